// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reasons the non-linear fit produced nothing.

use thiserror::Error;

use super::lm::LmError;
use crate::model::ModelError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("No spectrum is loaded")]
    NoSpectrum,

    #[error("There are no magnetic-field data")]
    NoField,

    #[error("There is no usable initial guess")]
    NoGuess,

    #[error("Only {selected} bins are selected; at least {required} are needed")]
    TooFewBins { selected: usize, required: usize },

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("{0}")]
    Solver(#[from] LmError),
}

impl FitError {
    /// Was the fit not attempted (as opposed to attempted and failed)?
    pub fn is_no_run(&self) -> bool {
        !matches!(self, FitError::Model(_) | FitError::Solver(_))
    }
}
