// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reasons the moments analysis produced nothing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MomentsError {
    #[error("No spectrum is loaded")]
    NoSpectrum,

    #[error("The spectrum has no velocity windows")]
    NoWindows,

    #[error("Only {used} look directions are selected; at least {required} are needed")]
    TooFewDirections { used: usize, required: usize },

    #[error("The selected look directions can't determine a bulk velocity")]
    Singular,
}

impl MomentsError {
    /// Was the analysis not attempted (as opposed to attempted and failed)?
    pub fn is_no_run(&self) -> bool {
        !matches!(self, MomentsError::Singular)
    }
}
