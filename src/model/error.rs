// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all model-related errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Expected {expected} parameters, got {got}")]
    ParamCount { expected: usize, got: usize },

    #[error("Expected values for {expected} populations, got {got}")]
    PopulationCount { expected: usize, got: usize },

    #[error("The values of population {0} don't match its drift/anisotropy flags")]
    ShapeMismatch(usize),
}
