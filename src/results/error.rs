// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading or writing analysis results.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Tried to write results to a file with an unsupported extension '{ext}'! Supported: json, txt")]
    UnsupportedExt { ext: String },

    #[error("A fit of population {slot} has no species")]
    NoSpecies { slot: usize },

    #[error("Couldn't (de)serialise the results: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
