// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with fetching spectra and magnetic-field data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Spectrum {spectrum}, cup {cup}: every row of currents must have one value per voltage window")]
    RaggedCurrents { spectrum: usize, cup: usize },

    #[error("Spectrum {spectrum}, cup {cup} has no altitude and there is no default for it")]
    MissingAltitude { spectrum: usize, cup: usize },

    #[error("Couldn't (de)serialise the archive: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
