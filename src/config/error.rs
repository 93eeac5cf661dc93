// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with analysis settings.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Argument file '{file}' doesn't have a recognised file extension! Valid extensions are: {valid}")]
    UnknownExtension { file: String, valid: String },

    #[error("Couldn't decode the structure of {file}:\n{err}")]
    Decode { file: String, err: String },

    #[error("Couldn't encode the settings as toml: {0}")]
    Encode(String),

    #[error("The setting '{0}' must be positive")]
    NonPositive(&'static str),

    #[error("{0}")]
    Instrument(#[from] crate::instrument::InstrumentError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
