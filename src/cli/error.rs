// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all windfit-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use crate::{
    batch::BatchError, config::ConfigError, results::ResultsError, source::SourceError,
};

/// The *only* publicly visible error from windfit.
#[derive(Error, Debug)]
pub enum WindfitError {
    /// An error related to analysis settings or argument files.
    #[error("{0}\n\nRun `windfit default-config` to see every setting and its default.")]
    Config(String),

    /// An error related to reading an archive of spectra.
    #[error("{0}")]
    Source(String),

    /// An error related to writing results.
    #[error("{0}\n\nSupported results formats: json, txt")]
    Results(String),

    /// An error related to batch analysis.
    #[error("{0}")]
    Batch(String),

    /// A time that couldn't be understood.
    #[error("Couldn't parse '{time}' as a time: {err}\n\nUse e.g. '2008-11-04T12:00:00 UTC'")]
    Time { time: String, err: String },

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

impl From<ConfigError> for WindfitError {
    fn from(e: ConfigError) -> Self {
        let s = e.to_string();
        match e {
            ConfigError::IO(_) => Self::Generic(s),
            _ => Self::Config(s),
        }
    }
}

impl From<SourceError> for WindfitError {
    fn from(e: SourceError) -> Self {
        Self::Source(e.to_string())
    }
}

impl From<ResultsError> for WindfitError {
    fn from(e: ResultsError) -> Self {
        let s = e.to_string();
        match e {
            ResultsError::IO(_) => Self::Generic(s),
            _ => Self::Results(s),
        }
    }
}

impl From<BatchError> for WindfitError {
    fn from(e: BatchError) -> Self {
        Self::Batch(e.to_string())
    }
}

impl From<std::io::Error> for WindfitError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
