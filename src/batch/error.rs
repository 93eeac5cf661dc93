// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with batch analysis.

use hifitime::Epoch;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("The batch start time ({start}) must be before its stop time ({stop})")]
    ReversedRange { start: Epoch, stop: Epoch },

    #[error("The analyser was left in an unusable state by a panicking thread")]
    Poisoned,

    #[error("Couldn't start the batch thread: {0}")]
    Spawn(std::io::Error),
}
