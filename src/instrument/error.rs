// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with instrument calibration inputs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("The effective-area table must have {expected} entries (0 to 90 degrees), but it has {got}")]
    TableLength { expected: usize, got: usize },

    #[error("The effective-area table has an invalid value at {angle} degrees: {value}")]
    BadTableValue { angle: usize, value: f64 },
}
