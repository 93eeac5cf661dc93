// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Choosing which bins of a spectrum each analysis uses.
//!
//! The moments analysis uses a block of the strongest directions and, in each,
//! a run of the strongest windows. The non-linear fit uses, in each of those
//! directions, the windows where the guessed populations should be visible.

mod fit;
mod moments;

pub use fit::{FitSelection, SelectionTarget};
pub use moments::MomentsSelection;
