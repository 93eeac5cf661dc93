// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Analysis of solar-wind ion spectra measured by a Faraday-cup spectrometer.

A spectrum is a grid of currents over look directions and velocity windows.
`windfit` selects trustworthy bins, inverts them into first-order plasma
moments, and refines those with a multi-population non-linear fit of a
bi-Maxwellian instrument-response model.
 */

pub mod analysis;
pub mod batch;
mod cli;
pub mod config;
pub mod constants;
pub mod events;
pub mod field;
pub mod fit;
pub mod instrument;
pub mod ions;
pub(crate) mod math;
pub mod model;
pub mod moments;
pub mod results;
pub mod selection;
pub mod source;
pub mod spectrum;

use crossbeam_utils::atomic::AtomicCell;

// Re-exports.
pub use analysis::{Analyser, DisplayedResult, DynamicStage, GuessEdit};
pub use cli::{Windfit, WindfitError};
pub use config::AnalysisConfig;
pub use events::{Event, EventReceiver, MessageKind, Stage};
pub use field::{FieldSample, MagneticField};
pub use instrument::EffectiveArea;
pub use results::{FitRecord, ResultsLog};
pub use spectrum::{RawCup, RawSpectrum, Spectrum};

/// Should progress bars be drawn? The CLI turns this on unless the user asks
/// otherwise.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
