// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Analyse every spectrum in a time range, one after another.
//!
//! Each spectrum is loaded into the [`Analyser`], which runs whichever stages
//! are dynamic. The analyser is locked for the whole of a spectrum and
//! released during the pause between spectra, so other threads can look at it
//! or ask the batch to stop.

mod error;

pub use error::BatchError;

use std::{
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_utils::atomic::AtomicCell;
use hifitime::Epoch;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, warn};
use strum_macros::Display;

use crate::{
    events::{Event, MessageKind, Stage},
    source::SpectrumRequest,
    Analyser, PROGRESS_BARS,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    pub start: Epoch,

    /// The first spectrum after this is the last analysed.
    pub stop: Epoch,

    /// Wait between spectra.
    pub pause: Duration,

    /// Stop at the first spectrum without field data, or without a result
    /// from a dynamic moments or fit stage.
    pub halt_on_error: bool,

    /// Begin with the first spectrum after `start` rather than the nearest to
    /// it.
    pub get_next: bool,
}

/// Why a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BatchEnd {
    /// A spectrum after the stop time was reached.
    Finished,

    /// There were no more spectra.
    NoSpectrum,

    /// A spectrum had an error and `halt_on_error` was set.
    Halted,

    /// Someone asked the batch to stop.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// The number of spectra loaded.
    pub spectra: usize,
    pub end: BatchEnd,
}

/// Did the analysis of the loaded spectrum go wrong?
fn has_error(analyser: &Analyser) -> bool {
    let dynamic = analyser.dynamic();
    analyser.field().is_empty()
        || (dynamic.moments && analyser.moments().is_none())
        || (dynamic.fit && analyser.fit().is_none())
}

/// Run a batch on this thread. `stop` is checked once per spectrum; setting
/// it ends the batch before the next spectrum is loaded.
pub fn run_batch(
    analyser: &Mutex<Analyser>,
    options: &BatchOptions,
    stop: &AtomicCell<bool>,
) -> Result<BatchSummary, BatchError> {
    if options.start >= options.stop {
        return Err(BatchError::ReversedRange {
            start: options.start,
            stop: options.stop,
        });
    }
    info!("Analysing spectra from {} to {}", options.start, options.stop);
    analyser
        .lock()
        .map_err(|_| BatchError::Poisoned)?
        .message(Stage::Batch, MessageKind::Begin);

    let progress = ProgressBar::with_draw_target(
        None,
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {pos} spectra: {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    )
    .with_message("starting");

    let mut request = if options.get_next {
        SpectrumRequest::next(options.start)
    } else {
        SpectrumRequest::nearest(options.start)
    };
    let mut spectra = 0;
    let end = loop {
        let mut a = analyser.lock().map_err(|_| BatchError::Poisoned)?;
        a.load_spectrum(&request);
        let Some(time) = a.spectrum().map(|s| s.time) else {
            info!("No spectrum after {}", request.time);
            break BatchEnd::NoSpectrum;
        };
        spectra += 1;
        progress.inc(1);
        progress.set_message(time.to_string());
        debug!("Batch spectrum {spectra} at {time}");

        if options.halt_on_error && has_error(&a) {
            warn!("Halting the batch at the spectrum at {time}");
            break BatchEnd::Halted;
        }
        if time > options.stop {
            break BatchEnd::Finished;
        }
        if stop.load() {
            break BatchEnd::Stopped;
        }
        drop(a);

        if !options.pause.is_zero() {
            thread::sleep(options.pause);
        }
        request = SpectrumRequest::next(time);
    };

    let mut a = analyser.lock().map_err(|_| BatchError::Poisoned)?;
    let kind = match end {
        BatchEnd::Finished => MessageKind::End,
        _ => MessageKind::Abort,
    };
    a.message(Stage::Batch, kind);
    a.emit(Event::BatchDone);
    progress.finish_with_message(format!("{end}"));
    info!("Batch ended ({end}) after {spectra} spectra");

    Ok(BatchSummary { spectra, end })
}

/// Run a batch on a new thread.
pub fn spawn_batch(
    analyser: Arc<Mutex<Analyser>>,
    options: BatchOptions,
    stop: Arc<AtomicCell<bool>>,
) -> Result<JoinHandle<Result<BatchSummary, BatchError>>, BatchError> {
    stop.store(false);
    thread::Builder::new()
        .name("batch".to_string())
        .spawn(move || run_batch(&analyser, &options, &stop))
        .map_err(BatchError::Spawn)
}
