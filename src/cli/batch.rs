// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::Parser;
use crossbeam_utils::atomic::AtomicCell;
use log::info;

use super::{
    common::{parse_time, write_outputs, AnalysisArgs, OUTPUTS_HELP},
    WindfitError,
};
use crate::{
    batch::{spawn_batch, BatchOptions},
    events::{Event, MessageKind, Stage},
    source::JsonArchive,
    Analyser,
};

#[derive(Parser, Debug, Clone)]
pub(super) struct BatchArgs {
    /// A JSON archive of spectra and magnetic-field data.
    #[clap(name = "ARCHIVE", parse(from_os_str))]
    pub(super) archive: PathBuf,

    /// Start with the spectrum nearest this time.
    #[clap(long)]
    pub(super) start: String,

    /// Finish with the first spectrum after this time.
    #[clap(long)]
    pub(super) stop: String,

    /// Seconds to wait between spectra.
    #[clap(long, default_value = "0")]
    pub(super) pause: f64,

    /// Stop at the first spectrum without field data, or without a result
    /// from the moments or (if it's run) the fit.
    #[clap(long)]
    pub(super) halt_on_error: bool,

    /// Start with the first spectrum after the start time rather than the
    /// nearest.
    #[clap(long)]
    pub(super) next: bool,

    #[clap(flatten)]
    pub(super) analysis: AnalysisArgs,

    #[clap(
        short = 'o',
        long,
        multiple_values(true),
        help = OUTPUTS_HELP,
        help_heading = "OUTPUT FILES"
    )]
    pub(super) outputs: Vec<PathBuf>,
}

impl BatchArgs {
    pub(super) fn run(self, dry_run: bool, save_toml: Option<&Path>) -> Result<(), WindfitError> {
        let config = self.analysis.merge()?;
        if let Some(path) = save_toml {
            config.write_toml(path)?;
        }
        let options = BatchOptions {
            start: parse_time(&self.start)?,
            stop: parse_time(&self.stop)?,
            pause: Duration::try_from_secs_f64(self.pause).map_err(|e| {
                WindfitError::Batch(format!("Invalid pause '{}': {e}", self.pause))
            })?,
            halt_on_error: self.halt_on_error,
            get_next: self.next,
        };
        let archive = JsonArchive::open(&self.archive)?;
        info!(
            "{} spectra in {}",
            archive.archive().spectra().len(),
            self.archive.display()
        );
        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let mut analyser = Analyser::new(config, Box::new(archive.clone()), Box::new(archive))?;
        let rx = analyser.subscribe();
        let analyser = Arc::new(Mutex::new(analyser));
        let stop = Arc::new(AtomicCell::new(false));
        let summary = spawn_batch(Arc::clone(&analyser), options, stop)?
            .join()
            .map_err(|_| WindfitError::Batch("The batch thread panicked".to_string()))??;

        let (mut fits, mut failures) = (0, 0);
        for event in rx.try_iter() {
            match event {
                Event::Message {
                    stage: Stage::Fit,
                    kind: MessageKind::End,
                } => fits += 1,
                Event::Message {
                    stage: Stage::Fit,
                    kind: MessageKind::Fail,
                } => failures += 1,
                _ => (),
            }
        }
        info!(
            "{} spectra analysed ({}); {fits} fits, {failures} failed",
            summary.spectra, summary.end
        );

        let analyser = analyser
            .lock()
            .map_err(|_| WindfitError::Batch("The analyser was poisoned".to_string()))?;
        write_outputs(&analyser, &self.outputs)
    }
}
