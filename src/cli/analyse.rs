// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use super::{
    common::{log_summary, parse_time, write_outputs, AnalysisArgs, OUTPUTS_HELP},
    WindfitError,
};
use crate::{
    source::{JsonArchive, SpectrumRequest},
    Analyser,
};

#[derive(Parser, Debug, Clone)]
pub(super) struct AnalyseArgs {
    /// A JSON archive of spectra and magnetic-field data.
    #[clap(name = "ARCHIVE", parse(from_os_str))]
    pub(super) archive: PathBuf,

    /// The time of the spectrum to analyse, e.g. '2008-11-04T12:00:00 UTC'.
    /// The nearest spectrum is used.
    #[clap(short, long)]
    pub(super) time: String,

    /// Use the first spectrum after the time rather than the nearest.
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

impl AnalyseArgs {
    pub(super) fn run(self, dry_run: bool, save_toml: Option<&Path>) -> Result<(), WindfitError> {
        let config = self.analysis.merge()?;
        if let Some(path) = save_toml {
            config.write_toml(path)?;
        }
        let time = parse_time(&self.time)?;
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
        let request = if self.next {
            SpectrumRequest::next(time)
        } else {
            SpectrumRequest::nearest(time)
        };
        analyser.load_spectrum(&request);
        log_summary(&analyser);
        write_outputs(&analyser, &self.outputs)
    }
}
