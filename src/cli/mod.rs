// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `windfit`
//! subcommands are contained in modules.
//!
//! Only 3 things should be public in this module: `Windfit`, `Windfit::run`,
//! and `WindfitError`.

mod analyse;
mod batch;
mod common;
mod error;

pub use error::WindfitError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::{config::AnalysisConfig, PROGRESS_BARS};

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Analysis of solar-wind ion spectra from Faraday-cup spectrometers"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Windfit {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the analysis settings into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "analyze")]
    #[clap(about = "Analyse the spectrum nearest a time.")]
    Analyse(analyse::AnalyseArgs),

    #[clap(about = "Analyse every spectrum in a time range.")]
    Batch(batch::BatchArgs),

    #[clap(about = "Print (or write) the default analysis settings as TOML.")]
    DefaultConfig {
        /// Write the settings here rather than to stdout.
        #[clap(parse(from_os_str))]
        output: Option<PathBuf>,
    },
}

impl Windfit {
    pub fn run(self) -> Result<(), WindfitError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
        } = self.global_opts;
        if let Err(e) = setup_logging(verbosity) {
            return Err(WindfitError::Generic(format!(
                "Failed to initialise logging: {e}"
            )));
        }
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        let sub_command = match &self.command {
            Command::Analyse(_) => "analyse",
            Command::Batch(_) => "batch",
            Command::DefaultConfig { .. } => "default-config",
        };
        info!("windfit {} {}", sub_command, env!("CARGO_PKG_VERSION"));

        match self.command {
            Command::Analyse(args) => args.run(dry_run, save_toml.as_deref())?,
            Command::Batch(args) => args.run(dry_run, save_toml.as_deref())?,
            Command::DefaultConfig { output } => {
                let config = AnalysisConfig::default();
                match output {
                    Some(path) => {
                        config.write_toml(&path)?;
                        info!("Wrote the default settings to {}", path.display());
                    }
                    None => {
                        let s = toml::to_string(&config)
                            .map_err(|e| WindfitError::Config(e.to_string()))?;
                        println!("{s}");
                    }
                }
            }
        }

        info!("windfit {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}
