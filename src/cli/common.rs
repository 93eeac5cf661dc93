// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments shared by the subcommands that analyse spectra.

use std::{path::PathBuf, str::FromStr};

use clap::Args;
use hifitime::Epoch;
use log::{debug, info, warn};

use super::WindfitError;
use crate::{
    config::{AnalysisConfig, ARG_FILE_TYPES_COMMA_SEPARATED},
    model::Thermal,
    Analyser,
};

lazy_static::lazy_static! {
    pub(super) static ref CONFIG_HELP: String =
        format!("A file of analysis settings. Any settings given on the command line override those in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);
}

pub(super) const OUTPUTS_HELP: &str =
    "Paths to write fit results to. Supported formats: json, txt (a report)";

#[derive(Args, Debug, Clone, Default)]
pub(super) struct AnalysisArgs {
    #[clap(short, long, help = CONFIG_HELP.as_str(), help_heading = "SETTINGS", parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// The number of adjacent azimuths selected for the moments analysis.
    #[clap(long, help_heading = "SETTINGS")]
    pub(super) win_azm: Option<usize>,

    /// The number of adjacent velocity windows selected in each direction for
    /// the moments analysis.
    #[clap(long, help_heading = "SETTINGS")]
    pub(super) win_cur: Option<usize>,

    /// Currents below this are never used [pA].
    #[clap(long, help_heading = "SETTINGS")]
    pub(super) current_min: Option<f64>,

    /// The fewest bins the non-linear fit may be run on.
    #[clap(long, help_heading = "SETTINGS")]
    pub(super) fit_min_sel: Option<usize>,

    /// Run the non-linear fit on every spectrum. Only fits are written to the
    /// outputs.
    #[clap(long, help_heading = "SETTINGS")]
    pub(super) fit: bool,
}

impl AnalysisArgs {
    /// Read the settings file, if there is one, and apply the command-line
    /// settings on top.
    pub(super) fn merge(self) -> Result<AnalysisConfig, WindfitError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(w) = self.win_azm {
            config.win_azm = w;
        }
        if let Some(w) = self.win_cur {
            config.win_cur = w;
        }
        if let Some(c) = self.current_min {
            config.current_min = c;
        }
        if let Some(n) = self.fit_min_sel {
            config.fit_min_sel = n;
        }
        config.dynamic.fit |= self.fit;
        debug!("{config:#?}");
        Ok(config)
    }
}

pub(super) fn parse_time(time: &str) -> Result<Epoch, WindfitError> {
    Epoch::from_str(time.trim()).map_err(|e| WindfitError::Time {
        time: time.to_string(),
        err: e.to_string(),
    })
}

/// Write out the results of `analyser`, if anyone asked for them.
pub(super) fn write_outputs(analyser: &Analyser, outputs: &[PathBuf]) -> Result<(), WindfitError> {
    let results = analyser.results();
    if results.is_empty() && !outputs.is_empty() {
        warn!("There are no fit results; the outputs will be empty");
    }
    for path in outputs {
        results.write(path)?;
        info!("Wrote {} fit results to {}", results.len(), path.display());
    }
    Ok(())
}

/// Log what's known about the loaded spectrum.
pub(super) fn log_summary(analyser: &Analyser) {
    let Some(spectrum) = analyser.spectrum() else {
        warn!("No spectrum was loaded");
        return;
    };
    info!("Spectrum at {}", spectrum.time);
    let field = analyser.field();
    if field.is_empty() {
        warn!("  No magnetic-field data");
    } else {
        info!(
            "  |B| = {:.2} nT from {} samples",
            field.average_magnitude,
            field.len()
        );
    }

    match analyser.moments() {
        Some(m) => {
            info!(
                "  Moments: n = {:.3} cm^-3, V = ({:.1}, {:.1}, {:.1}) km/s, w = {:.2} km/s",
                m.density, m.velocity[0], m.velocity[1], m.velocity[2], m.thermal_speed
            );
            if let Some(a) = &m.anisotropy {
                info!(
                    "           w_per = {:.2} km/s, w_par = {:.2} km/s",
                    a.w_per, a.w_par
                );
            }
        }
        None => info!("  No moments"),
    }

    let Some(fit) = analyser.fit() else {
        info!("  No fit");
        return;
    };
    let [vx, vy, vz] = fit.bulk_velocity;
    let [sx, sy, sz] = fit.bulk_velocity_sigma;
    info!(
        "  Fit: V = ({vx:.1} ± {sx:.1}, {vy:.1} ± {sy:.1}, {vz:.1} ± {sz:.1}) km/s after {} iterations",
        fit.iterations
    );
    let ions = analyser.ions();
    for p in &fit.populations {
        let pop = &ions.populations[p.slot];
        let name = format!(
            "{} {}",
            ions.species_of(p.slot)
                .and_then(|s| s.name.as_deref())
                .unwrap_or("?"),
            pop.name.as_deref().unwrap_or("?")
        );
        let thermal = match (p.values.thermal, p.sigmas.thermal) {
            (Thermal::Isotropic(w), Thermal::Isotropic(s)) => format!("w = {w:.2} ± {s:.2}"),
            (Thermal::Anisotropic { per, par }, Thermal::Anisotropic { per: sp, par: sq }) => {
                format!("w_per = {per:.2} ± {sp:.2}, w_par = {par:.2} ± {sq:.2}")
            }
            _ => String::new(),
        };
        info!(
            "    {name}: n = {:.4} ± {:.4} cm^-3, {thermal} km/s",
            p.values.density, p.sigmas.density
        );
        if let (Some(dv), Some(s)) = (p.values.drift, p.sigmas.drift) {
            info!("    {name}: drift = {dv:.2} ± {s:.2} km/s");
        }
    }
}
