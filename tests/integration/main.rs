// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod analyse;
mod batch;
mod default_config;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};
use hifitime::{Duration, Epoch};
use ndarray::prelude::*;
use tempfile::TempDir;

use windfit::{
    constants::{PROTON_CHARGE, PROTON_MASS},
    model::{Covariates, ParamLayout, PopulationModel, PopulationShape, PopulationValues, Thermal},
    source::{JsonArchive, MemoryArchive},
    AnalysisConfig, EffectiveArea, FieldSample, MagneticField, RawCup, RawSpectrum, Spectrum,
};

const N_AZM: usize = 20;
const N_VEL: usize = 40;
const CADENCE: f64 = 92.0;

fn windfit() -> Command {
    Command::cargo_bin("windfit").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

fn t0() -> Epoch {
    Epoch::from_gregorian_utc_hms(2008, 11, 4, 12, 0, 0)
}

fn at(seconds: f64) -> Epoch {
    t0() + Duration::from_seconds(seconds)
}

fn voltage(speed: f64) -> f64 {
    PROTON_MASS * (1e3 * speed).powi(2) / (2.0 * PROTON_CHARGE)
}

fn field_samples(until: f64) -> Vec<FieldSample> {
    (0..=(until / 10.0) as usize)
        .map(|i| FieldSample {
            time: at(10.0 * i as f64),
            b: [-3.0, 3.0, 1.0],
        })
        .collect()
}

/// A spectrum of a proton core flowing at 400 km/s along -x and an alpha core
/// drifting 20 km/s along the field. The windows reach far enough to see the
/// alphas.
fn raw_spectrum(time: Epoch, samples: &[FieldSample]) -> RawSpectrum {
    let speeds: Vec<f64> = (0..N_VEL).map(|v| 250.0 + 15.0 * v as f64).collect();
    let centre_voltages: Vec<f64> = speeds.iter().map(|&s| voltage(s)).collect();
    let width_voltages: Vec<f64> = speeds
        .iter()
        .map(|&s| voltage(s + 7.5) - voltage(s - 7.5))
        .collect();
    let azimuths: Vec<f64> = (0..N_AZM).map(|p| -45.0 + 5.0 * p as f64).collect();
    let mut raw = RawSpectrum {
        time,
        cups: [15.0, -15.0]
            .into_iter()
            .map(|altitude| RawCup {
                altitude,
                azimuths: azimuths.clone(),
                centre_voltages: centre_voltages.clone(),
                width_voltages: width_voltages.clone(),
                currents: Array2::zeros((N_AZM, N_VEL)),
            })
            .collect(),
    };

    let blank = Spectrum::from_raw(&raw, &AnalysisConfig::default()).unwrap();
    let field = MagneticField::from_samples(time, samples, &blank.window_times());
    let layout = ParamLayout::new(vec![
        PopulationShape {
            drift: false,
            aniso: true,
            mass: 1.0,
            charge: 1.0,
        },
        PopulationShape {
            drift: true,
            aniso: true,
            mass: 4.0,
            charge: 2.0,
        },
    ]);
    let params = layout
        .encode(
            [-400.0, 0.0, 0.0],
            &[
                PopulationValues {
                    density: 5.0,
                    drift: None,
                    thermal: Thermal::Anisotropic {
                        per: 30.0,
                        par: 30.0,
                    },
                },
                PopulationValues {
                    density: 0.2,
                    drift: Some(20.0),
                    thermal: Thermal::Anisotropic {
                        per: 30.0,
                        par: 30.0,
                    },
                },
            ],
        )
        .unwrap();
    let covariates = Covariates::all(&blank, &field);
    let area = EffectiveArea::default();
    let currents = PopulationModel {
        layout: &layout,
        covariates: &covariates,
        area: &area,
    }
    .evaluate(&params)
    .unwrap();

    // Covariates run over every bin in [head, azimuth, window] order.
    for (t, cup) in raw.cups.iter_mut().enumerate() {
        cup.currents = Array2::from_shape_fn((N_AZM, N_VEL), |(p, v)| {
            currents[(t * N_AZM + p) * N_VEL + v]
        });
    }
    raw
}

/// Write an archive of `n` spectra, `CADENCE` seconds apart, into `dir`.
fn write_archive(dir: &Path, n: usize) -> PathBuf {
    let samples = field_samples(n as f64 * CADENCE);
    let spectra = (0..n)
        .map(|i| raw_spectrum(at(i as f64 * CADENCE), &samples))
        .collect();
    let path = dir.join("archive.json");
    JsonArchive::write(&MemoryArchive::new(spectra, samples), &path).unwrap();
    path
}

fn make_archive(n: usize) -> (TempDir, PathBuf) {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let path = write_archive(tmp_dir.path(), n);
    (tmp_dir, path)
}
