// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;
use tempfile::tempdir;

use super::*;
use crate::{
    field::FieldSample,
    fit::FittedPopulation,
    model::PopulationValues,
};

fn time() -> Epoch {
    Epoch::from_gregorian_utc_hms(2008, 11, 4, 12, 0, 3)
}

fn field() -> MagneticField {
    let samples = [
        FieldSample {
            time: time(),
            b: [1.0, -2.0, 3.0],
        },
        FieldSample {
            time: time() + hifitime::Duration::from_seconds(5.0),
            b: [3.0, -2.0, 1.0],
        },
    ];
    MagneticField::from_samples(time(), &samples, &[1.5])
}

/// A fit of the proton core and alpha core.
fn outcome() -> FitOutcome {
    FitOutcome {
        params: vec![],
        covariance: Array2::zeros((0, 0)),
        bulk_velocity: [-400.0, 12.5, -3.25],
        bulk_velocity_sigma: [0.5, 0.25, f64::INFINITY],
        populations: vec![
            FittedPopulation {
                slot: 0,
                values: PopulationValues {
                    density: 5.0,
                    drift: None,
                    thermal: Thermal::Anisotropic { per: 25.0, par: 35.0 },
                },
                sigmas: PopulationValues {
                    density: 0.01,
                    drift: None,
                    thermal: Thermal::Anisotropic { per: 0.1, par: 0.2 },
                },
            },
            FittedPopulation {
                slot: 2,
                values: PopulationValues {
                    density: 0.2,
                    drift: Some(-20.0),
                    thermal: Thermal::Anisotropic { per: 30.0, par: 40.0 },
                },
                sigmas: PopulationValues {
                    density: 0.001,
                    drift: Some(1.5),
                    thermal: Thermal::Anisotropic { per: 0.3, par: 0.4 },
                },
            },
        ],
        chi_squared: 1.0,
        iterations: 7,
        selection: Array3::from_elem((1, 1, 1), true),
        components: Array4::zeros((1, 1, 1, 2)),
        total: Array3::zeros((1, 1, 1)),
    }
}

fn record() -> FitRecord {
    FitRecord::new(time(), &field(), &IonRegistry::new(4, 5), &outcome()).unwrap()
}

#[test]
fn test_sci_matches_python_formatting() {
    assert_eq!(sci(123.4), "+1.2340e+02");
    assert_eq!(sci(-0.00051234), "-5.1234e-04");
    assert_eq!(sci(0.0), "+0.0000e+00");
    assert_eq!(sci(1e100), "+1.0000e+100");
    assert_eq!(sci(f64::INFINITY), "      +inf");
    assert_eq!(sci(f64::NEG_INFINITY), "      -inf");
    assert_eq!(sci(f64::NAN), "      +nan");
}

#[test]
fn test_record_from_outcome() {
    let r = record();
    assert_eq!(r.time, time());
    assert_eq!(r.b0, [2.0, -2.0, 2.0]);
    assert_eq!(r.v0, [-400.0, 12.5, -3.25]);

    assert_eq!(r.species.len(), 2);
    assert_eq!(r.species[0].name, "Proton");
    assert_eq!(r.species[1].symbol, "a");
    assert_eq!(r.species[1].mass, 4.0);
    assert_eq!(r.species[1].charge, 2.0);

    assert_eq!(r.populations.len(), 2);
    let alpha = &r.populations[1];
    assert_eq!(alpha.species, "Alpha");
    assert_eq!(alpha.name, "Core");
    assert_eq!(alpha.symbol, "c");
    assert_eq!(
        alpha.drift,
        Some(Measured {
            value: -20.0,
            sigma: 1.5
        })
    );
    assert!(r.populations[0].drift.is_none());
    assert_eq!(
        alpha.thermal,
        ThermalRecord::Anisotropic {
            w_per: Measured {
                value: 30.0,
                sigma: 0.3
            },
            w_par: Measured {
                value: 40.0,
                sigma: 0.4
            },
        }
    );
}

#[test]
fn test_species_listed_once() {
    let mut ions = IonRegistry::new(4, 5);
    ions.populations[1].used = true;
    let mut outcome = outcome();
    outcome.populations[1].slot = 1;
    outcome.populations[1].values.thermal = Thermal::Isotropic(30.0);
    outcome.populations[1].sigmas.thermal = Thermal::Isotropic(0.3);

    let r = FitRecord::new(time(), &field(), &ions, &outcome).unwrap();
    assert_eq!(r.species.len(), 1);
    assert_eq!(r.populations[1].species, "Proton");
    assert_eq!(r.populations[1].name, "Beam");
}

#[test]
fn test_record_needs_a_species() {
    let mut ions = IonRegistry::new(4, 5);
    ions.populations[2].species = None;
    let result = FitRecord::new(time(), &field(), &ions, &outcome());
    assert!(matches!(result, Err(ResultsError::NoSpecies { slot: 2 })));
}

#[test]
fn test_log_is_append_only() {
    let mut log = ResultsLog::new();
    assert!(log.is_empty());
    log.push(record());
    let mut second = record();
    second.time += hifitime::Duration::from_seconds(92.0);
    log.push(second.clone());
    assert_eq!(log.len(), 2);
    assert_eq!(log.records()[1], second);
}

#[test]
fn test_json_round_trip() {
    let mut log = ResultsLog::new();
    log.push(record());
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    log.write(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("\"kind\": \"anisotropic\""));
    // The infinite uncertainty.
    assert!(contents.contains("null"));

    let read = ResultsLog::read(&path).unwrap();
    assert_eq!(read.len(), 1);
    let r = &read.records()[0];
    assert_eq!(r.time, time());
    assert_eq!(r.populations, log.records()[0].populations);
    assert_eq!(r.sigma_v0[..2], [0.5, 0.25]);
    assert!(r.sigma_v0[2].is_nan());
}

#[test]
fn test_report_layout() {
    let mut log = ResultsLog::new();
    log.push(record());
    let mut buf = vec![];
    log.write_report(&mut buf).unwrap();
    let report = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = report.lines().collect();

    assert_eq!(lines[0], SEP);
    assert_eq!(lines[1], format!("# windfit {}", env!("CARGO_PKG_VERSION")));
    assert_eq!(SEP.len(), 59);
    assert!(report.contains("\nTimestamp:  2008-11-04/12:00:03\n"));
    assert!(report.contains("\nB-Field:    +2.0000e+00 -2.0000e+00 +2.0000e+00\n"));
    assert!(report.contains("\nVelocity:   -4.0000e+02 +1.2500e+01 -3.2500e+00\n"));
    assert!(report.contains(&format!(
        "\n{SPC} +5.0000e-01 +2.5000e-01       +inf\n"
    )));
    assert!(report.contains("\nSpecies:    Alpha (a)\n"));
    assert!(report.contains(&format!("\n{SPC} +4.0000e+00  +2.0000e+00\n")));
    assert!(report.contains(&format!("\n{SPC} Population: Core (c)\n")));
    assert!(report.contains(&format!("\n{SPC}{SPC}  Drift vel:  -2.0000e+01\n")));
    assert!(report.contains(&format!(
        "\n{SPC}{SPC}  Thrm Speed: +3.0000e+01 +4.0000e+01\n"
    )));
    assert!(report.contains(&format!(
        "\n{SPC}{SPC}{SPC}   +3.0000e-01 +4.0000e-01"
    )));
    // Protons don't drift.
    assert_eq!(report.matches("Drift vel:").count(), 1);
    assert_eq!(report.matches("Population:").count(), 2);
    assert_eq!(lines.last(), Some(&SEP));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let log = ResultsLog::new();
    let result = log.write(&dir.path().join("results.pkl"));
    assert!(matches!(result, Err(ResultsError::UnsupportedExt { ext }) if ext == "pkl"));

    let report = dir.path().join("results.TXT");
    log.write(&report).unwrap();
    assert!(matches!(
        ResultsLog::read(&report),
        Err(ResultsError::UnsupportedExt { .. })
    ));
}
