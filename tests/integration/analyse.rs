// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests for analysing a single spectrum.

use std::fs::read_to_string;

use approx::assert_relative_eq;

use crate::*;
use windfit::{results::ThermalRecord, ResultsLog};

#[test]
fn test_analyse_writes_fit_results() {
    let (tmp_dir, archive) = make_archive(2);
    let json = tmp_dir.path().join("fits.json");
    let txt = tmp_dir.path().join("fits.txt");

    let cmd = windfit()
        .args([
            "analyse",
            &archive.display().to_string(),
            "-t",
            "2008-11-04T12:01:00 UTC",
            "--fit",
            "--no-progress-bars",
            "-o",
            &json.display().to_string(),
            &txt.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "{stderr}");
    assert!(stdout.contains("Moments"), "{stdout}");

    let log = ResultsLog::read(&json).unwrap();
    assert_eq!(log.len(), 1);
    let record = &log.records()[0];
    // 12:01:00 is nearer the second spectrum.
    assert!((record.time - at(CADENCE)).to_seconds().abs() < 1e-3);
    assert_relative_eq!(record.v0[0], -400.0, max_relative = 1e-2);
    assert!(record.v0[1].abs() < 5.0);
    assert!(record.v0[2].abs() < 5.0);
    assert_relative_eq!(record.b0[0], -3.0, epsilon = 1e-9);

    let names: Vec<&str> = record.species.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Proton", "Alpha"]);
    assert_eq!(record.populations.len(), 2);
    let protons = &record.populations[0];
    assert_eq!(protons.species, "Proton");
    assert_relative_eq!(protons.density.value, 5.0, max_relative = 5e-2);
    assert!(protons.drift.is_none());
    match protons.thermal {
        ThermalRecord::Anisotropic { w_per, w_par } => {
            assert_relative_eq!(w_per.value, 30.0, max_relative = 0.1);
            assert_relative_eq!(w_par.value, 30.0, max_relative = 0.1);
        }
        t => panic!("Expected an anisotropic proton core, got {t:?}"),
    }
    let alphas = &record.populations[1];
    assert_eq!(alphas.species, "Alpha");
    assert!(alphas.drift.is_some());

    let report = read_to_string(&txt).unwrap();
    assert!(report.contains("Timestamp:  2008-11-04/12:01:32"), "{report}");
    assert!(report.contains("Species:    Proton (p)"), "{report}");
    assert!(report.contains("Species:    Alpha (a)"), "{report}");
}

#[test]
fn test_analyse_without_the_fit_writes_nothing() {
    let (tmp_dir, archive) = make_archive(1);
    let json = tmp_dir.path().join("fits.json");

    let cmd = windfit()
        .args([
            "analyse",
            &archive.display().to_string(),
            "-t",
            "2008-11-04T12:00:00 UTC",
            "--no-progress-bars",
            "-o",
            &json.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    assert!(ResultsLog::read(&json).unwrap().is_empty());
}

#[test]
fn test_analyse_dry_run_leaves_no_outputs() {
    let (tmp_dir, archive) = make_archive(1);
    let json = tmp_dir.path().join("fits.json");
    let toml = tmp_dir.path().join("settings.toml");

    let cmd = windfit()
        .args([
            "--dry-run",
            "--save-toml",
            &toml.display().to_string(),
            "analyse",
            &archive.display().to_string(),
            "-t",
            "2008-11-04T12:00:00 UTC",
            "--win-azm",
            "5",
            "-o",
            &json.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    assert!(!json.exists());

    // The settings are saved even on a dry run.
    let config: AnalysisConfig = toml::from_str(&read_to_string(&toml).unwrap()).unwrap();
    assert_eq!(config.win_azm, 5);
}

#[test]
fn test_analyse_bad_inputs() {
    let (tmp_dir, archive) = make_archive(1);

    let cmd = windfit()
        .args([
            "analyse",
            &archive.display().to_string(),
            "-t",
            "the day after tomorrow",
        ])
        .ok();
    assert!(cmd.is_err(), "{:?}", get_cmd_output(cmd));
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("the day after tomorrow"), "{stderr}");

    let cmd = windfit()
        .args([
            "analyse",
            &tmp_dir.path().join("missing.json").display().to_string(),
            "-t",
            "2008-11-04T12:00:00 UTC",
        ])
        .ok();
    assert!(cmd.is_err(), "{:?}", get_cmd_output(cmd));

    // Results can't be written as yaml.
    let cmd = windfit()
        .args([
            "analyse",
            &archive.display().to_string(),
            "-t",
            "2008-11-04T12:00:00 UTC",
            "--fit",
            "-o",
            &tmp_dir.path().join("fits.yaml").display().to_string(),
        ])
        .ok();
    assert!(cmd.is_err(), "{:?}", get_cmd_output(cmd));
}
