// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests for batches of spectra.

use crate::*;
use windfit::ResultsLog;

#[test]
fn test_batch_fits_every_spectrum_in_range() {
    let (tmp_dir, archive) = make_archive(4);
    let json = tmp_dir.path().join("fits.json");

    // 12:02:00 is between the second and third spectra, so the third is the
    // last one analysed.
    let cmd = windfit()
        .args([
            "batch",
            &archive.display().to_string(),
            "--start",
            "2008-11-04T12:00:00 UTC",
            "--stop",
            "2008-11-04T12:02:00 UTC",
            "--fit",
            "--no-progress-bars",
            "-o",
            &json.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "{stderr}");
    assert!(stdout.contains("3 spectra analysed"), "{stdout}");

    let log = ResultsLog::read(&json).unwrap();
    assert_eq!(log.len(), 3);
    for (i, record) in log.records().iter().enumerate() {
        let expected = at(i as f64 * CADENCE);
        assert!((record.time - expected).to_seconds().abs() < 1e-3);
    }
}

#[test]
fn test_batch_halts_without_field_data() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    // Field data only cover the first spectrum.
    let samples = field_samples(CADENCE / 2.0);
    let spectra = (0..3)
        .map(|i| raw_spectrum(at(i as f64 * CADENCE), &samples))
        .collect();
    let archive = tmp_dir.path().join("archive.json");
    JsonArchive::write(&MemoryArchive::new(spectra, samples), &archive).unwrap();

    let cmd = windfit()
        .args([
            "batch",
            &archive.display().to_string(),
            "--start",
            "2008-11-04T12:00:00 UTC",
            "--stop",
            "2008-11-04T13:00:00 UTC",
            "--halt-on-error",
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("2 spectra analysed"), "{stdout}");
}

#[test]
fn test_batch_reversed_range() {
    let (_tmp_dir, archive) = make_archive(1);
    let cmd = windfit()
        .args([
            "batch",
            &archive.display().to_string(),
            "--start",
            "2008-11-04T13:00:00 UTC",
            "--stop",
            "2008-11-04T12:00:00 UTC",
        ])
        .ok();
    assert!(cmd.is_err(), "{:?}", get_cmd_output(cmd));

    let cmd = windfit()
        .args([
            "batch",
            &archive.display().to_string(),
            "--start",
            "2008-11-04T12:00:00 UTC",
            "--stop",
            "2008-11-04T13:00:00 UTC",
            "--pause=-1",
        ])
        .ok();
    assert!(cmd.is_err(), "{:?}", get_cmd_output(cmd));
}
