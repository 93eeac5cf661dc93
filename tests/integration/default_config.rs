// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests for the default settings.

use std::fs::read_to_string;

use crate::*;

#[test]
fn test_default_config_to_stdout() {
    let cmd = windfit().args(["default-config"]).ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);

    // Log lines surround the settings.
    assert!(stdout.contains("win_azm = 7"), "{stdout}");
    assert!(stdout.contains("[dynamic]"), "{stdout}");
}

#[test]
fn test_default_config_to_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let path = tmp_dir.path().join("settings.toml");
    let cmd = windfit()
        .args(["default-config", &path.display().to_string()])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));

    let config: AnalysisConfig = toml::from_str(&read_to_string(&path).unwrap()).unwrap();
    assert_eq!(config, AnalysisConfig::default());

    // The file is usable as settings for an analysis.
    let (_archive_dir, archive) = make_archive(1);
    let cmd = windfit()
        .args([
            "analyse",
            &archive.display().to_string(),
            "-t",
            "2008-11-04T12:00:00 UTC",
            "-c",
            &path.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
}
