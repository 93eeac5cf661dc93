// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use hifitime::Duration;

use super::*;

fn start() -> Epoch {
    Epoch::from_gregorian_utc_hms(2008, 11, 4, 12, 0, 0)
}

fn sample(seconds: f64, b: [f64; 3]) -> FieldSample {
    FieldSample {
        time: start() + Duration::from_seconds(seconds),
        b,
    }
}

#[test]
fn test_empty_field() {
    let field = MagneticField::from_samples(start(), &[], &[1.5, 4.5]);
    assert!(field.is_empty());
    assert_eq!(field.len(), 0);
    assert!(field.per_window.is_empty());
    assert!(field.cos_to_look(&[1.0, 0.0, 0.0]).is_none());
}

#[test]
fn test_averages() {
    let samples = [sample(0.0, [3.0, 0.0, 0.0]), sample(10.0, [5.0, 0.0, 0.0])];
    let field = MagneticField::from_samples(start(), &samples, &[]);
    assert_eq!(field.len(), 2);
    assert_eq!(field.average, [4.0, 0.0, 0.0]);
    assert_abs_diff_eq!(field.average_magnitude, 4.0);
    assert_eq!(field.average_direction, [1.0, 0.0, 0.0]);
    assert_eq!(field.magnitudes, vec![3.0, 5.0]);
    assert_abs_diff_eq!(field.mean_deviation, 0.0);
    assert_abs_diff_eq!(field.cos_to_look(&[0.0, 1.0, 0.0]).unwrap(), 0.0);
}

#[test]
fn test_angles() {
    let samples = [sample(0.0, [0.0, 2.0, 0.0]), sample(1.0, [0.0, 0.0, 2.0])];
    let field = MagneticField::from_samples(start(), &samples, &[]);
    assert_abs_diff_eq!(field.latitudes[0], 0.0);
    assert_abs_diff_eq!(field.longitudes[0], 90.0);
    assert_abs_diff_eq!(field.latitudes[1], 90.0);
    // Each sample is 45 degrees from the average.
    assert_abs_diff_eq!(field.mean_deviation, 45.0, epsilon = 1e-10);
}

#[test]
fn test_mean_deviation_skips_zero_samples() {
    let samples = [
        sample(0.0, [0.0, 2.0, 0.0]),
        sample(1.0, [0.0, 0.0, 0.0]),
        sample(2.0, [0.0, 4.0, 0.0]),
    ];
    let field = MagneticField::from_samples(start(), &samples, &[]);
    assert_abs_diff_eq!(field.average_direction[1], 1.0, epsilon = 1e-12);
    // The zero sample would otherwise count as 90 degrees or NaN.
    assert_abs_diff_eq!(field.mean_deviation, 0.0, epsilon = 1e-10);
}

#[test]
fn test_interpolation_clamps_and_sorts() {
    // Out of order on purpose.
    let samples = [
        sample(6.0, [2.0, 4.0, 0.0]),
        sample(2.0, [0.0, 0.0, 0.0]),
    ];
    let field = MagneticField::from_samples(start(), &samples, &[0.0, 3.0, 4.0, 9.0]);
    assert_eq!(field.times, vec![2.0, 6.0]);
    assert_eq!(field.per_window.len(), 4);
    assert_eq!(field.per_window[0], [0.0, 0.0, 0.0]);
    assert_abs_diff_eq!(field.per_window[1][0], 0.5);
    assert_abs_diff_eq!(field.per_window[1][1], 1.0);
    assert_abs_diff_eq!(field.per_window[2][1], 2.0);
    assert_eq!(field.per_window[3], [2.0, 4.0, 0.0]);
}

#[test]
fn test_sample_serde() {
    let s = sample(0.0, [1.0, -2.0, 3.5]);
    let json = serde_json::to_string(&s).unwrap();
    assert!(json.contains("2008-11-04T12:00:00"));
    let back: FieldSample = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);
}
