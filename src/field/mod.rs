// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The ambient magnetic field during a spectrum.

#[cfg(test)]
mod tests;

use hifitime::Epoch;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::math::{dot, interp, mean, norm, normalise};

/// A single magnetometer measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    #[serde(with = "epoch_string")]
    pub time: Epoch,

    /// \[nT\]
    pub b: [f64; 3],
}

/// Magnetic-field samples relative to a spectrum's start and the quantities
/// derived from them. An empty field is a legal "no field data" state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagneticField {
    /// Seconds after the spectrum's timestamp, increasing.
    pub times: Vec<f64>,

    /// \[nT\]
    pub vectors: Vec<[f64; 3]>,

    /// Magnitude of each sample \[nT\].
    pub magnitudes: Vec<f64>,

    /// Elevation of each sample out of the x-y plane \[degrees\].
    pub latitudes: Vec<f64>,

    /// Azimuthal angle of each sample in the x-y plane \[degrees\].
    pub longitudes: Vec<f64>,

    /// Mean of the samples \[nT\].
    pub average: [f64; 3],

    /// Magnitude of `average` \[nT\].
    pub average_magnitude: f64,

    /// Unit vector along `average`.
    pub average_direction: [f64; 3],

    /// Mean of `latitudes` and `longitudes` \[degrees\].
    pub average_angles: [f64; 2],

    /// Mean over samples of `acos(b · average_direction / |b|)` \[degrees\],
    /// i.e. the average angle between each sample and the mean field
    /// direction. Samples with `|b| = 0` are left out; 0 when none remain.
    pub mean_deviation: f64,

    /// The field interpolated at the middle of each velocity window \[nT\].
    pub per_window: Vec<[f64; 3]>,
}

impl MagneticField {
    pub fn empty() -> MagneticField {
        MagneticField::default()
    }

    /// Derive the field quantities for a spectrum starting at `start` whose
    /// velocity windows are centred `window_times` seconds after it. Window
    /// times outside the span of the samples take the nearest sample's value.
    pub fn from_samples(
        start: Epoch,
        samples: &[FieldSample],
        window_times: &[f64],
    ) -> MagneticField {
        if samples.is_empty() {
            return MagneticField::empty();
        }

        let mut samples = samples.to_vec();
        samples.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

        let times: Vec<f64> = samples
            .iter()
            .map(|s| (s.time - start).to_seconds())
            .collect();
        let vectors: Vec<[f64; 3]> = samples.iter().map(|s| s.b).collect();
        let magnitudes: Vec<f64> = vectors.iter().map(norm).collect();

        let component = |i: usize| vectors.iter().map(|b| b[i]).collect::<Vec<_>>();
        let (bx, by, bz) = (component(0), component(1), component(2));
        // Non-empty, so the means exist.
        let average = [
            mean(&bx).unwrap_or_default(),
            mean(&by).unwrap_or_default(),
            mean(&bz).unwrap_or_default(),
        ];
        let average_magnitude = norm(&average);
        let average_direction = normalise(&average);

        let latitudes: Vec<f64> = vectors
            .iter()
            .map(|b| b[2].atan2(b[0].hypot(b[1])).to_degrees())
            .collect();
        let longitudes: Vec<f64> = vectors
            .iter()
            .map(|b| b[1].atan2(b[0]).to_degrees())
            .collect();
        let average_angles = [
            mean(&latitudes).unwrap_or_default(),
            mean(&longitudes).unwrap_or_default(),
        ];

        let deviations: Vec<f64> = vectors
            .iter()
            .zip(&magnitudes)
            .filter(|(_, &m)| m > 0.0)
            .map(|(b, m)| {
                (dot(b, &average_direction) / m)
                    .clamp(-1.0, 1.0)
                    .acos()
                    .to_degrees()
            })
            .collect();
        let mean_deviation = mean(&deviations).unwrap_or_default();

        let per_window = window_times
            .iter()
            .map(|&t| [interp(t, &times, &bx), interp(t, &times, &by), interp(t, &times, &bz)])
            .collect();

        debug!(
            "{} field samples; average |B| = {average_magnitude:.3} nT",
            samples.len()
        );

        MagneticField {
            times,
            vectors,
            magnitudes,
            latitudes,
            longitudes,
            average,
            average_magnitude,
            average_direction,
            average_angles,
            mean_deviation,
            per_window,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The cosine of the angle between a look direction and the average
    /// field. `None` without field data.
    pub fn cos_to_look(&self, look: &[f64; 3]) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(dot(look, &self.average_direction))
        }
    }
}

/// (De)serialise epochs as their human-readable form, e.g.
/// "2008-11-04T12:34:56 UTC".
pub(crate) mod epoch_string {
    use std::str::FromStr;

    use hifitime::Epoch;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(epoch: &Epoch, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&epoch.to_string())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Epoch, D::Error> {
        let s = String::deserialize(d)?;
        Epoch::from_str(&s).map_err(|e| D::Error::custom(format!("bad epoch '{s}': {e}")))
    }
}
