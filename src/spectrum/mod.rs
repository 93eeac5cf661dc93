// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ion spectra.
//!
//! A [`RawSpectrum`] is what a data source hands over: for each detector head
//! (cup), its azimuths, the centre and width of each voltage window and the
//! measured currents. [`Spectrum::from_raw`] converts the voltage windows into
//! proton-speed windows, drops trailing fill data and flags unusable bins.

mod error;

pub use error::SpectrumError;

use hifitime::Epoch;
use itertools::Itertools;
use log::{debug, trace, warn};
use ndarray::prelude::*;

use crate::{
    constants::{PROTON_CHARGE, PROTON_MASS},
    instrument::look_direction,
    AnalysisConfig,
};

/// The data of one detector head, as delivered by a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCup {
    /// \[degrees\]
    pub altitude: f64,

    /// One per look direction \[degrees\].
    pub azimuths: Vec<f64>,

    /// Centre of each voltage window \[V\].
    pub centre_voltages: Vec<f64>,

    /// Width of each voltage window \[V\].
    pub width_voltages: Vec<f64>,

    /// Currents \[pA\] with dimensions `[azimuth, window]`.
    pub currents: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSpectrum {
    pub time: Epoch,
    pub cups: Vec<RawCup>,
}

/// A measured spectrum. This is immutable once made; loading another spectrum
/// replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub time: Epoch,

    /// One per detector head \[degrees\].
    pub altitudes: Vec<f64>,

    /// \[degrees\] with dimensions `[head, azimuth]`.
    pub azimuths: Array2<f64>,

    /// Centres of the velocity windows \[km/s\].
    pub vel_centres: Vec<f64>,

    /// Widths of the velocity windows \[km/s\].
    pub vel_widths: Vec<f64>,

    /// \[pA\] with dimensions `[head, azimuth, window]`.
    pub currents: Array3<f64>,

    /// Which currents are trustworthy. Same shape as `currents`.
    pub valid: Array3<bool>,

    /// Seconds spent on each velocity window.
    pub rotation_seconds: f64,
}

impl Spectrum {
    /// Make a spectrum from velocity windows directly. The validity mask is
    /// derived from the currents.
    pub fn new(
        time: Epoch,
        altitudes: Vec<f64>,
        azimuths: Array2<f64>,
        vel_centres: Vec<f64>,
        vel_widths: Vec<f64>,
        currents: Array3<f64>,
        config: &AnalysisConfig,
    ) -> Result<Spectrum, SpectrumError> {
        let (n_alt, n_azm, n_vel) = currents.dim();
        if altitudes.len() != n_alt || azimuths.dim() != (n_alt, n_azm) {
            return Err(SpectrumError::GeometryShape {
                altitudes: altitudes.len(),
                azimuths: azimuths.dim(),
                currents: currents.dim(),
            });
        }
        if vel_centres.len() != n_vel || vel_widths.len() != n_vel {
            return Err(SpectrumError::WindowCount {
                centres: vel_centres.len(),
                widths: vel_widths.len(),
                currents: n_vel,
            });
        }

        let valid = validity_mask(
            currents.view(),
            config.current_min,
            config.current_jump,
        );
        Ok(Spectrum {
            time,
            altitudes,
            azimuths,
            vel_centres,
            vel_widths,
            currents,
            valid,
            rotation_seconds: config.rotation_seconds,
        })
    }

    /// Convert a raw spectrum. Voltage windows become proton-speed windows,
    /// and everything from the first non-increasing window onwards is dropped.
    pub fn from_raw(raw: &RawSpectrum, config: &AnalysisConfig) -> Result<Spectrum, SpectrumError> {
        if raw.cups.is_empty() {
            return Err(SpectrumError::NoCups);
        }
        let n_azm = raw.cups[0].azimuths.len();
        for (i, cup) in raw.cups.iter().enumerate() {
            if cup.azimuths.len() != n_azm {
                return Err(SpectrumError::AzimuthCount {
                    cup: i,
                    expected: n_azm,
                    got: cup.azimuths.len(),
                });
            }
            if cup.width_voltages.len() != cup.centre_voltages.len() {
                return Err(SpectrumError::VoltageCount {
                    cup: i,
                    centres: cup.centre_voltages.len(),
                    widths: cup.width_voltages.len(),
                });
            }
            let expected = (n_azm, cup.centre_voltages.len());
            if cup.currents.dim() != expected {
                return Err(SpectrumError::CurrentShape {
                    cup: i,
                    expected,
                    got: cup.currents.dim(),
                });
            }
        }

        let windows = raw
            .cups
            .iter()
            .map(|cup| velocity_windows(&cup.centre_voltages, &cup.width_voltages))
            .collect::<Vec<_>>();
        let n_vel = truncation_length(&windows.iter().map(|(c, _)| c.as_slice()).collect_vec());
        trace!("Keeping {n_vel} velocity windows");

        // All heads share the first head's velocity windows.
        let (centres, widths) = &windows[0];
        for (i, (other, _)) in windows.iter().enumerate().skip(1) {
            let mismatch = centres
                .iter()
                .zip(other.iter())
                .take(n_vel)
                .any(|(a, b)| (a - b).abs() > 1e-6 * a.abs().max(b.abs()));
            if mismatch {
                warn!("The velocity windows of cup {i} differ from those of cup 0; using cup 0's");
            }
        }

        let n_alt = raw.cups.len();
        let altitudes = raw.cups.iter().map(|c| c.altitude).collect();
        let azimuths = Array2::from_shape_fn((n_alt, n_azm), |(t, p)| raw.cups[t].azimuths[p]);
        let currents = Array3::from_shape_fn((n_alt, n_azm, n_vel), |(t, p, v)| {
            raw.cups[t].currents[(p, v)]
        });

        let spectrum = Spectrum::new(
            raw.time,
            altitudes,
            azimuths,
            centres[..n_vel].to_vec(),
            widths[..n_vel].to_vec(),
            currents,
            config,
        )?;
        debug!(
            "Loaded spectrum at {}: {} x {} x {} bins, {} valid",
            spectrum.time,
            n_alt,
            n_azm,
            n_vel,
            spectrum.valid.iter().filter(|&&v| v).count()
        );
        Ok(spectrum)
    }

    pub fn n_alt(&self) -> usize {
        self.currents.len_of(Axis(0))
    }

    pub fn n_azm(&self) -> usize {
        self.currents.len_of(Axis(1))
    }

    pub fn n_vel(&self) -> usize {
        self.currents.len_of(Axis(2))
    }

    /// The unit look vector of direction `(t, p)`.
    pub fn look(&self, t: usize, p: usize) -> [f64; 3] {
        look_direction(self.altitudes[t], self.azimuths[(t, p)])
    }

    /// Time of each velocity window, in seconds after the spectrum's
    /// timestamp. Each is the middle of the window's rotation.
    pub fn window_times(&self) -> Vec<f64> {
        (0..self.n_vel())
            .map(|v| self.rotation_seconds * (v as f64 + 0.5))
            .collect()
    }

    /// Total duration of the measurement \[seconds\].
    pub fn duration(&self) -> f64 {
        self.rotation_seconds * self.n_vel() as f64
    }
}

/// Proton speed \[km/s\] equivalent to a voltage \[V\]. Negative voltages are
/// treated as zero.
pub fn voltage_to_speed(voltage: f64) -> f64 {
    1e-3 * (2.0 * PROTON_CHARGE * voltage.max(0.0) / PROTON_MASS).sqrt()
}

/// Convert voltage windows (centres and widths) into velocity windows.
fn velocity_windows(centres: &[f64], widths: &[f64]) -> (Vec<f64>, Vec<f64>) {
    centres
        .iter()
        .zip(widths)
        .map(|(&c, &d)| {
            let lower = voltage_to_speed(c - d / 2.0);
            let upper = voltage_to_speed(c + d / 2.0);
            (voltage_to_speed(c), upper - lower)
        })
        .unzip()
}

/// The number of leading windows to keep: the index of the first centre that
/// isn't larger than its predecessor in any of the heads.
pub fn truncation_length(centres: &[&[f64]]) -> usize {
    let shortest = centres.iter().map(|c| c.len()).min().unwrap_or(0);
    if shortest == 0 {
        return 0;
    }
    (1..shortest)
        .find(|&v| centres.iter().any(|c| c[v] <= c[v - 1]))
        .unwrap_or(shortest)
}

/// Flag the bins that can be trusted. A bin is invalid if its current is below
/// `current_min` (or not finite), or if it's a spike: more than `current_jump`
/// times its only neighbour at either end of the window range, or more than
/// `current_jump` times both neighbours elsewhere. With fewer than two windows
/// every bin is considered valid.
pub fn validity_mask(currents: ArrayView3<f64>, current_min: f64, current_jump: f64) -> Array3<bool> {
    let (_, _, n_vel) = currents.dim();
    let mut valid = Array3::from_elem(currents.dim(), true);
    if n_vel < 2 {
        return valid;
    }

    for (cur, mut vld) in currents
        .lanes(Axis(2))
        .into_iter()
        .zip(valid.lanes_mut(Axis(2)))
    {
        for v in 0..n_vel {
            let c = cur[v];
            let spike = |neighbour: f64| c > current_jump * neighbour;
            vld[v] = if !c.is_finite() || c < current_min {
                false
            } else if v == 0 {
                !spike(cur[1])
            } else if v == n_vel - 1 {
                !spike(cur[v - 1])
            } else {
                !(spike(cur[v - 1]) && spike(cur[v + 1]))
            };
        }
    }
    valid
}
