// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Instrument geometry: look directions of the cups and their effective
//! collecting area.

mod error;

pub use error::InstrumentError;

use ndarray::prelude::*;

use crate::{
    constants::{NUM_AREA_ANGLES, WIND_FC_EFFECTIVE_AREA},
    math::{clip, dot, normalise},
};

/// The Cartesian unit vector of a look direction. The colatitude is `90° -
/// altitude` and the longitude is `-azimuth` (both arguments in degrees).
pub fn look_direction(altitude: f64, azimuth: f64) -> [f64; 3] {
    let theta = (90.0 - altitude).to_radians();
    let phi = (-azimuth).to_radians();
    let (s_theta, c_theta) = theta.sin_cos();
    let (s_phi, c_phi) = phi.sin_cos();
    [s_theta * c_phi, s_theta * s_phi, c_theta]
}

/// Look directions for a grid of detector heads (`altitudes`, one per row of
/// `azimuths`). The output has the same shape as `azimuths`.
pub fn look_directions(altitudes: &[f64], azimuths: ArrayView2<f64>) -> Array2<[f64; 3]> {
    Array2::from_shape_fn(azimuths.dim(), |(t, p)| {
        look_direction(altitudes[t], azimuths[(t, p)])
    })
}

/// Effective collecting area as a function of inflow angle, tabulated at whole
/// degrees from 0 to 90.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveArea {
    /// \[cm^2\]
    table: Vec<f64>,
}

impl EffectiveArea {
    pub fn new(table: Vec<f64>) -> Result<EffectiveArea, InstrumentError> {
        if table.len() != NUM_AREA_ANGLES {
            return Err(InstrumentError::TableLength {
                expected: NUM_AREA_ANGLES,
                got: table.len(),
            });
        }
        if let Some((angle, &value)) = table
            .iter()
            .enumerate()
            .find(|(_, a)| !a.is_finite() || **a < 0.0)
        {
            return Err(InstrumentError::BadTableValue { angle, value });
        }
        Ok(EffectiveArea { table })
    }

    pub fn table(&self) -> &[f64] {
        &self.table
    }

    /// Area \[cm^2\] at an inflow angle \[degrees\]. The angle is clipped to
    /// \[0, 90\].
    pub fn at_angle(&self, angle: f64) -> f64 {
        let angle = clip(angle, 0.0, 90.0);
        let lower = angle.floor() as usize;
        if lower >= NUM_AREA_ANGLES - 1 {
            return self.table[NUM_AREA_ANGLES - 1];
        }
        let frac = angle - lower as f64;
        self.table[lower] + frac * (self.table[lower + 1] - self.table[lower])
    }

    /// Area \[cm^2\] seen by particles moving with `velocity` into a cup
    /// looking along `look`. Magnitudes of either vector are irrelevant.
    pub fn area(&self, look: &[f64; 3], velocity: &[f64; 3]) -> f64 {
        self.at_angle(inflow_angle(look, velocity))
    }
}

impl Default for EffectiveArea {
    fn default() -> Self {
        EffectiveArea {
            table: WIND_FC_EFFECTIVE_AREA.to_vec(),
        }
    }
}

/// The angle \[degrees\] between a cup's normal and the direction particles
/// arrive from, clipped to \[0, 90\].
pub fn inflow_angle(look: &[f64; 3], velocity: &[f64; 3]) -> f64 {
    let d = normalise(look);
    let v = normalise(velocity);
    let c = clip(-dot(&d, &v), -1.0, 1.0);
    clip(c.acos().to_degrees(), 0.0, 90.0)
}
