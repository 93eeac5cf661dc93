// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The moments analysis: closed-form estimates of the bulk velocity, density
//! and thermal speed from the selected currents.
//!
//! Each used direction gives an estimate of the inflow speed along it; a least
//! squares fit of those gives the bulk velocity. Each direction then gives a
//! density and a thermal speed. With field data, the thermal speeds of the
//! directions are regressed against their alignment with the field to split
//! the thermal speed into perpendicular and parallel parts.
//!
//! The estimators omit a factor of two present in the textbook expressions;
//! the currents are calibrated with it already applied.

mod error;

pub use error::MomentsError;

use log::{debug, trace};
use ndarray::prelude::*;

use crate::{
    constants::{BOLTZMANN, PROTON_CHARGE, PROTON_MASS},
    field::MagneticField,
    instrument::EffectiveArea,
    math::{dot, linear_fit, lstsq3, mean, norm, weighted_mean},
    model::{expected_current, expected_current_maxwellian, BiMaxwellian},
    selection::MomentsSelection,
    spectrum::Spectrum,
};

/// The estimates made from one used direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionEstimate {
    /// `(head, azimuth)`
    pub index: (usize, usize),

    /// Unit look vector.
    pub look: [f64; 3],

    /// Effective collecting area for the bulk velocity \[cm^2\].
    pub area: f64,

    /// \[cm^-3\]
    pub density: f64,

    /// Signed inflow speed along the look direction \[km/s\].
    pub speed: f64,

    /// \[km/s\]
    pub thermal_speed: f64,

    /// \[kK\]
    pub temperature: f64,
}

/// Perpendicular and parallel parts of the thermal speed and temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anisotropy {
    /// \[km/s\]
    pub w_per: f64,

    /// \[km/s\]
    pub w_par: f64,

    /// \[kK\]
    pub t_per: f64,

    /// \[kK\]
    pub t_par: f64,

    /// `t_per / t_par`
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MomentsResult {
    /// \[km/s\]
    pub velocity: [f64; 3],

    /// \[km/s\]
    pub speed: f64,

    /// \[cm^-3\]
    pub density: f64,

    /// \[km/s\]
    pub thermal_speed: f64,

    /// \[kK\]
    pub temperature: f64,

    /// Only when there were field data and the regression worked.
    pub anisotropy: Option<Anisotropy>,

    pub directions: Vec<DirectionEstimate>,

    /// Currents \[pA\] expected from the result in every bin of the spectrum.
    pub currents: Array3<f64>,
}

/// Temperature \[kK\] of protons with thermal speed `w` \[km/s\].
fn temperature(w: f64) -> f64 {
    (1e-3 / BOLTZMANN) * PROTON_MASS * (1e3 * w).powi(2)
}

/// Run the moments analysis on the selected bins. Every selected bin of a used
/// direction contributes, valid or not.
pub fn run_moments(
    spectrum: Option<&Spectrum>,
    selection: &MomentsSelection,
    field: &MagneticField,
    min_sel_azm: usize,
    area: &EffectiveArea,
) -> Result<MomentsResult, MomentsError> {
    let spectrum = spectrum.ok_or(MomentsError::NoSpectrum)?;
    if spectrum.n_vel() == 0 {
        return Err(MomentsError::NoWindows);
    }
    if selection.num_used < min_sel_azm {
        return Err(MomentsError::TooFewDirections {
            used: selection.num_used,
            required: min_sel_azm,
        });
    }

    let used = selection
        .directions
        .indexed_iter()
        .filter(|(_, &d)| d)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    let selected = |t: usize, p: usize| {
        (0..spectrum.n_vel())
            .filter(move |&v| selection.bins[(t, p, v)])
            .map(move |v| (spectrum.currents[(t, p, v)], spectrum.vel_centres[v]))
    };

    let looks = used
        .iter()
        .map(|&(t, p)| spectrum.look(t, p))
        .collect::<Vec<_>>();
    let speeds = used
        .iter()
        .map(|&(t, p)| {
            let (num, den) = selected(t, p).fold((0.0, 0.0), |(num, den), (cur, vel)| {
                (num + cur, den + cur / vel)
            });
            -num / den
        })
        .collect::<Vec<_>>();
    if speeds.iter().any(|s| !s.is_finite()) {
        return Err(MomentsError::Singular);
    }

    let velocity = lstsq3(&looks, &speeds).ok_or(MomentsError::Singular)?;
    let speed = norm(&velocity);
    trace!("Moments bulk velocity {velocity:?} km/s");

    let mut directions = Vec::with_capacity(used.len());
    for ((&index, &look), &dir_speed) in used.iter().zip(&looks).zip(&speeds) {
        let (t, p) = index;
        let eca = area.area(&look, &velocity);
        let scale = (1.0 / PROTON_CHARGE) / (1e-4 * eca);

        let density = 1e-6
            * scale
            * selected(t, p)
                .map(|(cur, vel)| (1e-12 * cur) / (1e3 * vel))
                .sum::<f64>();
        let flux = selected(t, p)
            .map(|(cur, vel)| (1e-12 * cur) * (1e3 * vel))
            .sum::<f64>();
        let w2 = scale / (1e6 * density) * flux - (1e3 * dir_speed).powi(2);
        let thermal_speed = 1e-3 * w2.max(0.0).sqrt();

        directions.push(DirectionEstimate {
            index,
            look,
            area: eca,
            density,
            speed: dir_speed,
            thermal_speed,
            temperature: temperature(thermal_speed),
        });
    }

    let densities = directions.iter().map(|d| d.density).collect::<Vec<_>>();
    let weights = directions.iter().map(|d| d.area * d.area).collect::<Vec<_>>();
    let density = weighted_mean(&densities, &weights).ok_or(MomentsError::Singular)?;

    let thermal_speeds = directions
        .iter()
        .map(|d| d.thermal_speed)
        .collect::<Vec<_>>();
    let anisotropy = if field.is_empty() {
        None
    } else {
        anisotropy(&directions, &field.average_direction)
    };
    let (thermal_speed, temp) = match anisotropy {
        Some(a) => {
            let w2 = (2.0 / 3.0) * a.w_per.powi(2) + (1.0 / 3.0) * a.w_par.powi(2);
            (w2.sqrt(), (2.0 / 3.0) * a.t_per + (1.0 / 3.0) * a.t_par)
        }
        None => {
            let w = mean(&thermal_speeds).ok_or(MomentsError::Singular)?;
            (w, temperature(w))
        }
    };

    let currents = Array3::from_shape_fn(spectrum.currents.dim(), |(t, p, v)| {
        let look = spectrum.look(t, p);
        let (centre, width) = (spectrum.vel_centres[v], spectrum.vel_widths[v]);
        match anisotropy {
            Some(a) => expected_current(
                centre,
                width,
                &look,
                &field.average_direction,
                &BiMaxwellian {
                    density,
                    velocity,
                    w_per: a.w_per,
                    w_par: a.w_par,
                },
                area,
            ),
            None => expected_current_maxwellian(
                centre,
                width,
                &look,
                density,
                velocity,
                thermal_speed,
                area,
            ),
        }
    });

    debug!(
        "Moments: |v| = {speed:.1} km/s, n = {density:.3} cm^-3, w = {thermal_speed:.2} km/s{}",
        match anisotropy {
            Some(a) => format!(", R = {:.3}", a.ratio),
            None => String::new(),
        }
    );

    Ok(MomentsResult {
        velocity,
        speed,
        density,
        thermal_speed,
        temperature: temp,
        anisotropy,
        directions,
        currents,
    })
}

/// Split the thermal speed using the directions' alignment with the field.
/// `None` if the alignments don't vary or the fit is unphysical.
fn anisotropy(directions: &[DirectionEstimate], b_dir: &[f64; 3]) -> Option<Anisotropy> {
    let x = directions
        .iter()
        .map(|d| dot(&d.look, b_dir).powi(2))
        .collect::<Vec<_>>();
    let y = directions
        .iter()
        .map(|d| d.thermal_speed.powi(2))
        .collect::<Vec<_>>();

    let (slope, icept) = linear_fit(&x, &y)?;
    if icept <= 0.0 || icept + slope <= 0.0 {
        trace!("Unphysical anisotropy fit (slope {slope}, intercept {icept})");
        return None;
    }

    let t_per = (1e-3 / BOLTZMANN) * PROTON_MASS * (1e6 * icept);
    let t_par = (1e-3 / BOLTZMANN) * PROTON_MASS * (1e6 * (icept + slope));
    Some(Anisotropy {
        w_per: icept.sqrt(),
        w_par: (icept + slope).sqrt(),
        t_per,
        t_par,
        ratio: t_per / t_par,
    })
}
