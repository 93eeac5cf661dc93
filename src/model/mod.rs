// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The instrument-response model: currents expected from one or more
//! (bi-)Maxwellian ion populations.
//!
//! The single-population kernel integrates the flux of a bi-Maxwellian over
//! one velocity window along one look direction. It differs from the textbook
//! expression by a factor of two, which the Wind/FC calibration absorbs.

mod error;

pub use error::ModelError;

use std::f64::consts::{FRAC_2_PI, SQRT_2};

use ndarray::prelude::*;
use statrs::function::erf::erf;

use crate::{
    constants::PROTON_CHARGE,
    field::MagneticField,
    instrument::EffectiveArea,
    math::{add, dot, normalise, scale},
    spectrum::Spectrum,
};

/// The plasma parameters of one drifting bi-Maxwellian population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiMaxwellian {
    /// \[cm^-3\]
    pub density: f64,

    /// \[km/s\]
    pub velocity: [f64; 3],

    /// Thermal speed perpendicular to the field \[km/s\].
    pub w_per: f64,

    /// Thermal speed parallel to the field \[km/s\].
    pub w_par: f64,
}

impl BiMaxwellian {
    /// An isotropic Maxwellian.
    pub fn isotropic(density: f64, velocity: [f64; 3], w: f64) -> BiMaxwellian {
        BiMaxwellian {
            density,
            velocity,
            w_per: w,
            w_par: w,
        }
    }

    /// The thermal speed seen along a direction whose cosine with the field is
    /// `cos_field`.
    pub fn effective_thermal_speed(&self, cos_field: f64) -> f64 {
        let c2 = cos_field * cos_field;
        ((1.0 - c2) * self.w_per * self.w_per + c2 * self.w_par * self.w_par).sqrt()
    }
}

/// The current \[pA\] expected in the velocity window `[centre - width/2,
/// centre + width/2]` \[km/s\] of a cup looking along `look`, for a plasma in a
/// magnetic field along `field`. Neither direction needs to be normalised.
pub fn expected_current(
    centre: f64,
    width: f64,
    look: &[f64; 3],
    field: &[f64; 3],
    plasma: &BiMaxwellian,
    area: &EffectiveArea,
) -> f64 {
    let look = normalise(look);
    let cos_field = dot(&normalise(field), &look);
    let w = plasma.effective_thermal_speed(cos_field);

    // Speed of the bulk flow into the cup.
    let u = -dot(&look, &plasma.velocity);

    let term = |edge: f64| {
        let x = edge - u;
        1e3 * w * FRAC_2_PI.sqrt() * (-(x / w).powi(2) / 2.0).exp()
            + 1e3 * u * erf(x / (SQRT_2 * w))
    };
    let bracket = term(centre + width / 2.0) - term(centre - width / 2.0);

    1e12 * 0.5
        * PROTON_CHARGE
        * (1e6 * plasma.density)
        * (1e-4 * area.area(&look, &plasma.velocity))
        * bracket
}

/// [`expected_current`] for an isotropic Maxwellian; the field direction is
/// irrelevant.
pub fn expected_current_maxwellian(
    centre: f64,
    width: f64,
    look: &[f64; 3],
    density: f64,
    velocity: [f64; 3],
    w: f64,
    area: &EffectiveArea,
) -> f64 {
    expected_current(
        centre,
        width,
        look,
        &[1.0, 0.0, 0.0],
        &BiMaxwellian::isotropic(density, velocity, w),
        area,
    )
}

/// The thermal description of one population: one speed, or separate speeds
/// perpendicular and parallel to the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Thermal {
    Isotropic(f64),
    Anisotropic { per: f64, par: f64 },
}

/// The fitted quantities of one population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationValues {
    /// \[cm^-3\]
    pub density: f64,

    /// Drift along the field relative to the bulk velocity \[km/s\]; `None`
    /// for populations that don't drift.
    pub drift: Option<f64>,

    /// \[km/s\]
    pub thermal: Thermal,
}

/// The structure of one population in a parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationShape {
    pub drift: bool,
    pub aniso: bool,

    /// Relative to the proton.
    pub mass: f64,

    /// Relative to the proton.
    pub charge: f64,
}

impl PopulationShape {
    pub fn num_params(&self) -> usize {
        1 + usize::from(self.drift) + if self.aniso { 2 } else { 1 }
    }
}

/// The layout of a parameter vector: the bulk velocity `[v0_x, v0_y, v0_z]`,
/// then for each population its density, its drift (if it drifts) and its
/// thermal speed or (perpendicular, parallel) thermal speeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    shapes: Vec<PopulationShape>,
}

impl ParamLayout {
    pub fn new(shapes: Vec<PopulationShape>) -> ParamLayout {
        ParamLayout { shapes }
    }

    pub fn shapes(&self) -> &[PopulationShape] {
        &self.shapes
    }

    pub fn num_populations(&self) -> usize {
        self.shapes.len()
    }

    /// The length of parameter vectors with this layout.
    pub fn len(&self) -> usize {
        3 + self
            .shapes
            .iter()
            .map(PopulationShape::num_params)
            .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn encode(
        &self,
        bulk_velocity: [f64; 3],
        populations: &[PopulationValues],
    ) -> Result<Vec<f64>, ModelError> {
        if populations.len() != self.shapes.len() {
            return Err(ModelError::PopulationCount {
                expected: self.shapes.len(),
                got: populations.len(),
            });
        }

        let mut params = Vec::with_capacity(self.len());
        params.extend_from_slice(&bulk_velocity);
        for (i, (shape, values)) in self.shapes.iter().zip(populations).enumerate() {
            params.push(values.density);
            match (shape.drift, values.drift) {
                (true, Some(dv)) => params.push(dv),
                (false, None) => (),
                _ => return Err(ModelError::ShapeMismatch(i)),
            }
            match (shape.aniso, values.thermal) {
                (true, Thermal::Anisotropic { per, par }) => {
                    params.push(per);
                    params.push(par);
                }
                (false, Thermal::Isotropic(w)) => params.push(w),
                _ => return Err(ModelError::ShapeMismatch(i)),
            }
        }
        Ok(params)
    }

    /// The exact inverse of [`ParamLayout::encode`].
    pub fn decode(&self, params: &[f64]) -> Result<([f64; 3], Vec<PopulationValues>), ModelError> {
        if params.len() != self.len() {
            return Err(ModelError::ParamCount {
                expected: self.len(),
                got: params.len(),
            });
        }

        let bulk_velocity = [params[0], params[1], params[2]];
        let mut c = 3;
        let mut next = || {
            let p = params[c];
            c += 1;
            p
        };
        let populations = self
            .shapes
            .iter()
            .map(|shape| {
                let density = next();
                let drift = if shape.drift { Some(next()) } else { None };
                let thermal = if shape.aniso {
                    let per = next();
                    let par = next();
                    Thermal::Anisotropic { per, par }
                } else {
                    Thermal::Isotropic(next())
                };
                PopulationValues {
                    density,
                    drift,
                    thermal,
                }
            })
            .collect();
        Ok((bulk_velocity, populations))
    }
}

/// Everything the model needs to know about a set of bins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Covariates {
    /// `(head, azimuth, window)` of each bin.
    pub indices: Vec<(usize, usize, usize)>,

    /// Velocity-window centres \[km/s\].
    pub centres: Vec<f64>,

    /// Velocity-window widths \[km/s\].
    pub widths: Vec<f64>,

    /// Unit look vectors.
    pub looks: Vec<[f64; 3]>,

    /// The field during each bin's window \[nT\].
    pub fields: Vec<[f64; 3]>,
}

impl Covariates {
    /// The covariates of the bins flagged in `mask`, in `(head, azimuth,
    /// window)` order.
    pub fn from_mask(spectrum: &Spectrum, field: &MagneticField, mask: ArrayView3<bool>) -> Covariates {
        let indices = mask
            .indexed_iter()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect();
        Covariates::from_indices(spectrum, field, indices)
    }

    /// The covariates of every bin of the spectrum.
    pub fn all(spectrum: &Spectrum, field: &MagneticField) -> Covariates {
        let (n_alt, n_azm, n_vel) = spectrum.currents.dim();
        let indices = (0..n_alt)
            .flat_map(|t| (0..n_azm).flat_map(move |p| (0..n_vel).map(move |v| (t, p, v))))
            .collect();
        Covariates::from_indices(spectrum, field, indices)
    }

    fn from_indices(
        spectrum: &Spectrum,
        field: &MagneticField,
        indices: Vec<(usize, usize, usize)>,
    ) -> Covariates {
        let mut cov = Covariates {
            centres: Vec::with_capacity(indices.len()),
            widths: Vec::with_capacity(indices.len()),
            looks: Vec::with_capacity(indices.len()),
            fields: Vec::with_capacity(indices.len()),
            indices: vec![],
        };
        for &(t, p, v) in &indices {
            cov.centres.push(spectrum.vel_centres[v]);
            cov.widths.push(spectrum.vel_widths[v]);
            cov.looks.push(spectrum.look(t, p));
            cov.fields
                .push(field.per_window.get(v).copied().unwrap_or(field.average));
        }
        cov.indices = indices;
        cov
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }
}

/// The summed response of several ion populations.
pub struct PopulationModel<'a> {
    pub layout: &'a ParamLayout,
    pub covariates: &'a Covariates,
    pub area: &'a EffectiveArea,
}

impl<'a> PopulationModel<'a> {
    /// The current of each population in each bin, with dimensions `[bin,
    /// population]`.
    pub fn evaluate_components(&self, params: &[f64]) -> Result<Array2<f64>, ModelError> {
        let (v0, populations) = self.layout.decode(params)?;
        let mut out = Array2::zeros((self.covariates.len(), populations.len()));

        for (i, (shape, values)) in self.layout.shapes().iter().zip(&populations).enumerate() {
            let (w_per, w_par) = match values.thermal {
                Thermal::Isotropic(w) => (w, w),
                Thermal::Anisotropic { per, par } => (per, par),
            };
            // Populations are modelled as if they were protons at a scaled
            // speed.
            let sqm = (shape.charge / shape.mass).sqrt();

            for (k, cur) in out.column_mut(i).iter_mut().enumerate() {
                let field = &self.covariates.fields[k];
                let velocity = match values.drift {
                    Some(dv) => add(&v0, &scale(&normalise(field), dv)),
                    None => v0,
                };
                let plasma = BiMaxwellian {
                    density: values.density,
                    velocity,
                    w_per,
                    w_par,
                };
                *cur = shape.charge
                    * expected_current(
                        self.covariates.centres[k] * sqm,
                        self.covariates.widths[k] * sqm,
                        &self.covariates.looks[k],
                        field,
                        &plasma,
                        self.area,
                    );
            }
        }

        Ok(out)
    }

    /// The total current in each bin.
    pub fn evaluate(&self, params: &[f64]) -> Result<Vec<f64>, ModelError> {
        Ok(self
            .evaluate_components(params)?
            .sum_axis(Axis(1))
            .to_vec())
    }
}
