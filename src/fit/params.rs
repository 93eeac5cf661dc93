// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The initial guess of the non-linear fit.

use log::{debug, trace};
use ndarray::prelude::*;

use crate::{
    field::MagneticField,
    instrument::EffectiveArea,
    ions::{FitSettings, GuessMultiplier, IonRegistry, Setting},
    math::{dot, round_sig, round_to},
    model::{Covariates, ModelError, PopulationModel, PopulationValues},
    moments::MomentsResult,
    spectrum::Spectrum,
};

pub use crate::model::ParamLayout;

/// A complete starting point for the fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub layout: ParamLayout,

    /// The population slots in the guess, in parameter order.
    pub populations: Vec<usize>,

    /// The parameter vector.
    pub params: Vec<f64>,

    /// Currents \[pA\] expected from each guessed population, with dimensions
    /// `[head, azimuth, window, population]`.
    pub components: Array4<f64>,

    /// Sum of `components` over populations.
    pub total: Array3<f64>,
}

impl Guess {
    pub fn values(&self) -> Option<([f64; 3], Vec<PopulationValues>)> {
        self.layout.decode(&self.params).ok()
    }
}

/// Is population `pop` part of a guess? It must be used, well formed and have
/// every number its flags call for.
pub fn eligible(ions: &IonRegistry, pop: usize) -> bool {
    ions.populations.get(pop).map_or(false, |p| p.used)
        && ions.population_valid(pop)
        && ions.populations[pop].values().is_some()
}

/// Replace the guessed bulk velocity and population values with scaled
/// moments. Everything is cleared first, so populations that aren't used,
/// aren't valid or have incomplete settings end up without values, as does
/// everything when there's no moments result.
pub fn auto_guess(
    ions: &mut IonRegistry,
    settings: &FitSettings,
    moments: Option<&MomentsResult>,
    field: &MagneticField,
) {
    ions.clear_guess_values();
    ions.bulk_velocity = Default::default();
    let Some(mom) = moments else {
        trace!("No moments; the guess is cleared");
        return;
    };

    ions.bulk_velocity = mom.velocity.map(|v| Setting::Value(round_to(v, 1)));

    let drift_sign = if field.is_empty() {
        None
    } else {
        let s = dot(&mom.velocity, &field.average_direction).signum();
        Some(if s == 0.0 { 1.0 } else { s })
    };

    for i in 0..ions.populations.len() {
        let drift = ions.populations[i].drift;
        if !ions.populations[i].used || !ions.population_valid(i) || !settings.guess_valid(i, drift) {
            continue;
        }
        let gss = |which| settings.multiplier(i, which);
        let pop = &mut ions.populations[i];

        pop.density = gss(GuessMultiplier::Density)
            .map(|m| round_sig(m * mom.density, 4))
            .into();
        if pop.drift {
            pop.drift_speed = match (drift_sign, gss(GuessMultiplier::Drift)) {
                (Some(s), Some(m)) => Setting::Value(round_sig(s * mom.speed * m, 4)),
                _ => Setting::Unset,
            };
        }
        let w: Setting<f64> = gss(GuessMultiplier::Thermal)
            .map(|m| round_sig(m * mom.thermal_speed, 4))
            .into();
        if pop.aniso {
            pop.w_per = w.clone();
            pop.w_par = w;
        } else {
            pop.w = w;
        }
    }
    debug!("Guess made from the moments");
}

/// Assemble the guess vector from the registry and model its currents over the
/// whole spectrum. `None` if population 0 can't take part, the bulk velocity
/// is incomplete or there are no field data.
pub fn build_guess(
    ions: &IonRegistry,
    spectrum: &Spectrum,
    field: &MagneticField,
    area: &EffectiveArea,
) -> Option<Guess> {
    let populations = (0..ions.populations.len())
        .filter(|&i| eligible(ions, i))
        .collect::<Vec<_>>();
    if populations.first() != Some(&0) || field.is_empty() {
        trace!("No guess: population 0 isn't ready or there's no field");
        return None;
    }
    let v0 = ions.bulk_velocity()?;

    let shapes = populations
        .iter()
        .map(|&i| ions.shape(i))
        .collect::<Option<Vec<_>>>()?;
    let values = populations
        .iter()
        .map(|&i| ions.populations[i].values())
        .collect::<Option<Vec<_>>>()?;
    let layout = ParamLayout::new(shapes);
    let params = layout.encode(v0, &values).ok()?;

    let (components, total) = model_grids(&layout, &params, spectrum, field, area).ok()?;
    debug!("Guess of {} parameters for {} populations", params.len(), populations.len());
    Some(Guess {
        layout,
        populations,
        params,
        components,
        total,
    })
}

/// The current of each population in every bin, `[head, azimuth, window,
/// population]`, and their sum.
pub(crate) fn model_grids(
    layout: &ParamLayout,
    params: &[f64],
    spectrum: &Spectrum,
    field: &MagneticField,
    area: &EffectiveArea,
) -> Result<(Array4<f64>, Array3<f64>), ModelError> {
    let covariates = Covariates::all(spectrum, field);
    let model = PopulationModel {
        layout,
        covariates: &covariates,
        area,
    };
    let flat = model.evaluate_components(params)?;
    let (n_alt, n_azm, n_vel) = spectrum.currents.dim();
    let components = Array4::from_shape_fn(
        (n_alt, n_azm, n_vel, layout.num_populations()),
        |(t, p, v, i)| flat[((t * n_azm + p) * n_vel + v, i)],
    );
    let total = components.sum_axis(Axis(3));
    Ok((components, total))
}
