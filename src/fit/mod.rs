// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The non-linear fit of several ion populations to the selected currents.

mod error;
pub mod lm;
pub mod params;

pub use error::FitError;
pub use params::{auto_guess, build_guess, Guess};

use log::{debug, trace};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    field::MagneticField,
    instrument::EffectiveArea,
    model::{Covariates, PopulationModel, PopulationValues, Thermal},
    selection::FitSelection,
    spectrum::Spectrum,
};

/// Stopping rules of the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Relative reduction of χ² below which the fit has converged.
    pub ftol: f64,

    /// Relative step size below which the fit has converged.
    pub xtol: f64,

    /// Largest cosine between the residuals and any Jacobian column at which
    /// the fit has converged.
    pub gtol: f64,

    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 1.49012e-8,
            max_iterations: 2000,
        }
    }
}

/// One fitted population and its 1σ uncertainties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedPopulation {
    /// Population slot.
    pub slot: usize,

    pub values: PopulationValues,

    /// Same shape as `values`.
    pub sigmas: PopulationValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// Best-fit parameter vector, in the guess's layout.
    pub params: Vec<f64>,

    pub covariance: Array2<f64>,

    /// \[km/s\]
    pub bulk_velocity: [f64; 3],

    /// \[km/s\]
    pub bulk_velocity_sigma: [f64; 3],

    pub populations: Vec<FittedPopulation>,

    pub chi_squared: f64,

    pub iterations: usize,

    /// The bins that were fitted.
    pub selection: Array3<bool>,

    /// Currents \[pA\] expected from each fitted population in every bin,
    /// `[head, azimuth, window, population]`.
    pub components: Array4<f64>,

    /// Sum of `components` over populations.
    pub total: Array3<f64>,
}

/// Fit the guessed populations to the selected currents, weighting each by
/// the square root of its current.
pub fn run_fit(
    spectrum: Option<&Spectrum>,
    field: &MagneticField,
    guess: Option<&Guess>,
    selection: Option<&FitSelection>,
    min_selected: usize,
    area: &EffectiveArea,
    settings: &SolverSettings,
) -> Result<FitOutcome, FitError> {
    let spectrum = spectrum.ok_or(FitError::NoSpectrum)?;
    if spectrum.n_vel() == 0 {
        return Err(FitError::NoSpectrum);
    }
    if field.is_empty() {
        return Err(FitError::NoField);
    }
    let guess = guess
        .filter(|g| g.populations.first() == Some(&0) && !g.params.is_empty())
        .ok_or(FitError::NoGuess)?;
    let selected = selection.map_or(0, |s| s.count);
    if selected < min_selected {
        return Err(FitError::TooFewBins {
            selected,
            required: min_selected,
        });
    }
    let Some(selection) = selection else {
        return Err(FitError::TooFewBins {
            selected: 0,
            required: min_selected,
        });
    };

    let covariates = Covariates::from_mask(spectrum, field, selection.bins.view());
    let y = covariates
        .indices
        .iter()
        .map(|&i| spectrum.currents[i])
        .collect::<Vec<_>>();
    let sigma = y.iter().map(|c| c.sqrt()).collect::<Vec<_>>();
    let model = PopulationModel {
        layout: &guess.layout,
        covariates: &covariates,
        area,
    };
    trace!(
        "Fitting {} parameters to {} bins",
        guess.params.len(),
        covariates.len()
    );

    let solution = lm::levenberg_marquardt(
        |p| model.evaluate(p),
        &guess.params,
        &y,
        &sigma,
        settings,
    )?;

    let sigmas = solution
        .covariance
        .diagonal()
        .iter()
        .map(|v| v.sqrt())
        .collect::<Vec<_>>();
    let (bulk_velocity, values) = guess.layout.decode(&solution.params)?;
    let (_, sigma_values) = guess.layout.decode(&sigmas)?;
    let populations = guess
        .populations
        .iter()
        .zip(values)
        .zip(sigma_values)
        .map(|((&slot, values), sigmas)| FittedPopulation {
            slot,
            values,
            sigmas,
        })
        .collect::<Vec<_>>();

    let (components, total) =
        params::model_grids(&guess.layout, &solution.params, spectrum, field, area)?;
    let (p, _) = solution.covariance.shape();
    let covariance = Array2::from_shape_fn((p, p), |(i, j)| solution.covariance[(i, j)]);

    debug!(
        "Fit converged after {} iterations; chi^2 = {:.3}, v0 = {:?} km/s",
        solution.iterations, solution.chi_squared, bulk_velocity
    );
    for pop in &populations {
        let thermal = match pop.values.thermal {
            Thermal::Isotropic(w) => format!("w = {w:.2}"),
            Thermal::Anisotropic { per, par } => format!("w_per = {per:.2}, w_par = {par:.2}"),
        };
        trace!(
            "Population {}: n = {:.4} cm^-3, {thermal} km/s",
            pop.slot,
            pop.values.density
        );
    }

    Ok(FitOutcome {
        params: solution.params,
        covariance,
        bulk_velocity,
        bulk_velocity_sigma: [sigmas[0], sigmas[1], sigmas[2]],
        populations,
        chi_squared: solution.chi_squared,
        iterations: solution.iterations,
        selection: selection.bins.clone(),
        components,
        total,
    })
}
