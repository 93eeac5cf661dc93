// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Weighted non-linear least squares by Levenberg-Marquardt.
//!
//! The damping is scaled by the diagonal of the normal matrix (Marquardt's
//! variant), so parameters of very different sizes are treated alike. The
//! Jacobian comes from central differences.

use log::trace;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use super::SolverSettings;
use crate::model::ModelError;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const LAMBDA_MAX: f64 = 1e20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LmError {
    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("Got {data} data points, {sigmas} uncertainties and {model} model values")]
    Dimensions {
        data: usize,
        sigmas: usize,
        model: usize,
    },

    #[error("Uncertainty {index} is {sigma}; uncertainties must be positive")]
    BadSigma { index: usize, sigma: f64 },

    #[error("The model became non-finite")]
    NonFinite,

    #[error("No step reduces the residuals")]
    Stalled,

    #[error("Didn't converge within {0} iterations")]
    MaxIterations(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: Vec<f64>,

    /// `(JᵀWJ)⁻¹ χ²/(m - p)`; infinite where it can't be determined.
    pub covariance: DMatrix<f64>,

    /// Weighted sum of squared residuals.
    pub chi_squared: f64,

    pub iterations: usize,
}

/// Minimise `Σ ((y - f(x)) / σ)²` starting from `x0`.
pub fn levenberg_marquardt<F>(
    f: F,
    x0: &[f64],
    y: &[f64],
    sigma: &[f64],
    settings: &SolverSettings,
) -> Result<LmSolution, LmError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, ModelError>,
{
    if let Some((index, &sigma)) = sigma
        .iter()
        .enumerate()
        .find(|(_, &s)| !s.is_finite() || s <= 0.0)
    {
        return Err(LmError::BadSigma { index, sigma });
    }

    let weighted_residuals = |x: &[f64]| -> Result<DVector<f64>, LmError> {
        let model = f(x)?;
        if model.len() != y.len() || sigma.len() != y.len() {
            return Err(LmError::Dimensions {
                data: y.len(),
                sigmas: sigma.len(),
                model: model.len(),
            });
        }
        let r = DVector::from_iterator(
            y.len(),
            y.iter()
                .zip(&model)
                .zip(sigma)
                .map(|((y, m), s)| (y - m) / s),
        );
        if r.iter().all(|v| v.is_finite()) {
            Ok(r)
        } else {
            Err(LmError::NonFinite)
        }
    };

    let mut x = DVector::from_column_slice(x0);
    let mut r = weighted_residuals(x.as_slice())?;
    let mut chi2 = r.norm_squared();
    let mut lambda = LAMBDA_INIT;

    for iteration in 1..=settings.max_iterations {
        if chi2 == 0.0 {
            return finish(&weighted_residuals, x, chi2, iteration);
        }

        let jac = jacobian(&weighted_residuals, &x)?;
        let a = jac.transpose() * &jac;
        let g = jac.transpose() * &r;

        // Gradient test: the cosine between the residuals and each column.
        let gnorm = (0..a.nrows())
            .filter(|&i| a[(i, i)] > 0.0)
            .map(|i| g[i].abs() / (a[(i, i)] * chi2).sqrt())
            .fold(0.0, f64::max);
        if gnorm <= settings.gtol {
            trace!("LM converged on the gradient after {iteration} iterations");
            return finish(&weighted_residuals, x, chi2, iteration);
        }

        loop {
            let mut damped = a.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * a[(i, i)].max(f64::EPSILON);
            }
            let delta = match solve(damped, &g) {
                Some(d) => d,
                None => {
                    lambda *= LAMBDA_UP;
                    if lambda > LAMBDA_MAX {
                        return Err(LmError::Stalled);
                    }
                    continue;
                }
            };
            let step = delta.norm() / (x.norm() + settings.xtol);

            let x_trial = &x + &delta;
            let trial = match weighted_residuals(x_trial.as_slice()) {
                Ok(r) => Some(r),
                Err(LmError::NonFinite) => None,
                Err(e) => return Err(e),
            };
            match trial {
                Some(r_trial) if r_trial.norm_squared() < chi2 => {
                    let chi2_trial = r_trial.norm_squared();
                    let actual = (chi2 - chi2_trial) / chi2;
                    let predicted = (2.0 * g.dot(&delta) - delta.dot(&(&a * &delta))) / chi2;
                    x = x_trial;
                    r = r_trial;
                    chi2 = chi2_trial;
                    lambda = (lambda * LAMBDA_DOWN).max(f64::EPSILON);

                    if (actual <= settings.ftol && predicted.abs() <= settings.ftol)
                        || step <= settings.xtol
                    {
                        trace!("LM converged after {iteration} iterations; chi^2 = {chi2}");
                        return finish(&weighted_residuals, x, chi2, iteration);
                    }
                    break;
                }
                _ => {
                    if step <= settings.xtol {
                        trace!("LM converged on the step size after {iteration} iterations");
                        return finish(&weighted_residuals, x, chi2, iteration);
                    }
                    lambda *= LAMBDA_UP;
                    if lambda > LAMBDA_MAX {
                        return Err(LmError::Stalled);
                    }
                }
            }
        }
    }

    Err(LmError::MaxIterations(settings.max_iterations))
}

/// Estimate the covariance at the solution.
fn finish<R>(residuals: &R, x: DVector<f64>, chi2: f64, iterations: usize) -> Result<LmSolution, LmError>
where
    R: Fn(&[f64]) -> Result<DVector<f64>, LmError>,
{
    let jac = jacobian(residuals, &x)?;
    let (m, p) = jac.shape();
    let a = jac.transpose() * &jac;
    let covariance = match (a.try_inverse(), m > p) {
        (Some(inv), true) => inv * (chi2 / (m - p) as f64),
        _ => DMatrix::from_element(p, p, f64::INFINITY),
    };
    Ok(LmSolution {
        params: x.iter().copied().collect(),
        covariance,
        chi_squared: chi2,
        iterations,
    })
}

/// Jacobian of the model. The residuals are `(y - f) / σ`, so this is minus
/// their Jacobian.
fn jacobian<R>(residuals: &R, x: &DVector<f64>) -> Result<DMatrix<f64>, LmError>
where
    R: Fn(&[f64]) -> Result<DVector<f64>, LmError>,
{
    let cols = x
        .iter()
        .enumerate()
        .map(|(j, &xj)| {
            let h = f64::EPSILON.cbrt() * xj.abs().max(1.0);
            let mut up = x.clone();
            up[j] += h;
            let mut down = x.clone();
            down[j] -= h;
            let r_up = residuals(up.as_slice())?;
            let r_down = residuals(down.as_slice())?;
            Ok((r_down - r_up) / (2.0 * h))
        })
        .collect::<Result<Vec<_>, LmError>>()?;
    Ok(DMatrix::from_columns(&cols))
}

fn solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    match a.clone().cholesky() {
        Some(c) => Some(c.solve(b)),
        None => a.lu().solve(b),
    }
}
