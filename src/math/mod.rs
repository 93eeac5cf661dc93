// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use nalgebra::{DMatrix, DVector};

/// Dot product of two Cartesian 3-vectors.
#[inline]
pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean length of a 3-vector.
#[inline]
pub(crate) fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// The unit vector along `a`. A zero vector is returned unchanged.
#[inline]
pub(crate) fn normalise(a: &[f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n > 0.0 {
        [a[0] / n, a[1] / n, a[2] / n]
    } else {
        *a
    }
}

#[inline]
pub(crate) fn scale(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub(crate) fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub(crate) fn clip(x: f64, lower: f64, upper: f64) -> f64 {
    x.max(lower).min(upper)
}

/// Arithmetic mean. `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Weighted mean. `None` if there are no values or the weights sum to zero.
pub(crate) fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if values.is_empty() || values.len() != weights.len() || total == 0.0 {
        return None;
    }
    Some(
        values
            .iter()
            .zip(weights)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / total,
    )
}

/// One-dimensional linear interpolation of `(xp, fp)` at `x`. `xp` must be
/// increasing. Values outside the domain take the nearest end value.
pub(crate) fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    match xp.len() {
        0 => f64::NAN,
        1 => fp[0],
        n => {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= xp[n - 1] {
                return fp[n - 1];
            }
            // First index with xp[i] > x; guaranteed to be in 1..n.
            let i = xp.partition_point(|&v| v <= x);
            let (x0, x1) = (xp[i - 1], xp[i]);
            let (f0, f1) = (fp[i - 1], fp[i]);
            if x1 == x0 {
                f0
            } else {
                f0 + (f1 - f0) * (x - x0) / (x1 - x0)
            }
        }
    }
}

/// Ordinary least-squares straight line through `(x, y)`. Returns `(slope,
/// intercept)`, or `None` when there are fewer than two points or no spread in
/// `x`.
pub(crate) fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() < 2 || x.len() != y.len() {
        return None;
    }
    let x_mean = mean(x)?;
    let y_mean = mean(y)?;
    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
            let dx = xi - x_mean;
            (sxy + dx * (yi - y_mean), sxx + dx * dx)
        });
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, y_mean - slope * x_mean))
}

/// Least-squares solution `x` of `design · x = rhs` for a design matrix with
/// three columns, via the SVD. `None` if the system is rank deficient.
pub(crate) fn lstsq3(design: &[[f64; 3]], rhs: &[f64]) -> Option<[f64; 3]> {
    if design.len() != rhs.len() || design.len() < 3 {
        return None;
    }
    let a = DMatrix::from_fn(design.len(), 3, |r, c| design[r][c]);
    let b = DVector::from_column_slice(rhs);
    let svd = a.svd(true, true);
    // Singular values are sorted in decreasing order.
    let largest = svd.singular_values.max();
    let eps = largest * design.len() as f64 * f64::EPSILON;
    if svd.singular_values.iter().any(|&s| s <= eps) {
        return None;
    }
    let x = svd.solve(&b, eps).ok()?;
    Some([x[0], x[1], x[2]])
}

/// Round to `decimals` decimal places.
pub(crate) fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Round to `sig` significant figures. Zero and non-finite values are returned
/// unchanged.
pub(crate) fn round_sig(x: f64, sig: i32) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let magnitude = x.abs().log10().floor() as i32;
    round_to(x, sig - magnitude - 1)
}
