// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All physical constants are SI. Velocities elsewhere in the crate are km/s,
//! densities cm^-3, currents pA, fields nT and areas cm^2.

/// Elementary (proton) charge \[C\].
pub const PROTON_CHARGE: f64 = 1.602_176_634e-19;

/// Proton mass \[kg\].
pub const PROTON_MASS: f64 = 1.672_621_923_69e-27;

/// Boltzmann constant \[J/K\].
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// The altitudes of the two detector heads \[degrees\].
pub const DEFAULT_ALTITUDES: [f64; 2] = [15.0, -15.0];

/// The time taken by one spacecraft rotation, i.e. the time spent on one
/// velocity window \[seconds\].
pub const DEFAULT_ROTATION_SECONDS: f64 = 3.0;

/// Currents below this value \[pA\] are never valid.
pub const DEFAULT_CURRENT_MIN: f64 = 1.0;

/// A current more than this factor above its neighbour(s) is a spike.
pub const DEFAULT_CURRENT_JUMP: f64 = 100.0;

/// Default width of the azimuthal window of the moments selection.
pub const DEFAULT_WIN_AZM: usize = 7;

/// Default width of the velocity window of the moments selection.
pub const DEFAULT_WIN_CUR: usize = 7;

/// The minimum number of look directions used by the moments analysis.
pub const DEFAULT_MIN_SEL_AZM: usize = 5;

/// The minimum number of bins in a look direction used by the moments
/// analysis.
pub const DEFAULT_MIN_SEL_CUR: usize = 3;

/// The minimum number of bins required by the non-linear fit.
pub const DEFAULT_FIT_MIN_SEL: usize = 30;

/// Number of ion-species slots.
pub const DEFAULT_NUM_SPECIES: usize = 4;

/// Number of ion-population slots.
pub const DEFAULT_NUM_POPULATIONS: usize = 5;

/// Number of entries in an effective-area table (one per degree, 0 to 90).
pub const NUM_AREA_ANGLES: usize = 91;

/// Effective collecting area of the Wind/FC cups \[cm^2\] against inflow angle
/// in whole degrees.
pub const WIND_FC_EFFECTIVE_AREA: [f64; NUM_AREA_ANGLES] = [
    33.82000, 33.83000, 33.83000, 33.82000, 33.81000, //
    33.80000, 33.78000, 33.77000, 33.76000, 33.74000, //
    33.72000, 33.69000, 33.68000, 33.64000, 33.62000, //
    33.59000, 33.55000, 33.51000, 33.47000, 33.43000, //
    33.38700, 33.34100, 33.29300, 33.24300, 33.18200, //
    33.12800, 33.06300, 32.99600, 32.92800, 32.85900, //
    32.77800, 32.70700, 32.61600, 32.53500, 32.44500, //
    32.34600, 32.24900, 32.00100, 31.61500, 31.14000, //
    30.58820, 29.97170, 29.30000, 28.57000, 27.79000, //
    26.94000, 25.869997, 24.65000, 23.299996, 21.83000, //
    20.259996, 18.590001, 16.829996, 14.970001, 13.019996, //
    10.990001, 8.8779956, 6.6850016, 4.5209962, 2.5750016, //
    0.96799784, 0.0053996863, 0.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, //
];
