// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading ion spectra.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("The spectrum has no cups")]
    NoCups,

    #[error("Cup {cup} has {got} azimuths, but cup 0 has {expected}")]
    AzimuthCount {
        cup: usize,
        expected: usize,
        got: usize,
    },

    #[error("Cup {cup} has {centres} voltage-window centres but {widths} widths")]
    VoltageCount {
        cup: usize,
        centres: usize,
        widths: usize,
    },

    #[error("Cup {cup} currents have shape {got:?}, expected {expected:?}")]
    CurrentShape {
        cup: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Spectrum geometry doesn't match its currents: {altitudes} altitudes, azimuths {azimuths:?}, currents {currents:?}")]
    GeometryShape {
        altitudes: usize,
        azimuths: (usize, usize),
        currents: (usize, usize, usize),
    },

    #[error("Spectrum has {centres} window centres and {widths} widths for {currents} windows of currents")]
    WindowCount {
        centres: usize,
        widths: usize,
        currents: usize,
    },
}
