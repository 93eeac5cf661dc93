// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::debug;
use ndarray::prelude::*;

use crate::{
    field::MagneticField,
    ions::WindowBounds,
    math::{add, dot, norm, scale},
    model::{PopulationShape, PopulationValues, Thermal},
    spectrum::Spectrum,
};

/// A guessed population to select bins for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionTarget {
    pub shape: PopulationShape,
    pub values: PopulationValues,
    pub bounds: WindowBounds,
}

/// The bins used by the non-linear fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSelection {
    /// `[head, azimuth, window]`
    pub bins: Array3<bool>,

    pub count: usize,
}

impl FitSelection {
    pub fn empty(dim: (usize, usize, usize)) -> FitSelection {
        FitSelection {
            bins: Array3::from_elem(dim, false),
            count: 0,
        }
    }

    /// In every direction flagged in `directions`, select the valid bins whose
    /// speeds fall within each target's window. A target's window is centred on
    /// its bulk speed into the cup and is `lower` to `upper` thermal speeds
    /// wide, scaled to proton-equivalent speeds.
    pub fn auto(
        spectrum: &Spectrum,
        directions: ArrayView2<bool>,
        field: &MagneticField,
        bulk_velocity: [f64; 3],
        targets: &[SelectionTarget],
    ) -> FitSelection {
        let mut sel = FitSelection::empty(spectrum.currents.dim());
        if targets.is_empty() || field.is_empty() {
            debug!("No populations or field data; nothing selected for the fit");
            return sel;
        }
        let b_dir = field.average_direction;

        for ((t, p), _) in directions.indexed_iter().filter(|(_, &d)| d) {
            let look = spectrum.look(t, p);
            for target in targets {
                let vel = match target.values.drift {
                    Some(dv) => add(&bulk_velocity, &scale(&b_dir, dv)),
                    None => bulk_velocity,
                };
                let speed = norm(&vel);
                if speed == 0.0 {
                    continue;
                }
                let proj = -dot(&vel, &look);
                let w = match target.values.thermal {
                    Thermal::Isotropic(w) => w,
                    Thermal::Anisotropic { per, par } => {
                        let c = dot(&look, &b_dir);
                        ((1.0 - c * c) * per * per + c * c * par * par).sqrt()
                    }
                };
                let sqm = (target.shape.mass / target.shape.charge).sqrt();
                let v_min = (proj + target.bounds.lower * w * proj / speed) * sqm;
                let v_max = (proj + target.bounds.upper * w * proj / speed) * sqm;

                for (v, &centre) in spectrum.vel_centres.iter().enumerate() {
                    if spectrum.valid[(t, p, v)] && centre >= v_min && centre <= v_max {
                        sel.bins[(t, p, v)] = true;
                    }
                }
            }
        }

        sel.recount();
        debug!("Fit selection: {} bins", sel.count);
        sel
    }

    /// Flip the selection of one bin. Returns `false` for out-of-range bins.
    pub fn toggle(&mut self, t: usize, p: usize, v: usize) -> bool {
        match self.bins.get_mut((t, p, v)) {
            Some(b) => {
                *b = !*b;
                self.recount();
                true
            }
            None => false,
        }
    }

    fn recount(&mut self) {
        self.count = self.bins.iter().filter(|&&b| b).count();
    }
}
