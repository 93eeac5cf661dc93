// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::{debug, trace};
use ndarray::prelude::*;

use crate::spectrum::Spectrum;

/// The bins and directions used by the moments analysis.
///
/// A direction is used only if at least `min_sel_cur` of its bins are
/// selected, and if fewer than `min_sel_azm` directions qualify, none are.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentsSelection {
    /// Used directions, `[head, azimuth]`.
    pub directions: Array2<bool>,

    /// Selected bins, `[head, azimuth, window]`.
    pub bins: Array3<bool>,

    /// Selected bins per direction.
    pub counts: Array2<usize>,

    /// Number of used directions.
    pub num_used: usize,

    /// The azimuthal window size used by the last automatic selection.
    pub win_azm: usize,

    /// The velocity window size used by the last automatic selection.
    pub win_cur: usize,

    min_sel_azm: usize,
    min_sel_cur: usize,
}

impl MomentsSelection {
    /// Nothing selected.
    pub fn empty(dim: (usize, usize, usize), min_sel_azm: usize, min_sel_cur: usize) -> MomentsSelection {
        let (n_alt, n_azm, _) = dim;
        MomentsSelection {
            directions: Array2::from_elem((n_alt, n_azm), false),
            bins: Array3::from_elem(dim, false),
            counts: Array2::zeros((n_alt, n_azm)),
            num_used: 0,
            win_azm: 0,
            win_cur: 0,
            min_sel_azm,
            min_sel_cur,
        }
    }

    /// Select the block of `win_azm` adjacent azimuths with the largest summed
    /// peak current in each head, then in each of those directions the run of
    /// `win_cur` windows with the largest valid current (possibly including
    /// invalid bins). The windows are first clamped to `[min_sel_azm, n_azm]`
    /// and `[min_sel_cur, n_vel]`.
    ///
    /// Every run start from 0 to `n_vel - win_cur` inclusive is considered, so
    /// the run may end on the last window. The first run with a strictly larger
    /// sum wins. A direction whose runs all sum to zero (no positive valid
    /// current) gets no bins at all rather than the run at window 0.
    pub fn auto(
        spectrum: &Spectrum,
        win_azm: usize,
        win_cur: usize,
        min_sel_azm: usize,
        min_sel_cur: usize,
    ) -> MomentsSelection {
        let (n_alt, n_azm, n_vel) = spectrum.currents.dim();
        let win_azm = win_azm.max(min_sel_azm).min(n_azm);
        let win_cur = win_cur.max(min_sel_cur).min(n_vel);
        trace!("Automatic moments selection with windows {win_azm} x {win_cur}");

        let mut sel = MomentsSelection::empty((n_alt, n_azm, n_vel), min_sel_azm, min_sel_cur);
        sel.win_azm = win_azm;
        sel.win_cur = win_cur;
        if n_azm == 0 || n_vel == 0 {
            return sel;
        }

        // The largest valid current of each direction.
        let max_cur = Array2::from_shape_fn((n_alt, n_azm), |(t, p)| {
            spectrum
                .currents
                .slice(s![t, p, ..])
                .iter()
                .zip(spectrum.valid.slice(s![t, p, ..]))
                .filter(|(_, &v)| v)
                .map(|(&c, _)| c)
                .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))))
                .unwrap_or(0.0)
        });

        for t in 0..n_alt {
            let sums = (0..n_azm)
                .map(|p| (0..win_azm).map(|w| max_cur[(t, (p + w) % n_azm)]).sum::<f64>())
                .collect::<Vec<_>>();
            let mut p0 = 0;
            for (p, &s) in sums.iter().enumerate() {
                if s > sums[p0] {
                    p0 = p;
                }
            }
            for p in p0..p0 + win_azm {
                sel.directions[(t, p % n_azm)] = true;
            }
        }

        for ((t, p), _) in sel.directions.indexed_iter().filter(|(_, &d)| d) {
            let cur = spectrum.currents.slice(s![t, p, ..]);
            let vld = spectrum.valid.slice(s![t, p, ..]);
            let mut v0 = 0;
            let mut cur0 = 0.0;
            for v in 0..=n_vel - win_cur {
                let sum: f64 = (v..v + win_cur).filter(|&k| vld[k]).map(|k| cur[k]).sum();
                if sum > cur0 {
                    v0 = v;
                    cur0 = sum;
                }
            }
            // A direction without any valid current has nothing to offer.
            if cur0 > 0.0 {
                sel.bins.slice_mut(s![t, p, v0..v0 + win_cur]).fill(true);
            }
        }

        sel.validate();
        debug!(
            "Moments selection: {} directions, {} bins",
            sel.num_used,
            sel.counts.sum()
        );
        sel
    }

    /// Flip the selection of one bin and revalidate. Returns the directions
    /// whose use changed; out-of-range bins change nothing.
    pub fn toggle(&mut self, t: usize, p: usize, v: usize) -> Vec<(usize, usize)> {
        match self.bins.get_mut((t, p, v)) {
            Some(b) => *b = !*b,
            None => return vec![],
        }
        self.validate()
    }

    /// Make the direction mask agree with the bin mask: recount each
    /// direction's bins, use the directions with enough of them, and use none
    /// if too few qualify. Returns the directions whose use changed.
    pub fn validate(&mut self) -> Vec<(usize, usize)> {
        let old = self.directions.clone();

        self.counts = self
            .bins
            .map_axis(Axis(2), |lane| lane.iter().filter(|&&b| b).count());
        self.directions = self.counts.mapv(|c| c >= self.min_sel_cur);
        self.num_used = self.directions.iter().filter(|&&d| d).count();
        if self.num_used < self.min_sel_azm {
            self.directions.fill(false);
            self.num_used = 0;
        }

        self.directions
            .indexed_iter()
            .zip(old.iter())
            .filter(|((_, new), old)| *new != *old)
            .map(|((i, _), _)| i)
            .collect()
    }

    pub fn is_used(&self, t: usize, p: usize) -> bool {
        self.directions.get((t, p)).copied().unwrap_or(false)
    }
}
