// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-population settings of the non-linear analysis: how to scale the
//! moments into an initial guess, and how wide a window of each direction to
//! select for fitting.

use strum_macros::{Display, EnumString};

use super::Setting;

/// Which half of the settings an edit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsKind {
    Guess,
    Selection,
}

/// An edit to the settings of one population.
#[derive(Debug, Clone, PartialEq)]
pub enum FitSettingEdit {
    /// Multiplier of the moments density. Must be positive.
    GuessDensity(String),

    /// Multiplier of the moments speed giving the drift.
    GuessDrift(String),

    /// Multiplier of the moments thermal speed. Must be positive.
    GuessThermal(String),

    /// Lower and upper selection bounds, in thermal speeds either side of the
    /// bulk speed. The lower must be smaller.
    Selection(String, String),
}

impl FitSettingEdit {
    pub fn kind(&self) -> SettingsKind {
        match self {
            FitSettingEdit::Selection(..) => SettingsKind::Selection,
            _ => SettingsKind::Guess,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum GuessMultiplier {
    Density,
    Drift,
    Thermal,
}

/// A population's selection window, in thermal speeds relative to the bulk
/// speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitSettings {
    pub guess_density: Vec<Setting<f64>>,
    pub guess_drift: Vec<Setting<f64>>,
    pub guess_thermal: Vec<Setting<f64>>,
    pub sel_lower: Vec<Setting<f64>>,
    pub sel_upper: Vec<Setting<f64>>,
}

impl FitSettings {
    /// The default multipliers for the proton and alpha cores and beams, with
    /// a window of three thermal speeds either side for every slot.
    pub fn new(num_populations: usize) -> FitSettings {
        let defaults = |values: [Option<f64>; 4]| {
            (0..num_populations)
                .map(|i| Setting::from(values.get(i).copied().flatten()))
                .collect::<Vec<_>>()
        };
        FitSettings {
            guess_density: defaults([Some(1.0), Some(0.2), Some(0.02), Some(0.01)]),
            guess_drift: defaults([None, Some(0.03), Some(0.01), Some(0.05)]),
            guess_thermal: defaults([Some(1.0), Some(1.25), Some(1.0), Some(1.25)]),
            sel_lower: vec![Setting::Value(-3.0); num_populations],
            sel_upper: vec![Setting::Value(3.0); num_populations],
        }
    }

    pub fn len(&self) -> usize {
        self.guess_density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guess_density.is_empty()
    }

    /// Can a guess be made for population `pop`, which drifts iff `drift`?
    pub fn guess_valid(&self, pop: usize, drift: bool) -> bool {
        pop < self.len()
            && self.guess_density[pop].is_set()
            && self.guess_thermal[pop].is_set()
            && (!drift || self.guess_drift[pop].is_set())
    }

    pub fn selection_valid(&self, pop: usize) -> bool {
        self.bounds(pop).is_some()
    }

    pub fn bounds(&self, pop: usize) -> Option<WindowBounds> {
        Some(WindowBounds {
            lower: self.sel_lower.get(pop)?.value()?,
            upper: self.sel_upper.get(pop)?.value()?,
        })
    }

    pub fn multiplier(&self, pop: usize, which: GuessMultiplier) -> Option<f64> {
        match which {
            GuessMultiplier::Density => self.guess_density.get(pop)?.value(),
            GuessMultiplier::Drift => self.guess_drift.get(pop)?.value(),
            GuessMultiplier::Thermal => self.guess_thermal.get(pop)?.value(),
        }
    }

    /// Apply an edit. Returns `false` if there's no such slot.
    pub fn apply(&mut self, pop: usize, edit: FitSettingEdit) -> bool {
        if pop >= self.len() {
            return false;
        }
        match edit {
            FitSettingEdit::GuessDensity(t) => self.guess_density[pop] = Setting::parse_positive(&t),
            FitSettingEdit::GuessDrift(t) => {
                self.guess_drift[pop] = Setting::parse_with(&t, |_| true)
            }
            FitSettingEdit::GuessThermal(t) => self.guess_thermal[pop] = Setting::parse_positive(&t),
            FitSettingEdit::Selection(a, b) => {
                let lower = Setting::parse_with(&a, |_| true);
                let upper = Setting::parse_with(&b, |_| true);
                match (lower.value(), upper.value()) {
                    (Some(l), Some(u)) if l >= u => {
                        self.sel_lower[pop] = Setting::Invalid(a);
                        self.sel_upper[pop] = Setting::Invalid(b);
                    }
                    _ => {
                        self.sel_lower[pop] = lower;
                        self.sel_upper[pop] = upper;
                    }
                }
            }
        }
        true
    }
}
