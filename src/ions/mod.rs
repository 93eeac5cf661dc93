// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ion species and the populations fitted to a spectrum.
//!
//! There are fixed numbers of species and population slots; a slot may be
//! empty. Whether a population is *used* is the user's choice; whether it is
//! *valid* is derived from what has been filled in.

mod setting;
mod settings;

pub use setting::Setting;
pub use settings::{FitSettingEdit, FitSettings, GuessMultiplier, SettingsKind, WindowBounds};

use log::debug;
use strum_macros::{Display, EnumString};

use crate::model::{PopulationShape, PopulationValues, Thermal};

/// A kind of ion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Species {
    pub name: Option<String>,
    pub symbol: Option<String>,

    /// Relative to the proton.
    pub mass: Setting<f64>,

    /// Relative to the proton.
    pub charge: Setting<f64>,
}

impl Species {
    pub fn new(name: &str, symbol: &str, mass: f64, charge: f64) -> Species {
        Species {
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
            mass: Setting::Value(mass),
            charge: Setting::Value(charge),
        }
    }

    /// Everything is filled in and the mass and charge are positive.
    pub fn is_valid(&self) -> bool {
        self.name.is_some()
            && self.symbol.is_some()
            && matches!(self.mass, Setting::Value(m) if m > 0.0)
            && matches!(self.charge, Setting::Value(q) if q > 0.0)
    }
}

/// One velocity-distribution component of one species.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Population {
    pub used: bool,

    /// Index of the species slot.
    pub species: Option<usize>,

    pub name: Option<String>,
    pub symbol: Option<String>,

    /// Does it flow along the field relative to the bulk velocity?
    pub drift: bool,

    /// Does it have separate perpendicular and parallel thermal speeds?
    pub aniso: bool,

    /// \[cm^-3\]
    pub density: Setting<f64>,

    /// \[km/s\]
    pub drift_speed: Setting<f64>,

    /// \[km/s\]
    pub w: Setting<f64>,

    /// \[km/s\]
    pub w_per: Setting<f64>,

    /// \[km/s\]
    pub w_par: Setting<f64>,
}

impl Population {
    fn new(species: usize, name: &str, symbol: &str, used: bool, drift: bool, aniso: bool) -> Population {
        Population {
            used,
            species: Some(species),
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
            drift,
            aniso,
            ..Default::default()
        }
    }

    /// The numbers this population needs for a guess, or `None` if any is
    /// missing.
    pub fn values(&self) -> Option<PopulationValues> {
        let density = self.density.value()?;
        let drift = if self.drift {
            Some(self.drift_speed.value()?)
        } else {
            None
        };
        let thermal = if self.aniso {
            Thermal::Anisotropic {
                per: self.w_per.value()?,
                par: self.w_par.value()?,
            }
        } else {
            Thermal::Isotropic(self.w.value()?)
        };
        Some(PopulationValues {
            density,
            drift,
            thermal,
        })
    }

    /// Forget the guessed numbers.
    pub fn clear_values(&mut self) {
        self.density = Setting::Unset;
        self.drift_speed = Setting::Unset;
        self.w = Setting::Unset;
        self.w_per = Setting::Unset;
        self.w_par = Setting::Unset;
    }
}

/// A species attribute that can be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SpeciesField {
    Name,
    Symbol,
    Mass,
    Charge,
}

/// An edit to a population's structure.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulationEdit {
    Use(bool),
    Species(Option<usize>),
    Name(String),
    Symbol(String),
    Drift(bool),
    Aniso(bool),
}

/// An edit to a guessed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum GuessField {
    Density,
    DriftSpeed,
    W,
    WPer,
    WPar,
}

/// All species and populations, plus the guessed bulk velocity they share.
#[derive(Debug, Clone, PartialEq)]
pub struct IonRegistry {
    pub species: Vec<Species>,
    pub populations: Vec<Population>,

    /// Guessed bulk velocity \[km/s\].
    pub bulk_velocity: [Setting<f64>; 3],
}

impl IonRegistry {
    /// An empty registry with the given numbers of slots.
    pub fn empty(num_species: usize, num_populations: usize) -> IonRegistry {
        IonRegistry {
            species: vec![Species::default(); num_species],
            populations: vec![Population::default(); num_populations],
            bulk_velocity: Default::default(),
        }
    }

    /// Protons and alpha particles, each with a core and a beam. The cores are
    /// used; the beams are not.
    pub fn new(num_species: usize, num_populations: usize) -> IonRegistry {
        let mut reg = IonRegistry::empty(num_species, num_populations);
        let species = [
            Species::new("Proton", "p", 1.0, 1.0),
            Species::new("Alpha", "a", 4.0, 2.0),
        ];
        for (slot, s) in reg.species.iter_mut().zip(species) {
            *slot = s;
        }

        let mut pops = vec![Population::new(0, "Core", "c", true, false, true)];
        if num_species > 0 {
            pops.push(Population::new(0, "Beam", "b", false, true, false));
        }
        if num_species > 1 {
            pops.push(Population::new(1, "Core", "c", true, true, true));
            pops.push(Population::new(1, "Beam", "b", false, true, false));
        }
        for (slot, p) in reg.populations.iter_mut().zip(pops) {
            *slot = p;
        }
        reg
    }

    pub fn species_of(&self, pop: usize) -> Option<&Species> {
        self.populations
            .get(pop)
            .and_then(|p| p.species)
            .and_then(|s| self.species.get(s))
    }

    /// Is the population well formed? Its species must be valid and it must
    /// have a name and symbol. This says nothing about its guessed numbers.
    pub fn population_valid(&self, pop: usize) -> bool {
        match (self.populations.get(pop), self.species_of(pop)) {
            (Some(p), Some(s)) => s.is_valid() && p.name.is_some() && p.symbol.is_some(),
            _ => false,
        }
    }

    /// The fitting shape of a valid population.
    pub fn shape(&self, pop: usize) -> Option<PopulationShape> {
        if !self.population_valid(pop) {
            return None;
        }
        let p = &self.populations[pop];
        let s = self.species_of(pop)?;
        Some(PopulationShape {
            drift: p.drift,
            aniso: p.aniso,
            mass: s.mass.value()?,
            charge: s.charge.value()?,
        })
    }

    /// Forget the guessed numbers of every population.
    pub fn clear_guess_values(&mut self) {
        for pop in &mut self.populations {
            pop.clear_values();
        }
    }

    /// The guessed bulk velocity, if all components are set.
    pub fn bulk_velocity(&self) -> Option<[f64; 3]> {
        Some([
            self.bulk_velocity[0].value()?,
            self.bulk_velocity[1].value()?,
            self.bulk_velocity[2].value()?,
        ])
    }

    /// Edit a species. Mass and charge must be non-negative numbers. Returns
    /// `false` if there's no such slot.
    pub fn set_species(&mut self, slot: usize, field: SpeciesField, text: &str) -> bool {
        let Some(species) = self.species.get_mut(slot) else {
            return false;
        };
        let text_opt = || {
            let t = text.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        };
        match field {
            SpeciesField::Name => species.name = text_opt(),
            SpeciesField::Symbol => species.symbol = text_opt(),
            SpeciesField::Mass => species.mass = Setting::parse_non_negative(text),
            SpeciesField::Charge => species.charge = Setting::parse_non_negative(text),
        }
        debug!("Species {slot}: {field} = '{text}'");
        true
    }

    /// Edit a population's structure. Returns `false` if there's no such slot.
    ///
    /// Names and symbols are unique within a species, so moving a population
    /// to a species that already has one of its name or symbol clears both.
    pub fn set_population(&mut self, pop: usize, edit: PopulationEdit) -> bool {
        if pop >= self.populations.len() {
            return false;
        }
        match edit {
            PopulationEdit::Use(used) => self.populations[pop].used = used,
            PopulationEdit::Species(Some(s)) if s < self.species.len() => {
                if self.name_clash(pop, s) {
                    debug!("Population {pop} clashes with another in species {s}; clearing its name");
                    let p = &mut self.populations[pop];
                    p.name = None;
                    p.symbol = None;
                }
                self.populations[pop].species = Some(s);
            }
            PopulationEdit::Species(_) => self.populations[pop].species = None,
            PopulationEdit::Name(name) => {
                self.populations[pop].name = Some(name).filter(|n| !n.trim().is_empty())
            }
            PopulationEdit::Symbol(sym) => {
                self.populations[pop].symbol = Some(sym).filter(|s| !s.trim().is_empty())
            }
            PopulationEdit::Drift(drift) => self.populations[pop].drift = drift,
            PopulationEdit::Aniso(aniso) => self.populations[pop].aniso = aniso,
        }
        true
    }

    /// Would population `pop` share a name or symbol with another population
    /// of species `species`?
    fn name_clash(&self, pop: usize, species: usize) -> bool {
        let this = &self.populations[pop];
        self.populations.iter().enumerate().any(|(i, other)| {
            i != pop
                && other.species == Some(species)
                && ((this.name.is_some() && other.name == this.name)
                    || (this.symbol.is_some() && other.symbol == this.symbol))
        })
    }

    /// Edit one component (0 = x, 1 = y, 2 = z) of the guessed bulk velocity.
    /// Returns `false` for other axes.
    pub fn set_bulk_velocity(&mut self, axis: usize, text: &str) -> bool {
        match self.bulk_velocity.get_mut(axis) {
            Some(v) => {
                *v = Setting::parse_with(text, |_| true);
                true
            }
            None => false,
        }
    }

    /// Edit a guessed number of a population. Returns `false` if there's no
    /// such slot.
    pub fn set_guess(&mut self, pop: usize, field: GuessField, text: &str) -> bool {
        let Some(p) = self.populations.get_mut(pop) else {
            return false;
        };
        let value = Setting::parse_with(text, |_| true);
        match field {
            GuessField::Density => p.density = value,
            GuessField::DriftSpeed => p.drift_speed = value,
            GuessField::W => p.w = value,
            GuessField::WPer => p.w_per = value,
            GuessField::WPar => p.w_par = value,
        }
        true
    }
}
