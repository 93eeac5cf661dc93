// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The analysis of one spectrum at a time, and how a change anywhere in it
//! propagates downstream.
//!
//! The stages run in order: spectrum, moments selection, moments, guess, fit
//! selection and fit. Each downstream stage has a dynamic flag; a dynamic
//! stage is recomputed whenever its inputs change, while a static one keeps
//! whatever it has until it's asked to run. Every change is announced to
//! subscribers as an [`Event`].

#[cfg(test)]
mod tests;

use log::{debug, info, trace, warn};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    config::{AnalysisConfig, ConfigError, DynamicFlags},
    events::{Event, EventBus, EventReceiver, MessageKind, Stage},
    field::MagneticField,
    fit::{self, params, FitOutcome, Guess},
    instrument::EffectiveArea,
    ions::{
        FitSettingEdit, FitSettings, GuessField, IonRegistry, Population, PopulationEdit,
        Setting, SettingsKind, SpeciesField,
    },
    moments::{run_moments, MomentsResult},
    results::{FitRecord, ResultsLog},
    selection::{FitSelection, MomentsSelection, SelectionTarget},
    source::{FieldSource, SpectrumRequest, SpectrumSource},
    spectrum::Spectrum,
};

/// Which result a viewer should be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DisplayedResult {
    #[default]
    Moments,
    GuessSelection,
    Fit,
}

/// A stage with a dynamic flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DynamicStage {
    Moments,
    Guess,
    Selection,
    Fit,
}

/// A hand edit of the guess.
#[derive(Debug, Clone, PartialEq)]
pub enum GuessEdit {
    /// One component (0 = x, 1 = y, 2 = z) of the bulk velocity.
    BulkVelocity { axis: usize, text: String },

    Population {
        pop: usize,
        field: GuessField,
        text: String,
    },
}

/// Everything known about the current spectrum.
pub struct Analyser {
    config: AnalysisConfig,
    area: EffectiveArea,
    spectra: Box<dyn SpectrumSource>,
    fields: Box<dyn FieldSource>,
    events: EventBus,

    dynamic: DynamicFlags,
    display: DisplayedResult,

    /// The requested moments windows, as typed.
    win_azm_request: Setting<usize>,
    win_cur_request: Setting<usize>,

    /// The windows last used; an invalid request falls back to these.
    win_azm: usize,
    win_cur: usize,

    spectrum: Option<Spectrum>,
    field: MagneticField,
    moments_selection: Option<MomentsSelection>,
    moments: Option<MomentsResult>,

    ions: IonRegistry,
    settings: FitSettings,
    guess: Option<Guess>,
    fit_selection: Option<FitSelection>,
    fit: Option<FitOutcome>,

    results: ResultsLog,
}

impl Analyser {
    pub fn new(
        config: AnalysisConfig,
        spectra: Box<dyn SpectrumSource>,
        fields: Box<dyn FieldSource>,
    ) -> Result<Analyser, ConfigError> {
        let area = config.validate()?;
        debug!(
            "New analyser with {} species and {} population slots",
            config.num_species, config.num_populations
        );
        Ok(Analyser {
            area,
            spectra,
            fields,
            events: EventBus::new(),
            dynamic: config.dynamic,
            display: DisplayedResult::default(),
            win_azm_request: Setting::Value(config.win_azm),
            win_cur_request: Setting::Value(config.win_cur),
            win_azm: config.win_azm,
            win_cur: config.win_cur,
            spectrum: None,
            field: MagneticField::empty(),
            moments_selection: None,
            moments: None,
            ions: IonRegistry::new(config.num_species, config.num_populations),
            settings: FitSettings::new(config.num_populations),
            guess: None,
            fit_selection: None,
            fit: None,
            results: ResultsLog::new(),
            config,
        })
    }

    /// Get every event from now on.
    pub fn subscribe(&mut self) -> EventReceiver {
        self.events.subscribe()
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    pub(crate) fn message(&mut self, stage: Stage, kind: MessageKind) {
        self.events.message(stage, kind);
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn dynamic(&self) -> DynamicFlags {
        self.dynamic
    }

    pub fn display(&self) -> DisplayedResult {
        self.display
    }

    /// The requested moments windows.
    pub fn window_requests(&self) -> (&Setting<usize>, &Setting<usize>) {
        (&self.win_azm_request, &self.win_cur_request)
    }

    pub fn spectrum(&self) -> Option<&Spectrum> {
        self.spectrum.as_ref()
    }

    pub fn field(&self) -> &MagneticField {
        &self.field
    }

    pub fn moments_selection(&self) -> Option<&MomentsSelection> {
        self.moments_selection.as_ref()
    }

    pub fn moments(&self) -> Option<&MomentsResult> {
        self.moments.as_ref()
    }

    pub fn ions(&self) -> &IonRegistry {
        &self.ions
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    pub fn guess(&self) -> Option<&Guess> {
        self.guess.as_ref()
    }

    pub fn fit_selection(&self) -> Option<&FitSelection> {
        self.fit_selection.as_ref()
    }

    pub fn fit(&self) -> Option<&FitOutcome> {
        self.fit.as_ref()
    }

    pub fn results(&self) -> &ResultsLog {
        &self.results
    }

    /// Discard everything derived from the current spectrum and load another.
    pub fn load_spectrum(&mut self, request: &SpectrumRequest) {
        self.spectrum = None;
        self.field = MagneticField::empty();
        self.moments_selection = None;
        self.moments = None;
        self.guess = None;
        self.fit_selection = None;
        self.fit = None;
        // Guessed numbers belong to the old spectrum; the bulk velocity is kept.
        let before = self.ions.populations.clone();
        self.ions.clear_guess_values();
        self.events.emit(Event::Reset);
        self.population_values_changed(&before);

        if self.display != DisplayedResult::Moments {
            for stage in [DynamicStage::Moments, DynamicStage::Guess, DynamicStage::Selection] {
                self.set_dynamic(stage, true, false);
            }
            if self.display == DisplayedResult::Fit && !self.dynamic.fit {
                self.set_display(DisplayedResult::GuessSelection);
            }
        }

        self.events.message(Stage::Spectrum, MessageKind::Begin);
        let raw = match self.spectra.fetch(request) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("No spectrum found for {}", request.time);
                self.events.message(Stage::Spectrum, MessageKind::NoRun);
                self.events.emit(Event::SpectrumChanged);
                return;
            }
            Err(e) => {
                warn!("Couldn't fetch a spectrum: {e}");
                self.events.message(Stage::Spectrum, MessageKind::Fail);
                self.events.emit(Event::SpectrumChanged);
                return;
            }
        };
        let spectrum = match Spectrum::from_raw(&raw, &self.config) {
            Ok(s) => s,
            Err(e) => {
                warn!("The spectrum at {} can't be used: {e}", raw.time);
                self.events.message(Stage::Spectrum, MessageKind::Fail);
                self.events.emit(Event::SpectrumChanged);
                return;
            }
        };
        info!("Loaded the spectrum at {}", spectrum.time);
        self.events.message(Stage::Spectrum, MessageKind::End);
        self.events.emit(Event::SpectrumChanged);

        self.load_field(&spectrum);
        self.spectrum = Some(spectrum);

        if self.dynamic.moments {
            self.select_moments_bins(true);
        }
    }

    fn load_field(&mut self, spectrum: &Spectrum) {
        self.events.message(Stage::Field, MessageKind::Begin);
        match self.fields.fetch_range(spectrum.time, spectrum.duration()) {
            Ok(samples) if !samples.is_empty() => {
                self.field =
                    MagneticField::from_samples(spectrum.time, &samples, &spectrum.window_times());
                self.events.message(Stage::Field, MessageKind::End);
            }
            Ok(_) => {
                info!("No field data for the spectrum at {}", spectrum.time);
                self.events.message(Stage::Field, MessageKind::NoRun);
            }
            Err(e) => {
                warn!("Couldn't fetch field data: {e}");
                self.events.message(Stage::Field, MessageKind::Fail);
            }
        }
        self.events.emit(Event::FieldChanged);
    }

    /// Select the moments bins automatically with the requested windows, then
    /// run the moments analysis if `run` is set. A request that isn't a
    /// positive whole number leaves the previous window in place.
    pub fn auto_moments_selection(&mut self, win_azm: &str, win_cur: &str, run: bool) {
        let parse = |text: &str| match Setting::<usize>::parse(text) {
            Setting::Value(0) => Setting::Invalid(text.to_string()),
            s => s,
        };
        self.win_azm_request = parse(win_azm);
        self.win_cur_request = parse(win_cur);
        if let Setting::Value(w) = self.win_azm_request {
            self.win_azm = w;
        }
        if let Setting::Value(w) = self.win_cur_request {
            self.win_cur = w;
        }
        self.select_moments_bins(run);
    }

    fn select_moments_bins(&mut self, run: bool) {
        // The fit selection is built from the moments directions.
        self.fit_selection = None;

        let Some(spectrum) = &self.spectrum else {
            self.moments_selection = None;
            self.events.emit(Event::MomentsSelectionAll);
            return;
        };
        let sel = MomentsSelection::auto(
            spectrum,
            self.win_azm,
            self.win_cur,
            self.config.min_sel_azm,
            self.config.min_sel_cur,
        );
        // The clamped windows become the effective ones.
        self.win_azm = sel.win_azm;
        self.win_cur = sel.win_cur;
        self.moments_selection = Some(sel);
        self.events.emit(Event::MomentsSelectionAll);

        if run {
            self.run_moments();
        }
    }

    /// Flip one bin of the moments selection by hand and rerun the moments.
    pub fn toggle_moments_bin(&mut self, t: usize, p: usize, v: usize) {
        let Some(sel) = self.moments_selection.as_mut() else {
            trace!("No moments selection to edit");
            return;
        };
        if sel.bins.get((t, p, v)).is_none() {
            return;
        }
        let changed = sel.toggle(t, p, v);
        self.events.emit(Event::MomentsSelectionBin { t, p, v });
        for (t, p) in changed {
            self.events.emit(Event::MomentsSelectionDirection { t, p });
        }

        self.set_dynamic(DynamicStage::Moments, true, false);
        self.run_moments();
    }

    /// Run the moments analysis on the current selection, selecting
    /// automatically first if there isn't one.
    pub fn run_moments(&mut self) {
        self.moments = None;
        if self.moments_selection.is_none() && self.spectrum.is_some() {
            self.select_moments_bins(false);
        }

        self.events.message(Stage::Moments, MessageKind::Begin);
        let empty;
        let selection = match &self.moments_selection {
            Some(s) => s,
            None => {
                let c = &self.config;
                empty = MomentsSelection::empty((0, 0, 0), c.min_sel_azm, c.min_sel_cur);
                &empty
            }
        };
        let result = run_moments(
            self.spectrum.as_ref(),
            selection,
            &self.field,
            self.config.min_sel_azm,
            &self.area,
        );
        match result {
            Ok(m) => {
                info!(
                    "Moments: n = {:.3} cm^-3, |V| = {:.1} km/s, w = {:.2} km/s",
                    m.density, m.speed, m.thermal_speed
                );
                self.moments = Some(m);
                self.events.message(Stage::Moments, MessageKind::End);
                self.events.emit(Event::MomentsResultChanged);
            }
            Err(e) => {
                let kind = if e.is_no_run() {
                    info!("Moments not run: {e}");
                    MessageKind::NoRun
                } else {
                    warn!("Moments failed: {e}");
                    MessageKind::Fail
                };
                self.events.message(Stage::Moments, kind);
                self.events.emit(Event::MomentsResultChanged);
                return;
            }
        }

        if self.dynamic.guess {
            self.regenerate_guess();
        } else {
            self.set_display(DisplayedResult::Moments);
        }
    }

    /// Scale the moments into a new guess. This makes the guess dynamic.
    pub fn auto_guess(&mut self) {
        self.set_dynamic(DynamicStage::Guess, true, false);
        self.regenerate_guess();
    }

    fn regenerate_guess(&mut self) {
        self.guess = None;
        let before = self.ions.populations.clone();
        params::auto_guess(&mut self.ions, &self.settings, self.moments.as_ref(), &self.field);
        self.population_values_changed(&before);
        self.build_guess();
    }

    fn population_values_changed(&mut self, before: &[Population]) {
        for (i, (old, new)) in before.iter().zip(&self.ions.populations).enumerate() {
            if old != new {
                self.events.emit(Event::PopulationChanged(i));
            }
        }
    }

    /// Rebuild the guess from the values in the ion registry.
    pub fn build_guess(&mut self) {
        self.events.message(Stage::Guess, MessageKind::Begin);
        self.guess = self
            .spectrum
            .as_ref()
            .and_then(|s| params::build_guess(&self.ions, s, &self.field, &self.area));
        self.events.emit(Event::GuessChanged);
        if self.guess.is_none() {
            self.events.message(Stage::Guess, MessageKind::NoRun);
            return;
        }
        self.events.message(Stage::Guess, MessageKind::End);

        if self.dynamic.selection {
            self.regenerate_fit_selection();
        } else if self.dynamic.fit {
            self.run_fit();
        } else {
            self.set_display(DisplayedResult::GuessSelection);
        }
    }

    /// Edit the guess by hand. The guess stops being dynamic.
    pub fn set_guess_value(&mut self, edit: GuessEdit) {
        self.set_dynamic(DynamicStage::Guess, false, false);
        match edit {
            GuessEdit::BulkVelocity { axis, text } => {
                if !self.ions.set_bulk_velocity(axis, &text) {
                    return;
                }
            }
            GuessEdit::Population { pop, field, text } => {
                if !self.ions.set_guess(pop, field, &text) {
                    return;
                }
                self.events.emit(Event::PopulationChanged(pop));
            }
        }
        self.build_guess();
    }

    /// Select the fit bins around the guessed populations. This makes the
    /// selection dynamic.
    pub fn auto_fit_selection(&mut self) {
        self.set_dynamic(DynamicStage::Selection, true, false);
        self.regenerate_fit_selection();
    }

    fn regenerate_fit_selection(&mut self) {
        let Some(spectrum) = &self.spectrum else {
            self.fit_selection = None;
            self.events.emit(Event::FitSelectionAll);
            return;
        };

        let targets = match self.guess.as_ref().and_then(|g| Some((g, g.values()?))) {
            Some((guess, (_, values))) => guess
                .populations
                .iter()
                .zip(guess.layout.shapes())
                .zip(values)
                .filter_map(|((&slot, &shape), values)| {
                    Some(SelectionTarget {
                        shape,
                        values,
                        bounds: self.settings.bounds(slot)?,
                    })
                })
                .collect::<Vec<_>>(),
            None => vec![],
        };
        let bulk_velocity = self
            .guess
            .as_ref()
            .and_then(|g| g.values())
            .map(|(v0, _)| v0)
            .unwrap_or_default();
        let directions = match &self.moments_selection {
            Some(sel) => sel.directions.clone(),
            None => ndarray::Array2::from_elem((spectrum.n_alt(), spectrum.n_azm()), false),
        };

        self.events.message(Stage::Selection, MessageKind::Begin);
        self.fit_selection = Some(FitSelection::auto(
            spectrum,
            directions.view(),
            &self.field,
            bulk_velocity,
            &targets,
        ));
        if targets.is_empty() || self.field.is_empty() {
            self.events.message(Stage::Selection, MessageKind::NoRun);
            self.events.emit(Event::FitSelectionAll);
            return;
        }
        self.events.message(Stage::Selection, MessageKind::End);
        self.fit_selection_changed(None);
    }

    /// Flip one bin of the fit selection by hand. The selection stops being
    /// dynamic.
    pub fn toggle_fit_bin(&mut self, t: usize, p: usize, v: usize) {
        self.set_dynamic(DynamicStage::Selection, false, false);
        let Some(spectrum) = &self.spectrum else {
            trace!("No spectrum; no fit selection to edit");
            return;
        };
        let dim = spectrum.currents.dim();
        let sel = self
            .fit_selection
            .get_or_insert_with(|| FitSelection::empty(dim));
        if !sel.toggle(t, p, v) {
            return;
        }
        self.fit_selection_changed(Some((t, p, v)));
    }

    fn fit_selection_changed(&mut self, bin: Option<(usize, usize, usize)>) {
        match bin {
            Some((t, p, v)) => self.events.emit(Event::FitSelectionBin { t, p, v }),
            None => self.events.emit(Event::FitSelectionAll),
        }
        if self.dynamic.fit {
            self.run_fit();
        } else {
            self.set_display(DisplayedResult::GuessSelection);
        }
    }

    /// Run the non-linear fit. A successful fit is appended to the results.
    pub fn run_fit(&mut self) {
        self.fit = None;
        self.events.message(Stage::Fit, MessageKind::Begin);
        let outcome = fit::run_fit(
            self.spectrum.as_ref(),
            &self.field,
            self.guess.as_ref(),
            self.fit_selection.as_ref(),
            self.config.fit_min_sel,
            &self.area,
            &self.config.solver,
        );
        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                let kind = if e.is_no_run() {
                    info!("Fit not run: {e}");
                    MessageKind::NoRun
                } else {
                    warn!("Fit failed: {e}");
                    MessageKind::Fail
                };
                self.events.message(Stage::Fit, kind);
                self.events.emit(Event::FitResultChanged);
                return;
            }
        };

        // The fit needs a spectrum, so the time is there.
        if let Some(spectrum) = &self.spectrum {
            match FitRecord::new(spectrum.time, &self.field, &self.ions, &outcome) {
                Ok(record) => self.results.push(record),
                Err(e) => warn!("The fit at {} can't be recorded: {e}", spectrum.time),
            }
        }
        info!(
            "Fit converged after {} iterations, chi^2 = {:.4e}",
            outcome.iterations, outcome.chi_squared
        );
        self.fit = Some(outcome);
        self.events.message(Stage::Fit, MessageKind::End);
        self.events.emit(Event::FitResultChanged);
    }

    /// Change a stage's dynamic flag. Turning a flag on with `rerun` also
    /// runs the stage and shows what it leads to.
    pub fn set_dynamic(&mut self, stage: DynamicStage, on: bool, rerun: bool) {
        let flag = match stage {
            DynamicStage::Moments => &mut self.dynamic.moments,
            DynamicStage::Guess => &mut self.dynamic.guess,
            DynamicStage::Selection => &mut self.dynamic.selection,
            DynamicStage::Fit => &mut self.dynamic.fit,
        };
        if *flag == on {
            return;
        }
        *flag = on;
        debug!("{stage} dynamic: {on}");
        self.events.emit(Event::DynamicChanged);
        if !on || !rerun {
            return;
        }

        let after_fit_inputs = if self.dynamic.fit {
            DisplayedResult::Fit
        } else {
            DisplayedResult::GuessSelection
        };
        match stage {
            DynamicStage::Moments => {
                self.run_moments();
                if !self.dynamic.guess && !self.dynamic.selection {
                    self.set_display(DisplayedResult::Moments);
                } else {
                    self.set_display(after_fit_inputs);
                }
            }
            DynamicStage::Guess => {
                self.regenerate_guess();
                self.set_display(after_fit_inputs);
            }
            DynamicStage::Selection => {
                self.regenerate_fit_selection();
                self.set_display(after_fit_inputs);
            }
            DynamicStage::Fit => {
                self.run_fit();
                self.set_display(DisplayedResult::Fit);
            }
        }
    }

    pub fn set_display(&mut self, display: DisplayedResult) {
        if self.display == display {
            return;
        }
        trace!("Displaying {display}");
        self.display = display;
        self.events.emit(Event::DisplayChanged);
    }

    /// Edit a species, then rebuild the guess.
    pub fn set_species(&mut self, slot: usize, field: SpeciesField, text: &str) {
        if self.ions.set_species(slot, field, text) {
            self.ions_changed();
        }
    }

    /// Edit a population's structure, then rebuild the guess.
    pub fn set_population(&mut self, pop: usize, edit: PopulationEdit) {
        if self.ions.set_population(pop, edit) {
            self.events.emit(Event::PopulationChanged(pop));
            self.ions_changed();
        }
    }

    fn ions_changed(&mut self) {
        self.events.emit(Event::IonsChanged);
        if self.dynamic.guess {
            self.regenerate_guess();
        } else {
            self.build_guess();
        }
    }

    /// Edit how a population's guess or fit selection is made, then make it
    /// again.
    pub fn set_fit_setting(&mut self, pop: usize, edit: FitSettingEdit) {
        let kind = edit.kind();
        if !self.settings.apply(pop, edit) {
            return;
        }
        self.events.emit(Event::SettingsChanged);
        match kind {
            SettingsKind::Guess => self.auto_guess(),
            SettingsKind::Selection => self.auto_fit_selection(),
        }
        if !self.dynamic.fit {
            self.set_display(DisplayedResult::GuessSelection);
        }
    }
}
