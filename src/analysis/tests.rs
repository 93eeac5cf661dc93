// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use hifitime::{Duration, Epoch};
use ndarray::prelude::*;

use super::*;
use crate::{
    constants::{PROTON_CHARGE, PROTON_MASS},
    field::FieldSample,
    instrument::look_direction,
    model::expected_current_maxwellian,
    source::{MemoryArchive, SpectrumRequest},
    spectrum::{RawCup, RawSpectrum},
};

const N_AZM: usize = 20;
const N_VEL: usize = 30;
const CADENCE: f64 = 92.0;

fn t0() -> Epoch {
    Epoch::from_gregorian_utc_hms(2008, 11, 4, 12, 0, 0)
}

fn at(seconds: f64) -> Epoch {
    t0() + Duration::from_seconds(seconds)
}

/// The voltage that accelerates a proton to `speed` \[km/s\].
fn voltage(speed: f64) -> f64 {
    PROTON_MASS * (1e3 * speed).powi(2) / (2.0 * PROTON_CHARGE)
}

/// Two cups looking into a 400 km/s proton flow along -x. Every current is
/// `floor` if it's given.
fn raw_spectrum(time: Epoch, floor: Option<f64>) -> RawSpectrum {
    let speeds: Vec<f64> = (0..N_VEL).map(|v| 250.0 + 15.0 * v as f64).collect();
    let centre_voltages: Vec<f64> = speeds.iter().map(|&s| voltage(s)).collect();
    let width_voltages: Vec<f64> = speeds
        .iter()
        .map(|&s| voltage(s + 7.5) - voltage(s - 7.5))
        .collect();
    let azimuths: Vec<f64> = (0..N_AZM).map(|p| -45.0 + 5.0 * p as f64).collect();

    let mut raw = RawSpectrum {
        time,
        cups: [15.0, -15.0]
            .into_iter()
            .map(|altitude| RawCup {
                altitude,
                azimuths: azimuths.clone(),
                centre_voltages: centre_voltages.clone(),
                width_voltages: width_voltages.clone(),
                currents: Array2::zeros((N_AZM, N_VEL)),
            })
            .collect(),
    };

    // Model the currents on the speed windows the analysis will see.
    let blank = Spectrum::from_raw(&raw, &AnalysisConfig::default()).unwrap();
    let area = EffectiveArea::default();
    for (t, cup) in raw.cups.iter_mut().enumerate() {
        cup.currents = Array2::from_shape_fn((N_AZM, N_VEL), |(p, v)| match floor {
            Some(c) => c,
            None => expected_current_maxwellian(
                blank.vel_centres[v],
                blank.vel_widths[v],
                &look_direction(blank.altitudes[t], blank.azimuths[(t, p)]),
                5.0,
                [-400.0, 0.0, 0.0],
                30.0,
                &area,
            ),
        });
    }
    raw
}

fn field_samples(until: f64) -> Vec<FieldSample> {
    (0..=(until / 10.0) as usize)
        .map(|i| FieldSample {
            time: at(10.0 * i as f64),
            b: [-3.0, 3.0, 1.0 + 0.01 * i as f64],
        })
        .collect()
}

/// Two good spectra, `CADENCE` seconds apart, with field data throughout.
fn archive() -> MemoryArchive {
    MemoryArchive::new(
        vec![raw_spectrum(t0(), None), raw_spectrum(at(CADENCE), None)],
        field_samples(2.0 * CADENCE),
    )
}

fn analyser_for(archive: MemoryArchive) -> (Analyser, EventReceiver) {
    let mut analyser = Analyser::new(
        AnalysisConfig::default(),
        Box::new(archive.clone()),
        Box::new(archive),
    )
    .unwrap();
    let rx = analyser.subscribe();
    (analyser, rx)
}

fn drain(rx: &EventReceiver) -> Vec<Event> {
    rx.try_iter().collect()
}

/// The position of `event` in `events`, which must contain it.
fn position(events: &[Event], event: &Event) -> usize {
    events
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event:?} wasn't sent; got {events:?}"))
}

fn message(stage: Stage, kind: MessageKind) -> Event {
    Event::Message { stage, kind }
}

#[test]
fn test_load_runs_the_dynamic_stages() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(at(10.0)));

    assert_eq!(a.spectrum().unwrap().time, t0());
    assert_eq!(a.spectrum().unwrap().currents.dim(), (2, N_AZM, N_VEL));
    assert!(!a.field().is_empty());

    let sel = a.moments_selection().unwrap();
    assert_eq!((sel.win_azm, sel.win_cur), (7, 7));
    let moments = a.moments().unwrap();
    assert_relative_eq!(moments.speed, 400.0, max_relative = 0.05);

    // The default guess uses the proton and alpha cores.
    let guess = a.guess().unwrap();
    assert_eq!(guess.populations, vec![0, 2]);
    let (v0, _) = guess.values().unwrap();
    assert_relative_eq!(v0[0], moments.velocity[0], max_relative = 1e-3);

    assert!(a.fit_selection().unwrap().count > 0);
    // The fit isn't dynamic by default.
    assert!(a.fit().is_none());
    assert!(a.results().is_empty());
    assert_eq!(a.display(), DisplayedResult::GuessSelection);

    let events = drain(&rx);
    assert_eq!(events[0], Event::Reset);
    let order = [
        Event::SpectrumChanged,
        Event::FieldChanged,
        Event::MomentsSelectionAll,
        Event::MomentsResultChanged,
        Event::GuessChanged,
        Event::FitSelectionAll,
        Event::DisplayChanged,
    ];
    let positions = order.iter().map(|e| position(&events, e)).collect::<Vec<_>>();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{events:?}");
    assert!(!events.contains(&Event::FitResultChanged));
}

#[test]
fn test_missing_spectrum_resets_everything() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    assert!(a.guess().is_some());
    drain(&rx);

    a.load_spectrum(&SpectrumRequest::next(at(CADENCE)));
    assert!(a.spectrum().is_none());
    assert!(a.field().is_empty());
    assert!(a.moments_selection().is_none());
    assert!(a.moments().is_none());
    assert!(a.guess().is_none());
    assert!(a.fit_selection().is_none());

    let events = drain(&rx);
    assert_eq!(events[0], Event::Reset);
    assert!(events.contains(&message(Stage::Spectrum, MessageKind::NoRun)));
    assert_eq!(events.last(), Some(&Event::SpectrumChanged));
}

#[test]
fn test_currents_below_the_floor_give_no_moments() {
    let archive = MemoryArchive::new(vec![raw_spectrum(t0(), Some(0.5))], field_samples(CADENCE));
    let (mut a, rx) = analyser_for(archive);
    a.load_spectrum(&SpectrumRequest::nearest(t0()));

    assert!(a.spectrum().is_some());
    assert!(!a.spectrum().unwrap().valid.iter().any(|&v| v));
    assert_eq!(a.moments_selection().unwrap().num_used, 0);
    assert!(a.moments().is_none());
    assert!(a.guess().is_none());

    let events = drain(&rx);
    let no_run = position(&events, &message(Stage::Moments, MessageKind::NoRun));
    let changed = position(&events, &Event::MomentsResultChanged);
    assert!(no_run < changed);
    assert!(!events.contains(&Event::GuessChanged));
}

#[test]
fn test_invalid_window_requests_keep_the_previous_window() {
    let (mut a, _rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));

    // Too small a window is clamped to the minimum.
    a.auto_moments_selection("3", "x", false);
    assert_eq!(
        a.window_requests(),
        (&Setting::Value(3), &Setting::Invalid("x".to_string()))
    );
    let sel = a.moments_selection().unwrap();
    assert_eq!((sel.win_azm, sel.win_cur), (5, 7));

    a.auto_moments_selection("0", "9", false);
    assert_eq!(a.window_requests().0, &Setting::Invalid("0".to_string()));
    let sel = a.moments_selection().unwrap();
    assert_eq!((sel.win_azm, sel.win_cur), (5, 9));

    // Reselecting drops the fit selection until something rebuilds it.
    assert!(a.fit_selection().is_none());

    a.auto_moments_selection("", "", true);
    let sel = a.moments_selection().unwrap();
    assert_eq!((sel.win_azm, sel.win_cur), (5, 9));
    assert!(a.moments().is_some());
}

#[test]
fn test_toggling_a_moments_bin_makes_moments_dynamic() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    a.set_dynamic(DynamicStage::Moments, false, false);
    assert!(!a.dynamic().moments);

    let (t, p) = a
        .moments_selection()
        .unwrap()
        .directions
        .indexed_iter()
        .find(|(_, &d)| d)
        .map(|(i, _)| i)
        .unwrap();
    let v = (0..N_VEL)
        .find(|&v| !a.moments_selection().unwrap().bins[(t, p, v)])
        .unwrap();
    drain(&rx);

    a.toggle_moments_bin(t, p, v);
    assert!(a.dynamic().moments);
    assert!(a.moments_selection().unwrap().bins[(t, p, v)]);
    assert!(a.moments().is_some());
    let events = drain(&rx);
    assert!(events.contains(&Event::MomentsSelectionBin { t, p, v }));
    assert!(events.contains(&Event::DynamicChanged));
    assert!(events.contains(&Event::MomentsResultChanged));

    // Out of range: nothing happens.
    a.toggle_moments_bin(5, 0, 0);
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_editing_the_guess_makes_it_static() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    drain(&rx);

    a.set_guess_value(GuessEdit::Population {
        pop: 0,
        field: GuessField::Density,
        text: "7".to_string(),
    });
    assert!(!a.dynamic().guess);
    let (_, values) = a.guess().unwrap().values().unwrap();
    assert_eq!(values[0].density, 7.0);
    let events = drain(&rx);
    assert!(events.contains(&Event::PopulationChanged(0)));
    assert!(events.contains(&Event::GuessChanged));
    // The selection is still dynamic.
    assert!(events.contains(&Event::FitSelectionAll));

    a.set_guess_value(GuessEdit::BulkVelocity {
        axis: 1,
        text: "fast".to_string(),
    });
    assert!(a.guess().is_none());
    assert_eq!(
        a.ions().bulk_velocity[1],
        Setting::Invalid("fast".to_string())
    );

    // A new spectrum forgets the population values but keeps the hand-made
    // bulk velocity.
    a.set_guess_value(GuessEdit::BulkVelocity {
        axis: 1,
        text: "12".to_string(),
    });
    a.load_spectrum(&SpectrumRequest::next(t0()));
    assert!(!a.dynamic().guess);
    assert!(a.guess().is_none());
    assert_eq!(a.display(), DisplayedResult::Moments);
    assert_eq!(a.ions().bulk_velocity[1], Setting::Value(12.0));
    assert_eq!(a.ions().populations[0].density, Setting::Unset);
    a.build_guess();
    assert!(a.guess().is_none());

    a.auto_guess();
    assert!(a.dynamic().guess);
    let (v0, values) = a.guess().unwrap().values().unwrap();
    assert_relative_eq!(v0[0], a.moments().unwrap().velocity[0], max_relative = 1e-3);
    assert_ne!(v0[1], 12.0);
    assert_ne!(values[0].density, 7.0);
}

#[test]
fn test_toggling_a_fit_bin_makes_the_selection_static() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    let before = a.fit_selection().unwrap().count;
    drain(&rx);

    a.toggle_fit_bin(1, 2, 3);
    assert!(!a.dynamic().selection);
    let sel = a.fit_selection().unwrap();
    assert_eq!(sel.count, before + 1);
    assert!(sel.bins[(1, 2, 3)]);
    let events = drain(&rx);
    assert!(events.contains(&Event::FitSelectionBin { t: 1, p: 2, v: 3 }));
    assert!(!events.contains(&Event::FitResultChanged));

    a.toggle_fit_bin(2, 0, 0);
    assert_eq!(a.fit_selection().unwrap().count, before + 1);
}

#[test]
fn test_dynamic_fit_runs_and_records() {
    let (mut a, rx) = analyser_for(archive());
    // The spectrum has only protons.
    a.set_population(2, PopulationEdit::Use(false));
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    assert_eq!(a.guess().unwrap().populations, vec![0]);
    assert!(a.fit().is_none());
    drain(&rx);

    a.set_dynamic(DynamicStage::Fit, true, true);
    assert!(a.dynamic().fit);
    assert_eq!(a.display(), DisplayedResult::Fit);
    let fit = a.fit().unwrap();
    assert_relative_eq!(fit.bulk_velocity[0], -400.0, max_relative = 1e-3);
    assert_relative_eq!(fit.populations[0].values.density, 5.0, max_relative = 1e-2);
    assert_eq!(a.results().len(), 1);
    assert_eq!(a.results().records()[0].time, t0());

    let events = drain(&rx);
    let begin = position(&events, &message(Stage::Fit, MessageKind::Begin));
    let end = position(&events, &message(Stage::Fit, MessageKind::End));
    let changed = position(&events, &Event::FitResultChanged);
    assert!(begin < end && end < changed);

    // The next spectrum is fitted as it loads.
    a.load_spectrum(&SpectrumRequest::next(t0()));
    assert!(a.fit().is_some());
    assert_eq!(a.results().len(), 2);

    // Setting a flag to what it already is does nothing.
    drain(&rx);
    a.set_dynamic(DynamicStage::Fit, true, true);
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_fit_without_enough_bins_is_not_run() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    a.set_fit_setting(0, FitSettingEdit::Selection("-0.01".into(), "0.01".into()));
    a.set_fit_setting(2, FitSettingEdit::Selection("-0.01".into(), "0.01".into()));
    assert!(a.fit_selection().unwrap().count < a.config().fit_min_sel);
    drain(&rx);

    a.run_fit();
    assert!(a.fit().is_none());
    assert!(a.results().is_empty());
    let events = drain(&rx);
    assert!(events.contains(&message(Stage::Fit, MessageKind::NoRun)));
    assert_eq!(events.last(), Some(&Event::FitResultChanged));
}

#[test]
fn test_settings_edits_regenerate() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    let wide = a.fit_selection().unwrap().count;
    a.set_dynamic(DynamicStage::Selection, false, false);
    drain(&rx);

    a.set_fit_setting(0, FitSettingEdit::Selection("-1".into(), "1".into()));
    assert!(a.dynamic().selection);
    assert!(a.fit_selection().unwrap().count < wide);
    let events = drain(&rx);
    assert_eq!(events[0], Event::SettingsChanged);
    assert!(events.contains(&Event::FitSelectionAll));

    let density = a.ions().populations[0].density.value().unwrap();
    a.set_fit_setting(0, FitSettingEdit::GuessDensity("2".into()));
    let doubled = a.ions().populations[0].density.value().unwrap();
    assert_relative_eq!(doubled, 2.0 * density, max_relative = 1e-3);

    // Nothing to edit.
    drain(&rx);
    a.set_fit_setting(9, FitSettingEdit::GuessDensity("2".into()));
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_ion_edits_rebuild_the_guess() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    drain(&rx);

    a.set_species(0, SpeciesField::Mass, "-1");
    assert!(!a.ions().population_valid(0));
    assert!(a.guess().is_none());
    let events = drain(&rx);
    assert_eq!(events[0], Event::IonsChanged);
    assert!(events.contains(&Event::GuessChanged));

    a.set_species(0, SpeciesField::Mass, "1");
    assert!(a.guess().is_some());

    a.set_population(2, PopulationEdit::Use(false));
    assert_eq!(a.guess().unwrap().populations, vec![0]);
    let events = drain(&rx);
    assert_eq!(events[0], Event::PopulationChanged(2));
    assert_eq!(events[1], Event::IonsChanged);
}

#[test]
fn test_set_dynamic_chooses_the_display() {
    let (mut a, rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));

    a.set_display(DisplayedResult::Moments);
    drain(&rx);
    a.set_display(DisplayedResult::Moments);
    assert!(drain(&rx).is_empty());

    // Turning a flag off never reruns anything.
    a.set_dynamic(DynamicStage::Guess, false, true);
    assert_eq!(drain(&rx), vec![Event::DynamicChanged]);

    a.set_dynamic(DynamicStage::Selection, false, false);
    a.set_dynamic(DynamicStage::Moments, false, false);
    a.set_dynamic(DynamicStage::Moments, true, true);
    assert_eq!(a.display(), DisplayedResult::Moments);

    a.set_dynamic(DynamicStage::Guess, true, true);
    assert_eq!(a.display(), DisplayedResult::GuessSelection);
    assert!(a.guess().is_some());
}

#[test]
fn test_loading_from_the_fit_display_forces_dynamic_stages() {
    let (mut a, rx) = analyser_for(archive());
    a.set_dynamic(DynamicStage::Selection, false, false);
    a.set_display(DisplayedResult::Fit);
    drain(&rx);

    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    assert!(a.dynamic().moments && a.dynamic().guess && a.dynamic().selection);
    assert!(!a.dynamic().fit);
    assert_eq!(a.display(), DisplayedResult::GuessSelection);
    let events = drain(&rx);
    assert_eq!(events[0], Event::Reset);
    assert_eq!(events[1], Event::DynamicChanged);
    assert_eq!(events[2], Event::DisplayChanged);
}

#[test]
fn test_invalid_guess_multiplier_drops_the_population() {
    let (mut a, _rx) = analyser_for(archive());
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    assert_eq!(a.guess().unwrap().populations, vec![0, 2]);

    a.set_fit_setting(2, FitSettingEdit::GuessDensity("abc".into()));
    assert!(!a.settings().guess_valid(2, true));
    assert_eq!(a.ions().populations[2].density, Setting::Unset);
    assert!(a.ions().populations[2].values().is_none());
    assert_eq!(a.guess().unwrap().populations, vec![0]);

    // A valid multiplier brings it back.
    a.set_fit_setting(2, FitSettingEdit::GuessDensity("0.05".into()));
    assert_eq!(a.guess().unwrap().populations, vec![0, 2]);
}

#[test]
fn test_guess_is_not_carried_to_a_spectrum_without_moments() {
    let archive = MemoryArchive::new(
        vec![raw_spectrum(t0(), None), raw_spectrum(at(CADENCE), Some(0.5))],
        field_samples(2.0 * CADENCE),
    );
    let (mut a, rx) = analyser_for(archive);
    a.load_spectrum(&SpectrumRequest::nearest(t0()));
    assert!(a.guess().is_some());
    drain(&rx);

    a.load_spectrum(&SpectrumRequest::next(t0()));
    assert!(a.moments().is_none());
    assert!(a.guess().is_none());
    assert!(a
        .ions()
        .populations
        .iter()
        .all(|p| p.values().is_none()));
    let events = drain(&rx);
    assert!(events.contains(&Event::PopulationChanged(0)));
    assert!(events.contains(&Event::PopulationChanged(2)));

    // Rebuilding the guess has nothing old to fall back on.
    a.set_population(1, PopulationEdit::Use(false));
    assert!(a.guess().is_none());
    assert_eq!(a.ions().bulk_velocity(), None);
}
