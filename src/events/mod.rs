// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Notifications sent by the analyser as its state changes.
//!
//! Any number of observers can subscribe; each gets every event, in order,
//! over its own unbounded channel. Sending never blocks.


use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use strum_macros::{Display, EnumIter, EnumString};

/// The receiving end of a subscription.
pub type EventReceiver = Receiver<Event>;

/// A part of the analysis that reports its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Spectrum,
    Field,
    Moments,
    Guess,
    Selection,
    Fit,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    Begin,
    End,

    /// The stage ran and failed.
    Fail,

    /// The stage didn't have what it needed to run.
    NoRun,

    /// The stage was stopped early.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Everything derived from the previous spectrum was discarded.
    Reset,
    SpectrumChanged,
    FieldChanged,
    MomentsSelectionBin { t: usize, p: usize, v: usize },
    MomentsSelectionDirection { t: usize, p: usize },
    MomentsSelectionAll,
    MomentsResultChanged,
    PopulationChanged(usize),
    IonsChanged,
    SettingsChanged,
    GuessChanged,
    FitSelectionBin { t: usize, p: usize, v: usize },
    FitSelectionAll,
    FitResultChanged,
    DisplayChanged,
    DynamicChanged,
    BatchDone,
    Message { stage: Stage, kind: MessageKind },
}

/// Fans events out to subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Vec<Sender<Event>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    /// Send `event` to every subscriber. Subscribers that have hung up are
    /// forgotten.
    pub fn emit(&mut self, event: Event) {
        trace!("Event: {event:?}");
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn message(&mut self, stage: Stage, kind: MessageKind) {
        self.emit(Event::Message { stage, kind });
    }

    pub fn num_subscribers(&self) -> usize {
        self.senders.len()
    }
}
