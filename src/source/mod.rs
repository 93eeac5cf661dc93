// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Where spectra and magnetic-field data come from.
//!
//! The analysis only needs the two traits here. [`MemoryArchive`] keeps
//! everything in memory and [`JsonArchive`] reads it from a file.

mod error;
mod json;

pub use error::SourceError;
pub use json::JsonArchive;

use hifitime::{Duration, Epoch};
use log::trace;

use crate::{field::FieldSample, spectrum::RawSpectrum};

/// Which spectrum to take relative to the requested time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// The closest in time. Ties go to the earlier spectrum.
    #[default]
    Nearest,

    /// The last strictly before.
    Previous,

    /// The first strictly after.
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumRequest {
    pub time: Epoch,
    pub direction: Direction,

    /// Only spectra within `[start, end]` are considered.
    pub bounds: Option<(Epoch, Epoch)>,
}

impl SpectrumRequest {
    pub fn nearest(time: Epoch) -> SpectrumRequest {
        SpectrumRequest {
            time,
            direction: Direction::Nearest,
            bounds: None,
        }
    }

    pub fn next(time: Epoch) -> SpectrumRequest {
        SpectrumRequest {
            time,
            direction: Direction::Next,
            bounds: None,
        }
    }

    pub fn with_bounds(self, start: Epoch, end: Epoch) -> SpectrumRequest {
        SpectrumRequest {
            bounds: Some((start, end)),
            ..self
        }
    }

    /// The index of the requested time in `times`, which must be sorted.
    pub(crate) fn pick(&self, times: &[Epoch]) -> Option<usize> {
        let in_bounds = |t: &Epoch| match self.bounds {
            Some((start, end)) => *t >= start && *t <= end,
            None => true,
        };
        let mut candidates = times
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, t)| in_bounds(&t));
        match self.direction {
            Direction::Previous => candidates.filter(|&(_, t)| t < self.time).last().map(|(i, _)| i),
            Direction::Next => candidates.find(|&(_, t)| t > self.time).map(|(i, _)| i),
            Direction::Nearest => candidates
                .map(|(i, t)| (i, (t - self.time).abs()))
                // The first of equals wins.
                .fold(None, |best: Option<(usize, Duration)>, (i, d)| match best {
                    Some((_, best_d)) if best_d <= d => best,
                    _ => Some((i, d)),
                })
                .map(|(i, _)| i),
        }
    }
}

/// A supplier of ion spectra.
pub trait SpectrumSource: Sync + Send {
    /// `Ok(None)` if no spectrum matches.
    fn fetch(&self, request: &SpectrumRequest) -> Result<Option<RawSpectrum>, SourceError>;
}

/// A supplier of magnetometer data.
pub trait FieldSource: Sync + Send {
    /// All samples from `start` to `duration` seconds after it, inclusive.
    fn fetch_range(&self, start: Epoch, duration: f64) -> Result<Vec<FieldSample>, SourceError>;
}

/// Spectra and field samples held in memory, both sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryArchive {
    spectra: Vec<RawSpectrum>,
    field: Vec<FieldSample>,
}

impl MemoryArchive {
    pub fn new(mut spectra: Vec<RawSpectrum>, mut field: Vec<FieldSample>) -> MemoryArchive {
        spectra.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        field.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        MemoryArchive { spectra, field }
    }

    pub fn spectra(&self) -> &[RawSpectrum] {
        &self.spectra
    }

    pub fn field(&self) -> &[FieldSample] {
        &self.field
    }
}

impl SpectrumSource for MemoryArchive {
    fn fetch(&self, request: &SpectrumRequest) -> Result<Option<RawSpectrum>, SourceError> {
        let times: Vec<Epoch> = self.spectra.iter().map(|s| s.time).collect();
        let found = request.pick(&times).map(|i| self.spectra[i].clone());
        match &found {
            Some(s) => trace!("Found the spectrum at {}", s.time),
            None => trace!("No spectrum for {request:?}"),
        }
        Ok(found)
    }
}

impl FieldSource for MemoryArchive {
    fn fetch_range(&self, start: Epoch, duration: f64) -> Result<Vec<FieldSample>, SourceError> {
        let end = start + Duration::from_seconds(duration);
        Ok(self
            .field
            .iter()
            .filter(|s| s.time >= start && s.time <= end)
            .copied()
            .collect())
    }
}
