// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An archive of spectra and field samples in a single JSON file:
//!
//! ```json
//! {
//!   "spectra": [
//!     {
//!       "time": "2008-11-04T12:00:00 UTC",
//!       "cups": [
//!         {
//!           "altitude": 15.0,
//!           "azimuths": [-45.0, -40.0],
//!           "centre_voltages": [300.0, 350.0],
//!           "width_voltages": [20.0, 20.0],
//!           "currents": [[1.0, 2.0], [3.0, 4.0]]
//!         }
//!       ]
//!     }
//!   ],
//!   "field": [{ "time": "2008-11-04T12:00:00 UTC", "b": [1.0, 2.0, 3.0] }]
//! }
//! ```
//!
//! `currents` has a row per azimuth. A cup without an altitude takes the
//! default altitude of its position.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use hifitime::Epoch;
use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FieldSource, MemoryArchive, SourceError, SpectrumRequest, SpectrumSource};
use crate::{
    constants::DEFAULT_ALTITUDES,
    field::{epoch_string, FieldSample},
    spectrum::{RawCup, RawSpectrum},
};

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveFile {
    #[serde(default)]
    spectra: Vec<SpectrumEntry>,

    #[serde(default)]
    field: Vec<FieldSample>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SpectrumEntry {
    #[serde(with = "epoch_string")]
    time: Epoch,
    cups: Vec<CupEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CupEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    altitude: Option<f64>,
    azimuths: Vec<f64>,
    centre_voltages: Vec<f64>,
    width_voltages: Vec<f64>,
    currents: Vec<Vec<f64>>,
}

impl SpectrumEntry {
    fn into_raw(self, index: usize) -> Result<RawSpectrum, SourceError> {
        let cups = self
            .cups
            .into_iter()
            .enumerate()
            .map(|(c, cup)| {
                let altitude = cup
                    .altitude
                    .or_else(|| DEFAULT_ALTITUDES.get(c).copied())
                    .ok_or(SourceError::MissingAltitude {
                        spectrum: index,
                        cup: c,
                    })?;
                let n_vel = cup.centre_voltages.len();
                let ragged = SourceError::RaggedCurrents {
                    spectrum: index,
                    cup: c,
                };
                if cup.currents.iter().any(|row| row.len() != n_vel) {
                    return Err(ragged);
                }
                let n_azm = cup.currents.len();
                let currents = Array2::from_shape_vec((n_azm, n_vel), cup.currents.concat())
                    .map_err(|_| ragged)?;
                Ok(RawCup {
                    altitude,
                    azimuths: cup.azimuths,
                    centre_voltages: cup.centre_voltages,
                    width_voltages: cup.width_voltages,
                    currents,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawSpectrum {
            time: self.time,
            cups,
        })
    }

    fn from_raw(raw: &RawSpectrum) -> SpectrumEntry {
        SpectrumEntry {
            time: raw.time,
            cups: raw
                .cups
                .iter()
                .map(|cup| CupEntry {
                    altitude: Some(cup.altitude),
                    azimuths: cup.azimuths.clone(),
                    centre_voltages: cup.centre_voltages.clone(),
                    width_voltages: cup.width_voltages.clone(),
                    currents: cup.currents.outer_iter().map(|row| row.to_vec()).collect(),
                })
                .collect(),
        }
    }
}

/// A [`MemoryArchive`] read from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonArchive {
    archive: MemoryArchive,
}

impl JsonArchive {
    pub fn open(path: &Path) -> Result<JsonArchive, SourceError> {
        let file: ArchiveFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let spectra = file
            .spectra
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.into_raw(i))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Read {} spectra and {} field samples from {}",
            spectra.len(),
            file.field.len(),
            path.display()
        );
        Ok(JsonArchive {
            archive: MemoryArchive::new(spectra, file.field),
        })
    }

    /// Write `archive` in the format [`JsonArchive::open`] reads.
    pub fn write(archive: &MemoryArchive, path: &Path) -> Result<(), SourceError> {
        let file = ArchiveFile {
            spectra: archive.spectra().iter().map(SpectrumEntry::from_raw).collect(),
            field: archive.field().to_vec(),
        };
        serde_json::to_writer(BufWriter::new(File::create(path)?), &file)?;
        Ok(())
    }

    pub fn archive(&self) -> &MemoryArchive {
        &self.archive
    }
}

impl SpectrumSource for JsonArchive {
    fn fetch(&self, request: &SpectrumRequest) -> Result<Option<RawSpectrum>, SourceError> {
        self.archive.fetch(request)
    }
}

impl FieldSource for JsonArchive {
    fn fetch_range(&self, start: Epoch, duration: f64) -> Result<Vec<FieldSample>, SourceError> {
        self.archive.fetch_range(start, duration)
    }
}
