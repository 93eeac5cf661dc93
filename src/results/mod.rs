// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The log of non-linear fit results, and code to write it out.
//!
//! Results can be written as JSON (which can be read back) or as a plain-text
//! report meant for people.

mod error;
#[cfg(test)]
mod tests;

pub use error::ResultsError;

use std::{
    ffi::OsStr,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use hifitime::Epoch;
use itertools::Itertools;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    field::{epoch_string, MagneticField},
    fit::FitOutcome,
    ions::IonRegistry,
    model::Thermal,
};

/// A value and its 1σ uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measured {
    pub value: f64,

    /// Non-finite uncertainties are written to JSON as `null` and read back as
    /// NaN.
    #[serde(with = "finite_or_null")]
    pub sigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThermalRecord {
    Isotropic { w: Measured },
    Anisotropic { w_per: Measured, w_par: Measured },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub name: String,
    pub symbol: String,

    /// Relative to the proton.
    pub mass: f64,

    /// Relative to the proton.
    pub charge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    /// The name of the population's species.
    pub species: String,
    pub name: String,
    pub symbol: String,

    /// \[cm^-3\]
    pub density: Measured,

    /// Drift along the field \[km/s\]; `None` for populations that don't drift.
    pub drift: Option<Measured>,

    /// \[km/s\]
    pub thermal: ThermalRecord,
}

/// The outcome of one successful fit, as it is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    #[serde(with = "epoch_string")]
    pub time: Epoch,

    /// Average magnetic field during the spectrum \[nT\].
    pub b0: [f64; 3],

    /// Bulk velocity \[km/s\].
    pub v0: [f64; 3],
    #[serde(with = "finite_or_null::triple")]
    pub sigma_v0: [f64; 3],

    /// Species of the fitted populations, each once.
    pub species: Vec<SpeciesRecord>,
    pub populations: Vec<PopulationRecord>,
}

impl FitRecord {
    /// Freeze a fit outcome. Names come from `ions` as they are now.
    pub fn new(
        time: Epoch,
        field: &MagneticField,
        ions: &IonRegistry,
        outcome: &FitOutcome,
    ) -> Result<FitRecord, ResultsError> {
        let mut species: Vec<SpeciesRecord> = vec![];
        let mut populations = Vec::with_capacity(outcome.populations.len());

        for fitted in &outcome.populations {
            let slot = fitted.slot;
            let pop = ions
                .populations
                .get(slot)
                .ok_or(ResultsError::NoSpecies { slot })?;
            let s = ions
                .species_of(slot)
                .ok_or(ResultsError::NoSpecies { slot })?;
            let species_name = s.name.clone().unwrap_or_default();
            if !species.iter().any(|r| r.name == species_name) {
                species.push(SpeciesRecord {
                    name: species_name.clone(),
                    symbol: s.symbol.clone().unwrap_or_default(),
                    mass: s.mass.value().unwrap_or(f64::NAN),
                    charge: s.charge.value().unwrap_or(f64::NAN),
                });
            }

            let measured = |value, sigma| Measured { value, sigma };
            let thermal = match (fitted.values.thermal, fitted.sigmas.thermal) {
                (Thermal::Anisotropic { per, par }, Thermal::Anisotropic { per: s_per, par: s_par }) => {
                    ThermalRecord::Anisotropic {
                        w_per: measured(per, s_per),
                        w_par: measured(par, s_par),
                    }
                }
                (Thermal::Isotropic(w), Thermal::Isotropic(s_w)) => ThermalRecord::Isotropic {
                    w: measured(w, s_w),
                },
                // Values and uncertainties are decoded with the same layout.
                (Thermal::Isotropic(w), _) => ThermalRecord::Isotropic {
                    w: measured(w, f64::NAN),
                },
                (Thermal::Anisotropic { per, par }, _) => ThermalRecord::Anisotropic {
                    w_per: measured(per, f64::NAN),
                    w_par: measured(par, f64::NAN),
                },
            };
            populations.push(PopulationRecord {
                species: species_name,
                name: pop.name.clone().unwrap_or_default(),
                symbol: pop.symbol.clone().unwrap_or_default(),
                density: measured(fitted.values.density, fitted.sigmas.density),
                drift: fitted
                    .values
                    .drift
                    .map(|dv| measured(dv, fitted.sigmas.drift.unwrap_or(f64::NAN))),
                thermal,
            });
        }

        Ok(FitRecord {
            time,
            b0: field.average,
            v0: outcome.bulk_velocity,
            sigma_v0: outcome.bulk_velocity_sigma,
            species,
            populations,
        })
    }
}

/// Every result so far, oldest first. Records are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsLog {
    records: Vec<FitRecord>,
}

impl ResultsLog {
    pub fn new() -> ResultsLog {
        ResultsLog::default()
    }

    pub fn push(&mut self, record: FitRecord) {
        trace!("Logging the fit at {}", record.time);
        self.records.push(record);
    }

    pub fn records(&self) -> &[FitRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), ResultsError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_json<R: Read>(reader: R) -> Result<ResultsLog, ResultsError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the human-readable report. Numbers are in scientific notation with
    /// four decimals and a sign, and an uncertainty sits immediately below its
    /// value.
    pub fn write_report<W: Write>(&self, mut w: W) -> Result<(), ResultsError> {
        write!(w, "{SEP}\n# windfit {}\n{SEP}\n", env!("CARGO_PKG_VERSION"))?;
        for line in REPORT_COMMENTS {
            writeln!(w, "{line}")?;
        }
        write!(w, "{SEP}")?;

        for record in &self.records {
            let (y, mo, d, h, mi, s, _) = record.time.to_gregorian_utc();
            write!(w, "\nTimestamp:  {y:04}-{mo:02}-{d:02}/{h:02}:{mi:02}:{s:02}")?;
            write!(w, "\nB-Field:   {}", nums(&record.b0))?;
            write!(w, "\nVelocity:  {}", nums(&record.v0))?;
            write!(w, "\n{SPC}{}", nums(&record.sigma_v0))?;

            for species in &record.species {
                write!(w, "\nSpecies:    {} ({})", species.name, species.symbol)?;
                write!(w, "\n{SPC} {}  {}", sci(species.mass), sci(species.charge))?;

                for pop in record.populations.iter().filter(|p| p.species == species.name) {
                    write!(w, "\n{SPC} Population: {} ({})", pop.name, pop.symbol)?;
                    write_measured(&mut w, "Density:   ", &[pop.density])?;
                    if let Some(dv) = pop.drift {
                        write_measured(&mut w, "Drift vel: ", &[dv])?;
                    }
                    match pop.thermal {
                        ThermalRecord::Isotropic { w: th } => {
                            write_measured(&mut w, "Thrm Speed:", &[th])?
                        }
                        ThermalRecord::Anisotropic { w_per, w_par } => {
                            write_measured(&mut w, "Thrm Speed:", &[w_per, w_par])?
                        }
                    }
                }
            }
            write!(w, "\n{SEP}")?;
        }
        writeln!(w)?;
        Ok(())
    }

    /// Write the log to `path`. The extension picks the format: "json" or
    /// "txt" (the report).
    pub fn write(&self, path: &Path) -> Result<(), ResultsError> {
        let ext = extension(path);
        let file = BufWriter::new(File::create(path)?);
        match ext.as_str() {
            "json" => self.write_json(file)?,
            "txt" => self.write_report(file)?,
            _ => return Err(ResultsError::UnsupportedExt { ext }),
        }
        debug!("Wrote {} results to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a log previously written as JSON.
    pub fn read(path: &Path) -> Result<ResultsLog, ResultsError> {
        let ext = extension(path);
        if ext != "json" {
            return Err(ResultsError::UnsupportedExt { ext });
        }
        ResultsLog::read_json(BufReader::new(File::open(path)?))
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

const SEP: &str = "#----------------------------------------------------------";
const SPC: &str = "           ";

const REPORT_COMMENTS: [&str; 13] = [
    "# Comments:",
    "#   -- Timestamps are \"YYYY-MM-DD/HH:MM:SS\" in UTC.",
    "#   -- Mass and charge of a species are on the line",
    "#      below its name, relative to the proton.",
    "#   -- Drifts are along the magnetic field; populations",
    "#      without one don't drift relative to the bulk.",
    "#   -- Vectors are (x, y, z) in GSE.",
    "#   -- Two thermal speeds are perpendicular then parallel.",
    "#   -- Absolute 1-sigma uncertainties are below their",
    "#      values, scaled for a reduced chi-squared of one.",
    "#   -- Units: B-field nT, mass proton mass, charge proton",
    "#      charge, density cm^-3, velocity km/s.",
    "#   -- Uncertainties that can't be determined are nan/inf.",
];

fn write_measured<W: Write>(w: &mut W, label: &str, values: &[Measured]) -> std::io::Result<()> {
    let v = values.iter().map(|m| m.value).collect_vec();
    let s = values.iter().map(|m| m.sigma).collect_vec();
    write!(w, "\n{SPC}{SPC}  {label}{}", nums(&v))?;
    write!(w, "\n{SPC}{SPC}{SPC}  {}", nums(&s))
}

/// Each number as " {:+10.4e}" would be in Python.
fn nums(values: &[f64]) -> String {
    values.iter().map(|&x| format!(" {}", sci(x))).collect()
}

/// Scientific notation with a sign, four decimals and an exponent of at least
/// two digits, right-aligned in ten characters.
pub(crate) fn sci(x: f64) -> String {
    let s = if x.is_nan() {
        "+nan".to_string()
    } else if x.is_infinite() {
        String::from(if x > 0.0 { "+inf" } else { "-inf" })
    } else {
        let s = format!("{x:+.4e}");
        match s.split_once('e') {
            Some((mantissa, exp)) => {
                let exp = exp.parse::<i32>().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            None => s,
        }
    };
    format!("{s:>10}")
}

mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(x: &f64, s: S) -> Result<S::Ok, S::Error> {
        if x.is_finite() {
            s.serialize_f64(*x)
        } else {
            s.serialize_none()
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }

    pub(crate) mod triple {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub(crate) fn serialize<S: Serializer>(x: &[f64; 3], s: S) -> Result<S::Ok, S::Error> {
            x.map(|x| Some(x).filter(|x| x.is_finite())).serialize(s)
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[f64; 3], D::Error> {
            Ok(<[Option<f64>; 3]>::deserialize(d)?.map(|x| x.unwrap_or(f64::NAN)))
        }
    }
}
