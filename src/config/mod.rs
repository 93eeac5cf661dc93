// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Analysis settings.
//!
//! Every field has a default, so an arguments file only needs to mention what
//! it changes. Files may be toml or json.

mod error;

pub use error::ConfigError;

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
    str::FromStr,
};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{constants::*, fit::SolverSettings, instrument::EffectiveArea};

#[derive(Debug, Display, EnumIter, EnumString)]
pub(crate) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,

    #[strum(serialize = "json")]
    Json,
}

lazy_static::lazy_static! {
    pub(crate) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");
}

/// Which stages recompute automatically when their inputs change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicFlags {
    pub moments: bool,
    pub guess: bool,
    pub selection: bool,
    pub fit: bool,
}

impl Default for DynamicFlags {
    fn default() -> Self {
        DynamicFlags {
            moments: true,
            guess: true,
            selection: true,
            fit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Currents below this \[pA\] are never used.
    pub current_min: f64,

    /// A current this many times larger than its neighbour(s) is a spike.
    pub current_jump: f64,

    /// Seconds spent on each velocity window.
    pub rotation_seconds: f64,

    /// Requested azimuthal window of the moments selection.
    pub win_azm: usize,

    /// Requested velocity window of the moments selection.
    pub win_cur: usize,

    /// Minimum number of directions for the moments analysis.
    pub min_sel_azm: usize,

    /// Minimum number of bins per direction for the moments analysis.
    pub min_sel_cur: usize,

    /// Minimum number of bins for the non-linear fit.
    pub fit_min_sel: usize,

    pub num_species: usize,

    pub num_populations: usize,

    /// Effective collecting area \[cm^2\] at 0, 1, ..., 90 degrees. The
    /// Wind/FC table is used if this isn't given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_area: Option<Vec<f64>>,

    pub solver: SolverSettings,

    pub dynamic: DynamicFlags,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            current_min: DEFAULT_CURRENT_MIN,
            current_jump: DEFAULT_CURRENT_JUMP,
            rotation_seconds: DEFAULT_ROTATION_SECONDS,
            win_azm: DEFAULT_WIN_AZM,
            win_cur: DEFAULT_WIN_CUR,
            min_sel_azm: DEFAULT_MIN_SEL_AZM,
            min_sel_cur: DEFAULT_MIN_SEL_CUR,
            fit_min_sel: DEFAULT_FIT_MIN_SEL,
            num_species: DEFAULT_NUM_SPECIES,
            num_populations: DEFAULT_NUM_POPULATIONS,
            effective_area: None,
            solver: SolverSettings::default(),
            dynamic: DynamicFlags::default(),
        }
    }
}

impl AnalysisConfig {
    /// Read a config from a toml or json file, chosen by the file's
    /// extension.
    pub fn from_file(path: &Path) -> Result<AnalysisConfig, ConfigError> {
        debug!("Attempting to parse argument file {}", path.display());

        let file_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        let mut contents = String::new();
        let config = match file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                File::open(path)?.read_to_string(&mut contents)?;
                toml::from_str(&contents).map_err(|err| ConfigError::Decode {
                    file: path.display().to_string(),
                    err: err.to_string(),
                })?
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                File::open(path)?.read_to_string(&mut contents)?;
                serde_json::from_str(&contents).map_err(|err| ConfigError::Decode {
                    file: path.display().to_string(),
                    err: err.to_string(),
                })?
            }
            None => {
                return Err(ConfigError::UnknownExtension {
                    file: path.display().to_string(),
                    valid: ARG_FILE_TYPES_COMMA_SEPARATED.clone(),
                })
            }
        };
        Ok(config)
    }

    /// Write the config as toml.
    pub fn write_toml(&self, path: &Path) -> Result<(), ConfigError> {
        let s = toml::to_string(self).map_err(|e| ConfigError::Encode(e.to_string()))?;
        let mut f = File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Check the settings are usable and build the effective-area table.
    pub fn validate(&self) -> Result<EffectiveArea, ConfigError> {
        if self.current_jump.is_nan() || self.current_jump <= 0.0 {
            return Err(ConfigError::NonPositive("current_jump"));
        }
        if self.rotation_seconds.is_nan() || self.rotation_seconds <= 0.0 {
            return Err(ConfigError::NonPositive("rotation_seconds"));
        }
        if self.num_populations == 0 {
            return Err(ConfigError::NonPositive("num_populations"));
        }
        if self.num_species == 0 {
            return Err(ConfigError::NonPositive("num_species"));
        }
        match &self.effective_area {
            Some(table) => Ok(EffectiveArea::new(table.clone())?),
            None => Ok(EffectiveArea::default()),
        }
    }
}
