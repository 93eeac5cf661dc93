// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

/// A number typed in by a user. Text that doesn't parse (or breaks a rule) is
/// kept so that it can be shown back.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Setting<T> {
    #[default]
    Unset,
    Invalid(String),
    Value(T),
}

impl<T: Copy> Setting<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Setting::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Setting::Value(_))
    }
}

impl<T> From<Option<T>> for Setting<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Setting::Value(v),
            None => Setting::Unset,
        }
    }
}

impl<T: FromStr> Setting<T> {
    /// Blank text is unset; anything else must parse.
    pub fn parse(text: &str) -> Setting<T> {
        let t = text.trim();
        if t.is_empty() {
            return Setting::Unset;
        }
        match t.parse() {
            Ok(v) => Setting::Value(v),
            Err(_) => Setting::Invalid(text.to_string()),
        }
    }
}

impl Setting<f64> {
    /// Like [`Setting::parse`], but the number must also satisfy `rule`.
    /// Non-finite numbers are never accepted.
    pub fn parse_with(text: &str, rule: impl Fn(f64) -> bool) -> Setting<f64> {
        match Setting::<f64>::parse(text) {
            Setting::Value(v) if !v.is_finite() || !rule(v) => Setting::Invalid(text.to_string()),
            s => s,
        }
    }

    pub fn parse_positive(text: &str) -> Setting<f64> {
        Setting::parse_with(text, |v| v > 0.0)
    }

    pub fn parse_non_negative(text: &str) -> Setting<f64> {
        Setting::parse_with(text, |v| v >= 0.0)
    }
}
