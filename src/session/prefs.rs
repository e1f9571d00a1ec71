// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::{Error, Point};

/// Preference key holding the last start position, as JSON `{"lat": .., "lng": ..}`.
pub const START_KEY: &str = "freeride.start";

/// Simple key-value storage of user preferences.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// [PreferenceStore] kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

pub(super) fn load_start<P: PreferenceStore>(prefs: &P) -> Option<Point> {
    let raw = prefs.get(START_KEY)?;
    match serde_json::from_str::<Point>(&raw) {
        Ok(p) if p.is_valid() => Some(p),
        Ok(p) => {
            log::warn!("ignoring invalid stored start position {}", p);
            None
        }
        Err(e) => {
            log::warn!("ignoring malformed stored start position: {}", e);
            None
        }
    }
}

pub(super) fn store_start<P: PreferenceStore>(prefs: &mut P, p: Point) -> Result<(), Error> {
    prefs.set(START_KEY, &serde_json::to_string(&p)?);
    Ok(())
}
