//! Store configuration.
//!
//! Loading flow:
//! 1. Start with [`StoreConfig::default()`]
//! 2. Optionally deserialize a JSON document over it (missing keys keep defaults)
//! 3. Apply `CELLDB_*` environment overrides (highest priority)

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Create the database file (and parent directories) when it does not
    /// exist. When false, opening a missing file fails.
    pub create_if_missing: bool,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Skip inserts whose supplied values equal an existing row.
    pub reject_duplicates: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            busy_timeout_ms: 5000,
            reject_duplicates: false,
        }
    }
}

impl StoreConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Parse a JSON document; keys it leaves out keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// - `CELLDB_CREATE_IF_MISSING`, `CELLDB_REJECT_DUPLICATES`: booleans
    /// - `CELLDB_BUSY_TIMEOUT_MS`: integer in `0..=600000`
    ///
    /// Invalid values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CELLDB_CREATE_IF_MISSING").and_then(|v| parse_bool(&v)) {
            self.create_if_missing = v;
        }
        if let Some(v) = lookup("CELLDB_REJECT_DUPLICATES").and_then(|v| parse_bool(&v)) {
            self.reject_duplicates = v;
        }
        if let Some(v) = lookup("CELLDB_BUSY_TIMEOUT_MS").and_then(|v| parse_u32(&v, 0, 600_000)) {
            self.busy_timeout_ms = v;
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        other => {
            debug!(value = other, "ignoring invalid boolean override");
            None
        }
    }
}

fn parse_u32(raw: &str, min: u32, max: u32) -> Option<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(!config.reject_duplicates);
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn json_keeps_defaults_for_missing_keys() {
        let config = StoreConfig::from_json(r#"{"reject_duplicates": true}"#).unwrap();
        assert!(config.reject_duplicates);
        assert!(config.create_if_missing);
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = StoreConfig::from_json("{nope").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn overrides_apply() {
        let mut config = StoreConfig::default();
        config.apply_overrides(lookup(&[
            ("CELLDB_REJECT_DUPLICATES", "yes"),
            ("CELLDB_CREATE_IF_MISSING", "off"),
            ("CELLDB_BUSY_TIMEOUT_MS", "250"),
        ]));
        assert!(config.reject_duplicates);
        assert!(!config.create_if_missing);
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut config = StoreConfig::default();
        config.apply_overrides(lookup(&[
            ("CELLDB_REJECT_DUPLICATES", "sometimes"),
            ("CELLDB_BUSY_TIMEOUT_MS", "9999999"),
        ]));
        assert_eq!(config, StoreConfig::default());
    }
}
