use std::fmt;

use celldb_core::{Value, MODIFIED};
use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// SQLite's `CURRENT_TIMESTAMP` layout.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One decoded result row, in projection order.
///
/// Rows are detached snapshots: they hold no reference to the table that
/// produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    values: Vec<(String, Value)>,
    modified: Option<NaiveDateTime>,
}

impl Row {
    pub(crate) fn new(values: Vec<(String, Value)>, modified: Option<NaiveDateTime>) -> Self {
        Self { values, modified }
    }

    /// Decoded value for `identifier`, or `None` when the row has no such
    /// column.
    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == identifier)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// When the row was inserted, if the table carries the timestamp.
    pub fn modified(&self) -> Option<NaiveDateTime> {
        self.modified
    }

    pub fn into_values(self) -> Vec<(String, Value)> {
        self.values
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(self.modified.is_some());
        let mut map = serializer.serialize_map(Some(self.values.len() + extra))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        if let Some(modified) = &self.modified {
            map.serialize_entry(MODIFIED, &modified.format(TIMESTAMP_FORMAT).to_string())?;
        }
        map.end()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}
