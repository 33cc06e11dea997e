//! Process-scoped binding of one [`Database`] to one storage location.
//!
//! A [`Registry`] is either unbound or bound to exactly one location.
//! Opening the bound location again hands back the same instance. Opening a
//! different location closes the current connection before the new one is
//! created, so at most one connection is live per registry. A bound
//! instance that was closed directly is replaced on the next open.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::database::Database;
use crate::error::StoreError;

pub struct Registry {
    bound: Mutex<Option<Arc<Database>>>,
    config: StoreConfig,
}

impl Registry {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            bound: Mutex::new(None),
            config,
        }
    }

    /// Bind to `location`, reusing or replacing the current binding.
    pub fn open(&self, location: &str) -> Result<Arc<Database>, StoreError> {
        let mut bound = self.bound.lock();

        if let Some(current) = bound.as_ref() {
            if current.location() == location && current.is_open() {
                info!(location, "reuse instance");
                return Ok(current.clone());
            }
        }
        if let Some(previous) = bound.take() {
            if previous.is_open() {
                info!(from = previous.location(), to = location, "rebind");
                previous.close()?;
            } else {
                info!(location = previous.location(), "bound instance was closed, reconnecting");
            }
        }

        let database = Arc::new(Database::connect(location, self.config.clone())?);
        *bound = Some(database.clone());
        Ok(database)
    }

    /// The bound database, if any.
    pub fn current(&self) -> Option<Arc<Database>> {
        self.bound.lock().clone()
    }

    pub fn location(&self) -> Option<String> {
        self.bound.lock().as_ref().map(|db| db.location().to_string())
    }

    /// Close the bound database and return to the unbound state.
    /// Returns false when nothing was bound.
    pub fn close(&self) -> Result<bool, StoreError> {
        match self.bound.lock().take() {
            Some(database) => {
                database.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if let Some(database) = self.bound.get_mut().take() {
            if let Err(e) = database.close() {
                warn!(location = database.location(), error = %e, "close on drop failed");
            }
        }
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, configured from the environment on first use.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(|| Registry::new(StoreConfig::from_env()))
}

/// Bind the process-wide registry to `location`.
pub fn open(location: &str) -> Result<Arc<Database>, StoreError> {
    global().open(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MEMORY;
    use celldb_core::{Codec, Column};

    #[test]
    fn starts_unbound() {
        let registry = Registry::default();
        assert!(registry.current().is_none());
        assert!(!registry.close().unwrap());
    }

    #[test]
    fn same_location_reuses_instance() {
        let registry = Registry::default();
        let first = registry.open(MEMORY).unwrap();
        first.define("t", [Column::new("a", Codec::TEXT)]).unwrap();

        let second = registry.open(MEMORY).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // Same connection, so the in-memory table is still there.
        assert!(second.table("t").is_some());
    }

    #[test]
    fn new_location_closes_previous() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.db");
        let b = dir.path().join("b.db");

        let registry = Registry::default();
        let first = registry.open(a.to_str().unwrap()).unwrap();
        first.define("only_in_a", [Column::new("x", Codec::TEXT)]).unwrap();

        let second = registry.open(b.to_str().unwrap()).unwrap();
        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(registry.location().as_deref(), b.to_str());
        assert!(second.table("only_in_a").is_none());

        // Going back rehydrates what was written to a.
        let third = registry.open(a.to_str().unwrap()).unwrap();
        assert!(!second.is_open());
        assert!(third.table("only_in_a").is_some());
    }

    #[test]
    fn explicit_close_unbinds() {
        let registry = Registry::default();
        let db = registry.open(MEMORY).unwrap();
        assert!(registry.close().unwrap());
        assert!(!db.is_open());
        assert!(registry.current().is_none());
    }

    #[test]
    fn closed_instance_is_replaced_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.db");
        let location = path.to_str().unwrap();

        let registry = Registry::default();
        let first = registry.open(location).unwrap();
        first.define("t", [Column::new("x", Codec::TEXT)]).unwrap();
        first.close().unwrap();

        let second = registry.open(location).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_open());
        assert!(second.table("t").is_some());
        assert!(second.define("u", [Column::new("y", Codec::TEXT)]).is_ok());
        assert!(Arc::ptr_eq(&registry.current().unwrap(), &second));
    }

    #[test]
    fn drop_closes_bound_database() {
        let registry = Registry::default();
        let db = registry.open(MEMORY).unwrap();
        drop(registry);
        assert!(!db.is_open());
    }
}
