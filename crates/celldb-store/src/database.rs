use std::collections::BTreeMap;
use std::sync::Arc;

use celldb_core::{Column, ColumnType, MODIFIED};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::engine::{Cell, Engine, SqliteEngine};
use crate::error::StoreError;
use crate::table::Table;

/// The tables of one storage location and the engine connected to it.
///
/// All statements go through the engine, which serializes them. The table
/// map has its own lock so lookups never wait on a running statement.
pub struct Database {
    engine: Arc<dyn Engine>,
    config: StoreConfig,
    tables: RwLock<BTreeMap<String, Table>>,
}

impl Database {
    /// Connect to `location` with SQLite and rehydrate existing relations.
    pub fn connect(location: &str, config: StoreConfig) -> Result<Self, StoreError> {
        debug!(location, "connect");
        let engine = SqliteEngine::open(location, &config)?;
        Self::with_engine(Arc::new(engine), config)
    }

    /// Wrap an already connected engine and rehydrate its relations.
    ///
    /// Rehydrated tables get raw column types: constraints and composite
    /// codecs are not recoverable from the schema.
    pub fn with_engine(engine: Arc<dyn Engine>, config: StoreConfig) -> Result<Self, StoreError> {
        let mut tables = BTreeMap::new();
        for name in engine.list_relations()? {
            let described = engine.describe_relation(&name)?;
            let stamped = described.iter().any(|(column, _)| column == MODIFIED);
            let columns: Vec<Column> = described
                .into_iter()
                .filter(|(column, _)| column != MODIFIED)
                .map(|(column, typename)| Column::new(column, ColumnType::raw(typename)))
                .collect();
            debug!(table = %name, columns = columns.len(), "rehydrated table with raw column types");
            let table = Table::new(
                engine.clone(),
                &name,
                columns,
                stamped,
                config.reject_duplicates,
            );
            tables.insert(name, table);
        }

        Ok(Self {
            engine,
            config,
            tables: RwLock::new(tables),
        })
    }

    pub fn location(&self) -> &str {
        self.engine.location()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Look up a table by name. Missing tables are logged, not fatal.
    pub fn table(&self, identifier: &str) -> Option<Table> {
        let table = self.tables.read().get(identifier).cloned();
        if table.is_none() {
            warn!(table = identifier, "missing table");
        }
        table
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.tables.read().contains_key(identifier)
    }

    /// Names of all known tables, sorted.
    pub fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Define a table and create it.
    ///
    /// An existing table with the same name is dropped first, losing its rows.
    pub fn define<I, C>(&self, identifier: &str, columns: I) -> Result<Table, StoreError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let mut tables = self.tables.write();
        if tables.contains_key(identifier) {
            warn!(table = identifier, "replace table");
            self.engine
                .commit(&format!("DROP TABLE IF EXISTS {identifier};"))?;
            tables.remove(identifier);
        }

        let table = Table::new(
            self.engine.clone(),
            identifier,
            columns.into_iter().map(Into::into).collect(),
            true,
            self.config.reject_duplicates,
        );
        table.create()?;
        tables.insert(identifier.to_string(), table.clone());
        Ok(table)
    }

    /// Drop a table. Returns false when no such table was known.
    pub fn drop_table(&self, identifier: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if !tables.contains_key(identifier) {
            warn!(table = identifier, "missing table");
            return Ok(false);
        }
        self.engine
            .commit(&format!("DROP TABLE IF EXISTS {identifier};"))?;
        tables.remove(identifier);
        info!(table = identifier, "dropped table");
        Ok(true)
    }

    pub fn execute(&self, sql: &str) -> Result<Vec<Vec<Cell>>, StoreError> {
        self.engine.execute(sql)
    }

    pub fn commit(&self, sql: &str) -> Result<usize, StoreError> {
        self.engine.commit(sql)
    }

    /// Close the connection. Every later statement fails with
    /// [`StoreError::Closed`].
    pub fn close(&self) -> Result<(), StoreError> {
        self.engine.close()
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_open()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location())
            .field("tables", &self.tables())
            .finish()
    }
}
