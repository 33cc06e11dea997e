pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod registry;
pub mod row;
pub mod table;

#[cfg(test)]
mod test_support;

pub use config::StoreConfig;
pub use database::Database;
pub use engine::{Cell, Engine, SqliteEngine, MEMORY};
pub use error::StoreError;
pub use registry::Registry;
pub use row::Row;
pub use table::{ColumnWarning, InsertReport, Selection, Table};
