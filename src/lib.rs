//! # celldb
//!
//! Typed tables over SQLite where a single cell can hold arrays and tuples
//! of any nesting depth.
//!
//! ```no_run
//! use celldb::{not_null, primary_key, unique, Codec, Value};
//!
//! let db = celldb::open(":memory:")?;
//! let notes = db.define(
//!     "notes",
//!     [
//!         ("id", primary_key(Codec::INTEGER)),
//!         ("tags", not_null(unique(Codec::array(Codec::TEXT)))),
//!     ],
//! )?;
//! notes.insert([("id", Value::from(1i64)), ("tags", Value::from(vec!["a", "b"]))])?;
//! for row in notes.select_all()? {
//!     println!("{row}");
//! }
//! # Ok::<(), celldb::StoreError>(())
//! ```

pub mod telemetry;

pub use celldb_core::{
    not_null, primary_key, unique, Codec, CodecError, Column, ColumnType, Constraint, Scalar,
    Value, CLOSE, MODIFIED, OPEN,
};
pub use celldb_store::registry::{global, open};
pub use celldb_store::{
    Cell, ColumnWarning, Database, Engine, InsertReport, Registry, Row, Selection, SqliteEngine,
    StoreConfig, StoreError, Table, MEMORY,
};
