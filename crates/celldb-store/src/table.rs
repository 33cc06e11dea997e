use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use celldb_core::{Codec, CodecError, Column, ColumnType, Scalar, Value, MODIFIED};
use chrono::NaiveDateTime;
use tracing::{error, warn};

use crate::engine::{Cell, Engine};
use crate::error::StoreError;
use crate::row::{Row, TIMESTAMP_FORMAT};

/// A condition reported by [`Table::insert`] that did not stop the insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnWarning {
    /// A supplied key matches no declared column; its value was dropped.
    UnknownColumn(String),
    /// A declared column got no value and was written as NULL.
    MissingValue(String),
}

impl fmt::Display for ColumnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn(name) => write!(f, "unknown column '{name}'"),
            Self::MissingValue(name) => write!(f, "missing value for column '{name}'"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// False when the duplicate check skipped the row.
    pub written: bool,
    pub warnings: Vec<ColumnWarning>,
}

/// Projection and predicate for [`Table::select`].
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// Columns to return. `None` or an empty list returns every declared
    /// column.
    pub columns: Option<Vec<String>>,
    /// Raw SQL predicate. `None` matches every row.
    pub predicate: Option<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            predicate: None,
        }
    }

    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

struct TableDef {
    identifier: String,
    columns: Vec<Column>,
    /// Whether the relation carries the trailing `modified` column.
    stamped: bool,
    reject_duplicates: bool,
}

/// A relation with typed columns. Cheap to clone; clones share the engine.
#[derive(Clone)]
pub struct Table {
    def: Arc<TableDef>,
    engine: Arc<dyn Engine>,
}

impl Table {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        identifier: &str,
        columns: Vec<Column>,
        stamped: bool,
        reject_duplicates: bool,
    ) -> Self {
        let mut kept: Vec<Column> = Vec::with_capacity(columns.len());
        for column in columns {
            if column.identifier() == MODIFIED {
                warn!(table = identifier, "ignoring reserved column '{MODIFIED}'");
            } else if kept.iter().any(|c| c.identifier() == column.identifier()) {
                warn!(
                    table = identifier,
                    column = column.identifier(),
                    "ignoring duplicate column"
                );
            } else {
                kept.push(column);
            }
        }

        Self {
            def: Arc::new(TableDef {
                identifier: identifier.to_string(),
                columns: kept,
                stamped,
                reject_duplicates,
            }),
            engine,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.def.identifier
    }

    pub fn columns(&self) -> &[Column] {
        &self.def.columns
    }

    pub fn column(&self, identifier: &str) -> Option<&Column> {
        self.def
            .columns
            .iter()
            .find(|c| c.identifier() == identifier)
    }

    /// Create the relation if it does not exist yet.
    pub fn create(&self) -> Result<&Self, StoreError> {
        let mut definitions: Vec<String> = self.columns().iter().map(Column::definition).collect();
        if self.def.stamped {
            definitions.push(format!("{MODIFIED} DATE"));
        }
        self.engine.commit(&format!(
            "CREATE TABLE IF NOT EXISTS {}({});",
            self.identifier(),
            definitions.join(", ")
        ))?;
        Ok(self)
    }

    /// Insert one row.
    ///
    /// Unknown keys and declared columns without a value are reported, not
    /// fatal. An encode failure aborts before anything is written.
    pub fn insert<I, K, V>(&self, values: I) -> Result<InsertReport, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values: HashMap<String, Value> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let table = self.identifier();
        let mut warnings = Vec::new();

        let mut unknown: Vec<&String> = values
            .keys()
            .filter(|key| self.column(key).is_none())
            .collect();
        unknown.sort();
        for key in unknown {
            warn!(table, column = %key, "missing column");
            warnings.push(ColumnWarning::UnknownColumn(key.clone()));
        }
        for column in self.columns() {
            if !values.contains_key(column.identifier()) {
                warn!(table, column = column.identifier(), "missing value for column");
                warnings.push(ColumnWarning::MissingValue(column.identifier().to_string()));
            }
        }

        let mut names = Vec::with_capacity(self.columns().len() + 1);
        let mut literals = Vec::with_capacity(self.columns().len() + 1);
        let mut conditions = Vec::with_capacity(self.columns().len());
        for column in self.columns() {
            match values.get(column.identifier()) {
                Some(value) if !value.is_null() => {
                    let literal = sql_literal(column.ty(), value).map_err(|e| {
                        error!(table, column = column.identifier(), error = %e, "could not encode value");
                        e
                    })?;
                    conditions.push(format!("{} = {literal}", column.identifier()));
                    literals.push(literal);
                }
                _ => {
                    conditions.push(format!("{} IS NULL", column.identifier()));
                    literals.push("NULL".to_string());
                }
            }
            names.push(column.identifier());
        }

        if self.def.reject_duplicates && !conditions.is_empty() {
            let existing = self.engine.execute(&format!(
                "SELECT 1 FROM {table} WHERE {} LIMIT 1;",
                conditions.join(" AND ")
            ))?;
            if !existing.is_empty() {
                warn!(table, "duplicate entry");
                return Ok(InsertReport {
                    written: false,
                    warnings,
                });
            }
        }

        if self.def.stamped {
            names.push(MODIFIED);
            literals.push("CURRENT_TIMESTAMP".to_string());
        }
        self.engine.commit(&format!(
            "INSERT INTO {table}({}) VALUES({});",
            names.join(", "),
            literals.join(", ")
        ))?;

        Ok(InsertReport {
            written: true,
            warnings,
        })
    }

    /// Select rows, decoding every projected cell with its column codec.
    ///
    /// Requested columns that are not declared are logged and skipped. A
    /// cell that fails to decode comes back as `Value::Null`.
    pub fn select(&self, selection: &Selection) -> Result<Vec<Row>, StoreError> {
        let table = self.identifier();
        let projection: Vec<&Column> = match &selection.columns {
            Some(requested) if !requested.is_empty() => {
                for name in requested.iter().filter(|name| self.column(name).is_none()) {
                    error!(table, column = %name, "missing column");
                }
                self.columns()
                    .iter()
                    .filter(|c| requested.iter().any(|r| r == c.identifier()))
                    .collect()
            }
            _ => self.columns().iter().collect(),
        };

        let mut names: Vec<&str> = projection.iter().map(|c| c.identifier()).collect();
        if self.def.stamped {
            names.push(MODIFIED);
        }
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("SELECT {} FROM {table}", names.join(", "));
        if let Some(predicate) = &selection.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql.push(';');

        let rows = self.engine.execute(&sql)?;
        Ok(rows
            .into_iter()
            .map(|cells| self.decode_row(&projection, cells))
            .collect())
    }

    /// Every row, every declared column.
    pub fn select_all(&self) -> Result<Vec<Row>, StoreError> {
        self.select(&Selection::all())
    }

    /// Delete rows matching `predicate`. `None` deletes every row.
    pub fn delete(&self, predicate: Option<&str>) -> Result<usize, StoreError> {
        let predicate = predicate.unwrap_or("TRUE");
        self.engine.commit(&format!(
            "DELETE FROM {} WHERE {predicate};",
            self.identifier()
        ))
    }

    fn decode_row(&self, projection: &[&Column], cells: Vec<Cell>) -> Row {
        let mut cells = cells.into_iter();
        let values = projection
            .iter()
            .zip(cells.by_ref())
            .map(|(column, cell)| {
                let value = decode_cell(column.ty(), cell).unwrap_or_else(|e| {
                    error!(
                        table = self.identifier(),
                        column = column.identifier(),
                        error = %e,
                        "could not decode cell"
                    );
                    Value::Null
                });
                (column.identifier().to_string(), value)
            })
            .collect();

        let modified = cells.next().and_then(|cell| match cell {
            Cell::Text(raw) => NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).ok(),
            _ => None,
        });

        Row::new(values, modified)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.columns().iter().map(Column::identifier).collect();
        write!(
            f,
            "Table(identifier: '{}', columns: [{}])",
            self.identifier(),
            names.join(", ")
        )
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("identifier", &self.def.identifier)
            .field("columns", &self.def.columns)
            .field("location", &self.engine.location())
            .finish()
    }
}

/// SQL string literal with embedded quotes doubled.
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// SQL literal for a non-null value. Top-level BLOB values are written as
/// blob literals so the cell holds the bytes themselves.
fn sql_literal(ty: &ColumnType, value: &Value) -> Result<String, CodecError> {
    match (ty.codec(), value) {
        (Codec::Scalar(Scalar::Blob), Value::Blob(bytes)) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for byte in bytes {
                out.push_str(&format!("{byte:02X}"));
            }
            out.push('\'');
            Ok(out)
        }
        _ => ty.encode(value).map(|encoded| quote(&encoded)),
    }
}

/// Decode one raw cell with the column's codec.
fn decode_cell(ty: &ColumnType, cell: Cell) -> Result<Value, CodecError> {
    match (ty.codec(), cell) {
        (_, Cell::Null) => Ok(Value::Null),
        (Codec::Raw(_), cell) => Ok(raw_value(cell)),
        (Codec::Scalar(Scalar::Blob), Cell::Blob(bytes)) => Ok(Value::Blob(bytes)),
        (_, Cell::Integer(i)) => ty.decode(&i.to_string()),
        (_, Cell::Real(r)) => ty.decode(&r.to_string()),
        (_, Cell::Text(text)) => ty.decode(&text),
        (_, Cell::Blob(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => ty.decode(&text),
            Err(e) => Err(CodecError::malformed(ty.typename(), e.to_string())),
        },
    }
}

fn raw_value(cell: Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Integer(i) => Value::Integer(i),
        Cell::Real(r) => Value::Real(r),
        Cell::Text(text) => Value::Text(text),
        Cell::Blob(bytes) => Value::Blob(bytes),
    }
}
