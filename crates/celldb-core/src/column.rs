//! Column declarations and the constraint chain.
//!
//! Constraints wrap a codec the way SQL column constraints wrap a type. The
//! chain is resolved once, when the column type is built, into the final
//! type text plus the single inner codec that does all encoding.

use std::fmt;

use crate::codec::Codec;
use crate::error::CodecError;
use crate::value::Value;

/// Identifier reserved for the insert timestamp every table carries.
pub const MODIFIED: &str = "modified";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constraint {
    Unique,
    NotNull,
    /// Implies `NotNull`.
    PrimaryKey,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique => write!(f, "UNIQUE"),
            Self::NotNull => write!(f, "NOT NULL"),
            Self::PrimaryKey => write!(f, "PRIMARY KEY"),
        }
    }
}

/// A codec plus the constraints applied to it, in application order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnType {
    codec: Codec,
    constraints: Vec<Constraint>,
    typename: String,
}

impl ColumnType {
    pub fn new(codec: Codec) -> Self {
        let typename = codec.typename().to_string();
        Self {
            codec,
            constraints: Vec::new(),
            typename,
        }
    }

    /// Column type for a relation rehydrated from schema introspection.
    pub fn raw(typename: impl Into<String>) -> Self {
        Self::new(Codec::raw(typename))
    }

    /// Wrap with one more constraint. Re-applying a constraint already in
    /// the chain changes nothing.
    pub fn with(mut self, constraint: Constraint) -> Self {
        if self.constraints.contains(&constraint) {
            return self;
        }
        match constraint {
            Constraint::Unique => self.push_suffix(Constraint::Unique),
            Constraint::NotNull => {
                // PRIMARY KEY already rendered NOT NULL.
                if !self.is_not_null() {
                    self.push_suffix(Constraint::NotNull);
                }
            }
            Constraint::PrimaryKey => {
                if !self.is_not_null() {
                    self.push_suffix(Constraint::NotNull);
                }
                self.push_suffix(Constraint::PrimaryKey);
            }
        }
        self.constraints.push(constraint);
        self
    }

    pub fn unique(self) -> Self {
        self.with(Constraint::Unique)
    }

    pub fn not_null(self) -> Self {
        self.with(Constraint::NotNull)
    }

    pub fn primary_key(self) -> Self {
        self.with(Constraint::PrimaryKey)
    }

    fn push_suffix(&mut self, constraint: Constraint) {
        self.typename.push(' ');
        self.typename.push_str(&constraint.to_string());
    }

    /// Full SQL type text, e.g. `BLOB UNIQUE NOT NULL`.
    pub fn typename(&self) -> &str {
        &self.typename
    }

    /// The codec every constraint delegates to.
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_not_null(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::NotNull | Constraint::PrimaryKey))
    }

    pub fn is_unique(&self) -> bool {
        self.constraints.contains(&Constraint::Unique)
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&Constraint::PrimaryKey)
    }

    pub fn encode(&self, value: &Value) -> Result<String, CodecError> {
        self.codec.encode(value)
    }

    pub fn decode(&self, text: &str) -> Result<Value, CodecError> {
        self.codec.decode(text)
    }
}

impl From<Codec> for ColumnType {
    fn from(codec: Codec) -> Self {
        Self::new(codec)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.typename)
    }
}

pub fn unique(inner: impl Into<ColumnType>) -> ColumnType {
    inner.into().unique()
}

pub fn not_null(inner: impl Into<ColumnType>) -> ColumnType {
    inner.into().not_null()
}

pub fn primary_key(inner: impl Into<ColumnType>) -> ColumnType {
    inner.into().primary_key()
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    identifier: String,
    ty: ColumnType,
}

impl Column {
    pub fn new(identifier: impl Into<String>, ty: impl Into<ColumnType>) -> Self {
        Self {
            identifier: identifier.into(),
            ty: ty.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn ty(&self) -> &ColumnType {
        &self.ty
    }

    /// `<identifier> <type text>` as it appears in `CREATE TABLE`.
    pub fn definition(&self) -> String {
        format!("{} {}", self.identifier, self.ty.typename())
    }
}

impl<S: Into<String>, T: Into<ColumnType>> From<(S, T)> for Column {
    fn from((identifier, ty): (S, T)) -> Self {
        Self::new(identifier, ty)
    }
}
