//! Value model, cell codecs and column types for celldb.
//!
//! Nothing in this crate talks to a database: it only turns [`Value`]s into
//! stored text and back, and renders column type text.

pub mod codec;
pub mod column;
pub mod error;
pub mod value;

pub use codec::{Codec, Scalar, CLOSE, OPEN};
pub use column::{not_null, primary_key, unique, Column, ColumnType, Constraint, MODIFIED};
pub use error::CodecError;
pub use value::Value;
