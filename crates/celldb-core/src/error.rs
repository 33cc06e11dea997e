/// Errors raised while encoding or decoding a cell.
///
/// All of these are recoverable: the store degrades a failed decode to
/// `Value::Null` and refuses a failed encode before issuing any statement.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("tuple arity mismatch: expected {expected} elements, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("malformed {typename} cell: {detail}")]
    Malformed { typename: String, detail: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{typename} element contains a reserved marker character")]
    ReservedMarker { typename: String },
}

impl CodecError {
    pub fn malformed(typename: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Malformed {
            typename: typename.into(),
            detail: detail.into(),
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Arity { .. } => "arity",
            Self::Malformed { .. } => "malformed",
            Self::Mismatch { .. } => "mismatch",
            Self::ReservedMarker { .. } => "reserved_marker",
        }
    }
}
