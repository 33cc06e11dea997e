//! Cell codecs.
//!
//! Scalars map to their textual SQL form. Arrays and tuples flatten nested
//! values into one string where every element is wrapped in an
//! [`OPEN`]/[`CLOSE`] pair:
//!
//! ```text
//! ["a", ["b", "c"]]  ->  STX a ETX STX STX b ETX STX c ETX ETX
//! ```
//!
//! The format does not escape markers. A scalar element whose text contains
//! either marker is rejected on encode rather than written ambiguously.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDate;

use crate::error::CodecError;
use crate::value::Value;

/// Opens a composite element (ASCII STX).
pub const OPEN: char = '\u{2}';
/// Closes a composite element (ASCII ETX).
pub const CLOSE: char = '\u{3}';

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Primitive column kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Integer,
    Date,
    Text,
    Blob,
}

impl Scalar {
    pub fn typename(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Integer => "INTEGER",
            Self::Date => "DATE",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }

    fn decode(self, text: &str) -> Result<Value, CodecError> {
        match self {
            Self::Bool => match text {
                "1" | "true" | "TRUE" => Ok(Value::Bool(true)),
                "0" | "false" | "FALSE" => Ok(Value::Bool(false)),
                other => Err(CodecError::malformed(
                    self.typename(),
                    format!("not a boolean: {other:?}"),
                )),
            },
            Self::Integer => text
                .parse()
                .map(Value::Integer)
                .map_err(|e| CodecError::malformed(self.typename(), e.to_string())),
            Self::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| CodecError::malformed(self.typename(), e.to_string())),
            Self::Text => Ok(Value::Text(text.to_string())),
            Self::Blob => STANDARD
                .decode(text)
                .map(Value::Blob)
                .map_err(|e| CodecError::malformed(self.typename(), e.to_string())),
        }
    }
}

/// A bidirectional transform between a [`Value`] and its stored text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Codec {
    Scalar(Scalar),
    /// Homogeneous sequence of any length.
    Array(Box<Codec>),
    /// Fixed-arity heterogeneous sequence.
    Tuple(Vec<Codec>),
    /// Stored type text recovered from an existing schema. Cells pass
    /// through unchanged.
    Raw(String),
}

impl Codec {
    pub const BOOL: Codec = Codec::Scalar(Scalar::Bool);
    pub const INTEGER: Codec = Codec::Scalar(Scalar::Integer);
    pub const DATE: Codec = Codec::Scalar(Scalar::Date);
    pub const TEXT: Codec = Codec::Scalar(Scalar::Text);
    pub const BLOB: Codec = Codec::Scalar(Scalar::Blob);

    pub fn array(item: Codec) -> Self {
        Self::Array(Box::new(item))
    }

    pub fn tuple(items: impl IntoIterator<Item = Codec>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    pub fn raw(typename: impl Into<String>) -> Self {
        Self::Raw(typename.into())
    }

    /// SQL type keyword for the column. Composites always store as `BLOB`.
    pub fn typename(&self) -> &str {
        match self {
            Self::Scalar(scalar) => scalar.typename(),
            Self::Array(_) | Self::Tuple(_) => Scalar::Blob.typename(),
            Self::Raw(typename) => typename.as_str(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Tuple(_))
    }

    /// Encode a value into its stored text.
    pub fn encode(&self, value: &Value) -> Result<String, CodecError> {
        match self {
            Self::Scalar(_) | Self::Raw(_) => scalar_text(value),
            Self::Array(item) => {
                let items = expect_list(value)?;
                let mut out = String::new();
                for element in items {
                    wrap_into(&mut out, item, element)?;
                }
                Ok(out)
            }
            Self::Tuple(codecs) => {
                let items = expect_list(value)?;
                if items.len() != codecs.len() {
                    return Err(CodecError::Arity {
                        expected: codecs.len(),
                        found: items.len(),
                    });
                }
                let mut out = String::new();
                for (codec, element) in codecs.iter().zip(items) {
                    wrap_into(&mut out, codec, element)?;
                }
                Ok(out)
            }
        }
    }

    /// Decode stored text back into a value.
    pub fn decode(&self, text: &str) -> Result<Value, CodecError> {
        match self {
            Self::Scalar(scalar) => scalar.decode(text),
            Self::Raw(_) => Ok(Value::Text(text.to_string())),
            Self::Array(item) => segments(self.typename(), text)?
                .into_iter()
                .map(|segment| item.decode(segment))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Self::Tuple(codecs) => {
                let parts = segments(self.typename(), text)?;
                if parts.len() != codecs.len() {
                    return Err(CodecError::Arity {
                        expected: codecs.len(),
                        found: parts.len(),
                    });
                }
                codecs
                    .iter()
                    .zip(parts)
                    .map(|(codec, segment)| codec.decode(segment))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
        }
    }
}

impl From<Scalar> for Codec {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

/// Textual form of a scalar value, independent of the declared kind.
fn scalar_text(value: &Value) -> Result<String, CodecError> {
    Ok(match value {
        Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Date(d) => d.format(DATE_FORMAT).to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(bytes) => STANDARD.encode(bytes),
        Value::Null | Value::List(_) => {
            return Err(CodecError::Mismatch {
                expected: "scalar",
                found: value.kind(),
            })
        }
    })
}

fn expect_list(value: &Value) -> Result<&[Value], CodecError> {
    value.as_list().ok_or(CodecError::Mismatch {
        expected: "list",
        found: value.kind(),
    })
}

fn wrap_into(out: &mut String, codec: &Codec, value: &Value) -> Result<(), CodecError> {
    let encoded = codec.encode(value)?;
    if !codec.is_composite() && encoded.contains(&[OPEN, CLOSE][..]) {
        return Err(CodecError::ReservedMarker {
            typename: codec.typename().to_string(),
        });
    }
    out.push(OPEN);
    out.push_str(&encoded);
    out.push(CLOSE);
    Ok(())
}

/// Split composite text into its top-level element bodies.
///
/// Single pass with a depth counter: an element starts at an `OPEN` seen at
/// depth 0 and ends when depth returns to 0. Nested markers stay inside the
/// element body for the inner codec to split further.
fn segments<'a>(typename: &str, text: &'a str) -> Result<Vec<&'a str>, CodecError> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (pos, ch) in text.char_indices() {
        match ch {
            OPEN => {
                if depth == 0 {
                    start = pos + OPEN.len_utf8();
                }
                depth += 1;
            }
            CLOSE => {
                if depth == 0 {
                    return Err(CodecError::malformed(
                        typename,
                        format!("unmatched close marker at byte {pos}"),
                    ));
                }
                depth -= 1;
                if depth == 0 {
                    out.push(&text[start..pos]);
                }
            }
            _ if depth == 0 => {
                return Err(CodecError::malformed(
                    typename,
                    format!("stray character {ch:?} at byte {pos}"),
                ));
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CodecError::malformed(
            typename,
            format!("{depth} unterminated element(s)"),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    fn roundtrip(codec: &Codec, value: Value) {
        let encoded = codec.encode(&value).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), value, "encoded: {encoded:?}");
    }

    #[test]
    fn scalar_typenames() {
        assert_eq!(Codec::BOOL.typename(), "BOOL");
        assert_eq!(Codec::INTEGER.typename(), "INTEGER");
        assert_eq!(Codec::DATE.typename(), "DATE");
        assert_eq!(Codec::TEXT.typename(), "TEXT");
        assert_eq!(Codec::BLOB.typename(), "BLOB");
        assert_eq!(Codec::raw("VARCHAR(12)").typename(), "VARCHAR(12)");
    }

    #[test]
    fn composites_store_as_blob() {
        assert_eq!(Codec::array(Codec::INTEGER).typename(), "BLOB");
        assert_eq!(Codec::tuple([Codec::TEXT, Codec::BOOL]).typename(), "BLOB");
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(&Codec::BOOL, Value::Bool(true));
        roundtrip(&Codec::BOOL, Value::Bool(false));
        roundtrip(&Codec::INTEGER, Value::Integer(-42));
        roundtrip(
            &Codec::DATE,
            Value::Date(NaiveDate::from_ymd_opt(2022, 3, 14).unwrap()),
        );
        roundtrip(&Codec::TEXT, text("hello world"));
        roundtrip(&Codec::TEXT, text(""));
        roundtrip(&Codec::BLOB, Value::Blob(vec![0, 2, 3, 255]));
    }

    #[test]
    fn scalar_encode_is_textual_passthrough() {
        assert_eq!(Codec::TEXT.encode(&text("abc")).unwrap(), "abc");
        assert_eq!(Codec::INTEGER.encode(&Value::Integer(7)).unwrap(), "7");
        assert_eq!(Codec::BOOL.encode(&Value::Bool(true)).unwrap(), "1");
        // No validation beyond type tagging.
        assert_eq!(Codec::INTEGER.encode(&text("abc")).unwrap(), "abc");
    }

    #[test]
    fn bool_accepts_words() {
        assert_eq!(Codec::BOOL.decode("true").unwrap(), Value::Bool(true));
        assert_eq!(Codec::BOOL.decode("0").unwrap(), Value::Bool(false));
        assert!(matches!(
            Codec::BOOL.decode("maybe"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn integer_decode_rejects_garbage() {
        let err = Codec::INTEGER.decode("forty-two").unwrap_err();
        assert_eq!(err.error_kind(), "malformed");
    }

    #[test]
    fn array_wire_format() {
        let codec = Codec::array(Codec::TEXT);
        let encoded = codec.encode(&Value::from(vec!["a", "bc"])).unwrap();
        assert_eq!(encoded, "\u{2}a\u{3}\u{2}bc\u{3}");
    }

    #[test]
    fn nested_array_wire_format() {
        let codec = Codec::array(Codec::array(Codec::TEXT));
        let value = Value::from(vec![vec!["a"], vec!["b", "c"]]);
        let encoded = codec.encode(&value).unwrap();
        assert_eq!(encoded, "\u{2}\u{2}a\u{3}\u{3}\u{2}\u{2}b\u{3}\u{2}c\u{3}\u{3}");
        assert_eq!(codec.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn empty_array() {
        let codec = Codec::array(Codec::TEXT);
        assert_eq!(codec.encode(&Value::List(vec![])).unwrap(), "");
        assert_eq!(codec.decode("").unwrap(), Value::List(vec![]));
    }

    #[test]
    fn array_of_empty_strings() {
        roundtrip(&Codec::array(Codec::TEXT), Value::from(vec!["", "", "x"]));
    }

    #[test]
    fn array_of_empty_arrays() {
        let codec = Codec::array(Codec::array(Codec::INTEGER));
        roundtrip(&codec, Value::from(vec![Value::List(vec![]), Value::List(vec![])]));
    }

    #[test]
    fn roundtrip_depths_zero_to_five() {
        let mut codec = Codec::TEXT;
        let mut value = text("leaf");
        roundtrip(&codec, value.clone());
        for depth in 1..=5 {
            codec = Codec::array(codec);
            value = Value::List(vec![value.clone(), value]);
            roundtrip(&codec, value.clone());
            assert_eq!(codec.encode(&value).unwrap().matches(OPEN).count(), (1 << (depth + 1)) - 2);
        }
    }

    #[test]
    fn tuple_roundtrip_at_depth() {
        let mut codec = Codec::INTEGER;
        let mut value = Value::Integer(1);
        for _ in 1..=5 {
            codec = Codec::tuple([codec, Codec::TEXT]);
            value = Value::List(vec![value, text("tag")]);
            roundtrip(&codec, value.clone());
        }
    }

    #[test]
    fn tuple_roundtrip_and_order() {
        let codec = Codec::tuple([Codec::TEXT, Codec::INTEGER, Codec::BOOL]);
        let value = Value::from(vec![text("x"), Value::Integer(3), Value::Bool(false)]);
        let encoded = codec.encode(&value).unwrap();
        assert_eq!(encoded, "\u{2}x\u{3}\u{2}3\u{3}\u{2}0\u{3}");
        assert_eq!(codec.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn tuple_encode_arity_mismatch() {
        let codec = Codec::tuple([Codec::TEXT, Codec::TEXT]);
        let err = codec.encode(&Value::from(vec!["only one"])).unwrap_err();
        assert_eq!(
            err,
            CodecError::Arity {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn tuple_decode_empty_is_arity_error() {
        let codec = Codec::tuple([Codec::TEXT, Codec::TEXT]);
        assert_eq!(
            codec.decode("").unwrap_err(),
            CodecError::Arity {
                expected: 2,
                found: 0
            }
        );
    }

    #[test]
    fn tuple_decode_too_many_segments() {
        let codec = Codec::tuple([Codec::TEXT]);
        let err = codec.decode("\u{2}a\u{3}\u{2}b\u{3}").unwrap_err();
        assert!(matches!(err, CodecError::Arity { expected: 1, found: 2 }));
    }

    #[test]
    fn array_of_tuples_with_nested_arrays() {
        let codec = Codec::array(Codec::tuple([Codec::TEXT, Codec::array(Codec::TEXT)]));
        let value = Value::from(vec![
            Value::from(vec![text("first"), Value::from(vec!["1"])]),
            Value::from(vec![text("second"), Value::from(vec!["2", "42"])]),
        ]);
        roundtrip(&codec, value);
    }

    #[test]
    fn decode_rejects_unbalanced_input() {
        let codec = Codec::array(Codec::TEXT);
        assert!(matches!(
            codec.decode("\u{2}abc"),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            codec.decode("abc\u{3}"),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            codec.decode("x\u{2}a\u{3}"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn encode_rejects_marker_in_scalar_element() {
        let codec = Codec::array(Codec::TEXT);
        let err = codec.encode(&Value::from(vec!["bad\u{2}value"])).unwrap_err();
        assert_eq!(err.error_kind(), "reserved_marker");
    }

    #[test]
    fn encode_rejects_non_list_for_composites() {
        let err = Codec::array(Codec::TEXT).encode(&text("flat")).unwrap_err();
        assert_eq!(
            err,
            CodecError::Mismatch {
                expected: "list",
                found: "text"
            }
        );
    }

    #[test]
    fn encode_rejects_list_for_scalar() {
        let err = Codec::TEXT.encode(&Value::from(vec!["a"])).unwrap_err();
        assert!(matches!(err, CodecError::Mismatch { expected: "scalar", .. }));
    }

    #[test]
    fn blob_elements_inside_arrays() {
        let codec = Codec::array(Codec::BLOB);
        roundtrip(&codec, Value::List(vec![Value::Blob(vec![2, 3]), Value::Blob(vec![])]));
    }

    #[test]
    fn raw_passthrough() {
        let codec = Codec::raw("TEXT");
        assert_eq!(codec.encode(&text("abc")).unwrap(), "abc");
        assert_eq!(codec.decode("abc").unwrap(), text("abc"));
    }
}
