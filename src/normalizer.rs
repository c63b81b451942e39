//! Response body normalization.
//!
//! Callers describe what they expect back with an [`ExpectedShape`]; the
//! dispatcher uses it to validate decoded bodies and to pick an empty value
//! when the upstream sends nothing.

use serde_json::{Map, Value};

use crate::error::GatewayError;

/// The shape a caller expects an upstream body to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedShape {
    /// No body is expected; whatever arrives is discarded.
    Empty,
    /// Any single JSON value.
    Scalar,
    /// A JSON array.
    Sequence,
    /// A JSON object.
    Mapping,
}

impl ExpectedShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Scalar => "scalar",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

/// Value substituted for an absent body.
pub fn empty_value_for(shape: ExpectedShape) -> Value {
    match shape {
        ExpectedShape::Sequence => Value::Array(Vec::new()),
        ExpectedShape::Mapping => Value::Object(Map::new()),
        ExpectedShape::Scalar | ExpectedShape::Empty => Value::Null,
    }
}

/// Decode a non-empty body and check it against the expected shape.
pub fn decode_body(shape: ExpectedShape, body: &[u8]) -> Result<Value, GatewayError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::DecodeFailure(e.to_string()))?;

    let matches = match shape {
        ExpectedShape::Sequence => value.is_array(),
        ExpectedShape::Mapping => value.is_object(),
        ExpectedShape::Scalar | ExpectedShape::Empty => true,
    };

    if !matches {
        return Err(GatewayError::DecodeFailure(format!(
            "expected a {} body, got {}",
            shape.as_str(),
            json_kind(&value)
        )));
    }

    Ok(value)
}

/// True when a body carries nothing but whitespace.
pub fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_value_for_every_shape() {
        assert_eq!(empty_value_for(ExpectedShape::Sequence), json!([]));
        assert_eq!(empty_value_for(ExpectedShape::Mapping), json!({}));
        assert_eq!(empty_value_for(ExpectedShape::Scalar), Value::Null);
        assert_eq!(empty_value_for(ExpectedShape::Empty), Value::Null);
    }

    #[test]
    fn test_decode_body_accepts_matching_shapes() {
        assert_eq!(
            decode_body(ExpectedShape::Sequence, b"[1,2]").unwrap(),
            json!([1, 2])
        );
        assert_eq!(
            decode_body(ExpectedShape::Mapping, br#"{"a":1}"#).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            decode_body(ExpectedShape::Scalar, br#""plain""#).unwrap(),
            json!("plain")
        );
    }

    #[test]
    fn test_decode_body_rejects_shape_mismatch() {
        let err = decode_body(ExpectedShape::Sequence, br#"{"a":1}"#).unwrap_err();
        match err {
            GatewayError::DecodeFailure(msg) => {
                assert!(msg.contains("sequence"));
                assert!(msg.contains("an object"));
            }
            other => panic!("expected DecodeFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_body_rejects_invalid_json() {
        assert!(matches!(
            decode_body(ExpectedShape::Scalar, b"<html>oops</html>"),
            Err(GatewayError::DecodeFailure(_))
        ));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(b""));
        assert!(is_blank(b"  \n\t"));
        assert!(!is_blank(b" {} "));
    }
}
