use std::fmt;

use serde_json::Map;

use crate::error::{CodecError, CodecResult};
use crate::json;

/// A structured record: an ordered mapping with unique string keys.
pub type Record = Map<String, serde_json::Value>;

/// A value that can be stored as an object payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Raw bytes, stored unchanged.
    Bytes(Vec<u8>),
    /// Text, stored in a caller-chosen text encoding.
    Text(String),
    /// Structured record, stored as JSON text.
    Record(Record),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Record(_) => "record",
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Text(s) => f.write_str(s),
            Self::Record(r) => match json::to_string(r) {
                Ok(text) => f.write_str(&text),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

/// Accepts JSON strings and objects; every other JSON type is rejected with
/// [`CodecError::UnsupportedValueType`].
impl TryFrom<serde_json::Value> for Value {
    type Error = CodecError;

    fn try_from(value: serde_json::Value) -> CodecResult<Self> {
        let type_name = match value {
            serde_json::Value::String(s) => return Ok(Self::Text(s)),
            serde_json::Value::Object(map) => return Ok(Self::Record(map)),
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(ref n) if n.is_f64() => "float",
            serde_json::Value::Number(_) => "int",
            serde_json::Value::Array(_) => "array",
        };
        Err(CodecError::UnsupportedValueType {
            type_name: type_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(b"abc".as_slice()), Value::Bytes(b"abc".to_vec()));
        assert_eq!(Value::from("abc"), Value::Text("abc".into()));
        assert_eq!(Value::from("abc").as_text(), Some("abc"));
        assert!(Value::from("abc").as_bytes().is_none());
    }

    #[test]
    fn json_string_and_object_accepted() {
        assert_eq!(Value::try_from(json!("hi")).unwrap(), Value::Text("hi".into()));
        let v = Value::try_from(json!({"hello": "world"})).unwrap();
        assert_eq!(v.as_record().unwrap()["hello"], json!("world"));
    }

    #[test]
    fn integer_is_unsupported() {
        let err = Value::try_from(json!(12345)).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedValueType {
                type_name: "int".into()
            }
        );
        assert!(err.to_string().contains("int"));
    }

    #[test]
    fn other_json_types_unsupported() {
        for v in [json!(null), json!(true), json!(1.5), json!([1, 2])] {
            assert!(matches!(
                Value::try_from(v),
                Err(CodecError::UnsupportedValueType { .. })
            ));
        }
    }

    #[test]
    fn display() {
        assert_eq!(Value::Bytes(vec![0; 4]).to_string(), "<4 bytes>");
        assert_eq!(Value::from("x").to_string(), "x");
        assert_eq!(
            Value::try_from(json!({"a": 1, "b": "caf\u{e9}"}))
                .unwrap()
                .to_string(),
            r#"{"a": 1, "b": "caf\u00e9"}"#
        );
    }
}
