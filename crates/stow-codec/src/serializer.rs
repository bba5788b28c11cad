//! Conversion between [`Value`]s and payload bytes.
//!
//! [`serialize`] records how a payload was produced in a [`SerializerInfo`];
//! [`deserialize`] uses that descriptor to rebuild the original value.

use std::fmt;
use std::str::FromStr;

use crate::encoding::TextEncoding;
use crate::error::{CodecError, CodecResult, MetadataStage};
use crate::json;
use crate::metadata::{decode_metadata, encode_metadata, Metadata};
use crate::value::Value;

/// Content type for raw bytes and plain text payloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// How a payload was derived from its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SerializerMethod {
    Text,
    Json,
}

impl SerializerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for SerializerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializerMethod {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        match s {
            // "str" is the tag written by the first release of the format.
            "text" | "str" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CodecError::UnknownSerializerMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Descriptor stored next to each payload.
///
/// `method == None` means the payload is the caller's raw bytes; in that case
/// `encoding` is always `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerializerInfo {
    method: Option<SerializerMethod>,
    encoding: Option<TextEncoding>,
}

impl SerializerInfo {
    /// Descriptor for raw bytes.
    pub fn raw() -> Self {
        Self::default()
    }

    /// Descriptor for a text or json payload in `encoding`.
    pub fn new(method: SerializerMethod, encoding: TextEncoding) -> Self {
        Self {
            method: Some(method),
            encoding: Some(encoding),
        }
    }

    pub fn method(&self) -> Option<SerializerMethod> {
        self.method
    }

    pub fn encoding(&self) -> Option<TextEncoding> {
        self.encoding
    }

    /// The descriptor as a metadata mapping: `{"method": .., "encoding": ..}`.
    pub fn to_metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert(
            "method".into(),
            self.method
                .map_or(serde_json::Value::Null, |m| m.as_str().into()),
        );
        map.insert(
            "encoding".into(),
            self.encoding
                .map_or(serde_json::Value::Null, |e| e.name().into()),
        );
        map
    }

    /// Parse a descriptor from its metadata mapping.
    ///
    /// The mapping arrives through an external channel, so an unrecognised
    /// method fails with [`CodecError::UnknownSerializerMethod`].
    pub fn from_metadata(map: &Metadata) -> CodecResult<Self> {
        let method = match map.get("method") {
            None => {
                return Err(CodecError::MetadataDecode {
                    stage: MetadataStage::Json,
                    reason: "serializer info has no method field".into(),
                })
            }
            Some(serde_json::Value::Null) => return Ok(Self::raw()),
            Some(serde_json::Value::String(s)) => s.parse::<SerializerMethod>()?,
            Some(other) => {
                return Err(CodecError::UnknownSerializerMethod {
                    method: other.to_string(),
                })
            }
        };
        let encoding = match map.get("encoding") {
            Some(serde_json::Value::String(s)) => s.parse::<TextEncoding>()?,
            _ => {
                return Err(CodecError::MissingEncoding {
                    method: method.to_string(),
                })
            }
        };
        Ok(Self::new(method, encoding))
    }

    /// Encode for the serializer-info header.
    pub fn encode_header(&self) -> CodecResult<String> {
        encode_metadata(Some(&self.to_metadata()))
    }

    /// Decode the serializer-info header; an absent header yields `None`.
    pub fn decode_header(header: Option<&str>) -> CodecResult<Option<Self>> {
        decode_metadata(header)?
            .map(|map| Self::from_metadata(&map))
            .transpose()
    }
}

/// Output of [`serialize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Serialized {
    pub payload: Vec<u8>,
    pub payload_length: u64,
    pub content_type: String,
    pub serializer_info: SerializerInfo,
}

impl Serialized {
    fn new(payload: Vec<u8>, content_type: String, serializer_info: SerializerInfo) -> Self {
        let payload_length = payload.len() as u64;
        Self {
            payload,
            payload_length,
            content_type,
            serializer_info,
        }
    }
}

/// Turn a value into payload bytes plus the descriptor needed to invert it.
pub fn serialize(value: &Value, encoding: TextEncoding) -> CodecResult<Serialized> {
    let serialized = match value {
        Value::Bytes(bytes) => {
            Serialized::new(bytes.clone(), OCTET_STREAM.into(), SerializerInfo::raw())
        }
        Value::Text(text) => Serialized::new(
            encoding.encode(text)?,
            OCTET_STREAM.into(),
            SerializerInfo::new(SerializerMethod::Text, encoding),
        ),
        Value::Record(record) => {
            let text = json::to_string(record)?;
            Serialized::new(
                encoding.encode(&text)?,
                format!("application/json; charset={encoding}"),
                SerializerInfo::new(SerializerMethod::Json, encoding),
            )
        }
    };
    Ok(serialized)
}

/// Rebuild a value from payload bytes.
///
/// Without a descriptor, or with a raw one, the payload is returned as
/// [`Value::Bytes`] unchanged.
pub fn deserialize(payload: Vec<u8>, info: Option<&SerializerInfo>) -> CodecResult<Value> {
    let Some(info) = info else {
        return Ok(Value::Bytes(payload));
    };
    let (method, encoding) = match (info.method, info.encoding) {
        (None, _) => return Ok(Value::Bytes(payload)),
        (Some(method), Some(encoding)) => (method, encoding),
        (Some(method), None) => {
            return Err(CodecError::MissingEncoding {
                method: method.to_string(),
            })
        }
    };
    let text = encoding.decode(&payload)?;
    match method {
        SerializerMethod::Text => Ok(Value::Text(text)),
        SerializerMethod::Json => {
            let parsed = serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| CodecError::PayloadDecode(e.to_string()))?;
            match parsed {
                serde_json::Value::Object(record) => Ok(Value::Record(record)),
                other => Err(CodecError::PayloadDecode(format!(
                    "expected a json object, found {other}"
                ))),
            }
        }
    }
}
