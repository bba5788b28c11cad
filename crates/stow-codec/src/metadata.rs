//! Header-safe encoding of key-value metadata.
//!
//! Storage headers accept a restricted character set, so metadata travels as
//! `base64(utf8(json(mapping)))`. The result is plain ASCII regardless of
//! what the mapping contains.
//!
//! Absent metadata encodes to the empty string. An explicitly empty mapping
//! encodes to the base64 form of `{}`, so the two stay distinguishable after
//! a round trip.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Map;

use crate::error::{CodecError, CodecResult, MetadataStage};
use crate::json;

/// Caller-supplied metadata: string keys to arbitrary JSON values.
pub type Metadata = Map<String, serde_json::Value>;

/// Encode metadata into a header value.
pub fn encode_metadata(metadata: Option<&Metadata>) -> CodecResult<String> {
    match metadata {
        None => Ok(String::new()),
        Some(map) => {
            let text = json::to_vec(map)?;
            Ok(BASE64.encode(text))
        }
    }
}

/// Decode a header value produced by [`encode_metadata`].
///
/// An absent or empty header yields `Ok(None)`. Any failure along the way is
/// reported as [`CodecError::MetadataDecode`] naming the failing stage.
pub fn decode_metadata(encoded: Option<&str>) -> CodecResult<Option<Metadata>> {
    let encoded = match encoded {
        None | Some("") => return Ok(None),
        Some(s) => s.trim(),
    };
    if !encoded.is_ascii() {
        return Err(CodecError::MetadataDecode {
            stage: MetadataStage::Ascii,
            reason: "header value contains non-ascii characters".into(),
        });
    }
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| CodecError::MetadataDecode {
            stage: MetadataStage::Base64,
            reason: e.to_string(),
        })?;
    let text = String::from_utf8(bytes).map_err(|e| CodecError::MetadataDecode {
        stage: MetadataStage::Utf8,
        reason: e.to_string(),
    })?;
    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| CodecError::MetadataDecode {
            stage: MetadataStage::Json,
            reason: e.to_string(),
        })?;
    match parsed {
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(CodecError::MetadataDecode {
            stage: MetadataStage::Json,
            reason: format!("expected an object, found {}", json_type_name(&other)),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn meta(value: serde_json::Value) -> Metadata {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn absent_encodes_to_empty_string() {
        assert_eq!(encode_metadata(None).unwrap(), "");
        assert_eq!(decode_metadata(Some("")).unwrap(), None);
        assert_eq!(decode_metadata(None).unwrap(), None);
    }

    #[test]
    fn empty_mapping_is_not_absent() {
        let empty = Metadata::new();
        let encoded = encode_metadata(Some(&empty)).unwrap();
        assert_eq!(encoded, "e30=");
        assert_eq!(decode_metadata(Some(&encoded)).unwrap(), Some(empty));
    }

    #[test]
    fn known_wire_form() {
        let m = meta(json!({"meta": "data"}));
        let encoded = encode_metadata(Some(&m)).unwrap();
        assert_eq!(encoded, BASE64.encode(br#"{"meta": "data"}"#));
    }

    #[test]
    fn non_ascii_round_trip() {
        let m = meta(json!({"hello": "\u{1f30d}"}));
        let encoded = encode_metadata(Some(&m)).unwrap();
        assert!(encoded.is_ascii());
        assert_eq!(decode_metadata(Some(&encoded)).unwrap(), Some(m));
    }

    #[test]
    fn bad_base64_fails() {
        let err = decode_metadata(Some("not base64!!")).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MetadataDecode {
                stage: MetadataStage::Base64,
                ..
            }
        ));
    }

    #[test]
    fn bad_utf8_fails() {
        let encoded = BASE64.encode([0xff, 0xfe, 0xfd]);
        let err = decode_metadata(Some(&encoded)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MetadataDecode {
                stage: MetadataStage::Utf8,
                ..
            }
        ));
    }

    #[test]
    fn bad_json_fails() {
        let encoded = BASE64.encode("{not json");
        let err = decode_metadata(Some(&encoded)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MetadataDecode {
                stage: MetadataStage::Json,
                ..
            }
        ));
    }

    #[test]
    fn non_object_json_fails() {
        let encoded = BASE64.encode("[1, 2]");
        assert!(decode_metadata(Some(&encoded)).is_err());
    }

    #[test]
    fn non_ascii_header_fails() {
        let err = decode_metadata(Some("e30=\u{e9}")).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MetadataDecode {
                stage: MetadataStage::Ascii,
                ..
            }
        ));
    }

    fn arb_json_leaf() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            any::<String>().prop_map(serde_json::Value::from),
        ]
    }

    fn arb_metadata() -> impl Strategy<Value = Metadata> {
        let value = arb_json_leaf().prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
                prop::collection::btree_map(any::<String>(), inner, 0..4)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        });
        prop::collection::btree_map(any::<String>(), value, 0..6)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn metadata_round_trip(m in arb_metadata()) {
            let encoded = encode_metadata(Some(&m)).unwrap();
            prop_assert!(encoded.is_ascii());
            prop_assert_eq!(decode_metadata(Some(&encoded)).unwrap(), Some(m));
        }
    }
}
