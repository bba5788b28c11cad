//! Value codec for stow.
//!
//! Converts typed values into payload bytes for an object store and back:
//!
//! - [`Value::Bytes`] is stored unchanged.
//! - [`Value::Text`] is encoded with a [`TextEncoding`].
//! - [`Value::Record`] is written as JSON text, then encoded.
//!
//! The [`SerializerInfo`] produced alongside each payload, and any caller
//! metadata, travel as header values built by [`encode_metadata`]:
//! `base64(utf8(json))`, which is ASCII-safe for any JSON content.

pub mod encoding;
pub mod error;
pub mod json;
pub mod metadata;
pub mod serializer;
pub mod value;

pub use encoding::TextEncoding;
pub use error::{CodecError, CodecResult, MetadataStage};
pub use metadata::{decode_metadata, encode_metadata, Metadata};
pub use serializer::{
    deserialize, serialize, Serialized, SerializerInfo, SerializerMethod, OCTET_STREAM,
};
pub use value::{Record, Value};
