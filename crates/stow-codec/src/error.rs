use thiserror::Error;

/// Errors produced while converting values to and from payload bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The value is not bytes, text, or a structured record.
    #[error("no method for converting type {type_name} to bytes")]
    UnsupportedValueType { type_name: String },

    /// The serializer descriptor names a method this codec does not know.
    #[error("unknown serializer method {method:?}")]
    UnknownSerializerMethod { method: String },

    /// A text or json descriptor arrived without an encoding name.
    #[error("serializer method {method} requires an encoding")]
    MissingEncoding { method: String },

    /// The text encoding name is not supported.
    #[error("unsupported text encoding: {0}")]
    UnsupportedEncoding(String),

    /// A character could not be represented in the requested encoding.
    #[error("cannot encode {ch:?} at position {position} as {encoding}")]
    Encode {
        encoding: String,
        ch: char,
        position: usize,
    },

    /// Payload bytes are not valid in the declared encoding.
    #[error("cannot decode payload as {encoding}: {reason}")]
    Decode { encoding: String, reason: String },

    /// A json payload did not parse into a structured record.
    #[error("invalid json payload: {0}")]
    PayloadDecode(String),

    /// A metadata header could not be decoded.
    #[error("metadata decode failed at {stage} stage: {reason}")]
    MetadataDecode {
        stage: MetadataStage,
        reason: String,
    },

    /// Serialization failure while producing JSON text.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Stage of header decoding at which a [`CodecError::MetadataDecode`] occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataStage {
    Ascii,
    Base64,
    Utf8,
    Json,
}

impl std::fmt::Display for MetadataStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::Base64 => write!(f, "base64"),
            Self::Utf8 => write!(f, "utf-8"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
