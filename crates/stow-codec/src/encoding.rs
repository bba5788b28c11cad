//! Text encodings understood by the codec.
//!
//! Names are matched case-insensitively and normalised to a canonical
//! spelling, which is the form recorded in serializer descriptors and in
//! the `charset` parameter of json content types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// A text encoding used to turn strings into payload bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }

    /// Encode `text` into bytes.
    ///
    /// Fails with [`CodecError::Encode`] on the first character the encoding
    /// cannot represent.
    pub fn encode(&self, text: &str) -> CodecResult<Vec<u8>> {
        let limit = match self {
            Self::Utf8 => return Ok(text.as_bytes().to_vec()),
            Self::Ascii => 0x7f,
            Self::Latin1 => 0xff,
        };
        let mut out = Vec::with_capacity(text.len());
        for (position, ch) in text.chars().enumerate() {
            let code = ch as u32;
            if code > limit {
                return Err(CodecError::Encode {
                    encoding: self.name().to_string(),
                    ch,
                    position,
                });
            }
            out.push(code as u8);
        }
        Ok(out)
    }

    /// Decode `bytes` into a string.
    pub fn decode(&self, bytes: &[u8]) -> CodecResult<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Decode {
                encoding: self.name().to_string(),
                reason: e.to_string(),
            }),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(CodecError::Decode {
                    encoding: self.name().to_string(),
                    reason: format!("byte 0x{:02x} at offset {offset} is not ascii", bytes[offset]),
                }),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            _ => Err(CodecError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = CodecError;

    fn try_from(value: String) -> CodecResult<Self> {
        value.parse()
    }
}

impl From<TextEncoding> for String {
    fn from(encoding: TextEncoding) -> Self {
        encoding.name().to_string()
    }
}
