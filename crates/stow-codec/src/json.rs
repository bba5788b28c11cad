//! JSON text form shared by payloads and metadata headers.
//!
//! Objects written by earlier releases of the header format use `", "` and
//! `": "` separators, escape everything outside printable ASCII as `\uXXXX`
//! and print floats in shortest round-trip form with a signed two-digit
//! exponent (`1e+16`, `2.5e-05`). [`CompatFormatter`] reproduces that form so
//! payloads and headers stay byte-identical across versions.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

use crate::error::{CodecError, CodecResult};

/// `serde_json` formatter producing the interoperable text form.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompatFormatter;

impl Formatter for CompatFormatter {
    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_repr(value).as_bytes())
    }

    fn write_f32<W>(&mut self, writer: &mut W, value: f32) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_repr(f64::from(value)).as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize `value` into the interoperable JSON text form.
pub fn to_vec<T>(value: &T) -> CodecResult<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CompatFormatter);
    value
        .serialize(&mut ser)
        .map_err(|e| CodecError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Like [`to_vec`], returning a `String`. The output is always ASCII.
pub fn to_string<T>(value: &T) -> CodecResult<String>
where
    T: Serialize + ?Sized,
{
    let buf = to_vec(value)?;
    String::from_utf8(buf).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn float_repr(value: f64) -> String {
    let sci = format!("{value:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..16).contains(&exponent) {
        let fixed = value.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{fixed}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}
