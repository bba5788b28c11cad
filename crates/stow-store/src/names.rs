//! Bucket name and object key validation.
//!
//! Bucket names follow the S3 rules:
//! - 3 to 63 characters
//! - lowercase letters, digits, `.` and `-` only
//! - must start and end with a letter or digit
//! - must not contain `..`
//! - must not be formatted as an IPv4 address
//!
//! Object keys must be non-empty, at most 1024 bytes of UTF-8, and free of
//! NUL characters. Path-like separators are allowed.

use crate::error::{TransportError, TransportResult};

/// Maximum length of an object key in bytes.
pub const MAX_KEY_LEN: usize = 1024;

fn invalid_bucket(name: &str, reason: impl Into<String>) -> TransportError {
    TransportError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a bucket name, returning `Ok(())` if valid.
///
/// ```
/// use stow_store::names::validate_bucket_name;
///
/// assert!(validate_bucket_name("rabbit").is_ok());
/// assert!(validate_bucket_name("my.logs-2024").is_ok());
/// assert!(validate_bucket_name("ab").is_err());
/// assert!(validate_bucket_name("Upper").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> TransportResult<()> {
    if !(3..=63).contains(&name.len()) {
        return Err(invalid_bucket(name, "must be between 3 and 63 characters"));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-'))
    {
        return Err(invalid_bucket(name, format!("contains forbidden character: {ch:?}")));
    }
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err(invalid_bucket(name, "must start and end with a letter or digit"));
    }
    if name.contains("..") {
        return Err(invalid_bucket(name, "must not contain '..'"));
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return Err(invalid_bucket(name, "must not be formatted as an IP address"));
    }
    Ok(())
}

/// Validate an object key, returning `Ok(())` if valid.
pub fn validate_key(key: &str) -> TransportResult<()> {
    let invalid = |reason: &str| TransportError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid("longer than 1024 bytes"));
    }
    if key.contains('\0') {
        return Err(invalid("must not contain NUL"));
    }
    Ok(())
}
