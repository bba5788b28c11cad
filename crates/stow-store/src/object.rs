use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stow_codec::{Metadata, Value};

/// Anything that names an object by bucket and key.
pub trait ObjectAddress {
    fn bucket(&self) -> &str;
    fn key(&self) -> &str;
}

impl<T: ObjectAddress + ?Sized> ObjectAddress for &T {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    fn key(&self) -> &str {
        (**self).key()
    }
}

/// A bucket/key pair as returned by listings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl ObjectAddress for ObjectLocation {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// One unit of stored data: its address, its logical value and the caller's
/// metadata.
///
/// Two objects are equal when all four parts are equal by content.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    bucket: String,
    key: String,
    value: Value,
    metadata: Metadata,
}

impl StoredObject {
    /// Create an object with empty metadata.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            value: value.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.bucket, &self.key)
    }

    pub fn into_parts(self) -> (String, String, Value, Metadata) {
        (self.bucket, self.key, self.value, self.metadata)
    }
}

impl ObjectAddress for StoredObject {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn key(&self) -> &str {
        &self.key
    }
}

/// HTTP-style headers attached to an object. Lookups ignore case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHeaders(BTreeMap<String, String>);

impl ObjectHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing header whose name differs only
    /// in case.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ObjectHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_compares_content() {
        let mut meta = Metadata::new();
        meta.insert("meta".into(), json!("data"));
        let a = StoredObject::new("b", "k", "v").with_metadata(meta.clone());
        let b = StoredObject::new(String::from("b"), "k", String::from("v")).with_metadata(meta);
        assert_eq!(a, b);
        assert_ne!(a, StoredObject::new("b", "k", "v"));
        assert_ne!(a, StoredObject::new("b", "k", b"v".to_vec()));
    }

    #[test]
    fn default_metadata_is_empty() {
        let obj = StoredObject::new("b", "k", b"raw".as_slice());
        assert!(obj.metadata().is_empty());
        assert_eq!(obj.location(), ObjectLocation::new("b", "k"));
        assert_eq!(obj.location().to_string(), "b/k");
    }

    #[test]
    fn headers_ignore_case() {
        let mut headers = ObjectHeaders::new();
        headers.insert("X-Amz-Meta-Metadata", "abc");
        assert_eq!(headers.get("x-amz-meta-metadata"), Some("abc"));
        headers.insert("x-amz-meta-metadata", "def");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-AMZ-META-METADATA"), Some("def"));
        assert_eq!(headers.get("missing"), None);
    }
}
