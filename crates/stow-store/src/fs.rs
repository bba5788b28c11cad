//! Directory-backed transport.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<bucket>/<dir>/.../<name>.obj            payload bytes
//! <root>/.stow/meta/<bucket>/<dir>/.../<name>.obj sidecar JSON: content type + headers
//! <root>/.stow/tmp/                               staging area for atomic writes
//! ```
//!
//! Every key segment but the last becomes a directory; the last becomes a
//! file carrying the `.obj` suffix. Segments are escaped so that a directory
//! name never ends in `.obj`, which lets `a` and `a/b` live in the same
//! bucket. Bucket names cannot start with `.`, so the `.stow` directory never
//! collides with a bucket.
//!
//! Payload and sidecar are staged as temporary files and persisted into
//! place, sidecar first. Readers never see a partial payload, and if the
//! payload cannot be persisted the previous sidecar is restored, so a failed
//! write does not leave the old payload paired with the new headers.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{DeleteFailure, TransportError, TransportResult};
use crate::names::{validate_bucket_name, validate_key};
use crate::object::{ObjectHeaders, ObjectLocation};
use crate::traits::{ObjectResponse, Transport};

const INTERNAL_DIR: &str = ".stow";
const OBJECT_SUFFIX: &str = ".obj";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    headers: ObjectHeaders,
}

/// A [`Transport`] that stores buckets as directories on the local disk.
#[derive(Debug, Clone)]
pub struct FsTransport {
    root: PathBuf,
}

impl FsTransport {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> TransportResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(INTERNAL_DIR).join("meta"))?;
        fs::create_dir_all(root.join(INTERNAL_DIR).join("tmp"))?;
        debug!(root = %root.display(), "opened filesystem transport");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> TransportResult<PathBuf> {
        validate_bucket_name(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn meta_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(INTERNAL_DIR).join("meta").join(bucket)
    }

    fn tmp_dir(&self) -> PathBuf {
        self.root.join(INTERNAL_DIR).join("tmp")
    }

    /// Resolve a bucket that must already exist.
    fn existing_bucket(&self, bucket: &str) -> TransportResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(TransportError::NoSuchBucket(bucket.to_string()));
        }
        Ok(dir)
    }

    fn payload_path(&self, bucket: &str, key: &str) -> TransportResult<(PathBuf, PathBuf)> {
        let dir = self.existing_bucket(bucket)?;
        let relative = key_to_relative(key)?;
        Ok((dir.join(&relative), self.meta_dir(bucket).join(relative)))
    }

    fn persist(&self, mut staged: NamedTempFile, target: &Path) -> TransportResult<()> {
        staged.flush()?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        staged.persist(target).map_err(|e| TransportError::Io(e.error))?;
        Ok(())
    }

    /// Put back the sidecar that was in place before a failed write.
    fn restore_sidecar(&self, path: &Path, previous: Option<Vec<u8>>) -> TransportResult<()> {
        match previous {
            Some(bytes) => {
                let mut staged = NamedTempFile::new_in(self.tmp_dir())?;
                staged.write_all(&bytes)?;
                self.persist(staged, path)
            }
            None => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Remove empty directories between `path`'s parent and `stop`.
    fn prune_empty_parents(path: &Path, stop: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == stop || !dir.starts_with(stop) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    fn remove_one(&self, bucket: &str, key: &str) -> TransportResult<()> {
        let (payload, sidecar) = self.payload_path(bucket, key)?;
        for path in [&payload, &sidecar] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Self::prune_empty_parents(&payload, &self.root.join(bucket));
        Self::prune_empty_parents(&sidecar, &self.meta_dir(bucket));
        Ok(())
    }
}

/// Escape a key segment so it never ends in [`OBJECT_SUFFIX`] and never
/// contains a bare `%`.
fn escape_segment(segment: &str) -> String {
    let mut escaped = segment.replace('%', "%25");
    if escaped.ends_with(OBJECT_SUFFIX) {
        let dot = escaped.len() - OBJECT_SUFFIX.len();
        escaped.replace_range(dot..dot + 1, "%2E");
    }
    escaped
}

fn unescape_segment(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Map a key onto a relative path, rejecting keys that would escape the
/// bucket directory or cannot be represented as a file.
fn key_to_relative(key: &str) -> TransportResult<PathBuf> {
    validate_key(key)?;
    let invalid = |reason: &str| TransportError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.starts_with('/') || key.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    if key.contains('\\') {
        return Err(invalid("must not contain '\\'"));
    }
    let segments: Vec<&str> = key.split('/').collect();
    let mut relative = PathBuf::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() || *segment == "." || *segment == ".." {
            return Err(invalid("contains an empty, '.' or '..' segment"));
        }
        let mut name = escape_segment(segment);
        if i + 1 == segments.len() {
            name.push_str(OBJECT_SUFFIX);
        }
        relative.push(name);
    }
    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(invalid("does not map to a relative path"));
    }
    Ok(relative)
}

/// Inverse of [`key_to_relative`]; `None` for paths that are not objects.
fn relative_to_key(relative: &Path) -> Option<String> {
    let names: Vec<&str> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;
    let (last, dirs) = names.split_last()?;
    let mut segments = dirs
        .iter()
        .map(|name| unescape_segment(name))
        .collect::<Option<Vec<_>>>()?;
    segments.push(unescape_segment(last.strip_suffix(OBJECT_SUFFIX)?)?);
    Some(segments.join("/"))
}

impl Transport for FsTransport {
    fn create_bucket(&self, bucket: &str) -> TransportResult<()> {
        let dir = self.bucket_dir(bucket)?;
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(TransportError::BucketAlreadyOwnedByYou(bucket.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(self.meta_dir(bucket))?;
        debug!(bucket, "created bucket directory");
        Ok(())
    }

    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        payload: &mut dyn Read,
        content_type: &str,
        length: u64,
        headers: &ObjectHeaders,
    ) -> TransportResult<()> {
        let (payload_path, sidecar_path) = self.payload_path(bucket, key)?;

        let mut staged = NamedTempFile::new_in(self.tmp_dir())?;
        let written = io::copy(&mut payload.take(length), &mut staged)?;
        if written != length {
            return Err(TransportError::LengthMismatch {
                declared: length,
                actual: written,
            });
        }

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            headers: headers.clone(),
        };
        let mut staged_meta = NamedTempFile::new_in(self.tmp_dir())?;
        serde_json::to_writer(&mut staged_meta, &sidecar)
            .map_err(|e| TransportError::Internal(format!("sidecar encode: {e}")))?;

        let previous = match fs::read(&sidecar_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        self.persist(staged_meta, &sidecar_path)?;
        if let Err(e) = self.persist(staged, &payload_path) {
            if let Err(restore) = self.restore_sidecar(&sidecar_path, previous) {
                warn!(bucket, key, error = %restore, "failed to restore sidecar");
            }
            return Err(e);
        }
        debug!(bucket, key, bytes = written, "wrote object file");
        Ok(())
    }

    fn read_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectResponse> {
        let (payload_path, sidecar_path) = self.payload_path(bucket, key)?;
        let not_found = || TransportError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
        if !payload_path.is_file() {
            return Err(not_found());
        }
        let file = File::open(&payload_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => not_found(),
            _ => e.into(),
        })?;
        let sidecar = match fs::read(&sidecar_path) {
            Ok(bytes) => serde_json::from_slice::<Sidecar>(&bytes)
                .map_err(|e| TransportError::Internal(format!("sidecar decode: {e}")))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Sidecar {
                content_type: "application/octet-stream".into(),
                headers: ObjectHeaders::new(),
            },
            Err(e) => return Err(e.into()),
        };
        Ok(ObjectResponse {
            body: Box::new(BufReader::new(file)),
            content_type: sidecar.content_type,
            headers: sidecar.headers,
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()> {
        self.remove_one(bucket, key)
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> TransportResult<Vec<DeleteFailure>> {
        self.existing_bucket(bucket)?;
        let mut failures = Vec::new();
        for key in keys {
            if let Err(e) = self.remove_one(bucket, key) {
                failures.push(DeleteFailure::from_error(bucket, key, &e));
            }
        }
        Ok(failures)
    }

    fn delete_bucket(&self, bucket: &str) -> TransportResult<()> {
        let dir = self.existing_bucket(bucket)?;
        let has_objects = WalkDir::new(&dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| entry.file_type().is_file());
        if has_objects {
            return Err(TransportError::BucketNotEmpty(bucket.to_string()));
        }
        fs::remove_dir_all(&dir)?;
        let meta = self.meta_dir(bucket);
        if meta.exists() {
            fs::remove_dir_all(meta)?;
        }
        debug!(bucket, "removed bucket directory");
        Ok(())
    }

    fn list_objects(&self, bucket: &str, recursive: bool) -> TransportResult<Vec<ObjectLocation>> {
        let dir = self.existing_bucket(bucket)?;
        let mut walker = WalkDir::new(&dir).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }
        let mut locations = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| TransportError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&dir)
                .map_err(|e| TransportError::Internal(e.to_string()))?;
            if let Some(key) = relative_to_key(relative) {
                locations.push(ObjectLocation::new(bucket, key));
            }
        }
        locations.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn transport() -> (tempfile::TempDir, FsTransport) {
        let dir = tempfile::tempdir().unwrap();
        let t = FsTransport::open(dir.path()).unwrap();
        (dir, t)
    }

    fn put(t: &FsTransport, bucket: &str, key: &str, data: &[u8], headers: &ObjectHeaders) {
        let mut cursor = Cursor::new(data.to_vec());
        t.write_object(bucket, key, &mut cursor, "text/plain", data.len() as u64, headers)
            .unwrap();
    }

    #[test]
    fn key_mapping() {
        assert_eq!(
            key_to_relative("turtle/rabbit.json").unwrap(),
            PathBuf::from("turtle").join("rabbit.json.obj")
        );
        assert_eq!(
            key_to_relative("a.obj/50%").unwrap(),
            PathBuf::from("a%2Eobj").join("50%25.obj")
        );
        for bad in ["/abs", "dir/", "a//b", "a/../b", ".", "a\\b"] {
            assert!(key_to_relative(bad).is_err(), "{bad} should be rejected");
        }
        for key in ["a/b", "a.obj", "a.obj/b.obj", "50%/x%2E", "caf\u{e9}"] {
            let relative = key_to_relative(key).unwrap();
            assert_eq!(relative_to_key(&relative).as_deref(), Some(key));
        }
        assert_eq!(relative_to_key(Path::new("stray.txt")), None);
        assert_eq!(relative_to_key(Path::new("bad%zz.obj")), None);
    }

    #[test]
    fn key_and_prefix_coexist() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        put(&t, "rabbit", "a", b"1", &ObjectHeaders::new());
        put(&t, "rabbit", "a/b", b"2", &ObjectHeaders::new());
        put(&t, "rabbit", "a.obj/c", b"3", &ObjectHeaders::new());
        put(&t, "rabbit", "a.obj", b"4", &ObjectHeaders::new());

        for (key, expected) in [("a", b"1"), ("a/b", b"2"), ("a.obj/c", b"3"), ("a.obj", b"4")] {
            let mut body = Vec::new();
            t.read_object("rabbit", key)
                .unwrap()
                .body
                .read_to_end(&mut body)
                .unwrap();
            assert_eq!(&body, expected, "{key}");
        }
        let keys: Vec<String> = t
            .list_objects("rabbit", true)
            .unwrap()
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(keys.len(), 4);
        for key in ["a", "a/b", "a.obj", "a.obj/c"] {
            assert!(keys.iter().any(|k| k == key), "{key} missing from {keys:?}");
        }
        let shallow: Vec<String> = t
            .list_objects("rabbit", false)
            .unwrap()
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(shallow, vec!["a", "a.obj"]);

        t.delete_object("rabbit", "a").unwrap();
        assert!(t.read_object("rabbit", "a/b").is_ok());
    }

    #[test]
    fn sidecar_sits_beside_payload() {
        let (dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        put(&t, "rabbit", "turtle/k", b"1", &ObjectHeaders::new());
        assert!(dir.path().join("rabbit/turtle/k.obj").is_file());
        let sidecar = fs::read(dir.path().join(".stow/meta/rabbit/turtle/k.obj")).unwrap();
        let sidecar: Sidecar = serde_json::from_slice(&sidecar).unwrap();
        assert_eq!(sidecar.content_type, "text/plain");
    }

    #[test]
    fn failed_payload_persist_restores_sidecar() {
        let (dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        let old: ObjectHeaders = [("X-Amz-Meta-SerializerInfo", "old")].into_iter().collect();
        let new: ObjectHeaders = [("X-Amz-Meta-SerializerInfo", "new")].into_iter().collect();
        put(&t, "rabbit", "k", b"old", &old);

        // A non-empty directory at the payload path makes the final rename fail.
        let payload = dir.path().join("rabbit/k.obj");
        fs::remove_file(&payload).unwrap();
        fs::create_dir_all(payload.join("blocker")).unwrap();
        let mut cursor = Cursor::new(b"new".to_vec());
        assert!(t
            .write_object("rabbit", "k", &mut cursor, "text/plain", 3, &new)
            .is_err());
        fs::remove_dir_all(&payload).unwrap();
        fs::write(&payload, b"old").unwrap();
        let response = t.read_object("rabbit", "k").unwrap();
        assert_eq!(response.headers.get("x-amz-meta-serializerinfo"), Some("old"));

        // Without a previous object the new sidecar is removed again.
        let fresh = dir.path().join("rabbit/fresh.obj");
        fs::create_dir_all(fresh.join("blocker")).unwrap();
        let mut cursor = Cursor::new(b"new".to_vec());
        assert!(t
            .write_object("rabbit", "fresh", &mut cursor, "text/plain", 3, &new)
            .is_err());
        assert!(!dir.path().join(".stow/meta/rabbit/fresh.obj").exists());
    }

    #[test]
    fn create_bucket_twice() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        assert!(t.create_bucket("rabbit").unwrap_err().is_bucket_exists());
    }

    #[test]
    fn write_read_with_headers() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        let headers: ObjectHeaders = [("X-Amz-Meta-Metadata", "e30=")].into_iter().collect();
        put(&t, "rabbit", "turtle/rabbit.json", b"payload", &headers);

        let mut response = t.read_object("rabbit", "turtle/rabbit.json").unwrap();
        let mut body = Vec::new();
        response.body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"payload");
        assert_eq!(response.content_type, "text/plain");
        assert_eq!(response.headers.get("x-amz-meta-metadata"), Some("e30="));
    }

    #[test]
    fn read_missing() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        assert!(matches!(
            t.read_object("rabbit", "nope"),
            Err(TransportError::NoSuchKey { .. })
        ));
        assert!(matches!(
            t.read_object("other", "nope"),
            Err(TransportError::NoSuchBucket(_))
        ));
    }

    #[test]
    fn reading_a_prefix_is_not_an_object() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        put(&t, "rabbit", "turtle/a", b"1", &ObjectHeaders::new());
        assert!(matches!(
            t.read_object("rabbit", "turtle"),
            Err(TransportError::NoSuchKey { .. })
        ));
    }

    #[test]
    fn listing_and_batch_delete() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        for key in ["b", "a", "turtle/c"] {
            put(&t, "rabbit", key, b"x", &ObjectHeaders::new());
        }
        let shallow: Vec<String> = t
            .list_objects("rabbit", false)
            .unwrap()
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(shallow, vec!["a", "b"]);
        let deep = t.list_objects("rabbit", true).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&ObjectLocation::new("rabbit", "turtle/c")));

        let keys: Vec<String> = deep.into_iter().map(|l| l.key).collect();
        let failures = t.delete_objects("rabbit", &keys).unwrap();
        assert!(failures.is_empty());
        assert!(t.list_objects("rabbit", true).unwrap().is_empty());
        t.delete_bucket("rabbit").unwrap();
    }

    #[test]
    fn batch_delete_reports_invalid_keys() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        let failures = t
            .delete_objects("rabbit", &["../escape".to_string()])
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code, "InvalidArgument");
    }

    #[test]
    fn delete_bucket_requires_empty() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        put(&t, "rabbit", "turtle/a", b"1", &ObjectHeaders::new());
        assert!(matches!(
            t.delete_bucket("rabbit"),
            Err(TransportError::BucketNotEmpty(_))
        ));
        t.delete_object("rabbit", "turtle/a").unwrap();
        t.delete_bucket("rabbit").unwrap();
        assert!(!t.root().join("rabbit").exists());
    }

    #[test]
    fn length_mismatch_leaves_nothing_behind() {
        let (_dir, t) = transport();
        t.create_bucket("rabbit").unwrap();
        let mut cursor = Cursor::new(b"abc".to_vec());
        let err = t
            .write_object("rabbit", "k", &mut cursor, "", 5, &ObjectHeaders::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::LengthMismatch { .. }));
        assert!(t.list_objects("rabbit", true).unwrap().is_empty());
    }
}
