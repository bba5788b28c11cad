//! In-memory transport for tests and embedding.
//!
//! [`InMemoryTransport`] keeps every bucket in a `BTreeMap` behind a
//! `RwLock`. Data is lost when the transport is dropped. It also records the
//! batch-delete calls it receives and lets tests lock individual objects so
//! that deleting them fails.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{DeleteFailure, TransportError, TransportResult};
use crate::names::{validate_bucket_name, validate_key};
use crate::object::{ObjectHeaders, ObjectLocation};
use crate::traits::{ObjectResponse, Transport};

#[derive(Clone, Debug)]
struct Entry {
    data: Vec<u8>,
    content_type: String,
    headers: ObjectHeaders,
}

type Buckets = BTreeMap<String, BTreeMap<String, Entry>>;

/// An in-memory implementation of [`Transport`].
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    buckets: RwLock<Buckets>,
    locked: RwLock<BTreeSet<(String, String)>>,
    batch_calls: Mutex<Vec<(String, usize)>>,
    releases: AtomicUsize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_buckets(&self) -> TransportResult<RwLockReadGuard<'_, Buckets>> {
        self.buckets
            .read()
            .map_err(|e| TransportError::Internal(format!("lock poisoned: {e}")))
    }

    fn write_buckets(&self) -> TransportResult<RwLockWriteGuard<'_, Buckets>> {
        self.buckets
            .write()
            .map_err(|e| TransportError::Internal(format!("lock poisoned: {e}")))
    }

    fn is_locked(&self, bucket: &str, key: &str) -> bool {
        self.locked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(bucket.to_string(), key.to_string()))
    }

    /// Mark an object as locked: batch deletes report it as `AccessDenied`
    /// and single deletes fail.
    pub fn lock_object(&self, bucket: &str, key: &str) {
        self.locked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bucket.to_string(), key.to_string()));
    }

    pub fn unlock_object(&self, bucket: &str, key: &str) {
        self.locked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(bucket.to_string(), key.to_string()));
    }

    /// Batch-delete calls received so far, as `(bucket, key count)`.
    pub fn batch_delete_calls(&self) -> Vec<(String, usize)> {
        self.batch_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times [`Transport::release`] has been called.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Number of objects across all buckets.
    pub fn object_count(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    /// Content type recorded for an object.
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|entry| entry.content_type.clone())
    }

    fn locked_failure(bucket: &str, key: &str) -> DeleteFailure {
        DeleteFailure {
            bucket: bucket.to_string(),
            key: key.to_string(),
            code: "AccessDenied".into(),
            message: "object is locked".into(),
        }
    }
}

impl Transport for InMemoryTransport {
    fn create_bucket(&self, bucket: &str) -> TransportResult<()> {
        validate_bucket_name(bucket)?;
        let mut buckets = self.write_buckets()?;
        if buckets.contains_key(bucket) {
            return Err(TransportError::BucketAlreadyOwnedByYou(bucket.to_string()));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
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
        validate_key(key)?;
        let mut data = Vec::new();
        payload.take(length).read_to_end(&mut data)?;
        if data.len() as u64 != length {
            return Err(TransportError::LengthMismatch {
                declared: length,
                actual: data.len() as u64,
            });
        }
        let mut buckets = self.write_buckets()?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| TransportError::NoSuchBucket(bucket.to_string()))?;
        objects.insert(
            key.to_string(),
            Entry {
                data,
                content_type: content_type.to_string(),
                headers: headers.clone(),
            },
        );
        Ok(())
    }

    fn read_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectResponse> {
        let buckets = self.read_buckets()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| TransportError::NoSuchBucket(bucket.to_string()))?;
        let entry = objects.get(key).ok_or_else(|| TransportError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(ObjectResponse {
            body: Box::new(Cursor::new(entry.data.clone())),
            content_type: entry.content_type.clone(),
            headers: entry.headers.clone(),
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()> {
        if self.is_locked(bucket, key) {
            return Err(TransportError::Internal(format!(
                "object {bucket}/{key} is locked"
            )));
        }
        let mut buckets = self.write_buckets()?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| TransportError::NoSuchBucket(bucket.to_string()))?;
        objects.remove(key);
        Ok(())
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> TransportResult<Vec<DeleteFailure>> {
        self.batch_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((bucket.to_string(), keys.len()));

        let mut buckets = self.write_buckets()?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| TransportError::NoSuchBucket(bucket.to_string()))?;
        let mut failures = Vec::new();
        for key in keys {
            if self.is_locked(bucket, key) {
                failures.push(Self::locked_failure(bucket, key));
            } else {
                objects.remove(key);
            }
        }
        Ok(failures)
    }

    fn delete_bucket(&self, bucket: &str) -> TransportResult<()> {
        let mut buckets = self.write_buckets()?;
        match buckets.get(bucket) {
            None => Err(TransportError::NoSuchBucket(bucket.to_string())),
            Some(objects) if !objects.is_empty() => {
                Err(TransportError::BucketNotEmpty(bucket.to_string()))
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    fn list_objects(&self, bucket: &str, recursive: bool) -> TransportResult<Vec<ObjectLocation>> {
        let buckets = self.read_buckets()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| TransportError::NoSuchBucket(bucket.to_string()))?;
        Ok(objects
            .keys()
            .filter(|key| recursive || !key.contains('/'))
            .map(|key| ObjectLocation::new(bucket, key.as_str()))
            .collect())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
