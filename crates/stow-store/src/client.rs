//! The storage facade: typed values in, typed values out.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use stow_codec::{
    decode_metadata, deserialize, encode_metadata, serialize, Metadata, SerializerInfo,
    TextEncoding, Value,
};
use tracing::{debug, info, warn};

use crate::error::{DeleteFailure, StoreError, StoreResult};
use crate::object::{ObjectAddress, ObjectHeaders, ObjectLocation, StoredObject};
use crate::traits::Transport;

/// Header carrying the encoded [`SerializerInfo`].
pub const SERIALIZER_INFO_HEADER: &str = "X-Amz-Meta-SerializerInfo";

/// Header carrying the encoded caller metadata.
pub const METADATA_HEADER: &str = "X-Amz-Meta-Metadata";

/// Behaviour switches for a [`StorageClient`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Encoding used by [`StorageClient::put`] for text and records.
    pub default_encoding: TextEncoding,
    /// Call [`StorageClient::ensure_bucket`] before every write.
    pub auto_create_buckets: bool,
}

/// Stores and retrieves [`Value`]s through a [`Transport`].
///
/// The client holds no state besides the transport. When it is dropped the
/// transport's [`Transport::release`] hook runs.
pub struct StorageClient<T: Transport> {
    transport: T,
    options: ClientOptions,
}

impl<T: Transport> StorageClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, ClientOptions::default())
    }

    pub fn with_options(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    // ---- Buckets ----

    /// Create `bucket` unless it already exists. Returns the bucket name.
    pub fn ensure_bucket(&self, bucket: &str) -> StoreResult<String> {
        match self.transport.create_bucket(bucket) {
            Ok(()) => info!(bucket, "bucket created"),
            Err(e) if e.is_bucket_exists() => debug!(bucket, "bucket already exists"),
            Err(e) => return Err(e.into()),
        }
        Ok(bucket.to_string())
    }

    /// Delete `bucket`. With `cascade`, every object in it is removed first.
    ///
    /// If the cascading removal reports failures the bucket delete is still
    /// attempted; the removal error is returned in preference to the bucket
    /// error.
    pub fn remove_bucket(&self, bucket: &str, cascade: bool) -> StoreResult<()> {
        let removal = if cascade {
            let listing = self.transport.list_objects(bucket, true)?;
            debug!(bucket, objects = listing.len(), "cascading bucket removal");
            self.remove_many(&listing)
        } else {
            Ok(())
        };
        let deleted = self.transport.delete_bucket(bucket).map_err(StoreError::from);
        match (removal, deleted) {
            (Err(removal), Err(deleted)) => {
                warn!(bucket, error = %deleted, "bucket delete failed after partial removal");
                Err(removal)
            }
            (Err(removal), Ok(())) => Err(removal),
            (Ok(()), result) => {
                if result.is_ok() {
                    info!(bucket, "bucket removed");
                }
                result
            }
        }
    }

    /// List object locations in `bucket`.
    pub fn list(&self, bucket: &str, recursive: bool) -> StoreResult<Vec<ObjectLocation>> {
        Ok(self.transport.list_objects(bucket, recursive)?)
    }

    // ---- Objects ----

    /// Store `value` at `bucket/key` using the client's default encoding.
    pub fn put(
        &self,
        bucket: &str,
        key: &str,
        value: impl Into<Value>,
        metadata: Option<Metadata>,
    ) -> StoreResult<StoredObject> {
        self.put_with_encoding(bucket, key, value, metadata, self.options.default_encoding)
    }

    /// Store `value` at `bucket/key`, encoding text and records with
    /// `encoding`.
    ///
    /// The returned object mirrors the caller's input; it is not read back
    /// from storage.
    pub fn put_with_encoding(
        &self,
        bucket: &str,
        key: &str,
        value: impl Into<Value>,
        metadata: Option<Metadata>,
        encoding: TextEncoding,
    ) -> StoreResult<StoredObject> {
        let value = value.into();
        if self.options.auto_create_buckets {
            self.ensure_bucket(bucket)?;
        }

        let serialized = serialize(&value, encoding)?;
        let mut headers = ObjectHeaders::new();
        headers.insert(
            SERIALIZER_INFO_HEADER,
            serialized.serializer_info.encode_header()?,
        );
        headers.insert(METADATA_HEADER, encode_metadata(metadata.as_ref())?);

        let mut payload = Cursor::new(serialized.payload);
        self.transport.write_object(
            bucket,
            key,
            &mut payload,
            &serialized.content_type,
            serialized.payload_length,
            &headers,
        )?;
        debug!(
            bucket,
            key,
            kind = value.type_name(),
            bytes = serialized.payload_length,
            "object stored"
        );

        Ok(StoredObject::new(bucket, key, value).with_metadata(metadata.unwrap_or_default()))
    }

    /// Store an existing [`StoredObject`].
    pub fn put_object(&self, object: &StoredObject, encoding: TextEncoding) -> StoreResult<()> {
        self.put_with_encoding(
            object.bucket(),
            object.key(),
            object.value().clone(),
            Some(object.metadata().clone()),
            encoding,
        )?;
        Ok(())
    }

    /// Fetch and decode the object at `bucket/key`.
    pub fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        self.fetch(bucket, key, true)
    }

    /// Fetch the object at `bucket/key` without decoding its payload; the
    /// value is always [`Value::Bytes`]. Metadata is still decoded.
    pub fn get_raw(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        self.fetch(bucket, key, false)
    }

    fn fetch(&self, bucket: &str, key: &str, decode: bool) -> StoreResult<StoredObject> {
        let mut response = self.transport.read_object(bucket, key)?;
        let mut payload = Vec::new();
        response
            .body
            .read_to_end(&mut payload)
            .map_err(crate::error::TransportError::from)?;

        let info = if decode {
            SerializerInfo::decode_header(response.headers.get(SERIALIZER_INFO_HEADER))?
        } else {
            None
        };
        let metadata = decode_metadata(response.headers.get(METADATA_HEADER))?;
        let value = deserialize(payload, info.as_ref())?;
        debug!(bucket, key, kind = value.type_name(), "object fetched");

        Ok(StoredObject::new(bucket, key, value).with_metadata(metadata.unwrap_or_default()))
    }

    /// Delete a single object.
    pub fn remove(&self, object: &impl ObjectAddress) -> StoreResult<()> {
        self.transport.delete_object(object.bucket(), object.key())?;
        debug!(bucket = object.bucket(), key = object.key(), "object removed");
        Ok(())
    }

    /// Delete many objects with one batch call per bucket.
    ///
    /// Every bucket group is attempted. Per-object failures are collected
    /// and returned together as [`StoreError::BatchRemoval`]; a transport
    /// error for a whole group is recorded as one failure per key in it.
    pub fn remove_many<I>(&self, objects: I) -> StoreResult<()>
    where
        I: IntoIterator,
        I::Item: ObjectAddress,
    {
        let mut by_bucket: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for object in objects {
            by_bucket
                .entry(object.bucket().to_string())
                .or_default()
                .push(object.key().to_string());
        }

        let mut failures = Vec::new();
        for (bucket, keys) in &by_bucket {
            match self.transport.delete_objects(bucket, keys) {
                Ok(errors) => {
                    debug!(
                        bucket = bucket.as_str(),
                        requested = keys.len(),
                        failed = errors.len(),
                        "batch delete"
                    );
                    failures.extend(errors);
                }
                Err(e) => {
                    warn!(bucket = bucket.as_str(), error = %e, "batch delete failed");
                    failures.extend(keys.iter().map(|key| DeleteFailure::from_error(bucket, key, &e)));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(failed = failures.len(), "batch removal incomplete");
            Err(StoreError::BatchRemoval { failures })
        }
    }
}

impl<T: Transport> Drop for StorageClient<T> {
    fn drop(&mut self) {
        self.transport.release();
    }
}

impl<T: Transport> std::fmt::Debug for StorageClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
