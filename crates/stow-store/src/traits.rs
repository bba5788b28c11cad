use std::io::Read;
use std::sync::Arc;

use crate::error::{DeleteFailure, TransportResult};
use crate::object::{ObjectHeaders, ObjectLocation};

/// A stored object as returned by [`Transport::read_object`].
pub struct ObjectResponse {
    /// Payload byte stream.
    pub body: Box<dyn Read + Send>,
    pub content_type: String,
    pub headers: ObjectHeaders,
}

impl std::fmt::Debug for ObjectResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectResponse")
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// The object-storage capability the facade is built on.
///
/// Implementations handle everything below the facade: connections,
/// signing, retries. They must be `Send + Sync`; whether concurrent calls are
/// safe beyond that is up to the backend.
pub trait Transport: Send + Sync {
    /// Create a bucket.
    ///
    /// Fails with `BucketAlreadyExists` or `BucketAlreadyOwnedByYou` if the
    /// bucket is already present.
    fn create_bucket(&self, bucket: &str) -> TransportResult<()>;

    /// Write `length` bytes from `payload` as the object at `bucket/key`,
    /// replacing any existing object.
    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        payload: &mut dyn Read,
        content_type: &str,
        length: u64,
        headers: &ObjectHeaders,
    ) -> TransportResult<()>;

    /// Open an object for reading. Fails with `NoSuchKey` if it is absent.
    fn read_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectResponse>;

    /// Delete one object. Deleting an absent key succeeds.
    fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()>;

    /// Delete several objects from one bucket in a single call.
    ///
    /// Returns the objects that could not be deleted; an empty vector means
    /// every key was removed.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> TransportResult<Vec<DeleteFailure>>;

    /// Delete a bucket. Fails with `BucketNotEmpty` if objects remain.
    fn delete_bucket(&self, bucket: &str) -> TransportResult<()>;

    /// List objects in a bucket. Without `recursive`, only keys directly
    /// under the bucket root (no `/`) are returned.
    fn list_objects(&self, bucket: &str, recursive: bool) -> TransportResult<Vec<ObjectLocation>>;

    /// Release any connection or session held by the transport.
    ///
    /// Called once when the owning client is dropped.
    fn release(&self) {}
}

macro_rules! forward_transport {
    ($ty:ty) => {
        impl<T: Transport + ?Sized> Transport for $ty {
            fn create_bucket(&self, bucket: &str) -> TransportResult<()> {
                (**self).create_bucket(bucket)
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
                (**self).write_object(bucket, key, payload, content_type, length, headers)
            }

            fn read_object(&self, bucket: &str, key: &str) -> TransportResult<ObjectResponse> {
                (**self).read_object(bucket, key)
            }

            fn delete_object(&self, bucket: &str, key: &str) -> TransportResult<()> {
                (**self).delete_object(bucket, key)
            }

            fn delete_objects(
                &self,
                bucket: &str,
                keys: &[String],
            ) -> TransportResult<Vec<DeleteFailure>> {
                (**self).delete_objects(bucket, keys)
            }

            fn delete_bucket(&self, bucket: &str) -> TransportResult<()> {
                (**self).delete_bucket(bucket)
            }

            fn list_objects(
                &self,
                bucket: &str,
                recursive: bool,
            ) -> TransportResult<Vec<ObjectLocation>> {
                (**self).list_objects(bucket, recursive)
            }

            fn release(&self) {
                (**self).release()
            }
        }
    };
}

forward_transport!(Box<T>);
forward_transport!(Arc<T>);
