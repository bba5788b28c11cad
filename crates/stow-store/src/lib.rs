//! Typed object storage over an S3-style transport.
//!
//! [`StorageClient`] stores bytes, text, or structured records under a
//! bucket/key address and records how each payload was encoded, so reads
//! return the same kind of value that was written.
//!
//! # Persisted format
//!
//! Every object carries two headers next to its payload:
//!
//! - `X-Amz-Meta-SerializerInfo` -- `base64(json({"method", "encoding"}))`
//! - `X-Amz-Meta-Metadata` -- `base64(json(metadata))`, empty when absent
//!
//! # Transports
//!
//! All backends implement the [`Transport`] trait:
//!
//! - [`InMemoryTransport`] -- `BTreeMap`-based, for tests and embedding
//! - [`FsTransport`] -- buckets as directories on local disk
//!
//! # Rules
//!
//! 1. The client owns no state beyond its transport.
//! 2. No retries and no partial success for single-object operations.
//! 3. Creating an existing bucket through [`StorageClient::ensure_bucket`]
//!    is a no-op; every other error propagates.
//! 4. Batch removal reports every per-object failure.

pub mod client;
pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod object;
pub mod traits;

pub use client::{ClientOptions, StorageClient, METADATA_HEADER, SERIALIZER_INFO_HEADER};
pub use config::{BackendConfig, StoreConfig};
pub use error::{DeleteFailure, StoreError, StoreResult, TransportError, TransportResult};
pub use fs::FsTransport;
pub use memory::InMemoryTransport;
pub use object::{ObjectAddress, ObjectHeaders, ObjectLocation, StoredObject};
pub use traits::{ObjectResponse, Transport};

pub use stow_codec::{CodecError, Metadata, Record, TextEncoding, Value};
