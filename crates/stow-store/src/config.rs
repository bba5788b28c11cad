use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stow_codec::TextEncoding;

use crate::client::{ClientOptions, StorageClient};
use crate::error::{StoreError, StoreResult};
use crate::fs::FsTransport;
use crate::memory::InMemoryTransport;
use crate::traits::Transport;

/// Which transport a configured client uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Ephemeral in-process storage.
    Memory,
    /// Buckets as directories under `root`.
    Filesystem { root: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from("stow-data"),
        }
    }
}

/// Client configuration, usually loaded from a TOML file:
///
/// ```toml
/// default_encoding = "utf-8"
/// auto_create_buckets = true
///
/// [backend]
/// kind = "filesystem"
/// root = "/var/lib/stow"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub default_encoding: TextEncoding,
    pub auto_create_buckets: bool,
    pub backend: BackendConfig,
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            default_encoding: self.default_encoding,
            auto_create_buckets: self.auto_create_buckets,
        }
    }

    /// Build a client for the configured backend.
    pub fn open(&self) -> StoreResult<StorageClient<Box<dyn Transport>>> {
        let transport: Box<dyn Transport> = match &self.backend {
            BackendConfig::Memory => Box::new(InMemoryTransport::new()),
            BackendConfig::Filesystem { root } => Box::new(FsTransport::open(root)?),
        };
        Ok(StorageClient::with_options(transport, self.client_options()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(
            c.backend,
            BackendConfig::Filesystem {
                root: "stow-data".into()
            }
        );
        assert_eq!(c.default_encoding, TextEncoding::Utf8);
        assert!(!c.auto_create_buckets);
    }

    #[test]
    fn parse_full() {
        let c = StoreConfig::from_toml_str(
            r#"
            default_encoding = "latin-1"
            auto_create_buckets = true

            [backend]
            kind = "filesystem"
            root = "/var/lib/stow"
            "#,
        )
        .unwrap();
        assert_eq!(c.default_encoding, TextEncoding::Latin1);
        assert!(c.auto_create_buckets);
        assert_eq!(
            c.backend,
            BackendConfig::Filesystem {
                root: "/var/lib/stow".into()
            }
        );
    }

    #[test]
    fn parse_partial_uses_defaults() {
        let c = StoreConfig::from_toml_str("[backend]\nkind = \"memory\"\n").unwrap();
        assert_eq!(c.backend, BackendConfig::Memory);
        assert_eq!(c.default_encoding, TextEncoding::Utf8);
    }

    #[test]
    fn unknown_encoding_rejected() {
        let err = StoreConfig::from_toml_str("default_encoding = \"ebcdic\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn toml_round_trip() {
        let c = StoreConfig {
            backend: BackendConfig::Memory,
            default_encoding: TextEncoding::Ascii,
            auto_create_buckets: true,
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn open_memory_backend() {
        let c = StoreConfig {
            backend: BackendConfig::Memory,
            ..StoreConfig::default()
        };
        let client = c.open().unwrap();
        client.ensure_bucket("rabbit").unwrap();
        let put = client.put("rabbit", "k", "v", None).unwrap();
        assert_eq!(client.get("rabbit", "k").unwrap(), put);
    }

    #[test]
    fn open_filesystem_backend() {
        let dir = tempfile::tempdir().unwrap();
        let c = StoreConfig {
            backend: BackendConfig::Filesystem {
                root: dir.path().to_path_buf(),
            },
            auto_create_buckets: true,
            ..StoreConfig::default()
        };
        let client = c.open().unwrap();
        let mut meta = stow_codec::Metadata::new();
        meta.insert("hello".into(), "\u{1f30d}".into());
        let put = client
            .put("rabbit", "turtle/rabbit.txt", "caf\u{e9}", Some(meta))
            .unwrap();
        drop(client);

        let reopened = c.open().unwrap();
        assert_eq!(reopened.get("rabbit", "turtle/rabbit.txt").unwrap(), put);
    }
}
