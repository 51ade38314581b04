//! Runtime configuration for the transports and the inbound decompression policy.
//!
//! [`IngestConfig`] is plain data: build it in code, take [`Default`], or load it from a
//! JSON file. Missing sections and fields fall back to their defaults, so
//! `{"dfs": {"default_fs": "hdfs://nn:8020"}}` is a complete config file.
//!
//! ```
//! use seqpack::config::IngestConfig;
//!
//! let config: IngestConfig = serde_json::from_str(r#"{"http": {"timeout_secs": 5}}"#)?;
//! assert_eq!(config.http.timeout_secs, 5);
//! assert_eq!(config.inbound.decompress_extensions, vec!["bz2".to_string()]);
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::error::{Result, SeqError};
use crate::io::cloud::traits::{CloudConfig, CloudCredentials};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub object_store: ObjectStoreConfig,
    pub dfs: DfsConfig,
    pub http: HttpConfig,
    pub inbound: InboundConfig,
}

impl IngestConfig {
    /// Load a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config JSON
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// S3-compatible object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// Base URL; buckets are addressed path-style below it.
    pub endpoint: String,
    pub region: String,
    /// Keys per listing page.
    pub page_size: u32,
    /// Stop a listing after this many pages. Unbounded when unset.
    pub max_list_pages: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            region: "us-east-1".to_string(),
            page_size: 1000,
            max_list_pages: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CloudConfig for ObjectStoreConfig {
    fn region(&self) -> Option<&str> {
        Some(&self.region)
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.endpoint)
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

/// Distributed filesystem (WebHDFS) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DfsConfig {
    /// Used when an `hdfs:///path` URI carries no authority, e.g. `hdfs://nn:8020`.
    pub default_fs: Option<String>,
    /// Namenode HTTP port that serves WebHDFS.
    pub http_port: u16,
    /// Sent as `user.name` on every request when set.
    pub user: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DfsConfig {
    fn default() -> Self {
        Self {
            default_fs: None,
            http_port: 9870,
            user: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl DfsConfig {
    /// Authority (`host:port`) of `default_fs`, if one is configured.
    #[must_use]
    pub fn default_authority(&self) -> Option<&str> {
        let fs = self.default_fs.as_deref()?;
        let authority = fs.strip_prefix("hdfs://").unwrap_or(fs);
        let authority = authority.split('/').next().unwrap_or_default();
        (!authority.is_empty()).then_some(authority)
    }
}

impl CloudConfig for DfsConfig {
    fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl CloudConfig for HttpConfig {
    fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

/// Which fetched objects get decompressed before they become record values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Extensions (without the dot) whose payloads are decompressed on fetch.
    pub decompress_extensions: Vec<String>,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            decompress_extensions: vec!["bz2".to_string()],
        }
    }
}

impl InboundConfig {
    /// True if `name` ends in one of the configured extensions (case-insensitive).
    #[must_use]
    pub fn should_decompress(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.decompress_extensions.iter().any(|ext| {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            !ext.is_empty() && lower.ends_with(&format!(".{ext}"))
        })
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// An access key pair used to sign object store requests.
#[derive(Clone)]
pub struct StaticCredentials {
    access_key: String,
    secret_key: String,
}

impl StaticCredentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`; `None` unless both are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let access = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self::new(access, secret))
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl CloudCredentials for StaticCredentials {
    fn identifier(&self) -> &str {
        &self.access_key
    }

    fn credential_type(&self) -> &str {
        "static"
    }

    fn secret(&self) -> &str {
        &self.secret_key
    }

    fn validate(&self) -> Result<()> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(SeqError::transport("empty access key or secret key"));
        }
        Ok(())
    }
}
