//! Transport traits for the storage systems objects are ingested from.
//!
//! Every transport is synchronous and `Send + Sync` so a single client can be shared
//! behind an `Arc` by the resolver, lister, writer and reader. Real implementations
//! live behind the `network` feature; in-memory fakes in [`super::fake`] are always
//! available.

use crate::error::Result;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Credential and Configuration Traits
// ============================================================================

/// Trait for cloud service credentials
pub trait CloudCredentials: Send + Sync {
    /// Returns a unique identifier for this credential (e.g. an access key ID)
    fn identifier(&self) -> &str;

    /// Returns the credential type (e.g. `"static"`, `"session"`)
    fn credential_type(&self) -> &str;

    /// Returns the secret used to sign requests
    fn secret(&self) -> &str;

    /// Validates the credentials (returns Ok if usable)
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or malformed
    fn validate(&self) -> Result<()>;
}

/// Trait for transport configuration sections
pub trait CloudConfig: Send + Sync {
    /// Returns the region or location for the service
    fn region(&self) -> Option<&str> {
        None
    }

    /// Returns the endpoint URL (if a custom endpoint is used)
    fn endpoint(&self) -> Option<&str> {
        None
    }

    /// Returns the request timeout in seconds
    fn timeout_secs(&self) -> u64 {
        30
    }

    /// Returns additional provider-specific configuration
    fn extra(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

// ============================================================================
// ObjectIO - Object Storage
// ============================================================================

/// Metadata for an object in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl ObjectMetadata {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }
}

/// One page of a listing, plus the marker to resume from.
///
/// `next_marker == None` means the provider has no more pages.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectMetadata>,
    pub next_marker: Option<String>,
}

/// Trait for object storage operations
pub trait ObjectIO: Send + Sync {
    /// Download an object's full content
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` if the bucket or object doesn't exist, `Transport` if the
    /// download fails
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Fetch one page of objects whose keys start with `prefix`, resuming after `marker`
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` if the bucket doesn't exist, `Transport` if the listing
    /// request fails
    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<ObjectPage>;
}

// ============================================================================
// DistributedFsIO - Hadoop-compatible filesystems
// ============================================================================

/// A path on a distributed filesystem, qualified by its namenode authority
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DfsPath {
    /// `host:port` of the namenode
    pub authority: String,
    /// Absolute path, always starting with `/`
    pub path: String,
}

impl DfsPath {
    pub fn new(authority: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            authority: authority.into(),
            path,
        }
    }

    /// The path of an entry directly under this directory.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let parent = self.path.trim_end_matches('/');
        Self {
            authority: self.authority.clone(),
            path: format!("{parent}/{name}"),
        }
    }

    /// Last path segment, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit('/').find(|s| !s.is_empty())
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hdfs://{}{}", self.authority, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfsEntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfsEntry {
    /// Name relative to the listed directory
    pub name: String,
    pub kind: DfsEntryKind,
    pub length: u64,
}

/// Trait for distributed filesystem operations
pub trait DistributedFsIO: Send + Sync {
    /// Read a file's full content
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` if the file doesn't exist, `Transport` on failure
    fn open(&self, path: &DfsPath) -> Result<Vec<u8>>;

    /// List the direct children of a directory, in provider order
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` if the directory doesn't exist, `Transport` on failure
    fn list_status(&self, dir: &DfsPath) -> Result<Vec<DfsEntry>>;

    /// Create (or replace, when `overwrite` is set) a file with the given content
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the file exists and `overwrite` is false, or the upload fails
    fn create(&self, path: &DfsPath, data: &[u8], overwrite: bool) -> Result<()>;
}

// ============================================================================
// HttpIO - Plain HTTP downloads
// ============================================================================

/// Trait for single-request HTTP downloads
pub trait HttpIO: Send + Sync {
    /// Issue one GET and return the body. Redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` on 404, `Transport` on any other failure status or
    /// connection error
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dfs_path_normalizes_and_joins() {
        let dir = DfsPath::new("nn:8020", "data/in/");
        assert_eq!(dir.path, "/data/in/");
        let child = dir.child("a.txt");
        assert_eq!(child.to_string(), "hdfs://nn:8020/data/in/a.txt");
        assert_eq!(child.file_name(), Some("a.txt"));
        assert_eq!(DfsPath::new("nn:8020", "/").file_name(), None);
    }
}
