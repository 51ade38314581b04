//! Parsing source and destination URIs into a [`SourceUri`].
//!
//! ## Supported schemes
//!
//! | Scheme              | Variant          | Example                              |
//! |---------------------|------------------|--------------------------------------|
//! | `file`              | `LocalFile`      | `file:///etc/passwd`                 |
//! | `hdfs`              | `DistributedFs`  | `hdfs://nn:8020/data/in`             |
//! | `s3`, `s3n`         | `ObjectStore`    | `s3://bucket.s3.amazonaws.com/a/b`   |
//! | `http`, `https`     | `Http`           | `https://host/file.bz2`              |
//!
//! For object store URIs the bucket is the host up to its first dot, so
//! `s3://ori-tmp.s3.amazonaws.com/passwd` names bucket `ori-tmp`, key `passwd`.
//! A trailing `/` on the key is preserved, which matters for prefix listings.

use crate::config::DfsConfig;
use crate::error::{Result, SeqError};
use crate::io::cloud::traits::DfsPath;
use std::path::{Path, PathBuf};

/// A parsed reference to an object on one of the supported storage systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUri {
    LocalFile { path: PathBuf },
    DistributedFs(DfsPath),
    ObjectStore { bucket: String, key: String },
    Http { url: String },
}

impl SourceUri {
    /// Parse `uri`, filling a missing distributed filesystem authority from `dfs`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScheme` for any scheme not listed in the module docs
    /// - `InvalidUri` for structurally broken URIs (no bucket, no host, no path,
    ///   or an `hdfs:///` URI with no configured default filesystem)
    pub fn parse(uri: &str, dfs: &DfsConfig) -> Result<Self> {
        let Some((scheme, rest)) = uri.split_once("://") else {
            return Err(SeqError::unsupported_scheme(uri));
        };

        match scheme.to_ascii_lowercase().as_str() {
            "file" => parse_local(uri, rest),
            "hdfs" => parse_dfs(uri, rest, dfs),
            "s3" | "s3n" => parse_object_store(uri, rest),
            "http" | "https" => {
                let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
                if host.is_empty() {
                    return Err(SeqError::invalid_uri(uri, "missing host"));
                }
                Ok(Self::Http {
                    url: uri.to_string(),
                })
            }
            _ => Err(SeqError::unsupported_scheme(uri)),
        }
    }

    /// Short scheme label used in log lines.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::LocalFile { .. } => "file",
            Self::DistributedFs(_) => "hdfs",
            Self::ObjectStore { .. } => "s3",
            Self::Http { .. } => "http",
        }
    }

    /// Canonical URI form: `file:///abs`, `hdfs://authority/path`, `s3://bucket/key`.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::LocalFile { path } => format!("file://{}", path.display()),
            Self::DistributedFs(path) => path.to_string(),
            Self::ObjectStore { bucket, key } => format!("s3://{bucket}/{key}"),
            Self::Http { url } => url.clone(),
        }
    }

    /// The scheme-local part used for pattern matching: the path, the key, or the URL.
    #[must_use]
    pub fn path_part(&self) -> String {
        match self {
            Self::LocalFile { path } => path.display().to_string(),
            Self::DistributedFs(path) => path.path.clone(),
            Self::ObjectStore { key, .. } => key.clone(),
            Self::Http { url } => url.clone(),
        }
    }

    /// Last non-empty path segment (for HTTP, ignoring any query string).
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        let last = |s: &str| {
            s.rsplit('/')
                .find(|seg| !seg.is_empty())
                .map(ToString::to_string)
        };
        match self {
            Self::LocalFile { path } => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Self::DistributedFs(path) => path.file_name().map(ToString::to_string),
            Self::ObjectStore { key, .. } => last(key),
            Self::Http { url } => {
                let without_scheme = url.split_once("://").map_or(url.as_str(), |(_, r)| r);
                let path = without_scheme.split(['?', '#']).next().unwrap_or_default();
                match path.split_once('/') {
                    Some((_, p)) => last(p),
                    None => None,
                }
            }
        }
    }
}

/// `file://localhost/p` names the same file as `file:///p`; any other leading segment
/// is read as a relative path.
fn parse_local(uri: &str, rest: &str) -> Result<SourceUri> {
    let rest = match rest.split_once('/') {
        Some((host, _)) if host.eq_ignore_ascii_case("localhost") => &rest[host.len()..],
        _ => rest,
    };
    if rest.is_empty() {
        return Err(SeqError::invalid_uri(uri, "missing path"));
    }
    let path = Path::new(rest);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::absolute(path).map_err(|e| {
            SeqError::invalid_uri(uri, "cannot make path absolute").with_source(e.to_string())
        })?
    };
    Ok(SourceUri::LocalFile { path })
}

fn parse_dfs(uri: &str, rest: &str, dfs: &DfsConfig) -> Result<SourceUri> {
    let (authority, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };
    let authority = if authority.is_empty() {
        dfs.default_authority()
            .ok_or_else(|| SeqError::invalid_uri(uri, "no authority and no default_fs configured"))?
    } else {
        authority
    };
    Ok(SourceUri::DistributedFs(DfsPath::new(authority, path)))
}

fn parse_object_store(uri: &str, rest: &str) -> Result<SourceUri> {
    let (host, key_part) = rest.split_once('/').unwrap_or((rest, ""));
    let bucket = host.split('.').next().unwrap_or_default();
    if bucket.is_empty() {
        return Err(SeqError::invalid_uri(uri, "missing bucket"));
    }

    let mut key = key_part
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if key_part.ends_with('/') && !key.is_empty() {
        key.push('/');
    }

    Ok(SourceUri::ObjectStore {
        bucket: bucket.to_string(),
        key,
    })
}
