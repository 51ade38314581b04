//! Enumerating the objects under a prefix.
//!
//! | Scheme    | Behaviour                                                      |
//! |-----------|----------------------------------------------------------------|
//! | `s3`      | every page of a prefix listing (recursive), provider order     |
//! | `hdfs`    | one directory level, files only, provider order                |
//! | `file`    | one directory level, files only, sorted                        |
//! | `http(s)` | `UnsupportedScheme`                                            |
//!
//! Results are canonical URIs (`s3://bucket/key`, `hdfs://authority/path`,
//! `file:///abs/path`) whose names end in `.<extension>`, or all entries when the
//! extension is empty.

use crate::error::{Result, SeqError};
use crate::io::cloud::helpers::{
    PaginationConfig, extension_suffix, matches_extension, paginate_with_marker,
};
use crate::io::cloud::traits::{DfsEntryKind, DfsPath};
use crate::io::glob::list_dir_files;
use crate::io::transports::Transports;
use crate::io::uri::SourceUri;
use log::debug;
use std::path::Path;

#[derive(Clone)]
pub struct SourceLister {
    transports: Transports,
}

impl SourceLister {
    #[must_use]
    pub fn new(transports: Transports) -> Self {
        Self { transports }
    }

    /// List the objects under `prefix_uri` whose names end in `.<extension>`.
    ///
    /// A leading dot on `extension` is accepted. An empty result means nothing under the
    /// prefix matched.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScheme` for schemes without listing support (HTTP) and unknown ones
    /// - `SourceNotFound` if the bucket or directory does not exist
    /// - `Transport` if a listing request fails
    pub fn list(&self, prefix_uri: &str, extension: &str) -> Result<Vec<String>> {
        let suffix = extension_suffix(extension);
        let source = SourceUri::parse(prefix_uri, &self.transports.config().dfs)?;
        let listed = match &source {
            SourceUri::ObjectStore { bucket, key } => self.list_object_store(bucket, key, &suffix),
            SourceUri::DistributedFs(dir) => self.list_dfs(dir, &suffix),
            SourceUri::LocalFile { path } => list_local(path, &suffix),
            SourceUri::Http { .. } => Err(SeqError::unsupported_scheme(prefix_uri)
                .context("listing is not available over HTTP")),
        }
        .map_err(|e| e.context(format!("list {prefix_uri}")))?;

        debug!(
            "listed {prefix_uri} (extension {extension:?}): {} match(es)",
            listed.len()
        );
        Ok(listed)
    }

    fn list_object_store(&self, bucket: &str, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        let store = self.transports.object_store();
        let pagination = PaginationConfig {
            max_pages: self.transports.config().object_store.max_list_pages,
        };
        paginate_with_marker(&pagination, |marker| {
            let page = store.list_objects_page(bucket, prefix, marker)?;
            let matches = page
                .objects
                .into_iter()
                .filter(|object| object.key.starts_with(prefix))
                .filter(|object| matches_extension(&object.key, suffix))
                .map(|object| format!("s3://{bucket}/{}", object.key))
                .collect();
            Ok((matches, page.next_marker))
        })
    }

    fn list_dfs(&self, dir: &DfsPath, suffix: &str) -> Result<Vec<String>> {
        let entries = self.transports.dfs().list_status(dir)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == DfsEntryKind::File)
            .filter(|entry| matches_extension(&entry.name, suffix))
            .map(|entry| dir.child(&entry.name).to_string())
            .collect())
    }
}

fn list_local(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    Ok(list_dir_files(dir)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| matches_extension(&name.to_string_lossy(), suffix))
        })
        .map(|path| format!("file://{}", path.display()))
        .collect())
}
