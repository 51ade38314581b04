//! Fake implementations for testing.
//!
//! These implementations use in-memory data structures to simulate the transports,
//! making them ideal for unit testing without a network. Each fake is cheap to clone;
//! clones share the same storage, so a test can keep a handle while the resolver owns
//! another.

use crate::error::{Result, SeqError};
use crate::io::cloud::traits::{
    DfsEntry, DfsEntryKind, DfsPath, DistributedFsIO, HttpIO, ObjectIO, ObjectMetadata,
    ObjectPage,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type BucketStorage = Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>;

// ============================================================================
// Fake Object Storage
// ============================================================================

/// In-memory object store. Listings are served in key order, `page_size` keys at a time.
#[derive(Clone)]
pub struct FakeObjectIO {
    storage: BucketStorage,
    page_size: usize,
    pages_served: Arc<AtomicUsize>,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// A store whose listings return at most `page_size` keys per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            page_size: page_size.max(1),
            pages_served: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn put_object(&self, bucket: &str, key: &str, data: &[u8]) {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
    }

    /// Create an empty bucket.
    pub fn create_bucket(&self, bucket: &str) {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default();
    }

    /// Number of listing pages served so far.
    #[must_use]
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }
}

impl Default for FakeObjectIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIO for FakeObjectIO {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| SeqError::not_found(format!("object s3://{bucket}/{key}")))
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<ObjectPage> {
        let (objects, has_more) = {
            let storage = self.storage.lock().expect("storage mutex poisoned");
            let bucket_map = storage
                .get(bucket)
                .ok_or_else(|| SeqError::not_found(format!("bucket {bucket}")))?;

            let mut remaining = bucket_map
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .filter(|(key, _)| marker.is_none_or(|m| key.as_str() > m))
                .map(|(key, data)| ObjectMetadata {
                    key: key.clone(),
                    size: data.len() as u64,
                    last_modified: None,
                    etag: Some(format!("etag-{key}")),
                });

            let objects: Vec<ObjectMetadata> = remaining.by_ref().take(self.page_size).collect();
            (objects, remaining.next().is_some())
        };

        self.pages_served.fetch_add(1, Ordering::SeqCst);
        let next_marker = if has_more {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ObjectPage {
            objects,
            next_marker,
        })
    }
}

// ============================================================================
// Fake Distributed Filesystem
// ============================================================================

#[derive(Default)]
struct DfsState {
    files: BTreeMap<DfsPath, Vec<u8>>,
    dirs: BTreeSet<DfsPath>,
}

/// In-memory distributed filesystem keyed by `(authority, path)`.
///
/// Directories are implied by the files under them; [`FakeDistributedFsIO::mkdir`]
/// creates an empty one.
#[derive(Clone, Default)]
pub struct FakeDistributedFsIO {
    state: Arc<Mutex<DfsState>>,
}

impl FakeDistributedFsIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, path: &DfsPath, data: &[u8]) {
        self.state
            .lock()
            .expect("dfs mutex poisoned")
            .files
            .insert(path.clone(), data.to_vec());
    }

    pub fn mkdir(&self, path: &DfsPath) {
        self.state
            .lock()
            .expect("dfs mutex poisoned")
            .dirs
            .insert(path.clone());
    }

    #[must_use]
    pub fn file(&self, path: &DfsPath) -> Option<Vec<u8>> {
        self.state
            .lock()
            .expect("dfs mutex poisoned")
            .files
            .get(path)
            .cloned()
    }
}

impl DistributedFsIO for FakeDistributedFsIO {
    fn open(&self, path: &DfsPath) -> Result<Vec<u8>> {
        self.file(path)
            .ok_or_else(|| SeqError::not_found(format!("file {path}")))
    }

    fn list_status(&self, dir: &DfsPath) -> Result<Vec<DfsEntry>> {
        let state = self.state.lock().expect("dfs mutex poisoned");
        let parent = format!("{}/", dir.path.trim_end_matches('/'));

        let mut entries: Vec<DfsEntry> = Vec::new();
        for (path, data) in &state.files {
            if path.authority != dir.authority {
                continue;
            }
            let Some(rest) = path.path.strip_prefix(&parent) else {
                continue;
            };
            match rest.split_once('/') {
                None => entries.push(DfsEntry {
                    name: rest.to_string(),
                    kind: DfsEntryKind::File,
                    length: data.len() as u64,
                }),
                Some((sub, _)) => {
                    if !entries.iter().any(|e| e.name == sub) {
                        entries.push(DfsEntry {
                            name: sub.to_string(),
                            kind: DfsEntryKind::Directory,
                            length: 0,
                        });
                    }
                }
            }
        }

        let wanted = parent.trim_end_matches('/');
        let known_dir = state
            .dirs
            .iter()
            .any(|d| d.authority == dir.authority && d.path.trim_end_matches('/') == wanted);
        if entries.is_empty() && !known_dir && parent != "/" {
            return Err(SeqError::not_found(format!("directory {dir}")));
        }
        Ok(entries)
    }

    fn create(&self, path: &DfsPath, data: &[u8], overwrite: bool) -> Result<()> {
        let mut state = self.state.lock().expect("dfs mutex poisoned");
        if !overwrite && state.files.contains_key(path) {
            return Err(SeqError::transport(format!("{path} already exists")));
        }
        state.files.insert(path.clone(), data.to_vec());
        Ok(())
    }
}

// ============================================================================
// Fake HTTP
// ============================================================================

/// Serves canned bodies by exact URL; anything else is a 404.
#[derive(Clone, Default)]
pub struct FakeHttpIO {
    responses: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FakeHttpIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, body: &[u8]) {
        self.responses
            .lock()
            .expect("http mutex poisoned")
            .insert(url.to_string(), body.to_vec());
    }
}

impl HttpIO for FakeHttpIO {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.responses
            .lock()
            .expect("http mutex poisoned")
            .get(url)
            .cloned()
            .ok_or_else(|| SeqError::not_found(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn object_pages_resume_after_marker() {
        let store = FakeObjectIO::with_page_size(2);
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            store.put_object("bkt", key, b"x");
        }

        let first = store.list_objects_page("bkt", "a/", None).unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_marker.as_deref(), Some("a/2"));

        let second = store.list_objects_page("bkt", "a/", Some("a/2")).unwrap();
        let keys: Vec<_> = second.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/3"]);
        assert!(second.next_marker.is_none());
        assert_eq!(store.pages_served(), 2);
    }

    #[test]
    fn missing_object_and_bucket_are_not_found() {
        let store = FakeObjectIO::new();
        let err = store.get_object("nope", "k").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SourceNotFound);
        let err = store.list_objects_page("nope", "", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SourceNotFound);
    }

    #[test]
    fn dfs_lists_one_level() {
        let fs = FakeDistributedFsIO::new();
        let dir = DfsPath::new("nn:8020", "/in");
        fs.put_file(&dir.child("a.txt"), b"aa");
        fs.put_file(&dir.child("sub").child("b.txt"), b"b");
        fs.put_file(&DfsPath::new("other:8020", "/in/c.txt"), b"c");

        let entries = fs.list_status(&dir).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].kind, DfsEntryKind::File);
        assert_eq!(entries[0].length, 2);
        assert_eq!(entries[1].name, "sub");
        assert_eq!(entries[1].kind, DfsEntryKind::Directory);

        let missing = fs.list_status(&DfsPath::new("nn:8020", "/nope"));
        assert_eq!(missing.unwrap_err().kind, ErrorKind::SourceNotFound);

        let empty = DfsPath::new("nn:8020", "/empty");
        fs.mkdir(&empty);
        assert!(fs.list_status(&empty).unwrap().is_empty());
    }

    #[test]
    fn dfs_create_respects_overwrite_flag() {
        let fs = FakeDistributedFsIO::new();
        let path = DfsPath::new("nn:8020", "/out/x.seq");
        fs.create(&path, b"one", false).unwrap();
        assert!(fs.create(&path, b"two", false).is_err());
        fs.create(&path, b"two", true).unwrap();
        assert_eq!(fs.open(&path).unwrap(), b"two");
    }

    #[test]
    fn http_serves_inserted_bodies() {
        let http = FakeHttpIO::new();
        http.insert("http://host/a", b"body");
        assert_eq!(http.get("http://host/a").unwrap(), b"body");
        assert_eq!(
            http.get("http://host/b").unwrap_err().kind,
            ErrorKind::SourceNotFound
        );
    }
}
