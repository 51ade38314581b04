//! [`ObjectIO`] over S3 using the `object_store` crate.
//!
//! `object_store` is async; each [`S3ObjectIO`] owns a current-thread tokio runtime and
//! blocks on it, so callers keep the synchronous [`ObjectIO`] API. Buckets are
//! addressed path-style (`{endpoint}/{bucket}/{key}`) so any S3-compatible endpoint
//! works. Requests are signed when credentials are given and sent unsigned otherwise,
//! which is what public buckets expect.
//!
//! One store is built per bucket on first use and cached.

use crate::config::ObjectStoreConfig;
use crate::error::{ErrorKind, Result, ResultExt, SeqError};
use crate::io::cloud::traits::{CloudCredentials, ObjectIO, ObjectMetadata, ObjectPage};
use futures::TryStreamExt;
use log::debug;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as StorePath;
use object_store::{ClientOptions, ObjectMeta, ObjectStore};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

pub struct S3ObjectIO {
    runtime: Runtime,
    config: ObjectStoreConfig,
    credentials: Option<Arc<dyn CloudCredentials>>,
    stores: Mutex<HashMap<String, Arc<AmazonS3>>>,
}

impl S3ObjectIO {
    /// # Errors
    ///
    /// Returns `InvalidUri` if the endpoint is not an absolute URL with a host,
    /// `Transport` if the runtime cannot be started
    pub fn new(
        config: &ObjectStoreConfig,
        credentials: Option<Arc<dyn CloudCredentials>>,
    ) -> Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint)
            .context_kind(ErrorKind::InvalidUri, || {
                format!("invalid object store endpoint {}", config.endpoint)
            })?;
        if endpoint.host_str().is_none_or(str::is_empty) {
            return Err(SeqError::invalid_uri(&config.endpoint, "endpoint has no host"));
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context_kind(ErrorKind::Transport, || "starting S3 client runtime".into())?;

        Ok(Self {
            runtime,
            config: config.clone(),
            credentials,
            stores: Mutex::new(HashMap::new()),
        })
    }

    fn store(&self, bucket: &str) -> Result<Arc<AmazonS3>> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| SeqError::transport("S3 store cache poisoned"))?;
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let options =
            ClientOptions::new().with_timeout(Duration::from_secs(self.config.timeout_secs));
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&self.config.region)
            .with_endpoint(self.config.endpoint.trim_end_matches('/'))
            .with_virtual_hosted_style_request(false)
            .with_allow_http(true)
            .with_client_options(options);
        builder = match &self.credentials {
            Some(credentials) => builder
                .with_access_key_id(credentials.identifier())
                .with_secret_access_key(credentials.secret()),
            None => builder.with_skip_signature(true),
        };

        let store = Arc::new(
            builder
                .build()
                .context_kind(ErrorKind::Transport, || format!("configuring bucket {bucket}"))?,
        );
        debug!("built S3 store for bucket {bucket} at {}", self.config.endpoint);
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Map a store error, keeping "no such key" apart from every other failure.
fn map_store_error(err: object_store::Error, what: &str) -> SeqError {
    match err {
        object_store::Error::NotFound { .. } => {
            SeqError::not_found(what).with_source(err.to_string())
        }
        other => SeqError::transport(format!("{what} failed")).with_source(other.to_string()),
    }
}

/// Keys are used verbatim when they are valid store paths; anything else is encoded.
fn store_path(key: &str) -> StorePath {
    StorePath::parse(key).unwrap_or_else(|_| StorePath::from(key))
}

/// The directory a listing starts from.
///
/// Store prefixes are whole path segments while listing prefixes are plain strings
/// (`data/tile` must match `data/tile07.nc`), so the listing is rooted at the last `/`
/// and the remainder is filtered per key.
fn list_root(prefix: &str) -> Option<StorePath> {
    let root = prefix.rfind('/').map_or("", |pos| &prefix[..pos]);
    (!root.is_empty()).then(|| store_path(root))
}

fn to_metadata(meta: ObjectMeta) -> ObjectMetadata {
    ObjectMetadata {
        key: meta.location.to_string(),
        size: meta.size as u64,
        last_modified: Some(meta.last_modified.to_rfc3339()),
        etag: meta.e_tag,
    }
}

/// Fill one page from `items`: at most `page_size` keys starting with `prefix`, plus
/// the marker to resume after when more remain.
fn fill_page<I>(items: I, prefix: &str, page_size: usize) -> ObjectPage
where
    I: IntoIterator<Item = ObjectMetadata>,
{
    let mut objects = Vec::new();
    let mut has_more = false;
    for object in items.into_iter().filter(|o| o.key.starts_with(prefix)) {
        if objects.len() == page_size {
            has_more = true;
            break;
        }
        objects.push(object);
    }
    let next_marker = if has_more {
        objects.last().map(|o: &ObjectMetadata| o.key.clone())
    } else {
        None
    };
    ObjectPage {
        objects,
        next_marker,
    }
}

impl ObjectIO for S3ObjectIO {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let what = format!("object s3://{bucket}/{key}");
        let store = self.store(bucket)?;
        let location = store_path(key);

        let body = self.block_on(async {
            let result = store.get(&location).await?;
            result.bytes().await
        });
        let body = body.map_err(|e| map_store_error(e, &what))?;
        debug!("fetched {what}: {} bytes", body.len());
        Ok(body.to_vec())
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<ObjectPage> {
        let what = format!("listing s3://{bucket}/{prefix}");
        let store = self.store(bucket)?;
        let root = list_root(prefix);
        let page_size = self.config.page_size.max(1) as usize;

        // One extra matching key tells us whether another page follows
        let listed = self.block_on(async {
            let mut stream = match marker {
                Some(marker) => store.list_with_offset(root.as_ref(), &store_path(marker)),
                None => store.list(root.as_ref()),
            };
            let mut matched = Vec::new();
            while let Some(meta) = stream.try_next().await? {
                let object = to_metadata(meta);
                if !object.key.starts_with(prefix) {
                    continue;
                }
                matched.push(object);
                if matched.len() > page_size {
                    break;
                }
            }
            Ok::<_, object_store::Error>(matched)
        });
        let listed = listed.map_err(|e| map_store_error(e, &what))?;

        let page = fill_page(listed, prefix, page_size);
        debug!("{what}: {} key(s) in page", page.objects.len());
        Ok(page)
    }
}
