//! The bundle of transport clients shared by the resolver, lister, writer and reader.

use crate::config::IngestConfig;
use crate::io::cloud::fake::{FakeDistributedFsIO, FakeHttpIO, FakeObjectIO};
use crate::io::cloud::traits::{DistributedFsIO, HttpIO, ObjectIO};
use std::sync::Arc;

#[cfg(feature = "network")]
use crate::error::Result;
#[cfg(feature = "network")]
use crate::io::cloud::traits::CloudCredentials;

/// One client per storage system plus the config they were built from.
///
/// Cloning is cheap; every clone shares the same clients.
#[derive(Clone)]
pub struct Transports {
    config: Arc<IngestConfig>,
    object_store: Arc<dyn ObjectIO>,
    dfs: Arc<dyn DistributedFsIO>,
    http: Arc<dyn HttpIO>,
}

impl Transports {
    pub fn new(
        config: IngestConfig,
        object_store: Arc<dyn ObjectIO>,
        dfs: Arc<dyn DistributedFsIO>,
        http: Arc<dyn HttpIO>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            object_store,
            dfs,
            http,
        }
    }

    /// Fresh, empty in-memory fakes for every remote transport. Local files are still
    /// read from disk.
    #[must_use]
    pub fn in_memory(config: IngestConfig) -> Self {
        Self::new(
            config,
            Arc::new(FakeObjectIO::new()),
            Arc::new(FakeDistributedFsIO::new()),
            Arc::new(FakeHttpIO::new()),
        )
    }

    /// [`Transports::in_memory`] with the default configuration.
    ///
    /// Only `file://` URIs reach real storage. Every `s3://`, `hdfs://` and `http(s)://`
    /// URI is served by an empty fake and fails with `SourceNotFound` until the fake is
    /// replaced ([`Transports::with_object_store`] and friends) or populated. Use
    /// [`Transports::connect`] for real network access.
    #[must_use]
    pub fn offline() -> Self {
        Self::in_memory(IngestConfig::default())
    }

    /// Real network clients: S3 REST, WebHDFS and plain HTTP.
    ///
    /// Object store requests are signed when `credentials` is given and anonymous
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if a client cannot be built or the credentials are invalid
    #[cfg(feature = "network")]
    pub fn connect(
        config: IngestConfig,
        credentials: Option<Arc<dyn CloudCredentials>>,
    ) -> Result<Self> {
        use crate::io::cloud::http::ReqwestHttpIO;
        use crate::io::cloud::s3::S3ObjectIO;
        use crate::io::cloud::webhdfs::WebHdfsIO;

        if let Some(creds) = &credentials {
            creds.validate()?;
        }
        let object_store = S3ObjectIO::new(&config.object_store, credentials)?;
        let dfs = WebHdfsIO::new(&config.dfs)?;
        let http = ReqwestHttpIO::new(&config.http)?;
        Ok(Self::new(
            config,
            Arc::new(object_store),
            Arc::new(dfs),
            Arc::new(http),
        ))
    }

    #[must_use]
    pub fn with_object_store(mut self, object_store: Arc<dyn ObjectIO>) -> Self {
        self.object_store = object_store;
        self
    }

    #[must_use]
    pub fn with_dfs(mut self, dfs: Arc<dyn DistributedFsIO>) -> Self {
        self.dfs = dfs;
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpIO>) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    #[must_use]
    pub fn object_store(&self) -> &dyn ObjectIO {
        self.object_store.as_ref()
    }

    #[must_use]
    pub fn dfs(&self) -> &dyn DistributedFsIO {
        self.dfs.as_ref()
    }

    #[must_use]
    pub fn http(&self) -> &dyn HttpIO {
        self.http.as_ref()
    }
}
