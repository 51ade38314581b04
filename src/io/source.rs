//! Fetching a single object as a [`Record`].
//!
//! The resolver dispatches on the URI scheme to the matching transport, then applies
//! the inbound decompression policy: objects whose name ends in one of
//! `InboundConfig::decompress_extensions` are decoded before they become the record
//! value. The policy is the same for every scheme.

use crate::container::Record;
use crate::error::{Result, SeqError, from_io};
use crate::io::compression::detect_from_extension;
use crate::io::transports::Transports;
use crate::io::uri::SourceUri;
use log::{debug, warn};
use std::fs;

#[derive(Clone)]
pub struct SourceResolver {
    transports: Transports,
}

impl SourceResolver {
    #[must_use]
    pub fn new(transports: Transports) -> Self {
        Self { transports }
    }

    #[must_use]
    pub fn transports(&self) -> &Transports {
        &self.transports
    }

    /// Fetch `uri` as a record.
    ///
    /// The key is the absolute path for local files and the URI as given for every
    /// other scheme.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScheme` / `InvalidUri` if the URI cannot be parsed
    /// - `SourceNotFound` if the object does not exist
    /// - `Transport` if the storage system fails
    /// - `Decode` if inbound decompression fails
    pub fn fetch(&self, uri: &str) -> Result<Record> {
        let source = SourceUri::parse(uri, &self.transports.config().dfs)?;
        let raw = self.fetch_raw_source(&source, uri)?;
        let raw_len = raw.len();
        let value = self
            .inbound_decode(&source, raw)
            .map_err(|e| e.context(format!("fetch {uri}")))?;

        let key = match &source {
            SourceUri::LocalFile { path } => path.display().to_string(),
            _ => uri.to_string(),
        };
        debug!(
            "fetched {} source {uri}: {raw_len} bytes, {} after inbound decoding",
            source.scheme(),
            value.len()
        );
        Ok(Record::new(key, value))
    }

    /// Fetch the bytes at `uri` exactly as stored, without inbound decompression.
    ///
    /// # Errors
    ///
    /// As [`SourceResolver::fetch`], minus `Decode`
    pub fn fetch_raw(&self, uri: &str) -> Result<Vec<u8>> {
        let source = SourceUri::parse(uri, &self.transports.config().dfs)?;
        self.fetch_raw_source(&source, uri)
    }

    pub(crate) fn fetch_raw_source(&self, source: &SourceUri, uri: &str) -> Result<Vec<u8>> {
        let bytes = match source {
            SourceUri::LocalFile { path } => {
                fs::read(path).map_err(|e| from_io(&e, &path.display().to_string()))
            }
            SourceUri::DistributedFs(path) => self.transports.dfs().open(path),
            SourceUri::ObjectStore { bucket, key } => {
                if key.is_empty() || key.ends_with('/') {
                    return Err(SeqError::invalid_uri(uri, "no object key"));
                }
                self.transports.object_store().get_object(bucket, key)
            }
            SourceUri::Http { url } => self.transports.http().get(url),
        };
        bytes.map_err(|e| e.context(format!("fetch {uri}")))
    }

    fn inbound_decode(&self, source: &SourceUri, raw: Vec<u8>) -> Result<Vec<u8>> {
        let Some(name) = source.file_name() else {
            return Ok(raw);
        };
        if !self.transports.config().inbound.should_decompress(&name) {
            return Ok(raw);
        }
        match detect_from_extension(&name) {
            Some(codec) => {
                debug!("decoding {name} as {}", codec.name());
                codec.decode(&raw)
            }
            None => {
                warn!("no inbound decoder for {name}; storing it as is");
                Ok(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::error::ErrorKind;
    use crate::io::cloud::fake::{FakeDistributedFsIO, FakeHttpIO, FakeObjectIO};
    use crate::io::cloud::traits::DfsPath;
    use bzip2::Compression;
    use bzip2::write::BzEncoder;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn local_file_key_is_absolute_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("passwd");
        fs::write(&path, b"root:x:0:0").unwrap();

        let resolver = SourceResolver::new(Transports::offline());
        let record = resolver.fetch(&format!("file://{}", path.display())).unwrap();
        assert_eq!(record.key, path.display().to_string());
        assert_eq!(record.value, b"root:x:0:0");
    }

    #[test]
    fn bz2_sources_are_decompressed_on_every_scheme() {
        let packed = bzip2(b"P6 image bytes");
        let store = FakeObjectIO::new();
        store.put_object("bkt", "img/photo.ppm.bz2", &packed);
        let dfs = FakeDistributedFsIO::new();
        dfs.put_file(&DfsPath::new("nn:8020", "/img/photo.ppm.bz2"), &packed);
        let http = FakeHttpIO::new();
        http.insert("http://host/photo.ppm.bz2", &packed);

        let transports = Transports::offline()
            .with_object_store(Arc::new(store))
            .with_dfs(Arc::new(dfs))
            .with_http(Arc::new(http));
        let resolver = SourceResolver::new(transports);

        for uri in [
            "s3://bkt/img/photo.ppm.bz2",
            "hdfs://nn:8020/img/photo.ppm.bz2",
            "http://host/photo.ppm.bz2",
        ] {
            let record = resolver.fetch(uri).unwrap();
            assert_eq!(record.key, uri);
            assert_eq!(record.value, b"P6 image bytes", "{uri}");
            assert_eq!(resolver.fetch_raw(uri).unwrap(), packed);
        }
    }

    #[test]
    fn local_bz2_file_is_decompressed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image.ppm.bz2");
        let image: Vec<u8> = b"P6\n2 2\n255\n".iter().copied().chain([9u8; 12]).collect();
        fs::write(&path, bzip2(&image)).unwrap();

        let uri = format!("file://{}", path.display());
        let resolver = SourceResolver::new(Transports::offline());
        let record = resolver.fetch(&uri).unwrap();
        assert_eq!(record.key, path.display().to_string());
        assert_eq!(record.value, image);
        assert_eq!(resolver.fetch_raw(&uri).unwrap(), bzip2(&image));
    }

    #[test]
    fn bz2_body_without_signature_is_restored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stripped.bz2");
        let packed = bzip2(b"signature was stripped upstream");
        assert_eq!(&packed[..3], b"BZh");
        fs::write(&path, &packed[2..]).unwrap();

        let record = SourceResolver::new(Transports::offline())
            .fetch(&format!("file://{}", path.display()))
            .unwrap();
        assert_eq!(record.value, b"signature was stripped upstream");
    }

    #[test]
    fn unlisted_extensions_pass_through() {
        let store = FakeObjectIO::new();
        store.put_object("bkt", "a.gz", b"not really gzip");
        let resolver = SourceResolver::new(Transports::offline().with_object_store(Arc::new(store)));
        assert_eq!(resolver.fetch("s3://bkt/a.gz").unwrap().value, b"not really gzip");
    }

    #[test]
    fn configured_extensions_are_honoured() {
        let mut config = IngestConfig::default();
        config.inbound.decompress_extensions = vec!["gz".into()];
        let store = FakeObjectIO::new();
        store.put_object("bkt", "a.gz", b"not really gzip");
        let transports = Transports::in_memory(config).with_object_store(Arc::new(store));
        let err = SourceResolver::new(transports).fetch("s3://bkt/a.gz").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert!(err.message.contains("s3://bkt/a.gz"));
    }

    #[test]
    fn malformed_bz2_is_a_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.bz2");
        fs::write(&path, b"definitely not bzip2").unwrap();
        let err = SourceResolver::new(Transports::offline())
            .fetch(&format!("file://{}", path.display()))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[test]
    fn failures_are_classified() {
        let resolver = SourceResolver::new(Transports::offline());
        assert_eq!(
            resolver.fetch("ftp://host/x").unwrap_err().kind,
            ErrorKind::UnsupportedScheme
        );
        assert_eq!(
            resolver.fetch("s3://").unwrap_err().kind,
            ErrorKind::InvalidUri
        );
        assert_eq!(
            resolver.fetch("s3://bkt/").unwrap_err().kind,
            ErrorKind::InvalidUri
        );
        assert_eq!(
            resolver.fetch("file:///definitely/not/here").unwrap_err().kind,
            ErrorKind::SourceNotFound
        );
        assert_eq!(
            resolver.fetch("http://host/missing").unwrap_err().kind,
            ErrorKind::SourceNotFound
        );
    }
}
