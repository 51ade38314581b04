//! Packing sources into containers: fetch, then write one container per source.
//!
//! ## Single source
//!
//! `pack("file:///etc/passwd", "file:///tmp/passwd.seq", codec)` writes one container
//! holding one record.
//!
//! ## Wildcards
//!
//! An input whose path contains `*` or `?` is a pattern. HTTP inputs are never
//! patterns, so a query string such as `?sig=...` is sent as is. The static prefix before the first
//! wildcard is listed (for directory-based schemes, its parent directory), entries are
//! kept when their path matches the whole pattern, and each match is written to
//! `<output>/<file name>.seq`. A trailing `*.ext` narrows the listing to that
//! extension up front.
//!
//! ## Line mode
//!
//! [`Packer::pack_lines`] splits each decoded source into lines and writes one record
//! per line, keyed by its `IntWritable` index from 0.
//!
//! Processing stops at the first failing source; the error names it.

use crate::codec::RecordCodec;
use crate::container::ContainerWriter;
use crate::error::{ErrorKind, Result, ResultExt, SeqError};
use crate::io::cloud::helpers::{
    extract_prefix_before_wildcard, glob_to_regex, has_wildcard, trailing_extension,
};
use crate::io::listing::SourceLister;
use crate::io::source::SourceResolver;
use crate::io::transports::Transports;
use crate::io::uri::SourceUri;
use log::info;
use regex::Regex;

/// One container written by [`Packer::pack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    pub source: String,
    pub destination: String,
    /// Payload size after inbound decoding, before the record codec.
    pub payload_bytes: usize,
    pub records: u64,
}

/// How a fetched source becomes records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// One record keyed by the source.
    Whole,
    /// One record per line, keyed by line index.
    Lines,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub entries: Vec<PackedEntry>,
}

impl PackSummary {
    #[must_use]
    pub fn total_payload_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.payload_bytes).sum()
    }
}

/// Ties the resolver, lister and writer together over one set of transports.
#[derive(Clone)]
pub struct Packer {
    transports: Transports,
    resolver: SourceResolver,
    lister: SourceLister,
    writer: ContainerWriter,
}

impl Packer {
    #[must_use]
    pub fn new(transports: Transports) -> Self {
        Self {
            resolver: SourceResolver::new(transports.clone()),
            lister: SourceLister::new(transports.clone()),
            writer: ContainerWriter::new(transports.clone()),
            transports,
        }
    }

    /// Pack `input` (a URI or a wildcard pattern) into containers under `output`.
    ///
    /// # Errors
    ///
    /// The first error from listing, fetching or writing, with the failing URI in its
    /// message
    pub fn pack(&self, input: &str, output: &str, codec: &dyn RecordCodec) -> Result<PackSummary> {
        self.pack_as(input, output, codec, Layout::Whole)
    }

    /// As [`Packer::pack`], but each container holds one record per line of its source.
    ///
    /// # Errors
    ///
    /// As [`Packer::pack`]
    pub fn pack_lines(
        &self,
        input: &str,
        output: &str,
        codec: &dyn RecordCodec,
    ) -> Result<PackSummary> {
        self.pack_as(input, output, codec, Layout::Lines)
    }

    fn pack_as(
        &self,
        input: &str,
        output: &str,
        codec: &dyn RecordCodec,
        layout: Layout,
    ) -> Result<PackSummary> {
        let mut summary = PackSummary::default();

        let parsed = SourceUri::parse(input, &self.transports.config().dfs)?;
        let is_pattern =
            !matches!(parsed, SourceUri::Http { .. }) && has_wildcard(&parsed.path_part());
        if !is_pattern {
            summary.entries.push(self.pack_one(input, output, codec, layout)?);
            return Ok(summary);
        }

        let sources = self.expand(input)?;
        info!("{input}: {} source(s) matched", sources.len());
        let out_dir = output.trim_end_matches('/');
        for source in sources {
            let parsed = SourceUri::parse(&source, &self.transports.config().dfs)?;
            let name = parsed
                .file_name()
                .ok_or_else(|| SeqError::invalid_uri(&source, "no file name"))?;
            let destination = format!("{out_dir}/{name}.seq");
            summary
                .entries
                .push(self.pack_one(&source, &destination, codec, layout)?);
        }
        Ok(summary)
    }

    fn pack_one(
        &self,
        source: &str,
        destination: &str,
        codec: &dyn RecordCodec,
        layout: Layout,
    ) -> Result<PackedEntry> {
        let record = self.resolver.fetch(source)?;
        let records = match layout {
            Layout::Whole => self
                .writer
                .write(destination, &record.key, &record.value, codec)
                .map(|()| 1),
            Layout::Lines => self.writer.write_lines(destination, &record.value, codec),
        }
        .map_err(|e| e.context(format!("packing {source}")))?;
        Ok(PackedEntry {
            source: source.to_string(),
            destination: destination.to_string(),
            payload_bytes: record.value.len(),
            records,
        })
    }

    /// Resolve a wildcard pattern to the canonical URIs it matches, in listing order.
    ///
    /// # Errors
    ///
    /// Listing errors, or `InvalidUri` if the pattern cannot be compiled
    pub fn expand(&self, pattern: &str) -> Result<Vec<String>> {
        let dfs = &self.transports.config().dfs;
        let parsed = SourceUri::parse(pattern, dfs)?;
        let static_prefix = extract_prefix_before_wildcard(pattern);

        let list_prefix = match &parsed {
            SourceUri::ObjectStore { .. } => static_prefix,
            _ => match static_prefix.rfind('/') {
                Some(pos) => &static_prefix[..=pos],
                None => static_prefix,
            },
        };
        let extension = trailing_extension(pattern).unwrap_or_default();

        let matcher = Regex::new(&glob_to_regex(&parsed.path_part()))
            .context_kind(ErrorKind::InvalidUri, || format!("bad pattern {pattern}"))?;

        let mut matches = Vec::new();
        for candidate in self.lister.list(list_prefix, extension)? {
            let path = SourceUri::parse(&candidate, dfs)?.path_part();
            if matcher.is_match(&path) {
                matches.push(candidate);
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::codec_by_name;
    use crate::container::ContainerReader;
    use crate::io::cloud::fake::{FakeHttpIO, FakeObjectIO};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn wildcard_over_object_store_writes_one_container_per_match() {
        let store = FakeObjectIO::with_page_size(2);
        store.put_object("bkt", "nex/2006/a.nc", b"aaa");
        store.put_object("bkt", "nex/2006/b.nc", b"bb");
        store.put_object("bkt", "nex/2006/c.txt", b"c");
        store.put_object("bkt", "nex/2007/d.nc", b"d");
        store.put_object("bkt", "nex/2006/deeper/e.nc", b"e");
        let transports = Transports::offline().with_object_store(Arc::new(store));

        let tmp = TempDir::new().unwrap();
        let out = format!("file://{}/out", tmp.path().display());
        let packer = Packer::new(transports.clone());
        let codec = codec_by_name("snappy").unwrap();
        let summary = packer
            .pack("s3://bkt/nex/2006/*.nc", &out, codec.as_ref())
            .unwrap();

        let sources: Vec<_> = summary.entries.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["s3://bkt/nex/2006/a.nc", "s3://bkt/nex/2006/b.nc"]);
        assert_eq!(summary.total_payload_bytes(), 5);

        let reader = ContainerReader::new(transports);
        let contents = reader.read_all(&format!("{out}/a.nc.seq")).unwrap();
        assert_eq!(contents.get("s3://bkt/nex/2006/a.nc").map(Vec::as_slice), Some(&b"aaa"[..]));
    }

    #[test]
    fn single_input_goes_to_output_as_is() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("notes.txt");
        std::fs::write(&src, b"hello").unwrap();
        let dest = format!("file://{}/nested/notes.seq", tmp.path().display());

        let packer = Packer::new(Transports::offline());
        let codec = codec_by_name("default").unwrap();
        let summary = packer
            .pack(&format!("file://{}", src.display()), &dest, codec.as_ref())
            .unwrap();
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].destination, dest);

        let keys = ContainerReader::new(Transports::offline()).list_keys(&dest).unwrap();
        assert_eq!(keys, vec![src.display().to_string()]);
    }

    #[test]
    fn http_query_string_is_not_a_wildcard() {
        let url = "https://host/data/file.bin?sig=abc";
        let http = FakeHttpIO::new();
        http.insert(url, b"signed body");
        let transports = Transports::offline().with_http(Arc::new(http));

        let tmp = TempDir::new().unwrap();
        let dest = format!("file://{}/file.seq", tmp.path().display());
        let codec = codec_by_name("gzip").unwrap();
        let summary = Packer::new(transports.clone())
            .pack(url, &dest, codec.as_ref())
            .unwrap();
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].source, url);

        let contents = ContainerReader::new(transports).read_all(&dest).unwrap();
        assert_eq!(contents.get(url).map(Vec::as_slice), Some(&b"signed body"[..]));
    }

    #[test]
    fn wildcard_is_only_looked_for_in_the_path() {
        let store = FakeObjectIO::new();
        store.put_object("bkt", "in/a.nc", b"a");
        let packer = Packer::new(Transports::offline().with_object_store(Arc::new(store)));
        assert_eq!(packer.expand("s3://bkt/in/?.nc").unwrap(), vec!["s3://bkt/in/a.nc"]);

        let tmp = TempDir::new().unwrap();
        let dest = format!("file://{}/a.seq", tmp.path().display());
        let codec = codec_by_name("default").unwrap();
        let summary = packer.pack("s3://bkt/in/a.nc", &dest, codec.as_ref()).unwrap();
        assert_eq!(summary.entries[0].destination, dest);
    }

    #[test]
    fn first_failure_stops_the_run() {
        let packer = Packer::new(Transports::offline());
        let codec = codec_by_name("default").unwrap();
        let err = packer
            .pack("file:///definitely/missing/*.nc", "file:///tmp/unused", codec.as_ref())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SourceNotFound);
    }

    #[test]
    fn lines_become_indexed_records() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("events.log");
        std::fs::write(&src, b"start\nmiddle\r\nend\n").unwrap();
        let dest = format!("file://{}/events.seq", tmp.path().display());

        let transports = Transports::offline();
        let codec = codec_by_name("gzip").unwrap();
        let summary = Packer::new(transports.clone())
            .pack_lines(&format!("file://{}", src.display()), &dest, codec.as_ref())
            .unwrap();
        assert_eq!(summary.entries[0].records, 3);

        let records = ContainerReader::new(transports).read_records(&dest).unwrap();
        let keys: Vec<_> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["0", "1", "2"]);
        assert_eq!(records[1].value, b"middle");
    }
}
