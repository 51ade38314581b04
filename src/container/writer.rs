//! Writing containers.

use crate::codec::RecordCodec;
use crate::container::format::{
    Header, KeyClass, SYNC_ESCAPE, SYNC_INTERVAL, SyncMarker, encode_bytes_writable,
    write_text,
};
use crate::error::{Result, SeqError, from_io};
use crate::io::transports::Transports;
use crate::io::uri::SourceUri;
use log::{debug, info};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

/// Appends record-compressed records to any `Write`.
///
/// The header is written on construction. Keys are `Text` unless the writer was
/// started with [`KeyClass::Int`], in which case records are appended by index with
/// [`SequenceFileWriter::append_indexed`]. Sync escapes are inserted between records at
/// the standard interval so readers can resynchronize.
///
/// # Example
///
/// ```
/// use seqpack::codec::codec_by_name;
/// use seqpack::container::{SequenceFileReader, SequenceFileWriter};
///
/// let codec = codec_by_name("gzip")?;
/// let mut writer = SequenceFileWriter::new(Vec::new(), codec.as_ref())?;
/// writer.append("a", b"first")?;
/// writer.append("b", b"second")?;
/// let bytes = writer.finish()?;
///
/// let keys: Vec<String> = SequenceFileReader::new(bytes.as_slice())?
///     .map(|r| r.map(|record| record.key))
///     .collect::<Result<_, _>>()?;
/// assert_eq!(keys, ["a", "b"]);
/// # Ok::<(), seqpack::error::SeqError>(())
/// ```
pub struct SequenceFileWriter<'c, W: Write> {
    out: W,
    codec: &'c dyn RecordCodec,
    key_class: KeyClass,
    sync: SyncMarker,
    position: u64,
    last_sync: u64,
    records: u64,
}

impl<'c, W: Write> SequenceFileWriter<'c, W> {
    /// Start a container with a random sync marker.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the header cannot be written
    pub fn new(out: W, codec: &'c dyn RecordCodec) -> Result<Self> {
        Self::with_sync(out, codec, rand::random())
    }

    /// Start a container with a caller-chosen sync marker.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the header cannot be written
    pub fn with_sync(out: W, codec: &'c dyn RecordCodec, sync: SyncMarker) -> Result<Self> {
        Self::start(out, codec, KeyClass::Text, sync)
    }

    /// Start a container whose keys are of `key_class`, with a random sync marker.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the header cannot be written
    pub fn with_key_class(out: W, codec: &'c dyn RecordCodec, key_class: KeyClass) -> Result<Self> {
        Self::start(out, codec, key_class, rand::random())
    }

    fn start(
        mut out: W,
        codec: &'c dyn RecordCodec,
        key_class: KeyClass,
        sync: SyncMarker,
    ) -> Result<Self> {
        let position = Header::record_compressed(codec.class_name(), sync)
            .with_key_class(key_class)
            .write_to(&mut out)?;
        Ok(Self {
            out,
            codec,
            key_class,
            sync,
            position,
            last_sync: 0,
            records: 0,
        })
    }

    /// Compress and append one record with a `Text` key.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the codec fails, `CorruptContainer` if the record is too large
    /// for the format or the container is keyed by index, `Transport` if the write fails
    pub fn append(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.expect_key_class(KeyClass::Text)?;
        let mut key_bytes = Vec::with_capacity(key.len() + 5);
        write_text(&mut key_bytes, key);
        self.append_serialized(key, &key_bytes, value)
    }

    /// Compress and append one record with an `IntWritable` key.
    ///
    /// # Errors
    ///
    /// As [`SequenceFileWriter::append`]; the container must be keyed by index
    pub fn append_indexed(&mut self, index: i32, value: &[u8]) -> Result<()> {
        self.expect_key_class(KeyClass::Int)?;
        self.append_serialized(index, &index.to_be_bytes(), value)
    }

    fn expect_key_class(&self, wanted: KeyClass) -> Result<()> {
        if self.key_class == wanted {
            return Ok(());
        }
        Err(SeqError::corrupt(format!(
            "cannot append a {} key to a container keyed by {}",
            wanted.class_name(),
            self.key_class.class_name()
        )))
    }

    fn append_serialized(
        &mut self,
        key: impl fmt::Display,
        key_bytes: &[u8],
        value: &[u8],
    ) -> Result<()> {
        if self.position >= self.last_sync + SYNC_INTERVAL {
            self.write_sync()?;
        }

        let value_bytes = self.codec.compress(&encode_bytes_writable(value)?)?;

        let too_large =
            || SeqError::corrupt(format!("record {key} is too large for a container"));
        let key_len = i32::try_from(key_bytes.len()).map_err(|_| too_large())?;
        let record_len =
            i32::try_from(key_bytes.len() + value_bytes.len()).map_err(|_| too_large())?;

        let mut frame = Vec::with_capacity(8 + key_bytes.len() + value_bytes.len());
        frame.extend_from_slice(&record_len.to_be_bytes());
        frame.extend_from_slice(&key_len.to_be_bytes());
        frame.extend_from_slice(key_bytes);
        frame.extend_from_slice(&value_bytes);
        self.write_all(&frame)?;

        self.records += 1;
        debug!(
            "appended record {key}: {} -> {} bytes",
            value.len(),
            value_bytes.len()
        );
        Ok(())
    }

    fn write_sync(&mut self) -> Result<()> {
        let mut escape = [0u8; 4 + 16];
        escape[..4].copy_from_slice(&SYNC_ESCAPE.to_be_bytes());
        escape[4..].copy_from_slice(&self.sync);
        self.last_sync = self.position;
        self.write_all(&escape)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| from_io(&e, "container"))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Records appended so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Bytes written so far, header included.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Flush and hand back the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the flush fails
    pub fn finish(mut self) -> Result<W> {
        self.out.flush().map_err(|e| from_io(&e, "container"))?;
        Ok(self.out)
    }
}

/// Split text into lines on `\n`, `\r\n` or `\r`, without the terminators.
///
/// A trailing terminator does not start an extra empty line.
#[must_use]
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\n' => {
                lines.push(&data[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&data[start..i]);
                i += if data.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Encode a single-record container in memory.
///
/// # Errors
///
/// As [`SequenceFileWriter::append`]
pub fn encode_container(key: &str, payload: &[u8], codec: &dyn RecordCodec) -> Result<Vec<u8>> {
    let mut writer = SequenceFileWriter::new(Vec::new(), codec)?;
    writer.append(key, payload)?;
    writer.finish()
}

/// Writes containers to local or distributed filesystem destinations.
#[derive(Clone)]
pub struct ContainerWriter {
    transports: Transports,
}

impl ContainerWriter {
    #[must_use]
    pub fn new(transports: Transports) -> Self {
        Self { transports }
    }

    /// Create or replace the container at `destination` holding one record.
    ///
    /// Local destinations get their parent directories created. Distributed
    /// filesystem destinations are encoded in memory and uploaded with overwrite.
    ///
    /// # Errors
    ///
    /// - `UnsupportedDestination` for object store and HTTP destinations
    /// - `UnsupportedScheme` / `InvalidUri` for unparseable destinations
    /// - `Decode` if the codec fails, `Transport` if the write fails
    pub fn write(
        &self,
        destination: &str,
        key: &str,
        payload: &[u8],
        codec: &dyn RecordCodec,
    ) -> Result<()> {
        let written = self.write_with(destination, codec, KeyClass::Text, |writer| {
            writer.append(key, payload)
        })?;
        info!(
            "wrote container {destination}: key {key}, {} payload bytes, {written} bytes, codec {}",
            payload.len(),
            codec.name()
        );
        Ok(())
    }

    /// Create or replace the container at `destination` with one record per line of
    /// `text`, keyed by `IntWritable` line index starting at 0.
    ///
    /// Lines are split on `\n`, `\r\n` or `\r`; values exclude the terminator.
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// As [`ContainerWriter::write`], plus `CorruptContainer` if there are more lines
    /// than an `IntWritable` can index
    pub fn write_lines(
        &self,
        destination: &str,
        text: &[u8],
        codec: &dyn RecordCodec,
    ) -> Result<u64> {
        let lines = split_lines(text);
        let count = lines.len() as u64;
        let written = self.write_with(destination, codec, KeyClass::Int, |writer| {
            for (index, line) in lines.iter().enumerate() {
                let index = i32::try_from(index)
                    .map_err(|_| SeqError::corrupt("too many lines for IntWritable keys"))?;
                writer.append_indexed(index, line)?;
            }
            Ok(())
        })?;
        info!(
            "wrote line container {destination}: {count} record(s), {written} bytes, codec {}",
            codec.name()
        );
        Ok(count)
    }

    /// Copy a local container to a distributed filesystem path, replacing any file
    /// there, and optionally delete the local copy afterwards. Returns the bytes copied.
    ///
    /// The source must start with a valid container header; the body is copied as is.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScheme` if `from` is not a `file://` URI
    /// - `UnsupportedDestination` if `to` is not an `hdfs://` URI
    /// - `SourceNotFound` if the local file does not exist
    /// - `CorruptContainer` if it is not a container
    /// - `Transport` if the upload or the delete fails
    pub fn copy_to_dfs(&self, from: &str, to: &str, delete_source: bool) -> Result<u64> {
        let dfs_config = &self.transports.config().dfs;
        let SourceUri::LocalFile { path: local } = SourceUri::parse(from, dfs_config)? else {
            return Err(SeqError::unsupported_scheme(from).context("copy from a local file"));
        };
        let SourceUri::DistributedFs(remote) = SourceUri::parse(to, dfs_config)? else {
            return Err(SeqError::unsupported_destination(to));
        };

        let what = local.display().to_string();
        let bytes = fs::read(&local).map_err(|e| from_io(&e, &what))?;
        Header::read_from(&mut bytes.as_slice()).map_err(|e| e.context(format!("copy {from}")))?;
        self.transports
            .dfs()
            .create(&remote, &bytes, true)
            .map_err(|e| e.context(format!("copy {from} to {to}")))?;

        if delete_source {
            fs::remove_file(&local).map_err(|e| from_io(&e, &what))?;
        }
        info!(
            "copied container {from} to {to}: {} bytes{}",
            bytes.len(),
            if delete_source { ", source deleted" } else { "" }
        );
        Ok(bytes.len() as u64)
    }

    /// Open the destination, run `fill` against a fresh writer, and close it.
    /// Returns the container size in bytes.
    fn write_with<F>(
        &self,
        destination: &str,
        codec: &dyn RecordCodec,
        key_class: KeyClass,
        fill: F,
    ) -> Result<u64>
    where
        F: FnOnce(&mut SequenceFileWriter<'_, &mut dyn Write>) -> Result<()>,
    {
        let target = SourceUri::parse(destination, &self.transports.config().dfs)?;
        let in_context = |e: SeqError| e.context(format!("write {destination}"));
        match &target {
            SourceUri::ObjectStore { .. } | SourceUri::Http { .. } => {
                Err(SeqError::unsupported_destination(destination))
            }
            SourceUri::LocalFile { path } => {
                let what = path.display().to_string();
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| from_io(&e, &what))?;
                }
                let file = File::create(path).map_err(|e| from_io(&e, &what))?;
                let mut out = BufWriter::new(file);

                let sink: &mut dyn Write = &mut out;
                let mut writer = SequenceFileWriter::with_key_class(sink, codec, key_class)
                    .map_err(in_context)?;
                fill(&mut writer).map_err(in_context)?;
                let position = writer.position();
                writer.finish().map_err(in_context)?;

                let file = out
                    .into_inner()
                    .map_err(|e| in_context(from_io(e.error(), &what)))?;
                file.sync_all().map_err(|e| from_io(&e, &what))?;
                Ok(position)
            }
            SourceUri::DistributedFs(path) => {
                let mut bytes = Vec::new();
                let out: &mut dyn Write = &mut bytes;
                let mut writer = SequenceFileWriter::with_key_class(out, codec, key_class)
                    .map_err(in_context)?;
                fill(&mut writer).map_err(in_context)?;
                writer.finish().map_err(in_context)?;

                self.transports
                    .dfs()
                    .create(path, &bytes, true)
                    .map_err(in_context)?;
                Ok(bytes.len() as u64)
            }
        }
    }
}
