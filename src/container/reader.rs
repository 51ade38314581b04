//! Reading containers.

use crate::codec::{CodecRegistry, RecordCodec};
use crate::container::Record;
use crate::container::format::{
    BYTES_WRITABLE_CLASS, Header, KeyClass, SYNC_ESCAPE, SYNC_SIZE, decode_bytes_writable,
    read_exact, read_exact_vec, read_i32, read_i32_or_eof,
};
use crate::error::{Result, SeqError, from_io};
use crate::io::source::SourceResolver;
use crate::io::transports::Transports;
use crate::io::uri::SourceUri;
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::sync::Arc;

/// Iterates the records of a container from any `Read`.
///
/// The header is parsed and validated on construction: keys must be `Text` or
/// `IntWritable` and values `BytesWritable`, the body must not be block-compressed, and the codec
/// class must be known to the registry. A container that fails any of these checks
/// yields no records at all. `IntWritable` keys are reported in decimal.
pub struct SequenceFileReader<R: Read> {
    input: R,
    header: Header,
    key_class: KeyClass,
    codec: Option<Arc<dyn RecordCodec>>,
    done: bool,
}

impl<R: Read> SequenceFileReader<R> {
    /// Open with the process-wide codec registry.
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` for a malformed or unsupported header and
    /// `UnsupportedCodec` for an unknown codec class
    pub fn new(input: R) -> Result<Self> {
        Self::with_registry(input, CodecRegistry::global())
    }

    /// Open, resolving the header codec through `registry`.
    ///
    /// # Errors
    ///
    /// As [`SequenceFileReader::new`]
    pub fn with_registry(mut input: R, registry: &CodecRegistry) -> Result<Self> {
        let header = Header::read_from(&mut input)?;
        let key_class = KeyClass::from_class_name(&header.key_class)
            .filter(|_| header.value_class == BYTES_WRITABLE_CLASS)
            .ok_or_else(|| {
                SeqError::corrupt(format!(
                    "expected Text or IntWritable keys with {BYTES_WRITABLE_CLASS} values, \
                     found {} -> {}",
                    header.key_class, header.value_class
                ))
            })?;
        if header.block_compressed {
            return Err(SeqError::corrupt("block-compressed containers are not supported"));
        }
        let codec = match header.codec_class.as_deref() {
            Some(class) if header.compressed => Some(registry.get(class)?),
            _ => None,
        };

        Ok(Self {
            input,
            header,
            key_class,
            codec,
            done: false,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Next key, skipping the value without decompressing it.
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` on truncation or a bad sync marker
    pub fn next_key(&mut self) -> Result<Option<String>> {
        let Some((key, value_len)) = self.next_entry()? else {
            return Ok(None);
        };
        let skipped = io::copy(&mut self.input.by_ref().take(value_len), &mut io::sink())
            .map_err(|e| from_io(&e, "container"))?;
        if skipped != value_len {
            return Err(SeqError::corrupt(format!("truncated value for key {key}")));
        }
        Ok(Some(key))
    }

    /// Next record with its value decompressed.
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` on truncation or a bad sync marker, `Decode` if the
    /// codec rejects the value
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let Some((key, value_len)) = self.next_entry()? else {
            return Ok(None);
        };
        let mut raw = Vec::new();
        let len = usize::try_from(value_len)
            .map_err(|_| SeqError::corrupt(format!("value for {key} is too large")))?;
        read_exact_vec(&mut self.input, &mut raw, len, "record value")?;

        let serialized = match &self.codec {
            Some(codec) => codec
                .decompress(&raw)
                .map_err(|e| e.context(format!("record {key}")))?,
            None => raw,
        };
        let value = decode_bytes_writable(serialized)?;
        debug!("read record {key}: {} bytes", value.len());
        Ok(Some(Record::new(key, value)))
    }

    /// Read up to and including the key of the next record, consuming any sync escapes.
    /// Returns the key and the length of the value that follows.
    fn next_entry(&mut self) -> Result<Option<(String, u64)>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let Some(record_len) = read_i32_or_eof(&mut self.input, "record length")? else {
                self.done = true;
                return Ok(None);
            };
            if record_len == SYNC_ESCAPE {
                let mut sync = [0u8; SYNC_SIZE];
                read_exact(&mut self.input, &mut sync, "sync marker")?;
                if sync != self.header.sync {
                    return Err(SeqError::corrupt("sync marker does not match the header"));
                }
                continue;
            }

            let key_len = read_i32(&mut self.input, "key length")?;
            if key_len < 1 || record_len < key_len {
                return Err(SeqError::corrupt(format!(
                    "bad record framing: record length {record_len}, key length {key_len}"
                )));
            }
            let mut key_buf = Vec::new();
            read_exact_vec(&mut self.input, &mut key_buf, key_len as usize, "record key")?;
            let key = self.key_class.decode(&key_buf)?;
            return Ok(Some((key, u64::from((record_len - key_len).unsigned_abs()))));
        }
    }
}

impl<R: Read> Iterator for SequenceFileReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Reads containers from any readable URI.
///
/// Local containers are streamed from disk; containers on other storage systems are
/// fetched whole through the [`SourceResolver`] (without inbound decompression).
#[derive(Clone)]
pub struct ContainerReader {
    resolver: SourceResolver,
}

impl ContainerReader {
    #[must_use]
    pub fn new(transports: Transports) -> Self {
        Self {
            resolver: SourceResolver::new(transports),
        }
    }

    /// Open a container for record-by-record reading.
    ///
    /// # Errors
    ///
    /// Returns `SourceNotFound` / `Transport` if the container cannot be fetched, plus
    /// any header error of [`SequenceFileReader::new`]
    pub fn open(&self, uri: &str) -> Result<SequenceFileReader<Box<dyn Read>>> {
        let source = SourceUri::parse(uri, &self.resolver.transports().config().dfs)?;
        let input: Box<dyn Read> = match &source {
            SourceUri::LocalFile { path } => {
                let file =
                    File::open(path).map_err(|e| from_io(&e, &path.display().to_string()))?;
                Box::new(BufReader::new(file))
            }
            _ => Box::new(Cursor::new(self.resolver.fetch_raw_source(&source, uri)?)),
        };
        SequenceFileReader::new(input).map_err(|e| e.context(format!("read {uri}")))
    }

    /// Keys in storage order. Values are skipped without decompression.
    ///
    /// # Errors
    ///
    /// As [`ContainerReader::open`], plus `CorruptContainer` on a damaged body
    pub fn list_keys(&self, uri: &str) -> Result<Vec<String>> {
        let mut reader = self.open(uri)?;
        let mut keys = Vec::new();
        while let Some(key) = reader
            .next_key()
            .map_err(|e| e.context(format!("read {uri}")))?
        {
            keys.push(key);
        }
        Ok(keys)
    }

    /// Every record, decompressed, in storage order (duplicates kept).
    ///
    /// # Errors
    ///
    /// As [`ContainerReader::open`], plus `CorruptContainer` / `Decode` on a damaged body
    pub fn read_records(&self, uri: &str) -> Result<Vec<Record>> {
        self.open(uri)?
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.context(format!("read {uri}")))
    }

    /// Key to value map. Records are applied in storage order, so for a duplicated key
    /// the last record wins.
    ///
    /// # Errors
    ///
    /// As [`ContainerReader::read_records`]
    pub fn read_all(&self, uri: &str) -> Result<HashMap<String, Vec<u8>>> {
        let mut map = HashMap::new();
        for record in self.open(uri)? {
            let record = record.map_err(|e| e.context(format!("read {uri}")))?;
            map.insert(record.key, record.value);
        }
        Ok(map)
    }

    /// The parsed header.
    ///
    /// # Errors
    ///
    /// As [`ContainerReader::open`]
    pub fn header(&self, uri: &str) -> Result<Header> {
        Ok(self.open(uri)?.header().clone())
    }
}
