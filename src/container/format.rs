//! Byte-level layout of a Hadoop sequence file (version 6).
//!
//! ## Header
//!
//! ```text
//! "SEQ" 0x06
//! Text  key class name            vint length + UTF-8
//! Text  value class name
//! u8    compressed flag
//! u8    block-compressed flag
//! Text  codec class name          only when compressed
//! i32   metadata entry count      big-endian, then (Text, Text) pairs
//! [16]  sync marker
//! ```
//!
//! ## Records
//!
//! ```text
//! i32   record length             key bytes + value bytes, or -1 for a sync escape
//! i32   key length
//! key   Text serialization, or a big-endian i32 for IntWritable keys
//! value BytesWritable serialization, compressed with the header codec
//! ```
//!
//! A sync escape (`-1` followed by the 16 sync bytes) is written before a record once
//! at least [`SYNC_INTERVAL`] bytes have passed since the previous one.

use crate::error::{Result, SeqError, from_io};
use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 3] = b"SEQ";
pub const VERSION: u8 = 6;
/// Oldest version with the compressed/block flags and codec class we rely on.
pub const MIN_VERSION: u8 = 5;
pub const SYNC_SIZE: usize = 16;
pub const SYNC_ESCAPE: i32 = -1;
/// 100 sync-sized hashes plus their escapes.
pub const SYNC_INTERVAL: u64 = 100 * (SYNC_SIZE as u64 + 4);

pub const TEXT_CLASS: &str = "org.apache.hadoop.io.Text";
pub const INT_WRITABLE_CLASS: &str = "org.apache.hadoop.io.IntWritable";
pub const BYTES_WRITABLE_CLASS: &str = "org.apache.hadoop.io.BytesWritable";

pub type SyncMarker = [u8; SYNC_SIZE];

/// The key types a container can hold.
///
/// `Text` keys carry object paths and URIs. `Int` keys are record indices, used by
/// line-per-record containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyClass {
    #[default]
    Text,
    Int,
}

impl KeyClass {
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Text => TEXT_CLASS,
            Self::Int => INT_WRITABLE_CLASS,
        }
    }

    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            TEXT_CLASS => Some(Self::Text),
            INT_WRITABLE_CLASS => Some(Self::Int),
            _ => None,
        }
    }

    /// Decode a serialized key into its string form (decimal for `Int`).
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` if `buf` is not exactly one key of this class
    pub fn decode(self, buf: &[u8]) -> Result<String> {
        match self {
            Self::Text => decode_text(buf),
            Self::Int => decode_int(buf).map(|index| index.to_string()),
        }
    }
}

/// The parsed header of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub key_class: String,
    pub value_class: String,
    pub compressed: bool,
    pub block_compressed: bool,
    /// Hadoop codec class, present when `compressed` is set.
    pub codec_class: Option<String>,
    pub metadata: Vec<(String, String)>,
    pub sync: SyncMarker,
}

impl Header {
    /// Switch the key class, e.g. to `IntWritable` for indexed containers.
    #[must_use]
    pub fn with_key_class(mut self, key_class: KeyClass) -> Self {
        self.key_class = key_class.class_name().to_string();
        self
    }

    /// A record-compressed `Text -> BytesWritable` header for `codec_class`.
    #[must_use]
    pub fn record_compressed(codec_class: &str, sync: SyncMarker) -> Self {
        Self {
            version: VERSION,
            key_class: TEXT_CLASS.to_string(),
            value_class: BYTES_WRITABLE_CLASS.to_string(),
            compressed: true,
            block_compressed: false,
            codec_class: Some(codec_class.to_string()),
            metadata: Vec::new(),
            sync,
        }
    }

    /// Serialize the header; returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the underlying writer fails
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(MAGIC);
        buf.push(self.version);
        write_text(&mut buf, &self.key_class);
        write_text(&mut buf, &self.value_class);
        buf.push(u8::from(self.compressed));
        buf.push(u8::from(self.block_compressed));
        if self.compressed {
            write_text(&mut buf, self.codec_class.as_deref().unwrap_or_default());
        }
        let count = i32::try_from(self.metadata.len())
            .map_err(|_| SeqError::corrupt("too many metadata entries"))?;
        buf.extend_from_slice(&count.to_be_bytes());
        for (name, value) in &self.metadata {
            write_text(&mut buf, name);
            write_text(&mut buf, value);
        }
        buf.extend_from_slice(&self.sync);

        out.write_all(&buf)
            .map_err(|e| from_io(&e, "container header"))?;
        Ok(buf.len() as u64)
    }

    /// Parse a header from the start of a container.
    ///
    /// Only the layout is checked here; whether the classes and codec are usable is
    /// the reader's decision.
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` on bad magic, an unsupported version or truncation
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut magic = [0u8; 3];
        read_exact(input, &mut magic, "magic")?;
        if &magic != MAGIC {
            return Err(SeqError::corrupt(format!(
                "bad magic {magic:02x?}, not a sequence file"
            )));
        }
        let version = read_u8(input, "version")?;
        if !(MIN_VERSION..=VERSION).contains(&version) {
            return Err(SeqError::corrupt(format!(
                "unsupported sequence file version {version}"
            )));
        }

        let key_class = read_text(input)?;
        let value_class = read_text(input)?;
        let compressed = read_u8(input, "compressed flag")? != 0;
        let block_compressed = read_u8(input, "block flag")? != 0;
        let codec_class = if compressed {
            Some(read_text(input)?)
        } else {
            None
        };

        let mut metadata = Vec::new();
        if version >= 6 {
            let count = read_i32(input, "metadata count")?;
            if count < 0 {
                return Err(SeqError::corrupt(format!("negative metadata count {count}")));
            }
            for _ in 0..count {
                let name = read_text(input)?;
                let value = read_text(input)?;
                metadata.push((name, value));
            }
        }

        let mut sync = [0u8; SYNC_SIZE];
        read_exact(input, &mut sync, "sync marker")?;

        Ok(Self {
            version,
            key_class,
            value_class,
            compressed,
            block_compressed,
            codec_class,
            metadata,
            sync,
        })
    }
}

// ============================================================================
// Variable-length integers (Hadoop WritableUtils)
// ============================================================================

/// Append a zero-compressed vint.
///
/// Values in `-112..=127` take one byte; anything else is a length byte followed by the
/// big-endian magnitude (one's complement for negatives).
pub fn write_vint(out: &mut Vec<u8>, value: i64) {
    if (-112..=127).contains(&value) {
        out.push(value as u8);
        return;
    }

    let mut len: i64 = -112;
    let mut magnitude = value;
    if magnitude < 0 {
        magnitude ^= -1;
        len = -120;
    }
    let mut tmp = magnitude;
    while tmp != 0 {
        tmp >>= 8;
        len -= 1;
    }
    out.push(len as u8);

    let bytes = if len < -120 { -(len + 120) } else { -(len + 112) };
    for idx in (0..bytes).rev() {
        out.push(((magnitude >> (idx * 8)) & 0xff) as u8);
    }
}

/// Total encoded size (length byte included) implied by a vint's first byte.
#[must_use]
pub fn vint_size(first: i8) -> usize {
    if first >= -112 {
        1
    } else if first < -120 {
        (-119 - i32::from(first)) as usize
    } else {
        (-111 - i32::from(first)) as usize
    }
}

fn vint_negative(first: i8) -> bool {
    first < -120 || (-112..0).contains(&first)
}

/// Read one vint.
///
/// # Errors
///
/// Returns `CorruptContainer` if the input ends mid-value
pub fn read_vint<R: Read>(input: &mut R) -> Result<i64> {
    let first = read_u8(input, "vint")? as i8;
    let size = vint_size(first);
    if size == 1 {
        return Ok(i64::from(first));
    }

    let mut value: i64 = 0;
    for _ in 0..size - 1 {
        value = (value << 8) | i64::from(read_u8(input, "vint")?);
    }
    Ok(if vint_negative(first) { value ^ -1 } else { value })
}

// ============================================================================
// Text and BytesWritable
// ============================================================================

/// Append a Hadoop `Text`: vint byte length then UTF-8.
pub fn write_text(out: &mut Vec<u8>, text: &str) {
    write_vint(out, text.len() as i64);
    out.extend_from_slice(text.as_bytes());
}

/// Read a Hadoop `Text`.
///
/// # Errors
///
/// Returns `CorruptContainer` on a negative length, truncation or invalid UTF-8
pub fn read_text<R: Read>(input: &mut R) -> Result<String> {
    let len = read_vint(input)?;
    let len = usize::try_from(len)
        .map_err(|_| SeqError::corrupt(format!("negative text length {len}")))?;
    let mut bytes = Vec::new();
    read_exact_vec(input, &mut bytes, len, "text")?;
    String::from_utf8(bytes)
        .map_err(|e| SeqError::corrupt("text is not UTF-8").with_source(e.to_string()))
}

/// Decode a serialized key buffer that must hold exactly one `Text`.
///
/// # Errors
///
/// Returns `CorruptContainer` if the buffer is not a single well-formed `Text`
pub fn decode_text(buf: &[u8]) -> Result<String> {
    let mut cursor = io::Cursor::new(buf);
    let text = read_text(&mut cursor)?;
    if cursor.position() != buf.len() as u64 {
        return Err(SeqError::corrupt("key length disagrees with its text length"));
    }
    Ok(text)
}

/// Decode a serialized `IntWritable`: exactly four big-endian bytes.
///
/// # Errors
///
/// Returns `CorruptContainer` for any other length
pub fn decode_int(buf: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = buf.try_into().map_err(|_| {
        SeqError::corrupt(format!("IntWritable key of {} bytes, expected 4", buf.len()))
    })?;
    Ok(i32::from_be_bytes(bytes))
}

/// `BytesWritable` serialization: big-endian i32 length then the bytes.
///
/// # Errors
///
/// Returns `CorruptContainer` if the payload exceeds `i32::MAX` bytes
pub fn encode_bytes_writable(payload: &[u8]) -> Result<Vec<u8>> {
    let len = i32::try_from(payload.len())
        .map_err(|_| SeqError::corrupt(format!("payload of {} bytes is too large", payload.len())))?;
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Inverse of [`encode_bytes_writable`]; the length prefix must match exactly.
///
/// # Errors
///
/// Returns `CorruptContainer` if the length prefix is missing or wrong
pub fn decode_bytes_writable(mut buf: Vec<u8>) -> Result<Vec<u8>> {
    if buf.len() < 4 {
        return Err(SeqError::corrupt("value shorter than its length prefix"));
    }
    let len = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if usize::try_from(len).ok() != Some(buf.len() - 4) {
        return Err(SeqError::corrupt(format!(
            "value length prefix {len} does not match {} payload bytes",
            buf.len() - 4
        )));
    }
    buf.drain(..4);
    Ok(buf)
}

// ============================================================================
// Primitive reads
// ============================================================================

fn io_error(err: &io::Error, what: &str) -> SeqError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SeqError::corrupt(format!("truncated container while reading {what}"))
    } else {
        from_io(err, "container")
    }
}

pub(crate) fn read_exact<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| io_error(&e, what))
}

/// Read exactly `len` bytes into `buf` without trusting `len` for the allocation.
pub(crate) fn read_exact_vec<R: Read>(
    input: &mut R,
    buf: &mut Vec<u8>,
    len: usize,
    what: &str,
) -> Result<()> {
    buf.clear();
    let read = input
        .by_ref()
        .take(len as u64)
        .read_to_end(buf)
        .map_err(|e| io_error(&e, what))?;
    if read != len {
        return Err(SeqError::corrupt(format!(
            "truncated container while reading {what}"
        )));
    }
    Ok(())
}

pub(crate) fn read_u8<R: Read>(input: &mut R, what: &str) -> Result<u8> {
    let mut byte = [0u8; 1];
    read_exact(input, &mut byte, what)?;
    Ok(byte[0])
}

pub(crate) fn read_i32<R: Read>(input: &mut R, what: &str) -> Result<i32> {
    let mut bytes = [0u8; 4];
    read_exact(input, &mut bytes, what)?;
    Ok(i32::from_be_bytes(bytes))
}

/// Like [`read_i32`], but a clean end of input before the first byte is `None`.
pub(crate) fn read_i32_or_eof<R: Read>(input: &mut R, what: &str) -> Result<Option<i32>> {
    let mut bytes = [0u8; 4];
    let mut filled = 0;
    while filled < bytes.len() {
        match input.read(&mut bytes[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(SeqError::corrupt(format!(
                    "truncated container while reading {what}"
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(io_error(&e, what)),
        }
    }
    Ok(Some(i32::from_be_bytes(bytes)))
}
