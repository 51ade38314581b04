//! Record codecs: the compression applied to every value stored in a container.
//!
//! A container declares exactly one codec in its header and every record value is
//! compressed with it independently (record-level granularity). Codecs are looked up
//! by short name (`"gzip"`) or by the Hadoop class name stored in the header
//! (`"org.apache.hadoop.io.compress.GzipCodec"`).
//!
//! ## Built-in Codecs
//!
//! | name      | aliases | format                                  |
//! |-----------|---------|-----------------------------------------|
//! | `default` | `zlib`  | zlib stream (`flate2`)                  |
//! | `gzip`    | `gz`    | gzip member (`flate2`)                  |
//! | `bzip2`   | `bz2`   | bzip2 stream (`bzip2`)                  |
//! | `snappy`  |         | Hadoop block framing around raw `snap`  |
//! | `lz4`     |         | Hadoop block framing around `lz4_flex`  |
//!
//! For every codec `decompress(compress(x)) == x`, including the empty input.
//!
//! ## Custom Codecs
//!
//! ```
//! use seqpack::codec::{CodecRegistry, RecordCodec};
//! use seqpack::error::Result;
//! use std::sync::Arc;
//!
//! struct Identity;
//!
//! impl RecordCodec for Identity {
//!     fn name(&self) -> &str { "identity" }
//!     fn class_name(&self) -> &str { "com.example.IdentityCodec" }
//!     fn compress(&self, data: &[u8]) -> Result<Vec<u8>> { Ok(data.to_vec()) }
//!     fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> { Ok(data.to_vec()) }
//! }
//!
//! let registry = CodecRegistry::builtin().with_codec(Arc::new(Identity));
//! assert!(registry.get("identity").is_ok());
//! ```

use crate::error::{ErrorKind, Result, ResultExt, SeqError};
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

/// Hadoop's default codec buffer (`io.compression.codec.*.buffersize`).
const HADOOP_BUFFER_SIZE: usize = 256 * 1024;

/// Process-wide registry, built once on first use and read-only afterwards.
static GLOBAL_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();

/// A named, invertible byte transform applied to record values.
///
/// Implementations must be stateless and `Send + Sync`; one instance is shared by every
/// reader and writer in the process.
pub trait RecordCodec: Send + Sync {
    /// Short name used on the command line and in logs (e.g. `"gzip"`).
    fn name(&self) -> &str;

    /// Fully-qualified class name written into the container header.
    fn class_name(&self) -> &str;

    /// Additional lookup names.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Compress a complete value.
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error if the encoder fails.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a complete value produced by [`RecordCodec::compress`].
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error if the payload is malformed or truncated. Partial output
    /// is never returned.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn RecordCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCodec")
            .field("name", &self.name())
            .field("class_name", &self.class_name())
            .finish()
    }
}

/// Lookup table from codec names to codec implementations.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn RecordCodec>>,
}

impl CodecRegistry {
    /// Registry holding the five built-in codecs.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            codecs: vec![
                Arc::new(DefaultCodec),
                Arc::new(GzipCodec),
                Arc::new(Bzip2Codec),
                Arc::new(SnappyCodec),
                Arc::new(Lz4Codec),
            ],
        }
    }

    /// The shared process-wide registry (built-in codecs only).
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::builtin)
    }

    /// Add a codec; later registrations shadow earlier ones with the same name.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn RecordCodec>) -> Self {
        self.codecs.insert(0, codec);
        self
    }

    /// Find a codec by short name, alias or class name (names are case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCodec` when nothing matches.
    pub fn get(&self, name: &str) -> Result<Arc<dyn RecordCodec>> {
        self.codecs
            .iter()
            .find(|codec| {
                codec.class_name() == name
                    || codec.name().eq_ignore_ascii_case(name)
                    || codec.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
            })
            .cloned()
            .ok_or_else(|| SeqError::unsupported_codec(name))
    }

    /// Short names of all registered codecs, in lookup order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Convenience: look up a codec in the global registry.
///
/// # Errors
///
/// Returns `UnsupportedCodec` when `name` is not a built-in codec.
pub fn codec_by_name(name: &str) -> Result<Arc<dyn RecordCodec>> {
    CodecRegistry::global().get(name)
}

// ============================================================================
// Stream Helpers
// ============================================================================

fn encode_with<W, F>(codec: &str, data: &[u8], encoder: W, finish: F) -> Result<Vec<u8>>
where
    W: Write,
    F: FnOnce(W) -> std::io::Result<Vec<u8>>,
{
    let mut encoder = encoder;
    encoder
        .write_all(data)
        .context_kind(ErrorKind::Decode, || format!("{codec} encode failed"))?;
    finish(encoder).context_kind(ErrorKind::Decode, || format!("{codec} encode failed"))
}

fn decode_with<R: Read>(codec: &str, mut decoder: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .context_kind(ErrorKind::Decode, || format!("{codec} decode failed"))?;
    Ok(out)
}

/// Inflate a zlib stream, insisting on reaching the end of the stream. The `read`
/// adapters in `flate2` stop quietly at end of input, which would hide truncation.
fn inflate_zlib(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::{Decompress, FlushDecompress, Status};

    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(3).max(64));
    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(4096));
        }
        let consumed = usize::try_from(inflater.total_in()).unwrap_or(data.len());
        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::Finish)
            .context_kind(ErrorKind::Decode, || "zlib decode failed".into())?;
        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let drained = usize::try_from(inflater.total_in()).unwrap_or(0) >= data.len();
                if drained && out.len() < out.capacity() {
                    return Err(SeqError::decode(format!(
                        "zlib stream truncated after {} input bytes",
                        data.len()
                    )));
                }
            }
        }
    }
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

struct DefaultCodec;

impl RecordCodec for DefaultCodec {
    fn name(&self) -> &str {
        "default"
    }

    fn class_name(&self) -> &str {
        "org.apache.hadoop.io.compress.DefaultCodec"
    }

    fn aliases(&self) -> &[&str] {
        &["zlib", "deflate"]
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        let encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encode_with("zlib", data, encoder, ZlibEncoder::finish)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        inflate_zlib(data)
    }
}

struct GzipCodec;

impl RecordCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn class_name(&self) -> &str {
        "org.apache.hadoop.io.compress.GzipCodec"
    }

    fn aliases(&self) -> &[&str] {
        &["gz"]
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        encode_with("gzip", data, encoder, GzEncoder::finish)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        decode_with("gzip", flate2::read::GzDecoder::new(data))
    }
}

struct Bzip2Codec;

impl RecordCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn class_name(&self) -> &str {
        "org.apache.hadoop.io.compress.BZip2Codec"
    }

    fn aliases(&self) -> &[&str] {
        &["bz2"]
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        let encoder = BzEncoder::new(Vec::new(), Compression::default());
        encode_with("bzip2", data, encoder, BzEncoder::finish)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        decode_with("bzip2", bzip2::read::BzDecoder::new(data))
    }
}

struct SnappyCodec;

impl RecordCodec for SnappyCodec {
    fn name(&self) -> &str {
        "snappy"
    }

    fn class_name(&self) -> &str {
        "org.apache.hadoop.io.compress.SnappyCodec"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        // Hadoop reserves room for snappy's worst-case expansion inside one buffer.
        let max_block = HADOOP_BUFFER_SIZE - (HADOOP_BUFFER_SIZE / 6 + 32);
        let mut encoder = snap::raw::Encoder::new();
        encode_blocks(data, max_block, |block| {
            encoder
                .compress_vec(block)
                .context_kind(ErrorKind::Decode, || "snappy encode failed".into())
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = snap::raw::Decoder::new();
        decode_blocks("snappy", data, |chunk, _remaining| {
            decoder
                .decompress_vec(chunk)
                .context_kind(ErrorKind::Decode, || "snappy decode failed".into())
        })
    }
}

struct Lz4Codec;

impl RecordCodec for Lz4Codec {
    fn name(&self) -> &str {
        "lz4"
    }

    fn class_name(&self) -> &str {
        "org.apache.hadoop.io.compress.Lz4Codec"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let max_block = HADOOP_BUFFER_SIZE - (HADOOP_BUFFER_SIZE / 255 + 16);
        encode_blocks(data, max_block, |block| Ok(lz4_flex::block::compress(block)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        decode_blocks("lz4", data, |chunk, remaining| {
            lz4_flex::block::decompress(chunk, remaining)
                .context_kind(ErrorKind::Decode, || "lz4 decode failed".into())
        })
    }
}

// ============================================================================
// Hadoop Block Framing
// ============================================================================

/// Frame `data` the way Hadoop's `BlockCompressorStream` does: for each block, the
/// big-endian uncompressed length followed by one length-prefixed compressed chunk.
fn encode_blocks<F>(data: &[u8], max_block: usize, mut compress: F) -> Result<Vec<u8>>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    let mut out = Vec::with_capacity(data.len() / 2 + 8);
    for block in data.chunks(max_block) {
        let chunk = compress(block)?;
        out.extend_from_slice(&frame_len(block.len())?.to_be_bytes());
        out.extend_from_slice(&frame_len(chunk.len())?.to_be_bytes());
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Inverse of [`encode_blocks`]. A block may span several chunks; `decompress` gets the
/// number of bytes still owed to the current block.
fn decode_blocks<F>(codec: &str, data: &[u8], mut decompress: F) -> Result<Vec<u8>>
where
    F: FnMut(&[u8], usize) -> Result<Vec<u8>>,
{
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let block_len = read_frame_len(codec, data, &mut pos)?;
        let mut produced = 0;
        while produced < block_len {
            let chunk_len = read_frame_len(codec, data, &mut pos)?;
            let chunk = data.get(pos..pos + chunk_len).ok_or_else(|| {
                SeqError::decode(format!("{codec} chunk truncated at offset {pos}"))
            })?;
            pos += chunk_len;
            let decoded = decompress(chunk, block_len - produced)?;
            produced += decoded.len();
            out.extend_from_slice(&decoded);
        }
        if produced != block_len {
            return Err(SeqError::decode(format!(
                "{codec} block declared {block_len} bytes but produced {produced}"
            )));
        }
    }
    Ok(out)
}

fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).context_kind(ErrorKind::Decode, || format!("block of {len} bytes too large"))
}

fn read_frame_len(codec: &str, data: &[u8], pos: &mut usize) -> Result<usize> {
    let bytes: [u8; 4] = data
        .get(*pos..*pos + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| SeqError::decode(format!("{codec} frame header truncated at {}", *pos)))?;
    *pos += 4;
    Ok(u32::from_be_bytes(bytes) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<u8>> {
        let mut noisy = Vec::with_capacity(600_000);
        let mut x: u32 = 0x1234_5678;
        for _ in 0..600_000 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            noisy.push((x & 0xff) as u8);
        }
        vec![
            Vec::new(),
            b"a".to_vec(),
            b"root:x:0:0:root:/root:/bin/bash\n".repeat(200),
            (0..=255u8).collect(),
            noisy,
        ]
    }

    #[test]
    fn every_builtin_codec_round_trips() {
        let registry = CodecRegistry::builtin();
        for name in ["default", "gzip", "bzip2", "snappy", "lz4"] {
            let codec = registry.get(name).unwrap();
            for sample in samples() {
                let packed = codec.compress(&sample).unwrap();
                let unpacked = codec.decompress(&packed).unwrap();
                assert_eq!(unpacked, sample, "codec {name}, {} bytes", sample.len());
            }
        }
    }

    #[test]
    fn lookup_by_alias_and_class_name() {
        let registry = CodecRegistry::global();
        assert_eq!(registry.get("bz2").unwrap().name(), "bzip2");
        assert_eq!(registry.get("GZIP").unwrap().name(), "gzip");
        assert_eq!(
            registry
                .get("org.apache.hadoop.io.compress.SnappyCodec")
                .unwrap()
                .name(),
            "snappy"
        );
    }

    #[test]
    fn unknown_codec_is_rejected() {
        let err = codec_by_name("brotli").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedCodec);
    }

    #[test]
    fn empty_input_frames_to_nothing() {
        let codec = codec_by_name("snappy").unwrap();
        assert!(codec.compress(&[]).unwrap().is_empty());
        assert!(codec.decompress(&[]).unwrap().is_empty());
    }

    #[test]
    fn truncated_frames_are_decode_errors() {
        for name in ["snappy", "lz4", "default", "gzip", "bzip2"] {
            let codec = codec_by_name(name).unwrap();
            let packed = codec.compress(&b"hello hello hello hello".repeat(50)).unwrap();
            let cut = &packed[..packed.len() - 3];
            let err = codec.decompress(cut).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Decode, "codec {name}");
        }
    }

    #[test]
    fn large_values_span_several_blocks() {
        let codec = codec_by_name("lz4").unwrap();
        let data = vec![7u8; 3 * HADOOP_BUFFER_SIZE];
        let packed = codec.compress(&data).unwrap();
        let first_block = u32::from_be_bytes(packed[..4].try_into().unwrap()) as usize;
        assert!(first_block < data.len());
        assert_eq!(codec.decompress(&packed).unwrap(), data);
    }
}
