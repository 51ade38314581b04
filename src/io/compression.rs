//! Inbound decompression for objects that arrive already compressed at the source.
//!
//! This is independent of the container's record codec: a `photo.ppm.bz2` object is
//! unpacked here *before* it becomes a record value, and the record value is then
//! compressed again with whatever codec the container declares.
//!
//! ## Built-in Decoders
//!
//! - **Gzip** (`.gz`, `.gzip`) - multi-member aware, via `flate2`
//! - **Bzip2** (`.bz2`, `.bzip2`) - multi-stream aware, via `bzip2`
//! - **Zip** (`.zip`) - yields the *last* file entry of the archive, via `zip`
//! - **Zstd** (`.zst`) - via `zstd` (feature: `compression-zstd`)
//! - **Xz** (`.xz`) - via `xz2` (feature: `compression-xz`)
//!
//! ## Detection
//!
//! File extensions are checked first, falling back to magic bytes only when
//! [`auto_decompress`] is asked to sniff content. The source resolver only uses the
//! extension path, restricted to the extensions enabled in its configuration.
//!
//! ## Failure Semantics
//!
//! A decoder either returns the complete payload or a `Decode` error carrying the
//! underlying cause. Empty input is not a valid compressed stream and is rejected, so
//! "decoded to empty" and "failed to decode" can always be told apart.

use crate::error::{ErrorKind, Result, ResultExt, SeqError};
use std::borrow::Cow;
use std::io::{Cursor, Read};

/// The two signature bytes that open every bzip2 stream.
pub const BZIP2_SIGNATURE: &[u8; 2] = b"BZ";

/// A decoder for one inbound compression format.
pub trait InboundCodec: Send + Sync {
    /// Human-readable name (e.g. `"gzip"`).
    fn name(&self) -> &str;

    /// Lowercase extensions with the leading dot (e.g. `&[".gz", ".gzip"]`).
    fn extensions(&self) -> &[&str];

    /// Magic byte signature, if the format has a reliable one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Decode a complete payload.
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error if the payload is empty, malformed or truncated.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

static INBOUND_CODECS: &[&dyn InboundCodec] = &[
    &GzipInbound,
    &Bzip2Inbound,
    &ZipInbound,
    #[cfg(feature = "compression-zstd")]
    &ZstdInbound,
    #[cfg(feature = "compression-xz")]
    &XzInbound,
];

/// All inbound decoders compiled into this build.
#[must_use]
pub fn inbound_codecs() -> &'static [&'static dyn InboundCodec] {
    INBOUND_CODECS
}

/// Find the decoder whose extension ends `name` (case-insensitive).
#[must_use]
pub fn detect_from_extension(name: &str) -> Option<&'static dyn InboundCodec> {
    let lower = name.to_lowercase();
    INBOUND_CODECS
        .iter()
        .copied()
        .find(|codec| codec.extensions().iter().any(|ext| lower.ends_with(ext)))
}

/// Find the decoder whose magic bytes open `data`.
#[must_use]
pub fn detect_from_magic(data: &[u8]) -> Option<&'static dyn InboundCodec> {
    INBOUND_CODECS
        .iter()
        .copied()
        .find(|codec| codec.magic_bytes().is_some_and(|magic| data.starts_with(magic)))
}

/// Decompress `data` if its name or content says it is compressed.
///
/// Detection strategy:
/// 1. Check the name's extension
/// 2. Fall back to magic bytes
/// 3. Return the bytes unchanged if nothing matches
///
/// # Errors
///
/// Returns a `Decode` error if a decoder was selected and failed.
pub fn auto_decompress(data: &[u8], name_hint: &str) -> Result<Vec<u8>> {
    match detect_from_extension(name_hint).or_else(|| detect_from_magic(data)) {
        Some(codec) => codec.decode(data).map_err(|e| e.context(name_hint)),
        None => Ok(data.to_vec()),
    }
}

// ============================================================================
// Format-specific decoders
// ============================================================================

fn reject_empty(format: &str, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(SeqError::decode(format!("empty input is not a {format} stream")));
    }
    Ok(())
}

fn read_all<R: Read>(format: &str, mut reader: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .context_kind(ErrorKind::Decode, || format!("{format} decode failed"))?;
    Ok(out)
}

/// Decode a gzip payload (all members).
///
/// # Errors
///
/// Returns a `Decode` error for empty, malformed or truncated input.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    reject_empty("gzip", data)?;
    if !data.starts_with(&[0x1f, 0x8b]) {
        return Err(SeqError::decode("missing gzip magic bytes"));
    }
    read_all("gzip", flate2::read::MultiGzDecoder::new(data))
}

/// Make sure a bzip2 payload starts with its `BZ` signature.
///
/// Some framing layers consume the two signature bytes before handing the body on,
/// leaving a stream that starts at the block-size header (`h1`..`h9`). The decoder
/// needs the full stream, so such bodies get the signature put back. Payloads that
/// already carry it are borrowed unchanged; anything else is rejected.
///
/// # Errors
///
/// Returns a `Decode` error if `data` is neither a full stream nor a signature-less body.
pub fn frame_bzip2_stream(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    let level_ok = |b: &u8| (b'1'..=b'9').contains(b);
    match data {
        [b'B', b'Z', b'h', level, ..] if level_ok(level) => Ok(Cow::Borrowed(data)),
        [b'h', level, ..] if level_ok(level) => {
            let mut framed = Vec::with_capacity(data.len() + BZIP2_SIGNATURE.len());
            framed.extend_from_slice(BZIP2_SIGNATURE);
            framed.extend_from_slice(data);
            Ok(Cow::Owned(framed))
        }
        _ => Err(SeqError::decode(
            "payload is not a bzip2 stream (no BZh signature or block header)",
        )),
    }
}

/// Decode a bzip2 payload (all streams), restoring a stripped signature first.
///
/// # Errors
///
/// Returns a `Decode` error for empty, malformed or truncated input.
pub fn decompress_bzip2(data: &[u8]) -> Result<Vec<u8>> {
    reject_empty("bzip2", data)?;
    let framed = frame_bzip2_stream(data)?;
    read_all("bzip2", bzip2::read::MultiBzDecoder::new(framed.as_ref()))
}

/// Decode a zip archive, returning the bytes of its last file entry.
///
/// Archives holding several files yield only the last one, in central-directory order.
///
/// # Errors
///
/// Returns a `Decode` error if the archive is malformed or holds no file entries.
pub fn decompress_zip(data: &[u8]) -> Result<Vec<u8>> {
    reject_empty("zip", data)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .context_kind(ErrorKind::Decode, || "malformed zip archive".into())?;

    let count = archive.len();
    let mut last_file = None;
    for index in 0..count {
        let entry = archive
            .by_index(index)
            .context_kind(ErrorKind::Decode, || format!("zip entry #{index} unreadable"))?;
        if !entry.is_dir() {
            last_file = Some(index);
        }
    }
    let index = last_file.ok_or_else(|| SeqError::decode("zip archive holds no file entries"))?;
    let entry = archive
        .by_index(index)
        .context_kind(ErrorKind::Decode, || format!("zip entry #{index} unreadable"))?;
    log::debug!("zip: using entry {} ({} of {count})", entry.name(), index + 1);
    read_all("zip", entry)
}

// ============================================================================
// Built-in InboundCodec Implementations
// ============================================================================

struct GzipInbound;

impl InboundCodec for GzipInbound {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        decompress_gzip(data)
    }
}

struct Bzip2Inbound;

impl InboundCodec for Bzip2Inbound {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        decompress_bzip2(data)
    }
}

struct ZipInbound;

impl InboundCodec for ZipInbound {
    fn name(&self) -> &str {
        "zip"
    }

    fn extensions(&self) -> &[&str] {
        &[".zip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x50, 0x4b, 0x03, 0x04])
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        decompress_zip(data)
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdInbound;

#[cfg(feature = "compression-zstd")]
impl InboundCodec for ZstdInbound {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        reject_empty("zstd", data)?;
        zstd::stream::decode_all(data)
            .context_kind(ErrorKind::Decode, || "zstd decode failed".into())
    }
}

#[cfg(feature = "compression-xz")]
struct XzInbound;

#[cfg(feature = "compression-xz")]
impl InboundCodec for XzInbound {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        reject_empty("xz", data)?;
        read_all("xz", xz2::read::XzDecoder::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn bzip2_bytes(data: &[u8]) -> Vec<u8> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn bzip2_signature_is_kept_when_present() {
        let full = bzip2_bytes(b"payload");
        let framed = frame_bzip2_stream(&full).unwrap();
        assert!(matches!(framed, Cow::Borrowed(_)));
        assert_eq!(decompress_bzip2(&full).unwrap(), b"payload");
    }

    #[test]
    fn bzip2_signature_is_restored_when_stripped() {
        let full = bzip2_bytes(b"body only");
        let body = &full[BZIP2_SIGNATURE.len()..];
        assert!(body.starts_with(b"h"));

        let framed = frame_bzip2_stream(body).unwrap();
        assert!(framed.starts_with(BZIP2_SIGNATURE));
        assert_eq!(framed.as_ref(), full.as_slice());
        assert_eq!(decompress_bzip2(body).unwrap(), b"body only");
    }

    #[test]
    fn bzip2_garbage_is_a_decode_error() {
        let err = decompress_bzip2(b"not bzip2 at all").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);

        let full = bzip2_bytes(&b"truncate me ".repeat(100));
        let err = decompress_bzip2(&full[..full.len() / 2]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[test]
    fn empty_input_is_not_silently_empty_output() {
        for decode in [decompress_gzip, decompress_bzip2, decompress_zip] {
            assert_eq!(decode(&[]).unwrap_err().kind, ErrorKind::Decode);
        }
    }

    #[test]
    fn gzip_members_are_concatenated() {
        let mut data = gzip_bytes(b"first,");
        data.extend(gzip_bytes(b"second"));
        assert_eq!(decompress_gzip(&data).unwrap(), b"first,second");
    }

    #[test]
    fn zip_yields_last_file_entry() {
        let archive = zip_bytes(&[("a.txt", b"first"), ("b.txt", b"second")]);
        assert_eq!(decompress_zip(&archive).unwrap(), b"second");
    }

    #[test]
    fn zip_without_files_is_rejected() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("only-a-dir/", zip::write::SimpleFileOptions::default())
            .unwrap();
        let archive = writer.finish().unwrap().into_inner();
        assert_eq!(decompress_zip(&archive).unwrap_err().kind, ErrorKind::Decode);
    }

    #[test]
    fn detection_prefers_extension_then_magic() {
        assert_eq!(detect_from_extension("x/ncar.NC.BZ2").unwrap().name(), "bzip2");
        assert!(detect_from_extension("plain.txt").is_none());
        assert_eq!(detect_from_magic(&gzip_bytes(b"x")).unwrap().name(), "gzip");

        let gz = gzip_bytes(b"sniffed");
        assert_eq!(auto_decompress(&gz, "no-extension").unwrap(), b"sniffed");
        assert_eq!(auto_decompress(b"plain", "plain.txt").unwrap(), b"plain");
    }
}
