//! # seqpack
//!
//! Pack objects from local disk, HDFS, S3 and HTTP into **Hadoop sequence files**.
//!
//! Each source object becomes one record: the key is the object's path or URI, the
//! value is its content compressed with the container's codec. Containers use the
//! standard `Text -> BytesWritable` layout with record-level compression, so Hadoop
//! tooling can read them directly.
//!
//! ## Key Features
//!
//! - **Four source schemes** - `file://`, `hdfs://` (WebHDFS), `s3://` / `s3n://`,
//!   `http(s)://`
//! - **Five record codecs** - `default` (zlib), `gzip`, `bzip2`, `snappy`, `lz4`
//! - **Inbound decompression** - `.bz2` (configurable) sources are unpacked on fetch
//! - **Prefix listing** - paginated object store listings, single-level directory listings
//! - **Wildcards** - `s3://bucket/data/*.nc` packs every match into its own container
//! - **Testable** - in-memory fakes for every transport
//!
//! ## Quick Start
//!
//! ```
//! use seqpack::codec::codec_by_name;
//! use seqpack::container::{ContainerReader, ContainerWriter};
//! use seqpack::io::source::SourceResolver;
//! use seqpack::io::transports::Transports;
//! # use std::fs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let tmp = tempfile::TempDir::new()?;
//! # let src = tmp.path().join("passwd");
//! # fs::write(&src, b"root:x:0:0")?;
//! # let input = format!("file://{}", src.display());
//! # let output = format!("file://{}/passwd.seq", tmp.path().display());
//! let transports = Transports::offline();
//!
//! // Fetch one object and write it as a single-record container
//! let record = SourceResolver::new(transports.clone()).fetch(&input)?;
//! let codec = codec_by_name("default")?;
//! ContainerWriter::new(transports.clone()).write(
//!     &output,
//!     &record.key,
//!     &record.value,
//!     codec.as_ref(),
//! )?;
//!
//! // Read it back
//! let contents = ContainerReader::new(transports).read_all(&output)?;
//! assert_eq!(contents[&record.key], b"root:x:0:0");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`codec`] - record codecs and the codec registry
//! - [`container`] - sequence file format, writer and reader
//! - [`io`] - URIs, transports, inbound decompression, fetching and listing
//! - [`pack`] - the fetch-and-write orchestration, including wildcards
//! - [`config`] - transport and inbound settings
//! - [`error`] - the crate error type
//!
//! ## Logging
//!
//! The library logs through the `log` facade: `debug!` per fetch, listing page and
//! record, `info!` per container written. Install any logger (the binaries use
//! `env_logger`, controlled by `RUST_LOG`).

pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod io;
pub mod pack;

pub use codec::{CodecRegistry, RecordCodec, codec_by_name};
pub use config::{IngestConfig, StaticCredentials};
pub use container::{ContainerReader, ContainerWriter, Header, Record};
pub use error::{ErrorKind, Result, SeqError};
pub use io::listing::SourceLister;
pub use io::source::SourceResolver;
pub use io::transports::Transports;
pub use io::uri::SourceUri;
pub use pack::{PackSummary, PackedEntry, Packer};
