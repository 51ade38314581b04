//! Containers: Hadoop sequence files holding `Text -> BytesWritable` records, or
//! `IntWritable -> BytesWritable` for line-per-record containers.
//!
//! - [`format`] - header, vint, `Text`, `IntWritable` and `BytesWritable` encoding
//! - [`writer`] - [`SequenceFileWriter`] over any `Write`, and [`ContainerWriter`] which
//!   writes to a `file://` or `hdfs://` destination and copies local containers to HDFS
//! - [`reader`] - [`SequenceFileReader`] over any `Read`, and [`ContainerReader`] which
//!   reads a container from any readable URI

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{Header, KeyClass};
pub use reader::{ContainerReader, SequenceFileReader};
pub use writer::{ContainerWriter, SequenceFileWriter, encode_container, split_lines};

/// One key/value pair stored in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}
