//! Getting bytes in: URIs, transports, inbound decompression, fetching and listing.
//!
//! - [`uri`] - parse a URI into a [`uri::SourceUri`]
//! - [`cloud`] - transport traits, real clients and fakes
//! - [`transports`] - the client bundle shared by every operation
//! - [`compression`] - inbound decompressors (gzip, bzip2, zip, ...)
//! - [`source`] - fetch one object as a record
//! - [`listing`] - enumerate objects under a prefix
//! - [`glob`] - local filesystem pattern expansion

pub mod cloud;
pub mod compression;
pub mod glob;
pub mod listing;
pub mod source;
pub mod transports;
pub mod uri;
