//! Transport abstractions for the storage systems objects come from and containers go to.
//!
//! Each storage system is a small synchronous trait with:
//!
//! - **A real client** behind the `network` feature: `object_store` for S3, `reqwest`'s
//!   blocking API for WebHDFS and HTTP
//! - **A fake** that keeps everything in memory, for tests without a network
//!
//! ## Available Transports
//!
//! - [`ObjectIO`] - S3-compatible object storage ([`s3::S3ObjectIO`])
//! - [`DistributedFsIO`] - Hadoop filesystems over WebHDFS ([`webhdfs::WebHdfsIO`])
//! - [`HttpIO`] - single GET downloads ([`http::ReqwestHttpIO`])
//!
//! ## Credential & Config Abstraction
//!
//! - [`CloudCredentials`] - access key pair used to sign object store requests
//! - [`CloudConfig`] - per-transport settings (endpoint, region, timeout)
//!
//! ## Unit Testing with Fakes
//!
//! ```
//! use seqpack::io::cloud::*;
//!
//! # fn main() -> seqpack::error::Result<()> {
//! let storage = FakeObjectIO::with_page_size(2);
//! storage.put_object("bucket", "in/a.txt", b"data");
//!
//! assert_eq!(storage.get_object("bucket", "in/a.txt")?, b"data");
//! let page = storage.list_objects_page("bucket", "in/", None)?;
//! assert_eq!(page.objects.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`traits`] - trait definitions and the types they exchange
//! - [`fake`] - in-memory fakes
//! - [`helpers`] - pagination and wildcard utilities

pub mod fake;
pub mod helpers;
pub mod traits;

#[cfg_attr(docsrs, doc(cfg(feature = "network")))]
#[cfg(feature = "network")]
pub mod http;

#[cfg_attr(docsrs, doc(cfg(feature = "network")))]
#[cfg(feature = "network")]
pub mod s3;

#[cfg_attr(docsrs, doc(cfg(feature = "network")))]
#[cfg(feature = "network")]
pub mod webhdfs;

pub use fake::*;
pub use traits::*;
