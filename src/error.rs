//! Error type shared by every seqpack operation.
//!
//! All fallible operations return [`Result<T>`] where the error is [`SeqError`]. The
//! [`ErrorKind`] tells callers *what* went wrong without string matching:
//!
//! - `UnsupportedScheme` / `UnsupportedDestination` / `UnsupportedCodec` - the request
//!   names something this crate does not handle
//! - `InvalidUri` - the URI is structurally malformed
//! - `SourceNotFound` - the object does not exist
//! - `Transport` - network or storage failure (retry-able by the caller)
//! - `Decode` - a compressed payload could not be decoded
//! - `CorruptContainer` - a container does not follow the sequence file layout
//!
//! Nothing in the crate retries internally; transient failures surface to the caller.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone)]
pub struct SeqError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedScheme,
    UnsupportedCodec,
    UnsupportedDestination,
    SourceNotFound,
    Transport,
    Decode,
    CorruptContainer,
    InvalidUri,
}

impl fmt::Display for SeqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {source})")?;
        }
        Ok(())
    }
}

impl Error for SeqError {}

impl SeqError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Prefix the message with the operation that failed (e.g. `"fetch s3://b/k"`).
    #[must_use]
    pub fn context(mut self, operation: impl fmt::Display) -> Self {
        self.message = format!("{operation}: {}", self.message);
        self
    }

    pub fn unsupported_scheme(uri: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedScheme,
            format!("unsupported URI scheme: {uri}"),
        )
    }

    pub fn unsupported_codec(name: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedCodec,
            format!("unsupported compression codec: {name}"),
        )
    }

    pub fn unsupported_destination(uri: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedDestination,
            format!("cannot write a container to {uri}"),
        )
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::SourceNotFound, format!("{what} not found"))
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptContainer, message)
    }

    pub fn invalid_uri(uri: &str, reason: &str) -> Self {
        Self::new(ErrorKind::InvalidUri, format!("invalid URI {uri}: {reason}"))
    }

    /// True for failures a caller may reasonably retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

pub type Result<T> = std::result::Result<T, SeqError>;

/// Attach an [`ErrorKind`] and a message to any foreign error.
pub trait ResultExt<T> {
    /// Convert a standard Result into a seqpack Result.
    ///
    /// # Errors
    ///
    /// Returns a `SeqError` with the given kind when `self` is an error; the foreign
    /// error becomes the `source`.
    fn context_kind(self, kind: ErrorKind, message: impl FnOnce() -> String) -> Result<T>;
}

impl<T, E: Error> ResultExt<T> for std::result::Result<T, E> {
    fn context_kind(self, kind: ErrorKind, message: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| SeqError::new(kind, message()).with_source(e.to_string()))
    }
}

/// Map a local I/O error, treating a missing file as `SourceNotFound`.
pub(crate) fn from_io(err: &std::io::Error, what: &str) -> SeqError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SeqError::not_found(what).with_source(err.to_string())
    } else {
        SeqError::transport(format!("I/O failure on {what}")).with_source(err.to_string())
    }
}
