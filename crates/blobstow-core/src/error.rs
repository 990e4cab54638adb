//! Error types for blobstow core operations.
//!
//! This module defines the error types used throughout the `blobstow-core` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blobstow core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Image reference could not be parsed.
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference {
        /// The offending reference string.
        reference: String,
        /// Why the reference was rejected.
        reason: String,
    },

    /// Platform string is malformed or not in the allow-list.
    #[error("Platform '{platform}' is not allowed (expected one of: {allowed})")]
    InvalidPlatform {
        /// The offending platform string.
        platform: String,
        /// Comma separated list of allowed platforms.
        allowed: String,
    },

    /// Digest string is not a `sha256` digest.
    #[error("Invalid digest: {digest}")]
    InvalidDigest {
        /// The offending digest string.
        digest: String,
    },

    /// Content does not hash to the expected digest.
    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Digest the caller expected.
        expected: String,
        /// Digest actually computed.
        actual: String,
    },

    /// File could not be read or written.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path of the file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid gzip stream.
    #[error("Failed to decompress {path}: {source}")]
    Decompression {
        /// Path of the compressed file.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
