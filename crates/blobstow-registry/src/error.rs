//! Error types for registry operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building, pushing or pulling artifacts.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid reference, platform or digest, or a local hashing failure.
    #[error(transparent)]
    Core(#[from] blobstow_core::Error),

    /// Failed to connect to registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Registry answered with a non-200 status.
    #[error("HTTP error from registry: {status} for {url}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// Transport-level failure that carries no status code.
    #[error("HTTP request failed: {message}")]
    RequestFailed {
        /// Error message.
        message: String,
    },

    /// The operation was cancelled by the caller.
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was in flight.
        operation: String,
    },

    /// The image index has no entry for the requested platform.
    #[error("No manifest for platform {platform} in {reference}")]
    PlatformNotFound {
        /// Resolved reference.
        reference: String,
        /// Requested platform.
        platform: String,
    },

    /// The matching index entry does not record the blob digest.
    #[error("Manifest for platform {platform} in {reference} has no blob digest annotation")]
    MissingDigestAnnotation {
        /// Resolved reference.
        reference: String,
        /// Requested platform.
        platform: String,
    },

    /// The fetched image index could not be interpreted.
    #[error("Malformed image index: {message}")]
    MalformedIndex {
        /// Error message.
        message: String,
    },

    /// The repository has no tags to resolve `latest` against.
    #[error("No tags found for {reference}")]
    NoTags {
        /// Reference whose tags were listed.
        reference: String,
    },

    /// The local OCI layout is missing or inconsistent.
    #[error("Invalid OCI layout at {path}: {message}")]
    InvalidLayout {
        /// Layout root.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("File I/O error at {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The caller's sink rejected a downloaded blob.
    #[error("Failed to write blob from {url}: {source}")]
    WriteFailed {
        /// Blob URL.
        url: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// Blob upload failed.
    #[error("Failed to upload blob {digest}: {message}")]
    UploadFailed {
        /// Digest of the blob.
        digest: String,
        /// Error message.
        message: String,
    },

    /// Manifest push failed.
    #[error("Failed to push manifest {reference}: {message}")]
    ManifestPushFailed {
        /// Tag or digest the manifest was pushed under.
        reference: String,
        /// Error message.
        message: String,
    },

    /// A blocking task panicked or was aborted.
    #[error("Background task failed: {message}")]
    TaskFailed {
        /// Error message.
        message: String,
    },
}

impl RegistryError {
    /// HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error came from caller cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else if let Some(status) = err.status() {
            Self::HttpError {
                status: status.as_u16(),
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
            }
        } else {
            Self::RequestFailed {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}
