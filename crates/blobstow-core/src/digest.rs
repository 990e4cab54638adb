//! SHA-256 content digests.
//!
//! Every document and blob in an OCI layout is named by the digest of its own
//! bytes. [`ContentDigest`] is that name: the algorithm is always `sha256`,
//! the value is 64 lowercase hex characters.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Algorithm prefix used in digest strings.
pub const SHA256_PREFIX: &str = "sha256:";

/// A SHA-256 content digest.
///
/// # Examples
///
/// ```
/// use blobstow_core::ContentDigest;
///
/// let digest = ContentDigest::from_bytes(b"hello");
/// assert_eq!(
///     digest.to_string(),
///     "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
/// );
/// assert_eq!(digest.hex().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest {
    hex: String,
}

impl ContentDigest {
    /// Computes the digest of an in-memory byte slice.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_hasher(Sha256::new_with_prefix(data))
    }

    /// Computes the digest of everything readable from `reader`.
    ///
    /// The reader is consumed through a bounded copy loop, so arbitrarily
    /// large inputs never sit in memory at once.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if reading fails.
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self::from_hasher(hasher))
    }

    /// Computes the digest of a file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(file).map_err(|e| Error::io(path, e))
    }

    /// Computes the digest of a gzip file's *decompressed* contents.
    ///
    /// For a `.tar.gz` layer this is the layer's `diff_id`, which differs
    /// from the digest of the file itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened and
    /// [`Error::Decompression`] if it is not a valid gzip stream.
    pub fn from_gzip_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(MultiGzDecoder::new(file)).map_err(|e| Error::Decompression {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Checks that a file hashes to this digest.
    ///
    /// Nothing in the download path calls this; it is available to callers
    /// that want to verify retrieved bytes themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DigestMismatch`] when the file content differs, or
    /// [`Error::Io`] when it cannot be read.
    pub fn verify_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let actual = Self::from_file(path)?;
        if actual == *self {
            Ok(())
        } else {
            Err(Error::DigestMismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Returns the algorithm name, always `sha256`.
    #[must_use]
    pub const fn algorithm(&self) -> &'static str {
        "sha256"
    }

    /// Returns the lowercase hex value without the algorithm prefix.
    ///
    /// This is also the file name of the blob inside `blobs/sha256/`.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Parses a bare 64-character lowercase hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] if the value is not valid hex of the
    /// right length.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let valid = hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self {
                hex: hex.to_string(),
            })
        } else {
            Err(Error::InvalidDigest {
                digest: hex.to_string(),
            })
        }
    }

    fn from_hasher(hasher: Sha256) -> Self {
        Self {
            hex: hex::encode(hasher.finalize()),
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SHA256_PREFIX}{}", self.hex)
    }
}

impl FromStr for ContentDigest {
    type Err = Error;

    /// Accepts `sha256:<hex>` or a bare hex value.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("sha256", hex)) => Self::from_hex(hex),
            Some(_) => Err(Error::InvalidDigest {
                digest: s.to_string(),
            }),
            None => Self::from_hex(s).map_err(|_| Error::InvalidDigest {
                digest: s.to_string(),
            }),
        }
    }
}

impl Serialize for ContentDigest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
