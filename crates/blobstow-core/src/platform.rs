//! Target platforms.
//!
//! Artifacts are published per OS/architecture pair. Only a fixed set of
//! pairs is accepted; anything outside the allow-lists is rejected outright
//! rather than normalised.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Operating systems an artifact may target.
pub const ALLOWED_OS: &[&str] = &["linux", "windows", "darwin"];

/// CPU architectures an artifact may target.
pub const ALLOWED_ARCH: &[&str] = &["amd64", "arm64"];

/// An OS/architecture pair drawn from [`ALLOWED_OS`] and [`ALLOWED_ARCH`].
///
/// # Examples
///
/// ```
/// use blobstow_core::Platform;
///
/// let platform = Platform::parse("linux/arm64").unwrap();
/// assert_eq!(platform.os(), "linux");
/// assert_eq!(platform.arch(), "arm64");
/// assert_eq!(platform.to_string(), "linux/arm64");
///
/// assert!(Platform::parse("linux/ia64").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    os: &'static str,
    arch: &'static str,
}

impl Platform {
    /// Parses an `<os>/<arch>` string.
    ///
    /// Surrounding whitespace is trimmed. The string must have exactly two
    /// `/`-separated components, each found in its allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlatform`] for anything else.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidPlatform {
            platform: text.to_string(),
            allowed: Self::allowed_list(),
        };

        let mut parts = text.trim().split('/');
        let (Some(os), Some(arch), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        Self::new(os, arch).ok_or_else(invalid)
    }

    /// Builds a platform from separate OS and architecture names.
    ///
    /// Returns `None` if either name is outside its allow-list.
    #[must_use]
    pub fn new(os: &str, arch: &str) -> Option<Self> {
        let os = ALLOWED_OS.iter().copied().find(|allowed| *allowed == os)?;
        let arch = ALLOWED_ARCH.iter().copied().find(|allowed| *allowed == arch)?;
        Some(Self { os, arch })
    }

    /// Every allowed platform, OS-major.
    #[must_use]
    pub fn all() -> Vec<Self> {
        ALLOWED_OS
            .iter()
            .flat_map(|&os| ALLOWED_ARCH.iter().map(move |&arch| Self { os, arch }))
            .collect()
    }

    /// The platform of the running host, if it is one of the allowed pairs.
    #[must_use]
    pub fn host() -> Option<Self> {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Operating system name (e.g. `linux`).
    #[must_use]
    pub const fn os(&self) -> &'static str {
        self.os
    }

    /// Architecture name (e.g. `amd64`).
    #[must_use]
    pub const fn arch(&self) -> &'static str {
        self.arch
    }

    fn allowed_list() -> String {
        Self::all()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            os: "linux",
            arch: "amd64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
