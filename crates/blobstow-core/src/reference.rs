//! Image references of the form `<registry-host>/<repository-path>[:<tag>]`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Tag used when a reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// A parsed, fully-qualified image reference.
///
/// The registry host is mandatory. Repository path components must be
/// lowercase, as registries require.
///
/// # Examples
///
/// ```
/// use blobstow_core::Reference;
///
/// let r = Reference::parse("ghcr.io/example/hello:1.2.0").unwrap();
/// assert_eq!(r.registry(), "ghcr.io");
/// assert_eq!(r.repository(), "example/hello");
/// assert_eq!(r.tag(), "1.2.0");
///
/// let r = Reference::parse("ghcr.io/example/hello").unwrap();
/// assert_eq!(r.tag(), "latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    registry: String,
    repository: String,
    tag: String,
}

impl Reference {
    /// Parses a reference string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if the host or repository is
    /// missing, a repository component is not lowercase alphanumeric with
    /// `.`, `_` or `-` separators, the tag is malformed, or the reference
    /// pins a digest.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        if input.contains('@') {
            return Err(invalid("digest references are not supported"));
        }

        let (registry, rest) = input
            .split_once('/')
            .ok_or_else(|| invalid("expected <registry-host>/<repository>"))?;
        if !is_valid_host(registry) {
            return Err(invalid("missing or malformed registry host"));
        }

        let (repository, tag) = match rest.rsplit_once(':') {
            Some((repository, tag)) => (repository, tag),
            None => (rest, DEFAULT_TAG),
        };

        if repository.is_empty() {
            return Err(invalid("missing repository"));
        }
        if repository.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(invalid("repository must be lowercase"));
        }
        if !repository.split('/').all(is_valid_path_component) {
            return Err(invalid("malformed repository path"));
        }
        if !is_valid_tag(tag) {
            return Err(invalid("malformed tag"));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Registry host, including any port (e.g. `ghcr.io`, `localhost:5000`).
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path within the registry (e.g. `example/hello`).
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Tag (defaults to `latest`).
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether the tag is the `latest` sentinel.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.tag == DEFAULT_TAG
    }

    /// Returns a copy of this reference pointing at a different tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if `tag` is malformed.
    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        if !is_valid_tag(tag) {
            return Err(Error::InvalidReference {
                reference: format!("{}/{}:{tag}", self.registry, self.repository),
                reason: "malformed tag".to_string(),
            });
        }
        Ok(Self {
            tag: tag.to_string(),
            ..self.clone()
        })
    }

    /// `<repository>:<tag>`, the reference without its host.
    #[must_use]
    pub fn repository_with_tag(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_valid_host(host: &str) -> bool {
    let (name, port) = match host.split_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    let name_ok = !name.is_empty()
        && (name.contains('.') || name == "localhost")
        && name.split('.').all(|label| {
            !label.is_empty() && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    let port_ok = port.map_or(true, |p| {
        !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())
    });
    name_ok && port_ok
}

/// `[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*`
fn is_valid_path_component(component: &str) -> bool {
    let is_alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    let mut rest = component;
    loop {
        let run = rest.len() - rest.trim_start_matches(is_alnum).len();
        if run == 0 {
            return false;
        }
        rest = &rest[run..];
        if rest.is_empty() {
            return true;
        }

        let sep_len = rest.len() - rest.trim_start_matches(['.', '_', '-']).len();
        let separator = &rest[..sep_len];
        let valid_separator = matches!(separator, "." | "_" | "__")
            || separator.bytes().all(|b| b == b'-');
        if !valid_separator {
            return false;
        }
        rest = &rest[sep_len..];
    }
}

/// `[A-Za-z0-9_][A-Za-z0-9._-]{0,127}`
fn is_valid_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    match bytes.first() {
        Some(&first) if first.is_ascii_alphanumeric() || first == b'_' => {}
        _ => return false,
    }
    bytes.len() <= MAX_TAG_LEN
        && bytes
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
