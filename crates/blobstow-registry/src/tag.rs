//! Tag resolution for download references.
//!
//! A reference either names a concrete tag or the `latest` sentinel. The
//! sentinel is resolved against the registry's tag list by taking the
//! **last** tag returned.
//!
//! This is a heuristic, not semantic-version ordering: the distribution API
//! does not promise any particular tag order, and no version comparison is
//! done here. Given `["1.0.0", "1.2.0", "2.0.0-rc1"]`, `latest` resolves to
//! `2.0.0-rc1`, pre-release or not. Publishers who rely on `latest` should
//! push tags in the order they want them picked.

use std::fmt;

use blobstow_core::reference::DEFAULT_TAG;

use crate::error::RegistryError;

/// A tag as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagQuery {
    /// The `latest` sentinel, resolved from the tag list.
    Latest,

    /// A concrete tag, used as-is.
    Exact(String),
}

impl TagQuery {
    /// Interprets a tag string. `latest` is matched case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::TagQuery;
    ///
    /// assert_eq!(TagQuery::parse("latest"), TagQuery::Latest);
    /// assert_eq!(TagQuery::parse("1.2.0"), TagQuery::Exact("1.2.0".to_string()));
    /// ```
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case(DEFAULT_TAG) {
            Self::Latest
        } else {
            Self::Exact(tag.to_string())
        }
    }

    /// Returns true if this query is the `latest` sentinel.
    #[must_use]
    pub const fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Resolves the query against the registry's tag list.
    ///
    /// `reference` is only used for error context.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::TagQuery;
    ///
    /// let tags = ["1.0.0", "1.2.0", "2.0.0-rc1"];
    /// assert_eq!(TagQuery::Latest.resolve(&tags, "ghcr.io/x/y").unwrap(), "2.0.0-rc1");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoTags`] when resolving `latest` against an
    /// empty list.
    pub fn resolve(
        &self,
        available_tags: &[impl AsRef<str>],
        reference: &str,
    ) -> Result<String, RegistryError> {
        match self {
            Self::Exact(tag) => Ok(tag.clone()),
            Self::Latest => available_tags
                .last()
                .map(|tag| tag.as_ref().to_string())
                .ok_or_else(|| RegistryError::NoTags {
                    reference: reference.to_string(),
                }),
        }
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "{DEFAULT_TAG}"),
            Self::Exact(tag) => write!(f, "{tag}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest() {
        assert!(TagQuery::parse("latest").is_latest());
        assert!(TagQuery::parse("LATEST").is_latest());
        assert!(!TagQuery::parse("1.0.0").is_latest());
    }

    #[test]
    fn test_latest_takes_last_element_not_highest_version() {
        let tags = vec!["1.0.0", "1.2.0", "2.0.0-rc1"];
        assert_eq!(TagQuery::Latest.resolve(&tags, "r").unwrap(), "2.0.0-rc1");

        let tags = vec!["2.0.0", "10.0.0", "1.0.0"];
        assert_eq!(TagQuery::Latest.resolve(&tags, "r").unwrap(), "1.0.0");
    }

    #[test]
    fn test_latest_on_empty_list() {
        let tags: Vec<String> = Vec::new();
        let err = TagQuery::Latest
            .resolve(&tags, "ghcr.io/example/hello:latest")
            .unwrap_err();
        assert!(matches!(err, RegistryError::NoTags { reference } if reference.ends_with(":latest")));
    }

    #[test]
    fn test_exact_is_not_checked_against_list() {
        let tags = vec!["1.0.0"];
        let query = TagQuery::Exact("9.9.9".to_string());
        assert_eq!(query.resolve(&tags, "r").unwrap(), "9.9.9");
    }

    #[test]
    fn test_display() {
        assert_eq!(TagQuery::Latest.to_string(), "latest");
        assert_eq!(TagQuery::Exact("v1".to_string()).to_string(), "v1");
    }
}
