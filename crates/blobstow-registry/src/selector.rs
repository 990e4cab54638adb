//! Platform selection over a fetched image index.

use blobstow_core::Platform;
use tracing::debug;

use crate::error::RegistryError;
use crate::oci::{Descriptor, ImageIndex};

/// Finds the index entry built for `platform`.
///
/// Entries are scanned in document order and the first whose
/// `platform.os` and `platform.architecture` both match wins. Entries
/// without a platform object are skipped.
///
/// Returns `Ok(None)` when the index is well formed but has no matching
/// entry.
///
/// # Errors
///
/// Returns [`RegistryError::MalformedIndex`] if `index_json` is not an image
/// index with a `manifests` array.
///
/// # Examples
///
/// ```
/// use blobstow_core::Platform;
/// use blobstow_registry::select_manifest_entry;
///
/// let index = r#"{
///     "schemaVersion": 2,
///     "manifests": [{
///         "mediaType": "application/vnd.oci.image.manifest.v1+json",
///         "digest": "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
///         "size": 0,
///         "platform": {"architecture": "amd64", "os": "linux"}
///     }]
/// }"#;
///
/// let linux = Platform::parse("linux/amd64")?;
/// assert!(select_manifest_entry(index, &linux)?.is_some());
///
/// let mac = Platform::parse("darwin/amd64")?;
/// assert!(select_manifest_entry(index, &mac)?.is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn select_manifest_entry(
    index_json: &str,
    platform: &Platform,
) -> Result<Option<Descriptor>, RegistryError> {
    let index: ImageIndex =
        serde_json::from_str(index_json).map_err(|e| RegistryError::MalformedIndex {
            message: e.to_string(),
        })?;

    let entry = index.manifests.into_iter().find(|entry| {
        entry
            .platform
            .as_ref()
            .is_some_and(|candidate| candidate.matches(platform))
    });

    match &entry {
        Some(found) => debug!(%platform, digest = %found.digest, "Selected manifest entry"),
        None => debug!(%platform, "No manifest entry for platform"),
    }

    Ok(entry)
}
