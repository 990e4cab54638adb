//! OCI Image and Distribution Specification types.
//!
//! This module defines the documents written into an OCI layout and read
//! back from registries: descriptors, image manifests, image indexes, the
//! layout marker and the tag list response.

use std::collections::BTreeMap;

use blobstow_core::{ContentDigest, Platform};
use serde::{Deserialize, Serialize};

/// Annotation recording the hex digest of the artifact blob itself.
///
/// Set on both the image manifest and its index entry so a reader can find
/// the blob without interpreting the manifest's layer list.
pub const ANNOTATION_BLOB_DIGEST: &str = "dev.pkgforge.bin.digest";

/// Standard annotation naming the tag of a manifest in `index.json`.
pub const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";

/// Standard annotation / label linking an image to its source repository.
pub const ANNOTATION_SOURCE: &str = "org.opencontainers.image.source";

/// Ordered annotation map, so serialized documents are byte-stable.
pub type Annotations = BTreeMap<String, String>;

/// OCI media types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    /// OCI image manifest media type.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index media type.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// OCI image config media type.
    pub const OCI_CONFIG: &'static str = "application/vnd.oci.image.config.v1+json";

    /// Gzip-compressed tar layer media type.
    pub const OCI_LAYER_GZIP: &'static str = "application/vnd.oci.image.layer.v1.tar+gzip";

    /// Creates a new media type.
    #[must_use]
    pub fn new(media_type: impl Into<String>) -> Self {
        Self(media_type.into())
    }

    /// Returns the media type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Image manifest media type.
    #[must_use]
    pub fn manifest() -> Self {
        Self::new(Self::OCI_MANIFEST)
    }

    /// Image index media type.
    #[must_use]
    pub fn index() -> Self {
        Self::new(Self::OCI_INDEX)
    }

    /// Image config media type.
    #[must_use]
    pub fn config() -> Self {
        Self::new(Self::OCI_CONFIG)
    }

    /// Gzip layer media type.
    #[must_use]
    pub fn layer_gzip() -> Self {
        Self::new(Self::OCI_LAYER_GZIP)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for MediaType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// Platform object of an index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciPlatform {
    /// CPU architecture (e.g. `amd64`).
    pub architecture: String,

    /// Operating system (e.g. `linux`).
    pub os: String,
}

impl OciPlatform {
    /// Whether this entry targets `platform`.
    #[must_use]
    pub fn matches(&self, platform: &Platform) -> bool {
        self.architecture == platform.arch() && self.os == platform.os()
    }
}

impl From<Platform> for OciPlatform {
    fn from(platform: Platform) -> Self {
        Self {
            architecture: platform.arch().to_string(),
            os: platform.os().to_string(),
        }
    }
}

/// OCI content descriptor.
///
/// A descriptor describes the disposition of targeted content. It includes
/// the type of the content, a content identifier (digest), and the byte-size
/// of the raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    pub media_type: MediaType,

    /// Digest of the targeted content.
    pub digest: String,

    /// Size in bytes of the content.
    pub size: u64,

    /// Target platform, on index entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<OciPlatform>,

    /// Optional annotations (key-value metadata).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl Descriptor {
    /// Creates a new descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_core::ContentDigest;
    /// use blobstow_registry::{Descriptor, MediaType};
    ///
    /// let desc = Descriptor::new(MediaType::layer_gzip(), &ContentDigest::from_bytes(b""), 0);
    /// assert_eq!(desc.digest_algorithm(), "sha256");
    /// ```
    #[must_use]
    pub fn new(media_type: MediaType, digest: &ContentDigest, size: u64) -> Self {
        Self {
            media_type,
            digest: digest.to_string(),
            size,
            platform: None,
            annotations: None,
        }
    }

    /// Sets the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Replaces the annotation set.
    #[must_use]
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Returns the digest algorithm (e.g., "sha256").
    #[must_use]
    pub fn digest_algorithm(&self) -> &str {
        self.digest.split(':').next().unwrap_or("sha256")
    }

    /// Returns the digest value (without algorithm prefix).
    #[must_use]
    pub fn digest_value(&self) -> &str {
        self.digest.split(':').nth(1).unwrap_or(&self.digest)
    }

    /// Returns the value of an annotation, if present.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.as_ref()?.get(key).map(String::as_str)
    }

    /// Hex digest of the artifact blob, from [`ANNOTATION_BLOB_DIGEST`].
    #[must_use]
    pub fn blob_digest(&self) -> Option<&str> {
        self.annotation(ANNOTATION_BLOB_DIGEST)
            .filter(|value| !value.is_empty())
    }
}

/// OCI Image Manifest.
///
/// Binds one config blob and the artifact layer for a single platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version (always 2).
    pub schema_version: u32,

    /// Media type of this manifest.
    pub media_type: MediaType,

    /// Configuration descriptor.
    pub config: Descriptor,

    /// Layers that make up the artifact.
    pub layers: Vec<Descriptor>,

    /// Optional annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl Manifest {
    /// Creates a manifest for a config blob and a single layer.
    #[must_use]
    pub fn new(config: Descriptor, layer: Descriptor) -> Self {
        Self {
            schema_version: 2,
            media_type: MediaType::manifest(),
            config,
            layers: vec![layer],
            annotations: None,
        }
    }

    /// Replaces the annotation set.
    #[must_use]
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }
}

/// OCI Image Index.
///
/// Used both for the per-platform manifest list and for the layout's root
/// `index.json`, which omits `mediaType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    /// Schema version (always 2).
    pub schema_version: u32,

    /// Media type of this index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// Referenced manifests (or, for `index.json`, the referenced index).
    pub manifests: Vec<Descriptor>,

    /// Optional annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl ImageIndex {
    /// Creates an image index over the given manifest descriptors.
    #[must_use]
    pub fn new(manifests: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(MediaType::index()),
            manifests,
            annotations: None,
        }
    }

    /// Creates the root `index.json` pointing at a single image index.
    #[must_use]
    pub fn root(index: Descriptor) -> Self {
        Self {
            schema_version: 2,
            media_type: None,
            manifests: vec![index],
            annotations: None,
        }
    }

    /// Replaces the annotation set.
    #[must_use]
    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }
}

/// Contents of the `oci-layout` marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayout {
    /// Layout version, `1.0.0`.
    pub image_layout_version: String,
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self {
            image_layout_version: "1.0.0".to_string(),
        }
    }
}

/// Response from the `/v2/<name>/tags/list` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagList {
    /// Repository name.
    #[serde(default)]
    pub name: String,

    /// List of tags, in the order the registry returned them.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(data: &[u8]) -> ContentDigest {
        ContentDigest::from_bytes(data)
    }

    #[test]
    fn test_media_type_layer() {
        let mt = MediaType::layer_gzip();
        assert_eq!(mt.as_str(), "application/vnd.oci.image.layer.v1.tar+gzip");
    }

    #[test]
    fn test_descriptor_new() {
        let d = digest(b"abc");
        let desc = Descriptor::new(MediaType::layer_gzip(), &d, 1024);
        assert_eq!(desc.size, 1024);
        assert_eq!(desc.digest, d.to_string());
        assert_eq!(desc.digest_algorithm(), "sha256");
        assert_eq!(desc.digest_value(), d.hex());
    }

    #[test]
    fn test_descriptor_blob_digest() {
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_BLOB_DIGEST.to_string(), "abc123".to_string());
        let desc = Descriptor::new(MediaType::manifest(), &digest(b"m"), 10)
            .with_annotations(annotations);
        assert_eq!(desc.blob_digest(), Some("abc123"));

        let bare = Descriptor::new(MediaType::manifest(), &digest(b"m"), 10);
        assert_eq!(bare.blob_digest(), None);
    }

    #[test]
    fn test_descriptor_serialization_skips_empty_fields() {
        let desc = Descriptor::new(MediaType::config(), &digest(b"c"), 2);
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"mediaType\""));
        assert!(!json.contains("platform"));
        assert!(!json.contains("annotations"));
    }

    #[test]
    fn test_index_entry_platform() {
        let desc = Descriptor::new(MediaType::manifest(), &digest(b"m"), 10)
            .with_platform(Platform::parse("linux/arm64").unwrap());
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["platform"]["architecture"], "arm64");
        assert_eq!(json["platform"]["os"], "linux");
    }

    #[test]
    fn test_manifest_serialization() {
        let config = Descriptor::new(MediaType::config(), &digest(b"c"), 2);
        let layer = Descriptor::new(MediaType::layer_gzip(), &digest(b"l"), 3);
        let manifest = Manifest::new(config, layer);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["schemaVersion"], 2);
        assert_eq!(json["mediaType"], MediaType::OCI_MANIFEST);
        assert_eq!(json["layers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_root_index_has_no_media_type() {
        let index = Descriptor::new(MediaType::index(), &digest(b"i"), 5);
        let json = serde_json::to_value(ImageIndex::root(index)).unwrap();
        assert!(json.get("mediaType").is_none());
        assert_eq!(json["manifests"][0]["mediaType"], MediaType::OCI_INDEX);
    }

    #[test]
    fn test_image_layout_marker() {
        let json = serde_json::to_string(&ImageLayout::default()).unwrap();
        assert_eq!(json, r#"{"imageLayoutVersion":"1.0.0"}"#);
    }

    #[test]
    fn test_tag_list_deserialization() {
        let json = r#"{
            "name": "example/hello",
            "tags": ["1.0.0", "1.2.0", "2.0.0-rc1"]
        }"#;

        let tags: TagList = serde_json::from_str(json).unwrap();
        assert_eq!(tags.name, "example/hello");
        assert_eq!(tags.tags.unwrap().len(), 3);
    }

    #[test]
    fn test_tag_list_null_tags() {
        let tags: TagList = serde_json::from_str(r#"{"name": "x", "tags": null}"#).unwrap();
        assert!(tags.tags.is_none());
    }
}
