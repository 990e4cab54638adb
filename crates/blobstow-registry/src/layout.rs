//! Local OCI image layout assembly.
//!
//! A [`LayoutBuilder`] owns a fresh temporary directory and writes one
//! single-layer image into it:
//!
//! ```text
//! <root>/
//! ├── oci-layout              {"imageLayoutVersion":"1.0.0"}
//! ├── index.json              -> image index
//! └── blobs/sha256/
//!     ├── <blob digest>       the gzip artifact, byte for byte
//!     ├── <config digest>     rootfs + platform + labels
//!     ├── <manifest digest>   config + layer
//!     └── <index digest>      platform -> manifest
//! ```
//!
//! Every file under `blobs/sha256` is named by the SHA-256 of its contents,
//! and every descriptor records the exact size of what it points at. The
//! directory is removed when the builder is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use blobstow_core::{ContentDigest, Platform};
use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::oci::{
    Annotations, Descriptor, ImageIndex, ImageLayout, Manifest, MediaType, ANNOTATION_BLOB_DIGEST,
    ANNOTATION_REF_NAME, ANNOTATION_SOURCE,
};

/// Name of the layout marker file.
pub const OCI_LAYOUT_FILE: &str = "oci-layout";

/// Name of the root index file.
pub const INDEX_FILE: &str = "index.json";

/// Blob store directory, relative to the layout root.
pub const BLOBS_DIR: &str = "blobs/sha256";

/// Digest and size of a file written to the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBlob {
    /// Digest of the written bytes.
    pub digest: ContentDigest,
    /// Length of the written bytes.
    pub size: u64,
}

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltLayout {
    /// The compressed artifact blob (the single layer).
    pub blob: WrittenBlob,
    /// Digest of the decompressed artifact, recorded as the config `diff_id`.
    pub diff_id: ContentDigest,
    /// The image config document.
    pub config: WrittenBlob,
    /// The image manifest document.
    pub manifest: WrittenBlob,
    /// The image index document.
    pub index: WrittenBlob,
}

/// Builds a single-artifact OCI layout in a private temporary directory.
#[derive(Debug)]
pub struct LayoutBuilder {
    dir: TempDir,
    blobs_dir: PathBuf,
}

impl LayoutBuilder {
    /// Creates a builder over a new, uniquely named temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IoError`] if the directory cannot be created.
    pub fn new() -> Result<Self, RegistryError> {
        let dir = tempfile::Builder::new()
            .prefix("oci")
            .tempdir()
            .map_err(|e| RegistryError::io(std::env::temp_dir(), e))?;
        Self::with_dir(dir)
    }

    /// Creates a builder over a new temporary directory inside `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IoError`] if the directory cannot be created.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix("oci")
            .tempdir_in(parent)
            .map_err(|e| RegistryError::io(parent, e))?;
        Self::with_dir(dir)
    }

    fn with_dir(dir: TempDir) -> Result<Self, RegistryError> {
        let blobs_dir = dir.path().join(BLOBS_DIR);
        fs::create_dir_all(&blobs_dir).map_err(|e| RegistryError::io(&blobs_dir, e))?;
        Ok(Self { dir, blobs_dir })
    }

    /// Root directory of the layout.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a blob inside the store.
    #[must_use]
    pub fn blob_path(&self, digest: &ContentDigest) -> PathBuf {
        self.blobs_dir.join(digest.hex())
    }

    /// Writes the complete layout for one artifact.
    ///
    /// `blob_path` must be a gzip stream; it is copied into the store and
    /// never modified. `tag` is recorded as the ref name in `index.json`.
    /// When `image_source` is given it is added as the
    /// `org.opencontainers.image.source` label and annotation.
    ///
    /// # Errors
    ///
    /// Returns an I/O error on any filesystem failure and a decompression
    /// error if `blob_path` is not valid gzip. The first failure aborts the
    /// build; the partial directory is left for the drop to clean up.
    pub fn build(
        &self,
        platform: Platform,
        blob_path: &Path,
        tag: &str,
        image_source: Option<&str>,
    ) -> Result<BuiltLayout, RegistryError> {
        self.write_image_layout()?;

        let blob = self.write_blob(blob_path)?;
        let diff_id = ContentDigest::from_gzip_file(blob_path)?;

        let mut metadata = Map::new();
        metadata.insert("architecture".into(), platform.arch().into());
        metadata.insert("os".into(), platform.os().into());
        if let Some(source) = image_source {
            let mut labels = Map::new();
            labels.insert(ANNOTATION_SOURCE.into(), source.into());
            let mut container_config = Map::new();
            container_config.insert("Labels".into(), Value::Object(labels));
            metadata.insert("config".into(), Value::Object(container_config));
        }
        let config = self.write_image_config(&diff_id, metadata)?;

        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_BLOB_DIGEST.into(), blob.digest.hex().into());
        if let Some(source) = image_source {
            annotations.insert(ANNOTATION_SOURCE.into(), source.into());
        }

        let manifest = Manifest::new(
            Descriptor::new(MediaType::config(), &config.digest, config.size),
            Descriptor::new(MediaType::layer_gzip(), &blob.digest, blob.size),
        )
        .with_annotations(annotations.clone());
        let manifest = self.write_json(&self.blobs_dir, &manifest, None)?;

        let entry = Descriptor::new(MediaType::manifest(), &manifest.digest, manifest.size)
            .with_platform(platform)
            .with_annotations(annotations.clone());
        let index = ImageIndex::new(vec![entry]).with_annotations(annotations);
        let index = self.write_json(&self.blobs_dir, &index, None)?;

        self.write_index_json(&index, tag)?;

        info!(
            root = %self.root().display(),
            %platform,
            tag,
            blob = %blob.digest,
            index = %index.digest,
            "Built OCI layout"
        );

        Ok(BuiltLayout {
            blob,
            diff_id,
            config,
            manifest,
            index,
        })
    }

    fn write_image_layout(&self) -> Result<WrittenBlob, RegistryError> {
        self.write_json(self.root(), &ImageLayout::default(), Some(OCI_LAYOUT_FILE))
    }

    /// Copies the artifact into the store under its own digest.
    fn write_blob(&self, source: &Path) -> Result<WrittenBlob, RegistryError> {
        let digest = ContentDigest::from_file(source)?;
        let size = fs::metadata(source)
            .map_err(|e| RegistryError::io(source, e))?
            .len();

        let target = self.blob_path(&digest);
        if target.exists() {
            debug!(%digest, "Blob already in store");
        } else {
            fs::copy(source, &target).map_err(|e| RegistryError::io(&target, e))?;
            debug!(%digest, size, "Copied blob into store");
        }

        Ok(WrittenBlob { digest, size })
    }

    fn write_image_config(
        &self,
        diff_id: &ContentDigest,
        metadata: Map<String, Value>,
    ) -> Result<WrittenBlob, RegistryError> {
        let mut rootfs = Map::new();
        rootfs.insert("type".into(), "layers".into());
        rootfs.insert(
            "diff_ids".into(),
            Value::Array(vec![diff_id.to_string().into()]),
        );

        let mut config = Map::new();
        config.insert("rootfs".into(), Value::Object(rootfs));
        config.extend(metadata);

        self.write_json(&self.blobs_dir, &config, None)
    }

    fn write_index_json(&self, index: &WrittenBlob, tag: &str) -> Result<WrittenBlob, RegistryError> {
        let mut annotations = Annotations::new();
        annotations.insert(ANNOTATION_REF_NAME.into(), tag.into());

        let entry = Descriptor::new(MediaType::index(), &index.digest, index.size)
            .with_annotations(annotations);
        let root = ImageIndex::root(entry);
        self.write_json(self.root(), &root, Some(INDEX_FILE))
    }

    /// Serializes `value` into `dir`, named `filename` or, when `None`, by
    /// the digest of the serialized bytes.
    fn write_json<T: Serialize>(
        &self,
        dir: &Path,
        value: &T,
        filename: Option<&str>,
    ) -> Result<WrittenBlob, RegistryError> {
        let bytes = serde_json::to_vec(value)?;
        let digest = ContentDigest::from_bytes(&bytes);
        let path = dir.join(filename.unwrap_or_else(|| digest.hex()));

        fs::write(&path, &bytes).map_err(|e| RegistryError::io(&path, e))?;
        debug!(path = %path.display(), %digest, size = bytes.len(), "Wrote JSON document");

        Ok(WrittenBlob {
            digest,
            size: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn gzip_file(payload: &[u8]) -> tempfile::NamedTempFile {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_new_creates_blob_store() {
        let builder = LayoutBuilder::new().unwrap();
        assert!(builder.root().join(BLOBS_DIR).is_dir());
    }

    #[test]
    fn test_builders_get_distinct_directories() {
        let a = LayoutBuilder::new().unwrap();
        let b = LayoutBuilder::new().unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_drop_removes_directory() {
        let builder = LayoutBuilder::new().unwrap();
        let root = builder.root().to_path_buf();
        drop(builder);
        assert!(!root.exists());
    }

    #[test]
    fn test_build_writes_layout_marker() {
        let source = gzip_file(b"payload");
        let builder = LayoutBuilder::new().unwrap();
        builder
            .build(Platform::default(), source.path(), "1.0.0", None)
            .unwrap();

        let marker = fs::read_to_string(builder.root().join(OCI_LAYOUT_FILE)).unwrap();
        assert_eq!(marker, r#"{"imageLayoutVersion":"1.0.0"}"#);
    }

    #[test]
    fn test_build_copies_blob_unchanged() {
        let source = gzip_file(&b"binary contents ".repeat(100));
        let builder = LayoutBuilder::new().unwrap();
        let built = builder
            .build(Platform::default(), source.path(), "1.0.0", None)
            .unwrap();

        let stored = fs::read(builder.blob_path(&built.blob.digest)).unwrap();
        assert_eq!(stored, fs::read(source.path()).unwrap());
        assert_eq!(ContentDigest::from_bytes(&stored), built.blob.digest);
        assert_eq!(stored.len() as u64, built.blob.size);
    }

    #[test]
    fn test_build_config_records_decompressed_digest() {
        let payload = b"tar stream stand-in ".repeat(50);
        let source = gzip_file(&payload);
        let builder = LayoutBuilder::new().unwrap();
        let built = builder
            .build(
                Platform::parse("darwin/arm64").unwrap(),
                source.path(),
                "1.0.0",
                Some("https://github.com/example/hello"),
            )
            .unwrap();

        assert_eq!(built.diff_id, ContentDigest::from_bytes(&payload));
        assert_ne!(built.diff_id, built.blob.digest);

        let config = read_json(&builder.blob_path(&built.config.digest));
        assert_eq!(config["rootfs"]["type"], "layers");
        assert_eq!(config["rootfs"]["diff_ids"][0], built.diff_id.to_string());
        assert_eq!(config["architecture"], "arm64");
        assert_eq!(config["os"], "darwin");
        assert_eq!(
            config["config"]["Labels"][ANNOTATION_SOURCE],
            "https://github.com/example/hello"
        );
    }

    #[test]
    fn test_build_manifest_references_config_and_layer() {
        let source = gzip_file(b"payload");
        let builder = LayoutBuilder::new().unwrap();
        let built = builder
            .build(Platform::default(), source.path(), "1.0.0", None)
            .unwrap();

        let manifest: Manifest =
            serde_json::from_slice(&fs::read(builder.blob_path(&built.manifest.digest)).unwrap())
                .unwrap();
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(manifest.config.digest, built.config.digest.to_string());
        assert_eq!(manifest.config.size, built.config.size);
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].media_type, MediaType::layer_gzip());
        assert_eq!(manifest.layers[0].digest, built.blob.digest.to_string());
        assert_eq!(manifest.layers[0].size, built.blob.size);
        assert_eq!(
            manifest.annotations.unwrap()[ANNOTATION_BLOB_DIGEST],
            built.blob.digest.hex()
        );
    }

    #[test]
    fn test_build_index_and_root_pointer() {
        let source = gzip_file(b"payload");
        let builder = LayoutBuilder::new().unwrap();
        let platform = Platform::parse("linux/arm64").unwrap();
        let built = builder.build(platform, source.path(), "2.1.0", None).unwrap();

        let index: ImageIndex =
            serde_json::from_slice(&fs::read(builder.blob_path(&built.index.digest)).unwrap())
                .unwrap();
        assert_eq!(index.manifests.len(), 1);
        let entry = &index.manifests[0];
        assert_eq!(entry.digest, built.manifest.digest.to_string());
        assert_eq!(entry.size, built.manifest.size);
        assert!(entry.platform.as_ref().unwrap().matches(&platform));
        assert_eq!(entry.blob_digest(), Some(built.blob.digest.hex()));

        let root: ImageIndex =
            serde_json::from_slice(&fs::read(builder.root().join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(root.manifests.len(), 1);
        assert_eq!(root.manifests[0].media_type, MediaType::index());
        assert_eq!(root.manifests[0].digest, built.index.digest.to_string());
        assert_eq!(root.manifests[0].size, built.index.size);
        assert_eq!(root.manifests[0].annotation(ANNOTATION_REF_NAME), Some("2.1.0"));
        assert!(root.annotations.is_none());
    }

    #[test]
    fn test_root_pointer_carries_tag_on_entry() {
        let source = gzip_file(b"payload");
        let builder = LayoutBuilder::new().unwrap();
        builder.build(Platform::default(), source.path(), "2.1.0", None).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(builder.root().join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(raw["manifests"][0]["annotations"][ANNOTATION_REF_NAME], "2.1.0");
        assert!(raw.get("annotations").is_none());
    }

    #[test]
    fn test_every_blob_is_named_by_its_digest() {
        let source = gzip_file(b"payload");
        let builder = LayoutBuilder::new().unwrap();
        builder
            .build(Platform::default(), source.path(), "1.0.0", Some("https://example.com"))
            .unwrap();

        let entries: Vec<_> = fs::read_dir(builder.root().join(BLOBS_DIR))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 4);
        for path in entries {
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            assert_eq!(ContentDigest::from_file(&path).unwrap().hex(), name);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let source = gzip_file(b"payload");
        let a = LayoutBuilder::new().unwrap();
        let b = LayoutBuilder::new().unwrap();
        let built_a = a.build(Platform::default(), source.path(), "1.0.0", None).unwrap();
        let built_b = b.build(Platform::default(), source.path(), "1.0.0", None).unwrap();
        assert_eq!(built_a, built_b);
    }

    #[test]
    fn test_build_rejects_non_gzip() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"plain text, not gzip").unwrap();

        let builder = LayoutBuilder::new().unwrap();
        let err = builder
            .build(Platform::default(), source.path(), "1.0.0", None)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Core(blobstow_core::Error::Decompression { .. })
        ));
    }

    #[test]
    fn test_build_missing_source() {
        let builder = LayoutBuilder::new().unwrap();
        let err = builder
            .build(Platform::default(), Path::new("/nonexistent/blob.tar.gz"), "1.0.0", None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Core(blobstow_core::Error::Io { .. })));
    }

    #[test]
    fn test_build_leaves_source_untouched() {
        let source = gzip_file(b"payload");
        let before = fs::read(source.path()).unwrap();
        let builder = LayoutBuilder::new().unwrap();
        builder
            .build(Platform::default(), source.path(), "1.0.0", None)
            .unwrap();
        assert_eq!(fs::read(source.path()).unwrap(), before);
    }
}
