//! Push transport: copying a local OCI layout to a registry.
//!
//! [`PushClient`] is the seam the storage façade uploads through. The
//! bundled [`RegistryPusher`] walks a layout written by
//! [`LayoutBuilder`](crate::LayoutBuilder) and replays it with the
//! distribution push API:
//!
//! 1. every config and layer blob, skipping ones the registry already has;
//! 2. every image manifest, by digest;
//! 3. the image index, under the destination tag.
//!
//! Credentials are sent as an opaque `Authorization` header. There is no
//! token-exchange handshake.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use blobstow_core::{ContentDigest, Reference};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::StatusCode;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::client::{auth_headers, build_http_client, cancellable, send};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::layout::{BLOBS_DIR, INDEX_FILE};
use crate::oci::{Descriptor, ImageIndex, Manifest, MediaType};

/// Copies a local OCI layout to a registry reference.
#[async_trait]
pub trait PushClient: Send + Sync {
    /// Uploads every blob and manifest under `layout_root` and tags the
    /// root image index as `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be read or the registry
    /// rejects any upload.
    async fn copy_image(
        &self,
        layout_root: &Path,
        destination: &Reference,
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError>;
}

/// [`PushClient`] speaking the OCI distribution push API.
#[derive(Debug, Clone)]
pub struct RegistryPusher {
    config: RegistryConfig,
    http: reqwest::Client,
}

impl RegistryPusher {
    /// Creates a pusher for the registry described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::{RegistryAuth, RegistryConfig, RegistryPusher};
    ///
    /// let config = RegistryConfig::new("https://ghcr.io")
    ///     .with_auth(RegistryAuth::basic("octocat", "ghp_token"));
    /// let pusher = RegistryPusher::new(config)?;
    /// # Ok::<(), blobstow_registry::RegistryError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http = build_http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Checks the configured credentials against `GET /v2/`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AuthenticationFailed`] on 401 and
    /// [`RegistryError::HttpError`] on any other non-200 status.
    pub async fn login(&self, cancel: &CancellationToken) -> Result<(), RegistryError> {
        let url = self.config.api_url("");
        let request = self
            .http
            .get(&url)
            .headers(auth_headers(&self.config.auth)?);

        let response = send(request, &url, cancel).await?;
        match response.status() {
            StatusCode::OK => {
                debug!(registry = %self.config.url, "Registry login succeeded");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(RegistryError::AuthenticationFailed {
                message: format!("{} rejected the supplied credentials", self.config.url),
            }),
            status => Err(RegistryError::HttpError {
                status: status.as_u16(),
                url,
            }),
        }
    }

    /// Uploads one blob from the layout unless the registry already has it.
    ///
    /// Returns true if the blob was uploaded.
    async fn push_blob(
        &self,
        repository: &str,
        layout_root: &Path,
        descriptor: &Descriptor,
        cancel: &CancellationToken,
    ) -> Result<bool, RegistryError> {
        let digest = &descriptor.digest;

        let head_url = self
            .config
            .api_url(&format!("{repository}/blobs/{digest}"));
        let request = self
            .http
            .head(&head_url)
            .headers(auth_headers(&self.config.auth)?);
        if send(request, &head_url, cancel).await?.status().is_success() {
            debug!(%digest, "Blob already present, skipping");
            return Ok(false);
        }

        let start_url = self
            .config
            .api_url(&format!("{repository}/blobs/uploads/"));
        let request = self
            .http
            .post(&start_url)
            .headers(auth_headers(&self.config.auth)?);
        let response = send(request, &start_url, cancel).await?;
        if !response.status().is_success() {
            return Err(upload_failed(digest, response, cancel).await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RegistryError::UploadFailed {
                digest: digest.clone(),
                message: "No upload location returned".to_string(),
            })?;
        let mut upload_url = self.resolve_location(location)?;
        upload_url.query_pairs_mut().append_pair("digest", digest);

        let path = blob_path(layout_root, descriptor)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| RegistryError::io(&path, e))?;

        let request = self
            .http
            .put(upload_url.as_str())
            .headers(auth_headers(&self.config.auth)?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, descriptor.size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)));
        let response = send(request, upload_url.as_str(), cancel).await?;
        if !response.status().is_success() {
            return Err(upload_failed(digest, response, cancel).await);
        }

        debug!(%digest, size = descriptor.size, "Uploaded blob");
        Ok(true)
    }

    /// Puts a manifest or index document under `reference` (tag or digest).
    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        media_type: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError> {
        let url = self
            .config
            .api_url(&format!("{repository}/manifests/{reference}"));
        let request = self
            .http
            .put(&url)
            .headers(auth_headers(&self.config.auth)?)
            .header(CONTENT_TYPE, media_type)
            .body(body);

        let response = send(request, &url, cancel).await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = cancellable(&url, cancel, async {
                Ok::<_, RegistryError>(response.text().await.unwrap_or_default())
            })
            .await?;
            return Err(RegistryError::ManifestPushFailed {
                reference: reference.to_string(),
                message: format!("{status}: {text}"),
            });
        }

        debug!(reference, media_type, "Pushed manifest");
        Ok(())
    }

    /// Resolves an upload `Location` header, which may be relative.
    fn resolve_location(&self, location: &str) -> Result<Url, RegistryError> {
        Url::parse(&self.config.url)
            .and_then(|base| base.join(location))
            .map_err(|_| RegistryError::InvalidUrl {
                url: location.to_string(),
            })
    }
}

#[async_trait]
impl PushClient for RegistryPusher {
    async fn copy_image(
        &self,
        layout_root: &Path,
        destination: &Reference,
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError> {
        let repository = destination.repository();

        let root_bytes = read_file(&layout_root.join(INDEX_FILE)).await?;
        let root: ImageIndex = serde_json::from_slice(&root_bytes)?;
        let [index_desc] = root.manifests.as_slice() else {
            return Err(RegistryError::InvalidLayout {
                path: layout_root.to_path_buf(),
                message: format!(
                    "{INDEX_FILE} must reference exactly one image index, found {}",
                    root.manifests.len()
                ),
            });
        };

        let index_bytes = read_file(&blob_path(layout_root, index_desc)?).await?;
        let index: ImageIndex = serde_json::from_slice(&index_bytes)?;

        let mut uploaded = 0_usize;
        for entry in &index.manifests {
            let manifest_bytes = read_file(&blob_path(layout_root, entry)?).await?;
            let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;

            for blob in std::iter::once(&manifest.config).chain(&manifest.layers) {
                if self.push_blob(repository, layout_root, blob, cancel).await? {
                    uploaded += 1;
                }
            }

            self.put_manifest(
                repository,
                &entry.digest,
                entry.media_type.as_str(),
                manifest_bytes,
                cancel,
            )
            .await?;
        }

        self.put_manifest(
            repository,
            destination.tag(),
            MediaType::OCI_INDEX,
            index_bytes,
            cancel,
        )
        .await?;

        info!(
            %destination,
            index = %index_desc.digest,
            manifests = index.manifests.len(),
            uploaded,
            "Pushed image"
        );
        Ok(())
    }
}

/// Store path of a descriptor's blob, refusing digests that are not
/// well-formed SHA-256.
fn blob_path(layout_root: &Path, descriptor: &Descriptor) -> Result<PathBuf, RegistryError> {
    let digest = ContentDigest::from_str(&descriptor.digest)?;
    Ok(layout_root.join(BLOBS_DIR).join(digest.hex()))
}

async fn read_file(path: &Path) -> Result<Vec<u8>, RegistryError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| RegistryError::io(path, e))
}

async fn upload_failed(
    digest: &str,
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> RegistryError {
    let status = response.status();
    let text = cancellable(digest, cancel, async {
        Ok::<_, RegistryError>(response.text().await.unwrap_or_default())
    })
    .await
    .unwrap_or_default();
    RegistryError::UploadFailed {
        digest: digest.to_string(),
        message: format!("{status}: {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pusher(url: &str) -> RegistryPusher {
        RegistryPusher::new(RegistryConfig::new(url)).unwrap()
    }

    #[test]
    fn test_resolve_relative_location() {
        let url = pusher("http://localhost:5000")
            .resolve_location("/v2/team/tool/blobs/uploads/abc?state=1")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/v2/team/tool/blobs/uploads/abc?state=1"
        );
    }

    #[test]
    fn test_resolve_absolute_location() {
        let url = pusher("https://ghcr.io")
            .resolve_location("https://uploads.example.com/session/1")
            .unwrap();
        assert_eq!(url.as_str(), "https://uploads.example.com/session/1");
    }

    #[test]
    fn test_digest_query_is_appended_to_existing_query() {
        let mut url = pusher("http://localhost:5000")
            .resolve_location("/upload?state=xyz")
            .unwrap();
        url.query_pairs_mut().append_pair("digest", "sha256:abc");
        assert_eq!(url.query(), Some("state=xyz&digest=sha256%3Aabc"));
    }

    #[test]
    fn test_blob_path_rejects_malformed_digest() {
        let desc = Descriptor {
            media_type: MediaType::layer_gzip(),
            digest: "sha256:../../etc/passwd".to_string(),
            size: 0,
            platform: None,
            annotations: None,
        };
        let err = blob_path(Path::new("/layout"), &desc).unwrap_err();
        assert!(matches!(err, RegistryError::Core(_)));
    }

    #[test]
    fn test_blob_path_uses_hex() {
        let digest = ContentDigest::from_bytes(b"x");
        let desc = Descriptor::new(MediaType::layer_gzip(), &digest, 1);
        let path = blob_path(Path::new("/layout"), &desc).unwrap();
        assert_eq!(path, Path::new("/layout/blobs/sha256").join(digest.hex()));
    }

    #[tokio::test]
    async fn test_copy_image_without_index_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let reference = Reference::parse("localhost:5000/team/tool:1.0.0").unwrap();
        let err = pusher("http://localhost:5000")
            .copy_image(dir.path(), &reference, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::IoError { path, .. } if path.ends_with(INDEX_FILE)));
    }

    #[tokio::test]
    async fn test_copy_image_rejects_empty_root_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE),
            r#"{"schemaVersion":2,"manifests":[]}"#,
        )
        .unwrap();
        let reference = Reference::parse("localhost:5000/team/tool:1.0.0").unwrap();
        let err = pusher("http://localhost:5000")
            .copy_image(dir.path(), &reference, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidLayout { .. }));
    }
}
