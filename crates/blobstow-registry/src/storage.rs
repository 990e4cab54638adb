//! Artifact storage façade.
//!
//! [`ArtifactStorage`] is the two-operation capability every backend
//! offers: put a blob for a platform under a reference, and get it back.
//! [`RegistryStorage`] implements it on top of an OCI registry by building
//! a single-artifact layout for uploads and walking tag, index and blob for
//! downloads. [`RegistryReader`] is the download half on its own, for
//! callers that never push.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use blobstow_core::{ContentDigest, Platform, Reference};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{cancellable, DistributionClient};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::layout::LayoutBuilder;
use crate::push::PushClient;
use crate::selector::select_manifest_entry;
use crate::tag::TagQuery;

/// Uploads and downloads platform-specific artifacts by reference.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Stores the gzip stream read from `reader` as the `platform` build of
    /// `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is invalid, the stream is not gzip,
    /// or the backend rejects the upload.
    async fn upload(
        &self,
        reference: &str,
        platform: Platform,
        image_source: Option<&str>,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError>;

    /// Writes the `platform` build of `reference` into `writer` and returns
    /// the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is invalid, no build exists for
    /// `platform`, or the backend fails.
    async fn download(
        &self,
        reference: &str,
        platform: Platform,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<u64, RegistryError>;
}

/// Anonymous, read-only access to artifacts in any registry.
///
/// A [`DistributionClient`] is built per call from the reference's host,
/// so one reader serves every registry.
#[derive(Debug, Clone, Copy)]
pub struct RegistryReader {
    plain_http: bool,
    timeout: Duration,
}

impl Default for RegistryReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryReader {
    /// Creates a reader talking HTTPS with a 30 second idle timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            plain_http: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Reads over plain HTTP, for local development registries.
    #[must_use]
    pub const fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    /// Sets the connect and idle-read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self, reference: &Reference) -> Result<DistributionClient, RegistryError> {
        let mut config = RegistryConfig::for_host(reference.registry()).with_timeout(self.timeout);
        if self.plain_http {
            config = config.with_plain_http();
        }
        DistributionClient::new(config)
    }

    /// Writes the `platform` build of `reference` into `writer` and returns
    /// the number of bytes written.
    ///
    /// A `latest` tag resolves to the last tag the registry lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is invalid, the tag list is empty,
    /// the index has no entry for `platform` or lacks the blob digest
    /// annotation, or a request fails.
    pub async fn download(
        &self,
        reference: &str,
        platform: Platform,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<u64, RegistryError> {
        let mut reference = Reference::parse(reference)?;
        let client = self.client(&reference)?;

        let query = TagQuery::parse(reference.tag());
        if query.is_latest() {
            let tags = client.list_tags(&reference, cancel).await?;
            let tag = query.resolve(&tags, &reference.to_string())?;
            debug!(%reference, resolved = %tag, "Resolved latest tag");
            reference = reference.with_tag(&tag)?;
        }

        let index = client.get_manifest(&reference, cancel).await?;
        let entry = select_manifest_entry(&index, &platform)?.ok_or_else(|| {
            RegistryError::PlatformNotFound {
                reference: reference.to_string(),
                platform: platform.to_string(),
            }
        })?;
        let blob_digest = entry
            .blob_digest()
            .ok_or_else(|| RegistryError::MissingDigestAnnotation {
                reference: reference.to_string(),
                platform: platform.to_string(),
            })?;
        let blob_digest = ContentDigest::from_hex(blob_digest)?;

        let written = client
            .get_blob(&reference, blob_digest.hex(), writer, cancel)
            .await?;

        info!(%reference, %platform, blob = %blob_digest, size = written, "Downloaded artifact");
        Ok(written)
    }
}

/// [`ArtifactStorage`] backed by an OCI registry.
///
/// Downloads go through a [`RegistryReader`]. Uploads go through the
/// supplied [`PushClient`].
#[derive(Debug)]
pub struct RegistryStorage<P> {
    pusher: P,
    reader: RegistryReader,
    scratch_dir: Option<PathBuf>,
}

impl<P: PushClient> RegistryStorage<P> {
    /// Creates a storage façade pushing through `pusher`.
    #[must_use]
    pub const fn new(pusher: P) -> Self {
        Self {
            pusher,
            reader: RegistryReader::new(),
            scratch_dir: None,
        }
    }

    /// Reads over plain HTTP, for local development registries.
    #[must_use]
    pub const fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.reader = self.reader.with_plain_http(plain_http);
        self
    }

    /// Sets the connect and idle-read timeout for downloads.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.reader = self.reader.with_timeout(timeout);
        self
    }

    /// Places spooled blobs and layouts under `dir` instead of the system
    /// temporary directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Returns the push transport.
    #[must_use]
    pub const fn pusher(&self) -> &P {
        &self.pusher
    }

    /// Returns the read side.
    #[must_use]
    pub const fn reader(&self) -> &RegistryReader {
        &self.reader
    }

    /// Copies `reader` into a uniquely named `blob.*.tar.gz` temporary file.
    async fn spool(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<NamedTempFile, RegistryError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("blob.").suffix(".tar.gz");
        let spool = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| {
            RegistryError::io(
                self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
                e,
            )
        })?;

        let handle = spool
            .as_file()
            .try_clone()
            .map_err(|e| RegistryError::io(spool.path(), e))?;
        let mut file = tokio::fs::File::from_std(handle);

        let copied = cancellable("spool upload", cancel, async {
            let copied = tokio::io::copy(reader, &mut file)
                .await
                .map_err(|e| RegistryError::io(spool.path(), e))?;
            file.flush()
                .await
                .map_err(|e| RegistryError::io(spool.path(), e))?;
            Ok::<_, RegistryError>(copied)
        })
        .await?;

        debug!(path = %spool.path().display(), size = copied, "Spooled upload");
        Ok(spool)
    }
}

#[async_trait]
impl<P: PushClient> ArtifactStorage for RegistryStorage<P> {
    async fn upload(
        &self,
        reference: &str,
        platform: Platform,
        image_source: Option<&str>,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<(), RegistryError> {
        let reference = Reference::parse(reference)?;
        let spool = self.spool(reader, cancel).await?;

        let blob_path = spool.path().to_path_buf();
        let tag = reference.tag().to_string();
        let image_source = image_source.map(str::to_string);
        let scratch_dir = self.scratch_dir.clone();
        let (layout, built) = tokio::task::spawn_blocking(move || {
            let layout = match scratch_dir {
                Some(dir) => LayoutBuilder::new_in(dir)?,
                None => LayoutBuilder::new()?,
            };
            let built = layout.build(platform, &blob_path, &tag, image_source.as_deref())?;
            Ok::<_, RegistryError>((layout, built))
        })
        .await
        .map_err(|e| RegistryError::TaskFailed {
            message: e.to_string(),
        })??;

        self.pusher
            .copy_image(layout.root(), &reference, cancel)
            .await?;

        info!(
            %reference,
            %platform,
            blob = %built.blob.digest,
            size = built.blob.size,
            "Uploaded artifact"
        );
        Ok(())
    }

    async fn download(
        &self,
        reference: &str,
        platform: Platform,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<u64, RegistryError> {
        self.reader
            .download(reference, platform, writer, cancel)
            .await
    }
}
