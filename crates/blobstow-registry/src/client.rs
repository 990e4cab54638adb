//! OCI Distribution API client for anonymous artifact reads.
//!
//! This module covers the read half of the distribution protocol: listing
//! tags, fetching an image index and streaming a blob by digest. Every call
//! takes a [`CancellationToken`]; cancelling it drops the in-flight request
//! and surfaces [`RegistryError::Cancelled`].

use std::future::Future;

use blobstow_core::Reference;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{RegistryAuth, RegistryConfig};
use crate::error::RegistryError;
use crate::oci::{MediaType, TagList};

/// Client for reading artifacts from an OCI-compatible registry.
#[derive(Debug, Clone)]
pub struct DistributionClient {
    config: RegistryConfig,
    http: reqwest::Client,
}

impl DistributionClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created, for example
    /// when a configured CA certificate cannot be read.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::{DistributionClient, RegistryConfig};
    ///
    /// let client = DistributionClient::new(RegistryConfig::for_host("ghcr.io"))?;
    /// assert_eq!(client.config().url, "https://ghcr.io");
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

    /// Lists the tags of the reference's repository, in registry order.
    ///
    /// A response without a `tags` field (or with `null`) is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HttpError`] for any non-200 status and
    /// [`RegistryError::Cancelled`] if `cancel` fires first.
    pub async fn list_tags(
        &self,
        reference: &Reference,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, RegistryError> {
        let url = self
            .config
            .api_url(&format!("{}/tags/list", reference.repository()));

        let response = self.get(&url, None, cancel).await?;
        let body = cancellable(&url, cancel, async {
            Ok::<_, RegistryError>(response.bytes().await?)
        })
        .await?;
        let tag_list: TagList = serde_json::from_slice(&body)?;
        let tags = tag_list.tags.unwrap_or_default();

        debug!(repository = reference.repository(), count = tags.len(), "Listed tags");
        Ok(tags)
    }

    /// Fetches the image index a tag points at, as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HttpError`] for any non-200 status (404 for
    /// an unknown repository or tag) and [`RegistryError::Cancelled`] if
    /// `cancel` fires first.
    pub async fn get_manifest(
        &self,
        reference: &Reference,
        cancel: &CancellationToken,
    ) -> Result<String, RegistryError> {
        let url = self.config.api_url(&format!(
            "{}/manifests/{}",
            reference.repository(),
            reference.tag()
        ));

        let response = self.get(&url, Some(MediaType::OCI_INDEX), cancel).await?;
        let body = cancellable(&url, cancel, async {
            Ok::<_, RegistryError>(response.text().await?)
        })
        .await?;

        debug!(%reference, size = body.len(), "Fetched image index");
        Ok(body)
    }

    /// Streams the blob with SHA-256 hex digest `digest_hex` into `writer`.
    ///
    /// The body is copied one chunk at a time, so memory use does not grow
    /// with the blob. The bytes are not re-hashed; callers that need
    /// integrity checking can hash the sink with
    /// [`blobstow_core::ContentDigest::verify_file`].
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HttpError`] for any non-200 status,
    /// [`RegistryError::WriteFailed`] if the sink fails, and
    /// [`RegistryError::Cancelled`] if `cancel` fires before the copy
    /// completes.
    pub async fn get_blob(
        &self,
        reference: &Reference,
        digest_hex: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<u64, RegistryError> {
        let url = self.config.api_url(&format!(
            "{}/blobs/sha256:{digest_hex}",
            reference.repository()
        ));

        let mut response = self.get(&url, None, cancel).await?;
        let written = cancellable(&url, cancel, async {
            let mut written = 0_u64;
            while let Some(chunk) = response.chunk().await? {
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| write_failed(&url, e))?;
                written += chunk.len() as u64;
            }
            writer.flush().await.map_err(|e| write_failed(&url, e))?;
            Ok::<_, RegistryError>(written)
        })
        .await?;

        info!(%reference, digest = digest_hex, size = written, "Downloaded blob");
        Ok(written)
    }

    /// Sends a GET and fails on anything but 200.
    async fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Response, RegistryError> {
        let mut request = self
            .http
            .get(url)
            .headers(auth_headers(&self.config.auth)?);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = send(request, url, cancel).await?;
        if response.status() != StatusCode::OK {
            return Err(RegistryError::HttpError {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// Sends a request, racing it against `cancel`.
pub(crate) async fn send(
    request: RequestBuilder,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Response, RegistryError> {
    debug!(url, "Sending registry request");
    cancellable(url, cancel, async {
        request.send().await.map_err(RegistryError::from)
    })
    .await
}

/// Runs `operation` unless `cancel` fires first.
///
/// Cancellation wins ties, so a token cancelled before the call never
/// starts any I/O.
pub(crate) async fn cancellable<T, F>(
    operation: &str,
    cancel: &CancellationToken,
    future: F,
) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, RegistryError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RegistryError::Cancelled {
            operation: operation.to_string(),
        }),
        result = future => result,
    }
}

/// Builds the HTTP client with proper configuration.
pub(crate) fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client, RegistryError> {
    // Idle limits only: a blob transfer that keeps making progress is never
    // cut off, however long it takes.
    let mut builder = reqwest::Client::builder()
        .connect_timeout(config.timeout)
        .read_timeout(config.timeout)
        .user_agent(&config.user_agent);

    if let Some(ref tls) = config.tls {
        if tls.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref ca_cert) = tls.ca_cert {
            let cert_pem = std::fs::read(ca_cert).map_err(|e| RegistryError::io(ca_cert, e))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem).map_err(|e| {
                RegistryError::RequestFailed {
                    message: format!("Invalid CA certificate: {e}"),
                }
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(ref cert_path), Some(ref key_path)) = (&tls.client_cert, &tls.client_key) {
            let mut cert_pem =
                std::fs::read(cert_path).map_err(|e| RegistryError::io(cert_path, e))?;
            let key_pem = std::fs::read(key_path).map_err(|e| RegistryError::io(key_path, e))?;
            cert_pem.extend_from_slice(&key_pem);

            let identity = reqwest::Identity::from_pem(&cert_pem).map_err(|e| {
                RegistryError::RequestFailed {
                    message: format!("Invalid client certificate: {e}"),
                }
            })?;
            builder = builder.identity(identity);
        }
    }

    builder.build().map_err(|e| RegistryError::ConnectionFailed {
        url: config.url.clone(),
        source: e,
    })
}

fn write_failed(url: &str, source: std::io::Error) -> RegistryError {
    RegistryError::WriteFailed {
        url: url.to_string(),
        source,
    }
}

/// Creates authentication headers for the configured credentials.
pub(crate) fn auth_headers(auth: &RegistryAuth) -> Result<HeaderMap, RegistryError> {
    let mut headers = HeaderMap::new();

    match auth {
        RegistryAuth::None => {}
        RegistryAuth::Basic { username, password } => {
            let credentials = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                format!("{username}:{password}"),
            );
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|_| {
                    RegistryError::AuthenticationFailed {
                        message: "Invalid credentials".to_string(),
                    }
                })?,
            );
        }
        RegistryAuth::Bearer { token } => {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    RegistryError::AuthenticationFailed {
                        message: "Invalid token".to_string(),
                    }
                })?,
            );
        }
    }

    Ok(headers)
}
