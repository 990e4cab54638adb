//! Configuration types for registry clients.
//!
//! A [`RegistryConfig`] is an immutable value describing one registry host
//! and the credentials used against it. Each client is built from its own
//! config; nothing is shared or registered globally.

use std::path::PathBuf;
use std::time::Duration;

/// Hosts that accept a fixed anonymous bearer token for public pulls.
///
/// GHCR rejects credential-less requests to public packages but accepts any
/// base64 token; `QQ==` is the conventional placeholder.
const ANONYMOUS_TOKENS: &[(&str, &str)] = &[("ghcr.io", "QQ==")];

/// Configuration for a registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL (e.g., "<https://ghcr.io>").
    pub url: String,

    /// Authentication configuration.
    pub auth: RegistryAuth,

    /// Connect timeout and the longest a request may wait for the next
    /// bytes from the registry. It does not bound a whole transfer.
    pub timeout: Duration,

    /// TLS configuration for private CAs and mTLS.
    pub tls: Option<TlsConfig>,

    /// User agent string.
    pub user_agent: String,
}

impl RegistryConfig {
    /// Creates a new registry configuration with the given URL and no
    /// credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("https://registry.example.com/");
    /// assert_eq!(config.url, "https://registry.example.com");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            auth: RegistryAuth::None,
            timeout: Duration::from_secs(30),
            tls: None,
            user_agent: format!("blobstow/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Creates an anonymous read configuration for a registry host.
    ///
    /// Known public registries get their anonymous bearer token attached;
    /// any other host is contacted without credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::{RegistryAuth, RegistryConfig};
    ///
    /// let config = RegistryConfig::for_host("ghcr.io");
    /// assert_eq!(config.url, "https://ghcr.io");
    /// assert!(matches!(config.auth, RegistryAuth::Bearer { .. }));
    ///
    /// let config = RegistryConfig::for_host("registry.example.com");
    /// assert!(matches!(config.auth, RegistryAuth::None));
    /// ```
    #[must_use]
    pub fn for_host(host: &str) -> Self {
        Self::new(format!("https://{host}")).with_auth(RegistryAuth::anonymous(host))
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the connect and idle-read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Talks plain HTTP instead of HTTPS, for local development registries.
    #[must_use]
    pub fn with_plain_http(mut self) -> Self {
        if let Some(rest) = self.url.strip_prefix("https://") {
            self.url = format!("http://{rest}");
        }
        self
    }

    /// Returns the URL of a `/v2/` API path.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.url, path.trim_start_matches('/'))
    }
}

/// Authentication methods for registry access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    /// No authentication.
    None,

    /// Basic authentication (username/password or username/token).
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },

    /// Bearer token authentication.
    Bearer {
        /// Token value.
        token: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("user", "pass");
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer token authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use blobstow_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::bearer("my-token");
    /// ```
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Anonymous credentials for a host: the public token for known
    /// registries, [`RegistryAuth::None`] otherwise.
    #[must_use]
    pub fn anonymous(host: &str) -> Self {
        ANONYMOUS_TOKENS
            .iter()
            .find(|(known, _)| *known == host)
            .map_or(Self::None, |(_, token)| Self::bearer(*token))
    }
}

/// TLS configuration for private CAs and mTLS connections.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to CA certificate file.
    pub ca_cert: Option<PathBuf>,

    /// Path to client certificate file.
    pub client_cert: Option<PathBuf>,

    /// Path to client private key file.
    pub client_key: Option<PathBuf>,

    /// Whether to skip certificate verification (NOT recommended for production).
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Creates a new TLS configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ca_cert: None,
            client_cert: None,
            client_key: None,
            insecure_skip_verify: false,
        }
    }

    /// Sets the CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Sets client certificate and key paths for mTLS.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Enables insecure mode (skips certificate verification).
    ///
    /// # Warning
    ///
    /// This should only be used for testing. Never use in production.
    #[must_use]
    pub const fn insecure(mut self) -> Self {
        self.insecure_skip_verify = true;
        self
    }
}
