//! CLI commands and argument parsing.

pub mod download;
pub mod platforms;
pub mod upload;
pub mod version;

use std::time::Duration;

use anyhow::{Context, Result};
use blobstow_core::Reference;
use blobstow_registry::{RegistryAuth, RegistryConfig};
use clap::{Parser, Subcommand};

/// Blobstow - store binary artifacts in OCI registries
#[derive(Parser)]
#[command(name = "blobstow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Upload a tar.gz artifact for one platform
    Upload(upload::UploadArgs),

    /// Download the artifact built for a platform
    Download(download::DownloadArgs),

    /// List the supported platforms
    Platforms,

    /// Print version information
    Version,
}

/// Parses a reference after lower-casing it, since registries only accept
/// lowercase repository names.
pub fn parse_reference(ref_name: &str) -> Result<Reference> {
    Reference::parse(&ref_name.to_lowercase())
        .with_context(|| format!("Invalid reference '{ref_name}'"))
}

/// Registry configuration for the reference's host.
pub fn registry_config(
    reference: &Reference,
    auth: Option<RegistryAuth>,
    timeout: u64,
    plain_http: bool,
) -> RegistryConfig {
    let mut config =
        RegistryConfig::for_host(reference.registry()).with_timeout(Duration::from_secs(timeout));
    if let Some(auth) = auth {
        config = config.with_auth(auth);
    }
    if plain_http {
        config = config.with_plain_http();
    }
    config
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reference_lowercases() {
        let reference = parse_reference("GHCR.io/Example/Hello:1.0.0").unwrap();
        assert_eq!(reference.to_string(), "ghcr.io/example/hello:1.0.0");
    }

    #[test]
    fn test_parse_reference_invalid() {
        let err = parse_reference("hello").unwrap_err();
        assert!(err.to_string().contains("Invalid reference 'hello'"));
    }

    #[test]
    fn test_registry_config_keeps_anonymous_token_without_auth() {
        let reference = parse_reference("ghcr.io/example/hello").unwrap();
        let config = registry_config(&reference, None, 60, false);
        assert_eq!(config.url, "https://ghcr.io");
        assert_eq!(config.auth, RegistryAuth::bearer("QQ=="));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_registry_config_plain_http_with_auth() {
        let reference = parse_reference("localhost:5000/team/tool:1.0.0").unwrap();
        let config = registry_config(&reference, Some(RegistryAuth::basic("u", "p")), 5, true);
        assert_eq!(config.url, "http://localhost:5000");
        assert_eq!(config.auth, RegistryAuth::basic("u", "p"));
    }
}
