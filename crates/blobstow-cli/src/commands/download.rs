//! Download command implementation.
//!
//! Fetches the artifact built for one platform from a registry.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use blobstow_core::Platform;
use blobstow_registry::RegistryReader;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::parse_reference;

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    /// Reference to download (e.g., `ghcr.io/example/hello:1.2.0`)
    #[arg(short, long = "ref-name")]
    pub ref_name: String,

    /// Output path for the tar.gz
    #[arg(short, long = "out-file")]
    pub out_file: PathBuf,

    /// Platform to download (defaults to the host platform)
    #[arg(long)]
    pub platform: Option<String>,

    /// Talk plain HTTP to the registry
    #[arg(long)]
    pub plain_http: bool,

    /// Seconds to wait for a connection or for the registry to send more data
    #[arg(long, default_value = "60")]
    pub timeout: u64,
}

/// Executes the download command.
///
/// A partially written output file is removed on failure.
///
/// # Errors
///
/// Returns an error if:
/// - The reference or platform is invalid
/// - No artifact exists for the platform
/// - The output file cannot be written
pub async fn execute(args: DownloadArgs, cancel: &CancellationToken) -> Result<()> {
    let reference = parse_reference(&args.ref_name)?;
    let platform = resolve_platform(args.platform.as_deref())?;

    info!(
        reference = %reference,
        %platform,
        out = %args.out_file.display(),
        "Downloading artifact"
    );

    let reader = RegistryReader::new()
        .with_plain_http(args.plain_http)
        .with_timeout(Duration::from_secs(args.timeout));

    let mut out = tokio::fs::File::create(&args.out_file)
        .await
        .with_context(|| format!("Failed to create {}", args.out_file.display()))?;

    let result = reader
        .download(&reference.to_string(), platform, &mut out, cancel)
        .await;
    drop(out);

    match result {
        Ok(size) => {
            println!(
                "Downloaded {reference} [{platform}] to {} ({size} bytes)",
                args.out_file.display()
            );
            Ok(())
        }
        Err(err) => {
            if let Err(remove_err) = tokio::fs::remove_file(&args.out_file).await {
                warn!(error = %remove_err, "Failed to remove partial download");
            }
            Err(err).with_context(|| format!("Failed to download {reference}"))
        }
    }
}

/// Parses an explicit platform or falls back to the host's.
fn resolve_platform(platform: Option<&str>) -> Result<Platform> {
    match platform {
        Some(text) => {
            Platform::parse(text).with_context(|| format!("Unsupported platform '{text}'"))
        }
        None => Platform::host()
            .context("The host platform is not supported; pass --platform explicitly"),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Commands};

    #[test]
    fn test_resolve_platform_explicit() {
        let platform = resolve_platform(Some("windows/arm64")).unwrap();
        assert_eq!(platform.to_string(), "windows/arm64");
    }

    #[test]
    fn test_resolve_platform_invalid() {
        let err = resolve_platform(Some("plan9/amd64")).unwrap_err();
        assert!(err.to_string().contains("Unsupported platform 'plan9/amd64'"));
    }

    #[test]
    fn test_resolve_platform_host_matches_platform_host() {
        match Platform::host() {
            Some(host) => assert_eq!(resolve_platform(None).unwrap(), host),
            None => assert!(resolve_platform(None).is_err()),
        }
    }

    #[test]
    fn test_parse_download_args() {
        let cli = Cli::try_parse_from([
            "blobstow",
            "download",
            "-r",
            "ghcr.io/example/hello",
            "-o",
            "hello.tar.gz",
        ])
        .unwrap();

        let Commands::Download(args) = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.ref_name, "ghcr.io/example/hello");
        assert_eq!(args.out_file, PathBuf::from("hello.tar.gz"));
        assert!(args.platform.is_none());
        assert!(!args.plain_http);
    }

    #[tokio::test]
    async fn test_execute_invalid_reference_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_file = dir.path().join("out.tar.gz");
        let args = DownloadArgs {
            ref_name: "not-a-reference".to_string(),
            out_file: out_file.clone(),
            platform: Some("linux/amd64".to_string()),
            plain_http: false,
            timeout: 5,
        };

        assert!(execute(args, &CancellationToken::new()).await.is_err());
        assert!(!out_file.exists());
    }

    #[tokio::test]
    async fn test_execute_cancelled_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_file = dir.path().join("out.tar.gz");
        let args = DownloadArgs {
            ref_name: "localhost:1/example/hello:1.0.0".to_string(),
            out_file: out_file.clone(),
            platform: Some("linux/amd64".to_string()),
            plain_http: true,
            timeout: 5,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = execute(args, &cancel).await.unwrap_err();
        assert!(format!("{err:#}").contains("cancelled"));
        assert!(!out_file.exists());
    }
}
