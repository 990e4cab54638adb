//! Upload command implementation.
//!
//! Packages a tar.gz (given directly, or built from a list of files) as a
//! single-platform OCI image and pushes it to the registry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use blobstow_core::Platform;
use blobstow_registry::{ArtifactStorage, RegistryAuth, RegistryPusher, RegistryStorage};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{parse_reference, registry_config};
use crate::compress;

/// Arguments for the upload command.
#[derive(Args)]
pub struct UploadArgs {
    /// Reference to push (e.g., `ghcr.io/example/hello:1.2.0`)
    #[arg(short, long = "ref-name")]
    pub ref_name: String,

    /// Path of the tar.gz to upload
    #[arg(short = 'f', long = "tgz-file", required_unless_present = "path")]
    pub tgz_file: Option<PathBuf>,

    /// Files to pack into a tar.gz and upload instead of --tgz-file
    #[arg(long, num_args = 1.., conflicts_with = "tgz_file")]
    pub path: Vec<PathBuf>,

    /// Username for basic authentication
    #[arg(short, long, env = "BLOBSTOW_USERNAME")]
    pub username: Option<String>,

    /// Password or token for basic authentication
    #[arg(short, long, env = "BLOBSTOW_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Bearer token for authentication
    #[arg(long, env = "BLOBSTOW_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Target platform (e.g., linux/amd64)
    #[arg(long, default_value = "linux/amd64")]
    pub platform: String,

    /// Value of org.opencontainers.image.source (defaults to the current
    /// GitHub repository when GITHUB_REPOSITORY is set)
    #[arg(long)]
    pub image_source: Option<String>,

    /// Talk plain HTTP to the registry
    #[arg(long)]
    pub plain_http: bool,

    /// Seconds to wait for a connection or for the registry to send more data
    #[arg(long, default_value = "60")]
    pub timeout: u64,
}

/// Executes the upload command.
///
/// # Errors
///
/// Returns an error if:
/// - The reference or platform is invalid
/// - The input file is missing or not gzip
/// - Registry login or the push fails
pub async fn execute(args: UploadArgs, cancel: &CancellationToken) -> Result<()> {
    let reference = parse_reference(&args.ref_name)?;
    let platform = Platform::parse(&args.platform)
        .with_context(|| format!("Unsupported platform '{}'", args.platform))?;
    let image_source = default_image_source(
        args.image_source.as_deref(),
        std::env::var("GITHUB_REPOSITORY").ok().as_deref(),
    );

    // Keeps a packed temp archive alive until the upload finishes.
    let (blob_path, _packed) = match &args.tgz_file {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("{} does not exist", path.display());
            }
            (path.clone(), None)
        }
        None => {
            let packed = compress::compress_to_temp(&args.path)
                .context("Failed to pack files into a tar.gz")?;
            (packed.path().to_path_buf(), Some(packed))
        }
    };

    info!(
        reference = %reference,
        %platform,
        file = %blob_path.display(),
        image_source = image_source.as_deref().unwrap_or(""),
        "Uploading artifact"
    );

    let auth = determine_auth(&args)?;
    let config = registry_config(&reference, auth, args.timeout, args.plain_http);
    let pusher = RegistryPusher::new(config).context("Failed to create registry client")?;
    pusher
        .login(cancel)
        .await
        .with_context(|| format!("Failed to log in to {}", reference.registry()))?;

    let mut file = tokio::fs::File::open(&blob_path)
        .await
        .with_context(|| format!("Failed to open {}", blob_path.display()))?;

    RegistryStorage::new(pusher)
        .with_plain_http(args.plain_http)
        .upload(
            &reference.to_string(),
            platform,
            image_source.as_deref(),
            &mut file,
            cancel,
        )
        .await
        .with_context(|| format!("Failed to upload {reference}"))?;

    println!("Uploaded {} as {reference} [{platform}]", blob_path.display());
    Ok(())
}

/// Determines the authentication method from CLI arguments.
///
/// `None` keeps the registry's anonymous default.
fn determine_auth(args: &UploadArgs) -> Result<Option<RegistryAuth>> {
    if let Some(ref token) = args.token {
        return Ok(Some(RegistryAuth::bearer(token)));
    }

    if let (Some(ref username), Some(ref password)) = (&args.username, &args.password) {
        return Ok(Some(RegistryAuth::basic(username, password)));
    }

    if args.username.is_some() || args.password.is_some() {
        anyhow::bail!("Both --username and --password are required for basic authentication");
    }

    Ok(None)
}

/// Image source URL: the explicit value, else the GitHub repository URL.
fn default_image_source(explicit: Option<&str>, github_repository: Option<&str>) -> Option<String> {
    match explicit.filter(|value| !value.is_empty()) {
        Some(value) => Some(value.to_string()),
        None => github_repository
            .filter(|repo| !repo.is_empty())
            .map(|repo| format!("https://github.com/{repo}")),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Commands};

    fn args() -> UploadArgs {
        UploadArgs {
            ref_name: "ghcr.io/example/hello:1.0.0".to_string(),
            tgz_file: Some(PathBuf::from("hello.tar.gz")),
            path: Vec::new(),
            username: None,
            password: None,
            token: None,
            platform: "linux/amd64".to_string(),
            image_source: None,
            plain_http: false,
            timeout: 60,
        }
    }

    #[test]
    fn test_determine_auth_none() {
        assert!(determine_auth(&args()).unwrap().is_none());
    }

    #[test]
    fn test_determine_auth_basic() {
        let args = UploadArgs {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..args()
        };
        let auth = determine_auth(&args).unwrap();
        assert_eq!(auth, Some(RegistryAuth::basic("user", "pass")));
    }

    #[test]
    fn test_determine_auth_bearer_wins() {
        let args = UploadArgs {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            token: Some("tok".to_string()),
            ..args()
        };
        let auth = determine_auth(&args).unwrap();
        assert_eq!(auth, Some(RegistryAuth::bearer("tok")));
    }

    #[test]
    fn test_determine_auth_incomplete_basic() {
        let args = UploadArgs {
            username: Some("user".to_string()),
            ..args()
        };
        assert!(determine_auth(&args).is_err());
    }

    #[test]
    fn test_default_image_source() {
        assert_eq!(
            default_image_source(Some("https://example.com/src"), Some("octocat/hello")),
            Some("https://example.com/src".to_string())
        );
        assert_eq!(
            default_image_source(None, Some("octocat/hello")),
            Some("https://github.com/octocat/hello".to_string())
        );
        assert_eq!(
            default_image_source(Some(""), Some("octocat/hello")),
            Some("https://github.com/octocat/hello".to_string())
        );
        assert_eq!(default_image_source(None, None), None);
        assert_eq!(default_image_source(None, Some("")), None);
    }

    #[test]
    fn test_parse_upload_with_paths() {
        let cli = Cli::try_parse_from([
            "blobstow",
            "upload",
            "-r",
            "ghcr.io/example/hello:1.0.0",
            "--path",
            "bin/hello",
            "README.md",
            "--platform",
            "darwin/arm64",
        ])
        .unwrap();

        let Commands::Upload(args) = cli.command else {
            panic!("expected upload command");
        };
        assert!(args.tgz_file.is_none());
        assert_eq!(args.path, [PathBuf::from("bin/hello"), PathBuf::from("README.md")]);
        assert_eq!(args.platform, "darwin/arm64");
    }

    #[test]
    fn test_parse_upload_requires_input() {
        let result = Cli::try_parse_from(["blobstow", "upload", "-r", "ghcr.io/example/hello"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_upload_rejects_both_inputs() {
        let result = Cli::try_parse_from([
            "blobstow",
            "upload",
            "-r",
            "ghcr.io/example/hello",
            "-f",
            "a.tar.gz",
            "--path",
            "b",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_execute_missing_file() {
        let args = UploadArgs {
            tgz_file: Some(PathBuf::from("/nonexistent/hello.tar.gz")),
            ..args()
        };
        let err = execute(args, &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_platform() {
        let args = UploadArgs {
            platform: "linux/386".to_string(),
            ..args()
        };
        let err = execute(args, &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported platform"));
    }
}
