//! # Blobstow Registry
//!
//! Stores arbitrary gzip artifacts in OCI-compatible registries (GHCR,
//! Docker Registry, Harbor, etc.) by dressing them up as single-layer
//! images, one per OS/architecture.
//!
//! ## Features
//!
//! - **OCI layout builder**: content-addressed blob store, image config,
//!   manifest, index and root pointer in a self-cleaning temp directory
//! - **Distribution API reads**: tag listing, image index fetch and
//!   streaming blob download, all cancellable
//! - **Push transport**: uploads a local layout with the distribution push API
//! - **Platform selection**: picks the index entry for an OS/arch pair
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blobstow_core::Platform;
//! use blobstow_registry::RegistryReader;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut out = tokio::fs::File::create("hello.tar.gz").await?;
//!     RegistryReader::new()
//!         .download(
//!             "ghcr.io/example/hello:latest",
//!             Platform::parse("linux/amd64")?,
//!             &mut out,
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   RegistryStorage                           │
//! │  ┌───────────────┐  ┌────────────────────┐  ┌────────────┐  │
//! │  │ LayoutBuilder │  │ DistributionClient │  │ PushClient │  │
//! │  │ (temp dir)    │  │ (reads)            │  │ (writes)   │  │
//! │  └───────────────┘  └────────────────────┘  └────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  OCI Registry                               │
//! │         /v2/<repo>/{tags/list,manifests,blobs}              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod config;
mod error;
mod layout;
mod oci;
mod push;
mod selector;
mod storage;
mod tag;


pub use client::DistributionClient;
pub use config::{RegistryAuth, RegistryConfig, TlsConfig};
pub use error::RegistryError;
pub use layout::{BuiltLayout, LayoutBuilder, WrittenBlob, BLOBS_DIR, INDEX_FILE, OCI_LAYOUT_FILE};
pub use oci::{
    Annotations, Descriptor, ImageIndex, ImageLayout, Manifest, MediaType, OciPlatform, TagList,
    ANNOTATION_BLOB_DIGEST, ANNOTATION_REF_NAME, ANNOTATION_SOURCE,
};
pub use push::{PushClient, RegistryPusher};
pub use selector::select_manifest_entry;
pub use storage::{ArtifactStorage, RegistryReader, RegistryStorage};
pub use tag::TagQuery;
