//! # Blobstow Core
//!
//! Core types shared by the blobstow crates.
//!
//! This crate provides the foundational values used when packaging a binary
//! blob as an OCI artifact:
//!
//! - [`ContentDigest`] - SHA-256 content addressing over bytes, readers and files
//! - [`Platform`] - validated OS/architecture pair
//! - [`Reference`] - parsed `<registry>/<repository>[:<tag>]` reference
//!
//! ## Example
//!
//! ```rust
//! use blobstow_core::{ContentDigest, Platform, Reference};
//!
//! let reference = Reference::parse("ghcr.io/example/hello:1.2.0")?;
//! let platform = Platform::parse("linux/amd64")?;
//! let digest = ContentDigest::from_bytes(b"artifact bytes");
//!
//! println!("{reference} [{platform}] {digest}");
//! # Ok::<(), blobstow_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod digest;
pub mod error;
pub mod platform;
pub mod reference;


pub use digest::ContentDigest;
pub use error::{Error, Result};
pub use platform::Platform;
pub use reference::Reference;
