//! Tar/gzip packing of loose files for upload.

use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

/// Writes `files` as a gzip-compressed tarball into `out`.
///
/// Each file is stored under the path it was given, minus any root,
/// `.` or `..` components, so `/usr/bin/tool` becomes `usr/bin/tool`.
pub fn compress(files: &[PathBuf], out: impl Write) -> Result<()> {
    let mut archive = tar::Builder::new(GzEncoder::new(out, Compression::default()));

    for file in files {
        let name = archive_name(file)?;
        let mut source =
            File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
        archive
            .append_file(&name, &mut source)
            .with_context(|| format!("Failed to add {} to archive", file.display()))?;
    }

    archive
        .into_inner()
        .and_then(GzEncoder::finish)
        .context("Failed to finish archive")?
        .flush()
        .context("Failed to flush archive")?;
    Ok(())
}

/// Packs `files` into a new `blobstow.*.tar.gz` temporary file.
///
/// The file is deleted when the returned handle is dropped.
pub fn compress_to_temp(files: &[PathBuf]) -> Result<NamedTempFile> {
    if files.is_empty() {
        anyhow::bail!("No files to pack");
    }

    let mut packed = tempfile::Builder::new()
        .prefix("blobstow.")
        .suffix(".tar.gz")
        .tempfile()
        .context("Failed to create temporary archive")?;
    compress(files, packed.as_file_mut())?;

    tracing::debug!(path = %packed.path().display(), files = files.len(), "Packed files");
    Ok(packed)
}

fn archive_name(path: &Path) -> Result<PathBuf> {
    let name: PathBuf = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    if name.as_os_str().is_empty() {
        anyhow::bail!("{} does not name a file", path.display());
    }
    Ok(name)
}
