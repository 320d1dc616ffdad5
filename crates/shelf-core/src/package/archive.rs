use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shelf_domain::CatalogError;
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

pub(crate) type Archive = ZipArchive<File>;

/// Opens a downloaded artifact, rejecting anything that is not a zip file.
pub(crate) fn open(path: &Path) -> Result<Archive> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    ZipArchive::new(file)
        .map_err(|err| CatalogError::invalid_file(path, format!("not a zip file: {err}")).into())
}

/// Archive-relative paths of every file entry, skipping directories and
/// entries that would escape the destination.
pub(crate) fn file_entries(archive: &mut Archive) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        if let Some(enclosed) = entry.enclosed_name() {
            entries.push(enclosed.to_path_buf());
        }
    }
    Ok(entries)
}

/// Extracts entries into `dest`; `map` picks the destination-relative path
/// for each archive path, or `None` to skip it.
pub(crate) fn extract<F>(archive: &mut Archive, dest: &Path, mut map: F) -> Result<usize>
where
    F: FnMut(&Path) -> Option<PathBuf>,
{
    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(target) = entry.enclosed_name().and_then(|name| map(name)) else {
            continue;
        };
        let target = dest.join(target);
        if entry.name().ends_with('/') || entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        io::copy(&mut entry, &mut outfile)?;
        written += 1;
    }
    debug!(dest = %dest.display(), files = written, "extracted archive");
    Ok(written)
}

pub(crate) fn extract_all(archive: &mut Archive, dest: &Path) -> Result<usize> {
    extract(archive, dest, |name| Some(name.to_path_buf()))
}

/// Fills a fresh directory with `fill`, then swaps it in at `target`.
///
/// The staging directory lives inside `root` so the final rename stays on one
/// filesystem; a failing `fill` leaves any existing `target` untouched.
pub(crate) fn replace_dir<F>(root: &Path, target: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let staging = staging_dir(root)?;
    let content = staging.path().join("content");
    fs::create_dir_all(&content)?;
    fill(&content)?;

    if target.exists() {
        fs::remove_dir_all(target)
            .with_context(|| format!("failed to remove {}", target.display()))?;
    }
    fs::rename(&content, target)
        .with_context(|| format!("failed to move content into {}", target.display()))?;
    close_staging(staging);
    Ok(())
}

/// Creates a hidden staging directory inside `root`, which must be on the
/// same filesystem as the final destination.
pub(crate) fn staging_dir(root: &Path) -> Result<TempDir> {
    fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
    tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(root)
        .with_context(|| format!("failed to create a staging directory in {}", root.display()))
}

pub(crate) fn close_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(err) = staging.close() {
        debug!(path = %path.display(), error = %err, "failed to clean up staging directory");
    }
}

/// Removes `dir` and then each now-empty ancestor up to, but not including, `stop`.
pub(crate) fn prune_empty_dirs(dir: &Path, stop: &Path) {
    let mut current = Some(dir);
    while let Some(path) = current {
        if path == stop || !path.starts_with(stop) {
            break;
        }
        if fs::remove_dir(path).is_err() {
            break;
        }
        current = path.parent();
    }
}
