use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shelf_domain::CatalogError;
use tracing::debug;

use super::archive;
use super::{HandlerId, Package, PackageKind};

pub(crate) const CONTENT_DIR: &str = "data/content";
pub(crate) const LIBRARY_DIR: &str = "data/library";
pub(crate) const INDEX_DIR: &str = "data/index";
const DEFAULT_EXTENSION: &str = "zim";

/// A zip holding one zim file, its library descriptor and an optional
/// full-text index, all renamed after the package id on install.
#[derive(Debug, Default)]
pub struct ZippedZim;

pub(crate) fn library_file(stem: &str) -> String {
    format!("{stem}.xml")
}

pub(crate) fn index_dir(stem: &str) -> String {
    format!("{stem}.idx")
}

struct Layout {
    /// File name of the zim inside `data/content/`.
    basename: String,
    extension: String,
}

impl Layout {
    fn detect(id: &str, entries: &[PathBuf]) -> Result<Self, CatalogError> {
        let content = Path::new(CONTENT_DIR);
        let mut files = entries
            .iter()
            .filter(|path| path.parent() == Some(content))
            .filter_map(|path| path.file_name()?.to_str());
        let basename = match (files.next(), files.next()) {
            (Some(name), None) => name.to_string(),
            (None, _) => {
                return Err(CatalogError::invalid_content(
                    id,
                    format!("no file under {CONTENT_DIR}/"),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(CatalogError::invalid_content(
                    id,
                    format!("more than one file under {CONTENT_DIR}/"),
                ))
            }
        };
        let library = Path::new(LIBRARY_DIR).join(library_file(&basename));
        if !entries.iter().any(|path| *path == library) {
            return Err(CatalogError::invalid_content(
                id,
                format!("missing {}", library.display()),
            ));
        }
        let extension = Path::new(&basename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string();
        Ok(Self {
            basename,
            extension,
        })
    }

    fn target(&self, id: &str, name: &Path) -> Option<PathBuf> {
        let stem = format!("{id}.{}", self.extension);
        let content = Path::new(CONTENT_DIR);
        let library = Path::new(LIBRARY_DIR);
        let index = Path::new(INDEX_DIR).join(index_dir(&self.basename));
        if name == content.join(&self.basename) {
            Some(content.join(&stem))
        } else if name == library.join(library_file(&self.basename)) {
            Some(library.join(library_file(&stem)))
        } else if let Ok(rest) = name.strip_prefix(&index) {
            Some(Path::new(INDEX_DIR).join(index_dir(&stem)).join(rest))
        } else {
            None
        }
    }
}

impl PackageKind for ZippedZim {
    fn typename(&self) -> &str {
        "zipped-zim"
    }

    fn handler(&self) -> Option<HandlerId> {
        Some(HandlerId::Kiwix)
    }

    fn install(&self, package: &Package, download: &Path, install_dir: &Path) -> Result<()> {
        let id = package.id();
        let mut zip = archive::open(download)?;
        let entries = archive::file_entries(&mut zip)?;
        let layout = Layout::detect(id, &entries)?;

        let staging = archive::staging_dir(install_dir)?;
        let written = archive::extract(&mut zip, staging.path(), |name| layout.target(id, name))?;

        // A previous copy, possibly under another extension, is replaced wholesale.
        remove_stems(id, install_dir)?;
        for dir in [CONTENT_DIR, LIBRARY_DIR, INDEX_DIR] {
            move_entries(&staging.path().join(dir), &install_dir.join(dir))?;
        }
        archive::close_staging(staging);
        debug!(package = id, files = written, "installed zim");
        Ok(())
    }

    fn remove(&self, package: &Package, install_dir: &Path) -> Result<()> {
        remove_stems(package.id(), install_dir)?;
        for dir in [CONTENT_DIR, LIBRARY_DIR, INDEX_DIR] {
            archive::prune_empty_dirs(&install_dir.join(dir), install_dir);
        }
        Ok(())
    }
}

/// Installed stems (`<id>.<ext>`) belonging to `id`.
fn installed_stems(id: &str, install_dir: &Path) -> Result<BTreeSet<String>> {
    let mut stems = BTreeSet::new();
    let sources = [
        (CONTENT_DIR, ""),
        (LIBRARY_DIR, ".xml"),
        (INDEX_DIR, ".idx"),
    ];
    for (dir, suffix) in sources {
        let dir = install_dir.join(dir);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err).with_context(|| format!("failed to read {}", dir.display())),
        };
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(suffix) else { continue };
            let owned = stem
                .strip_prefix(id)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|ext| !ext.is_empty() && !ext.contains('.'));
            if owned {
                stems.insert(stem.to_string());
            }
        }
    }
    Ok(stems)
}

/// Renames every entry of `from` into `to`.
fn move_entries(from: &Path, to: &Path) -> Result<()> {
    let entries = match fs::read_dir(from) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("failed to read {}", from.display())),
    };
    fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;
    for entry in entries {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        fs::rename(entry.path(), &dest)
            .with_context(|| format!("failed to move {}", dest.display()))?;
    }
    Ok(())
}

fn remove_stems(id: &str, install_dir: &Path) -> Result<()> {
    for stem in installed_stems(id, install_dir)? {
        let content = install_dir.join(CONTENT_DIR).join(&stem);
        let library = install_dir.join(LIBRARY_DIR).join(library_file(&stem));
        let index = install_dir.join(INDEX_DIR).join(index_dir(&stem));
        for file in [content, library] {
            if file.exists() {
                fs::remove_file(&file)
                    .with_context(|| format!("failed to remove {}", file.display()))?;
            }
        }
        if index.exists() {
            fs::remove_dir_all(&index)
                .with_context(|| format!("failed to remove {}", index.display()))?;
        }
        debug!(package = id, stem, "removed zim files");
    }
    Ok(())
}
