use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use shelf_domain::{CatalogError, MediaManifest, MANIFEST_FILE};
use tracing::{debug, info};

use super::archive;
use super::{HandlerId, Package, PackageKind};
use crate::documents::NewDocument;
use crate::effects::SharedEffects;

/// A zipped media bundle: `manifest.yml` plus the files it lists. Each
/// manifest entry becomes a document owned by the package.
pub struct ZippedMedias {
    effects: SharedEffects,
}

impl ZippedMedias {
    #[must_use]
    pub fn new(effects: SharedEffects) -> Self {
        Self { effects }
    }
}

fn read_manifest(id: &str, dir: &Path) -> Result<MediaManifest> {
    let path = dir.join(MANIFEST_FILE);
    let contents = fs::read_to_string(&path)
        .map_err(|_| CatalogError::invalid_content(id, format!("missing {MANIFEST_FILE}")))?;
    let manifest = MediaManifest::parse(&contents)
        .map_err(|err| CatalogError::invalid_content(id, format!("invalid {MANIFEST_FILE}: {err}")))?;
    if let Some(missing) = manifest
        .referenced_files()
        .find(|file| !dir.join(file).is_file())
    {
        return Err(
            CatalogError::invalid_content(id, format!("{MANIFEST_FILE} lists missing file {missing}"))
                .into(),
        );
    }
    Ok(manifest)
}

impl PackageKind for ZippedMedias {
    fn typename(&self) -> &str {
        "zipped-medias"
    }

    fn handler(&self) -> Option<HandlerId> {
        Some(HandlerId::MediaCenter)
    }

    fn install(&self, package: &Package, download: &Path, install_dir: &Path) -> Result<()> {
        let id = package.id();
        let mut zip = archive::open(download)?;
        let target = install_dir.join(id);
        let mut manifest = None;
        archive::replace_dir(install_dir, &target, |dest| {
            archive::extract_all(&mut zip, dest)?;
            manifest = Some(read_manifest(id, dest)?);
            Ok(())
        })?;
        let manifest = manifest.unwrap_or_default();

        let documents = self.effects.documents();
        let stale = documents.delete_for_package(id)?;
        if stale > 0 {
            debug!(package = id, count = stale, "dropped documents from previous install");
        }
        let created = documents.create_many(
            manifest
                .medias
                .iter()
                .map(|entry| NewDocument {
                    title: entry.title.clone(),
                    summary: entry.summary.clone(),
                    credits: entry.credits.clone(),
                    kind: entry.kind,
                    lang: entry.lang.clone(),
                    tags: entry.tags.clone(),
                    original: target.join(&entry.path),
                    preview: entry.preview.as_ref().map(|preview| target.join(preview)),
                    package_id: Some(id.to_string()),
                })
                .collect(),
        )?;
        info!(package = id, documents = created.len(), "registered media documents");
        Ok(())
    }

    fn remove(&self, package: &Package, install_dir: &Path) -> Result<()> {
        let id = package.id();
        let deleted = self.effects.documents().delete_for_package(id)?;
        debug!(package = id, count = deleted, "deleted media documents");
        let target = install_dir.join(id);
        if target.exists() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
        }
        Ok(())
    }
}
