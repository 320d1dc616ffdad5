use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::archive;
use super::{HandlerId, Package, PackageKind};

/// A zipped website served verbatim from `<root>/<id>/`.
#[derive(Debug, Default)]
pub struct StaticSite;

impl PackageKind for StaticSite {
    fn typename(&self) -> &str {
        "static-site"
    }

    fn handler(&self) -> Option<HandlerId> {
        Some(HandlerId::Nginx)
    }

    fn install(&self, package: &Package, download: &Path, install_dir: &Path) -> Result<()> {
        let mut zip = archive::open(download)?;
        let target = install_dir.join(package.id());
        archive::replace_dir(install_dir, &target, |dest| {
            archive::extract_all(&mut zip, dest).map(drop)
        })?;
        debug!(package = package.id(), path = %target.display(), "installed static site");
        Ok(())
    }

    fn remove(&self, package: &Package, install_dir: &Path) -> Result<()> {
        let target = install_dir.join(package.id());
        if target.exists() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("failed to remove {}", target.display()))?;
        }
        Ok(())
    }
}
