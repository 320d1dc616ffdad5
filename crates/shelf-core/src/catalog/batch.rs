use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use shelf_domain::{CatalogError, PackageIndex};
use shelf_store::{resolve_artifact, ArtifactRequest};
use tracing::{debug, info, warn};

use super::{select, Catalog};
use crate::handler::HandlerSet;
use crate::package::{HandlerId, Package};
use crate::settings::update_displayed_packages;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPackage {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPackage {
    pub id: String,
    pub error: String,
}

/// What a batch operation did to each requested package.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub skipped: Vec<SkippedPackage>,
    pub failed: Vec<FailedPackage>,
    /// Problems that did not fail any package, such as a service that
    /// could not be restarted.
    pub warnings: Vec<String>,
}

impl BatchReport {
    fn skip(&mut self, id: &str, reason: &str) {
        self.skipped.push(SkippedPackage {
            id: id.to_string(),
            reason: reason.to_string(),
        });
    }

    fn fail(&mut self, id: &str, err: &anyhow::Error) {
        let error = format!("{err:#}");
        warn!(package = id, %error, "package failed");
        self.failed.push(FailedPackage {
            id: id.to_string(),
            error,
        });
    }

    fn record(&mut self, id: &str, result: Result<()>) {
        match result {
            Ok(()) => self.processed.push(id.to_string()),
            Err(err) => self.fail(id, &err),
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

fn handler_of(package: &Package) -> Result<HandlerId, CatalogError> {
    package.handler().ok_or_else(|| CatalogError::InvalidPackageType {
        id: package.id().to_string(),
        typename: package.typename().to_string(),
    })
}

impl Catalog {
    /// Installs the available packages matching `patterns`.
    ///
    /// Packages already installed at the same version are skipped; another
    /// installed version is replaced. A failing package does not stop the
    /// batch.
    pub fn install_packages(&mut self, patterns: &[String]) -> Result<BatchReport> {
        let _lock = self.begin()?;
        let before = self.state.installed.clone();
        let ids = select::resolve_ids(patterns, &self.state.available)?;
        let packages = self.instantiate_all(&ids, &self.state.available)?;

        let mut handlers = self.handlers();
        let mut report = BatchReport::default();
        for package in &packages {
            let id = package.id();
            let previous = match self.state.installed.get(id) {
                Some(installed) if installed.version() == package.version() => {
                    debug!(package = id, version = package.version(), "already installed");
                    report.skip(id, "already installed");
                    continue;
                }
                Some(installed) => Some(self.registry.instantiate(id, installed)),
                None => None,
            };
            let result = previous
                .transpose()
                .map_err(anyhow::Error::from)
                .and_then(|previous| self.install_one(&mut handlers, package, previous));
            report.record(id, result);
        }

        let added = report.processed.clone();
        self.finish(handlers, &mut report, &before, &[], &added)?;
        Ok(report)
    }

    /// Removes the installed packages matching `patterns`.
    pub fn remove_packages(&mut self, patterns: &[String]) -> Result<BatchReport> {
        let _lock = self.begin()?;
        let before = self.state.installed.clone();
        let ids = select::resolve_ids(patterns, &self.state.installed)?;
        let packages = self.instantiate_all(&ids, &self.state.installed)?;

        let mut handlers = self.handlers();
        let mut report = BatchReport::default();
        for package in &packages {
            let result = handler_of(package)
                .map_err(anyhow::Error::from)
                .and_then(|handler| handlers.get(handler).remove(package));
            if result.is_ok() {
                self.state.installed.remove(package.id());
            }
            report.record(package.id(), result);
        }

        let removed = report.processed.clone();
        self.finish(handlers, &mut report, &before, &removed, &[])?;
        Ok(report)
    }

    /// Replaces installed packages matching `patterns` with the available
    /// version when it differs.
    ///
    /// The new artifact is fetched before the old copy is removed.
    pub fn upgrade_packages(&mut self, patterns: &[String]) -> Result<BatchReport> {
        let _lock = self.begin()?;
        let before = self.state.installed.clone();
        let ids = select::resolve_ids(patterns, &self.state.installed)?;

        let mut report = BatchReport::default();
        let mut upgrades = Vec::new();
        for id in &ids {
            let (Some(installed), Some(fresh)) =
                (self.state.installed.get(id), self.state.available.get(id))
            else {
                warn!(package = %id, "not available from any remote");
                report.skip(id, "not available from any remote");
                continue;
            };
            if installed.version() == fresh.version() {
                warn!("{id} has no update available");
                report.skip(id, "no update available");
                continue;
            }
            upgrades.push((
                self.registry.instantiate(id, installed)?,
                self.registry.instantiate(id, fresh)?,
            ));
        }

        let mut handlers = self.handlers();
        for (old, new) in upgrades {
            info!(package = new.id(), from = old.version(), to = new.version(), "upgrading");
            let result = self.install_one(&mut handlers, &new, Some(old));
            report.record(new.id(), result);
        }

        self.finish(handlers, &mut report, &before, &[], &[])?;
        Ok(report)
    }

    /// Fetches and re-materializes installed packages from their installed
    /// metadata, repairing local modifications.
    ///
    /// The existing copy is replaced by the package kind's own install, which
    /// validates the artifact before touching it; a bad artifact leaves the
    /// installed copy as it was.
    pub fn reinstall_packages(&mut self, patterns: &[String]) -> Result<BatchReport> {
        let _lock = self.begin()?;
        let before = self.state.installed.clone();
        let ids = select::resolve_ids(patterns, &self.state.installed)?;
        let packages = self.instantiate_all(&ids, &self.state.installed)?;

        let mut handlers = self.handlers();
        let mut report = BatchReport::default();
        for package in &packages {
            let result = self.fetch(package).and_then(|download| {
                handlers
                    .get(handler_of(package)?)
                    .install(package, &download)
            });
            report.record(package.id(), result);
        }

        self.finish(handlers, &mut report, &before, &[], &[])?;
        Ok(report)
    }

    fn instantiate_all(&self, ids: &[String], index: &PackageIndex) -> Result<Vec<Package>> {
        ids.iter()
            .map(|id| {
                let metadata = index
                    .get(id)
                    .ok_or_else(|| CatalogError::NoSuchPackage { id: id.clone() })?;
                Ok(self.registry.instantiate(id, metadata)?)
            })
            .collect()
    }

    /// Makes sure the artifact is in a cache and returns its path.
    fn fetch(&self, package: &Package) -> Result<PathBuf> {
        let metadata = package.metadata();
        let request = ArtifactRequest {
            id: package.id(),
            version: package.version(),
            url: metadata.url.as_deref(),
            sha256: metadata.sha256sum.as_deref(),
        };
        let artifact = resolve_artifact(&self.cache_root, &self.extra_caches, &request)?;
        debug!(
            package = package.id(),
            source = artifact.source.as_str(),
            bytes = artifact.size,
            "artifact ready"
        );
        Ok(artifact.path)
    }

    fn install_one(
        &mut self,
        handlers: &mut HandlerSet,
        package: &Package,
        previous: Option<Package>,
    ) -> Result<()> {
        let download = self.fetch(package)?;
        if let Some(old) = previous {
            handlers.get(handler_of(&old)?).remove(&old)?;
            self.state.installed.remove(old.id());
        }
        handlers.get(handler_of(package)?).install(package, &download)?;
        self.state
            .installed
            .insert(package.id().to_string(), package.metadata().clone());
        Ok(())
    }

    /// Second phase of every batch: persist, update the home page list, then
    /// commit each touched handler once.
    fn finish(
        &mut self,
        mut handlers: HandlerSet,
        report: &mut BatchReport,
        before: &PackageIndex,
        removed: &[String],
        added: &[String],
    ) -> Result<()> {
        if self.state.installed != *before {
            self.persist()?;
        }
        if !removed.is_empty() || !added.is_empty() {
            if let Err(err) = update_displayed_packages(&self.settings, removed, added) {
                warn!(error = %format!("{err:#}"), "failed to update displayed packages");
                report
                    .warnings
                    .push(format!("failed to update displayed packages: {err:#}"));
            }
        }
        if !handlers.is_empty() {
            report.warnings.extend(handlers.commit_all());
        }
        Ok(())
    }
}
