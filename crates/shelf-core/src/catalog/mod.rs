//! The catalog: remotes, the available and installed indexes, and the
//! install/remove/upgrade/reinstall workflows built on them.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use shelf_domain::{CatalogState, PackageIndex, Remote};
use tracing::debug;

use crate::config::{Config, InstallConfig, ServiceConfig};
use crate::effects::SharedEffects;
use crate::handler::HandlerSet;
use crate::lock::CatalogLock;
use crate::package::{Package, TypeRegistry};
use crate::settings::{SettingsRegistry, SettingsStore, SETTINGS_FILE};

mod batch;
mod refresh;
mod remotes;
mod select;

pub use batch::{BatchReport, FailedPackage, SkippedPackage};
pub use refresh::{RefreshReport, SkippedRemote};
pub use remotes::RemoteRegistry;

pub const CATALOG_FILE: &str = "catalog.yml";
pub const REMOTES_DIR: &str = "remotes";

pub struct Catalog {
    storage_root: PathBuf,
    cache_root: PathBuf,
    extra_caches: Vec<PathBuf>,
    install: InstallConfig,
    services: ServiceConfig,
    effects: SharedEffects,
    registry: TypeRegistry,
    remotes: RemoteRegistry,
    settings: SettingsStore,
    state: CatalogState,
}

/// One row of a package listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub size: Option<String>,
    #[serde(rename = "type")]
    pub typename: String,
    pub handled: bool,
}

impl PackageSummary {
    #[must_use]
    pub fn from_package(package: &Package) -> Self {
        Self {
            id: package.id().to_string(),
            name: package.display_name().to_string(),
            version: package.version().to_string(),
            size: package.filesize().ok(),
            typename: package.typename().to_string(),
            handled: package.handler().is_some(),
        }
    }
}

impl Catalog {
    /// Opens the catalog described by `config`, loading persisted state.
    pub fn open(config: &Config, effects: SharedEffects) -> Result<Self> {
        let storage_root = config.storage.root.clone();
        let state = CatalogState::load(&storage_root.join(CATALOG_FILE))?;
        debug!(
            root = %storage_root.display(),
            installed = state.installed.len(),
            available = state.available.len(),
            "opened catalog"
        );
        Ok(Self {
            remotes: RemoteRegistry::new(storage_root.join(REMOTES_DIR)),
            settings: SettingsStore::open(
                storage_root.join(SETTINGS_FILE),
                SettingsRegistry::builtin(),
            ),
            registry: TypeRegistry::with_builtin(effects.clone()),
            cache_root: config.cache.location.path.clone(),
            extra_caches: config.cache.extra.clone(),
            install: config.install.clone(),
            services: config.services.clone(),
            effects,
            state,
            storage_root,
        })
    }

    /// Replaces the package type registry.
    #[must_use]
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a read-only cache searched for artifacts before the primary cache.
    pub fn add_package_cache(&mut self, path: impl Into<PathBuf>) {
        self.extra_caches.push(path.into());
    }

    #[must_use]
    pub fn installed(&self) -> &PackageIndex {
        &self.state.installed
    }

    #[must_use]
    pub fn available(&self) -> &PackageIndex {
        &self.state.available
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn list_remotes(&self) -> Result<Vec<Remote>> {
        self.remotes.list()
    }

    /// Registers a remote; `Ok(false)` when it was already registered as is.
    pub fn add_remote(&mut self, id: &str, name: &str, url: &str) -> Result<bool> {
        let _lock = self.begin()?;
        self.remotes.add(&Remote::new(id, name, url))
    }

    pub fn remove_remote(&mut self, id: &str) -> Result<Remote> {
        let _lock = self.begin()?;
        self.remotes.remove(id)
    }

    pub fn list_available(&self, patterns: &[String]) -> Vec<Package> {
        self.listing(&self.state.available, patterns)
    }

    pub fn list_installed(&self, patterns: &[String]) -> Vec<Package> {
        self.listing(&self.state.installed, patterns)
    }

    /// Installed packages whose available version differs, as available.
    pub fn list_upgradable(&self, patterns: &[String]) -> Vec<Package> {
        select::match_ids(patterns, &self.state.installed)
            .into_iter()
            .filter_map(|id| {
                let installed = self.state.installed.get(&id)?;
                let available = self.state.available.get(&id)?;
                (installed.version() != available.version())
                    .then(|| self.registry.instantiate_lenient(&id, available))
            })
            .collect()
    }

    /// Available packages whose type no registered kind handles.
    pub fn list_nothandled(&self, patterns: &[String]) -> Vec<Package> {
        self.list_available(patterns)
            .into_iter()
            .filter(|package| package.handler().is_none())
            .collect()
    }

    fn listing(&self, index: &PackageIndex, patterns: &[String]) -> Vec<Package> {
        select::match_ids(patterns, index)
            .into_iter()
            .filter_map(|id| {
                let metadata = index.get(&id)?;
                Some(self.registry.instantiate_lenient(&id, metadata))
            })
            .collect()
    }

    fn state_path(&self) -> PathBuf {
        self.storage_root.join(CATALOG_FILE)
    }

    /// Takes the catalog lock and reloads state written by earlier holders.
    fn begin(&mut self) -> Result<CatalogLock> {
        let lock = CatalogLock::acquire(&self.storage_root)?;
        self.state = CatalogState::load(&self.state_path())?;
        Ok(lock)
    }

    fn persist(&self) -> Result<()> {
        self.state.save(&self.state_path())
    }

    fn handlers(&self) -> HandlerSet {
        HandlerSet::new(
            self.install.clone(),
            self.services.clone(),
            self.effects.clone(),
        )
    }
}

#[cfg(test)]
mod tests;
