//! Command entry points behind the `shelf` binary.
//!
//! Every command takes a [`CommandContext`] plus a request and returns an
//! [`ExecutionOutcome`](crate::ExecutionOutcome) whose `details` carry the
//! machine-readable payload.

use std::path::PathBuf;

use anyhow::Result;

use crate::catalog::Catalog;
use crate::config::{Config, EnvSnapshot, GlobalOptions};
use crate::effects::{SharedEffects, SystemEffects};
use crate::settings::{SettingsRegistry, SettingsStore, SETTINGS_FILE};

mod cache;
mod config;
mod list;
mod packages;
mod remotes;

pub use cache::{cache_clear, cache_update};
pub use config::{
    config_get, config_list, config_reset, config_set, ConfigGetRequest, ConfigListRequest,
    ConfigSetRequest,
};
pub use list::{list_packages, ListRequest, ListScope};
pub use packages::{
    packages_install, packages_reinstall, packages_remove, packages_upgrade, PackagesRequest,
};
pub use remotes::{remotes_add, remotes_list, remotes_remove, RemoteAddRequest, RemoteRemoveRequest};

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Builds a context from the process environment with system effects.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be resolved.
    pub fn new(global: &'a GlobalOptions) -> Result<Self> {
        let config = Config::from_snapshot(&EnvSnapshot::capture())?;
        let effects = SystemEffects::new(&config).shared();
        Ok(Self::with_effects(global, config, effects))
    }

    pub fn with_effects(global: &'a GlobalOptions, config: Config, effects: SharedEffects) -> Self {
        Self {
            global,
            config,
            effects,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared_effects(&self) -> SharedEffects {
        self.effects.clone()
    }

    /// Opens the catalog, adding `package_caches` after the configured ones.
    pub(crate) fn catalog(&self, package_caches: &[PathBuf]) -> Result<Catalog> {
        let mut catalog = Catalog::open(&self.config, self.shared_effects())?;
        for path in package_caches {
            catalog.add_package_cache(path);
        }
        Ok(catalog)
    }

    pub(crate) fn settings(&self) -> SettingsStore {
        SettingsStore::open(
            self.config.storage.root.join(SETTINGS_FILE),
            SettingsRegistry::builtin(),
        )
    }
}
