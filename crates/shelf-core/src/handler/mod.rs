//! Install targets: each handler owns a root directory, installs packages
//! into it and, on commit, refreshes its service.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{InstallConfig, ServiceConfig};
use crate::effects::SharedEffects;
use crate::package::{HandlerId, Package};
use crate::services::{ServiceError, ServiceManager};

mod kiwix;
mod mediacenter;
mod nginx;

pub use kiwix::{KiwixHandler, LIBRARY_FILE};
pub use mediacenter::MediaCenterHandler;
pub use nginx::NginxHandler;

pub trait Handler {
    fn id(&self) -> HandlerId;
    fn root(&self) -> &Path;
    /// Notes that the target changed and needs a commit.
    fn mark_pending(&mut self);

    /// Writes aggregate state and restarts the owning service when needed.
    ///
    /// Returns warnings that did not prevent the commit.
    fn commit(&mut self) -> Result<Vec<String>>;

    fn install(&mut self, package: &Package, download: &Path) -> Result<()> {
        let root = self.root().to_path_buf();
        fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
        package.install(download, &root)?;
        self.mark_pending();
        info!(package = package.id(), handler = %self.id(), "installed");
        Ok(())
    }

    fn remove(&mut self, package: &Package) -> Result<()> {
        let root = self.root().to_path_buf();
        package.remove(&root)?;
        self.mark_pending();
        info!(package = package.id(), handler = %self.id(), "removed");
        Ok(())
    }
}

/// Restarts `unit`, tolerating units that are not installed.
///
/// Returns a warning when the restart failed for another reason.
pub(crate) fn restart_service(services: &dyn ServiceManager, unit: &str) -> Option<String> {
    match services
        .get_service(unit)
        .and_then(|service| services.restart(&service))
    {
        Ok(()) => {
            debug!(unit, "restarted service");
            None
        }
        Err(ServiceError::NoSuchUnit { .. }) => {
            debug!(unit, "service not installed; skipping restart");
            None
        }
        Err(err) => {
            warn!(unit, error = %err, "failed to restart service");
            Some(format!("failed to restart {unit}: {err}"))
        }
    }
}

/// Handlers touched during one batch, created on first use and committed
/// together at the end.
pub(crate) struct HandlerSet {
    install: InstallConfig,
    services: ServiceConfig,
    effects: SharedEffects,
    active: BTreeMap<HandlerId, Box<dyn Handler>>,
}

impl HandlerSet {
    pub(crate) fn new(install: InstallConfig, services: ServiceConfig, effects: SharedEffects) -> Self {
        Self {
            install,
            services,
            effects,
            active: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&mut self, id: HandlerId) -> &mut dyn Handler {
        let handler = self.active.entry(id).or_insert_with(|| {
            build(id, &self.install, &self.services, self.effects.clone())
        });
        handler.as_mut()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Commits every touched handler once; failures become warnings.
    pub(crate) fn commit_all(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (id, handler) in &mut self.active {
            match handler.commit() {
                Ok(mut handler_warnings) => warnings.append(&mut handler_warnings),
                Err(err) => {
                    warn!(handler = %id, error = %format!("{err:#}"), "commit failed");
                    warnings.push(format!("failed to commit {id}: {err:#}"));
                }
            }
        }
        warnings
    }
}

fn build(
    id: HandlerId,
    install: &InstallConfig,
    services: &ServiceConfig,
    effects: SharedEffects,
) -> Box<dyn Handler> {
    match id {
        HandlerId::Kiwix => Box::new(KiwixHandler::new(
            install.kiwix_root.clone(),
            services.kiwix_unit.clone(),
            effects,
        )),
        HandlerId::Nginx => Box::new(NginxHandler::new(
            install.nginx_root.clone(),
            services.nginx_unit.clone(),
            effects,
        )),
        HandlerId::MediaCenter => Box::new(MediaCenterHandler::new(install.mediacenter_root.clone())),
    }
}
