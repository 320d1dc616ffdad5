use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use shelf_store::{resolve_cache_root, CacheLocation, CACHE_PATH_ENV};

pub const STORAGE_ROOT_ENV: &str = "SHELF_STORAGE_ROOT";
pub const PACKAGE_CACHES_ENV: &str = "SHELF_PACKAGE_CACHES";
pub const KIWIX_ROOT_ENV: &str = "SHELF_INDEX_ROOT";
pub const NGINX_ROOT_ENV: &str = "SHELF_SITES_ROOT";
pub const MEDIACENTER_ROOT_ENV: &str = "SHELF_MEDIA_ROOT";
pub const KIWIX_SERVICE_ENV: &str = "SHELF_INDEX_SERVICE";
pub const NGINX_SERVICE_ENV: &str = "SHELF_SITES_SERVICE";
pub const SYSTEMD_ENV: &str = "SHELF_SYSTEMD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn flag_is_disabled(&self, key: &str) -> bool {
        self.var(key).is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            )
        })
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub install: InstallConfig,
    pub services: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub location: CacheLocation,
    /// Read-only caches checked before the primary cache, in order.
    pub extra: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub kiwix_root: PathBuf,
    pub nginx_root: PathBuf,
    pub mediacenter_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub systemd: bool,
    pub kiwix_unit: String,
    pub nginx_unit: String,
}

impl Config {
    /// Builds a configuration from an environment snapshot.
    ///
    /// # Errors
    /// Returns an error if no storage or cache directory can be determined.
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let storage_root = match snapshot.var(STORAGE_ROOT_ENV) {
            Some(value) => absolutize(Path::new(value))?,
            None => dirs_next::data_local_dir()
                .ok_or_else(|| anyhow!("unable to determine a data directory; set {STORAGE_ROOT_ENV}"))?
                .join("shelf"),
        };
        let location = match snapshot.var(CACHE_PATH_ENV) {
            Some(value) => CacheLocation {
                path: absolutize(Path::new(value))?,
                source: CACHE_PATH_ENV,
            },
            None => resolve_cache_root()?,
        };
        let extra = snapshot
            .var(PACKAGE_CACHES_ENV)
            .map(|value| env::split_paths(value).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default();
        let root_or = |key: &str, default: &str| -> Result<PathBuf> {
            match snapshot.var(key) {
                Some(value) => absolutize(Path::new(value)),
                None => Ok(storage_root.join(default)),
            }
        };

        Ok(Self {
            install: InstallConfig {
                kiwix_root: root_or(KIWIX_ROOT_ENV, "kiwix")?,
                nginx_root: root_or(NGINX_ROOT_ENV, "nginx")?,
                mediacenter_root: root_or(MEDIACENTER_ROOT_ENV, "mediacenter")?,
            },
            services: ServiceConfig {
                systemd: !snapshot.flag_is_disabled(SYSTEMD_ENV),
                kiwix_unit: snapshot
                    .var(KIWIX_SERVICE_ENV)
                    .unwrap_or("kiwix-server")
                    .to_string(),
                nginx_unit: snapshot.var(NGINX_SERVICE_ENV).unwrap_or("nginx").to_string(),
            },
            storage: StorageConfig { root: storage_root },
            cache: CacheConfig { location, extra },
        })
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}
