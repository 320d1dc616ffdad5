use anyhow::{Context, Result};
use serde::Serialize;
use shelf_domain::{parse_remote_catalog, CatalogState, PackageIndex, Remote};
use tracing::{info, warn};

use super::Catalog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRemote {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    /// Remotes whose catalog was merged, in merge order.
    pub remotes: Vec<String>,
    pub skipped: Vec<SkippedRemote>,
    pub available: usize,
    /// Installed ids whose metadata was refreshed from the remotes.
    pub refreshed: Vec<String>,
}

fn fetch_remote(remote: &Remote) -> Result<PackageIndex> {
    let bytes = shelf_store::read_url(&remote.url)?;
    let contents = String::from_utf8(bytes)
        .with_context(|| format!("catalog at {} is not valid UTF-8", remote.url))?;
    Ok(parse_remote_catalog(&remote.url, &contents)?)
}

impl Catalog {
    /// Rebuilds the available index from every remote.
    ///
    /// A remote that cannot be fetched or parsed is skipped. Installed
    /// entries pick up new metadata only while it describes the same
    /// version and checksum.
    pub fn update_cache(&mut self) -> Result<RefreshReport> {
        let _lock = self.begin()?;
        let mut report = RefreshReport::default();
        let mut available = PackageIndex::new();
        for remote in self.remotes.list()? {
            match fetch_remote(&remote) {
                Ok(packages) => {
                    info!(remote = %remote.id, packages = packages.len(), "fetched remote catalog");
                    available.extend(packages);
                    report.remotes.push(remote.id);
                }
                Err(err) => {
                    warn!(remote = %remote.id, url = %remote.url, error = %format!("{err:#}"), "skipping remote");
                    report.skipped.push(SkippedRemote {
                        id: remote.id,
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        for (id, installed) in &mut self.state.installed {
            let Some(fresh) = available.get(id) else {
                continue;
            };
            if installed.same_content(fresh) && *installed != *fresh {
                *installed = fresh.clone();
                report.refreshed.push(id.clone());
            }
        }
        report.available = available.len();
        self.state.available = available;
        self.persist()?;
        Ok(report)
    }

    /// Forgets both indexes. Installed files are left on disk.
    pub fn clear_cache(&mut self) -> Result<()> {
        let _lock = self.begin()?;
        self.state = CatalogState::default();
        self.persist()
    }
}
