use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use shelf_domain::{CatalogError, Remote};
use tracing::{debug, warn};

const RECORD_EXTENSION: &str = "yml";

/// Remote records kept as one `<id>.yml` file each.
#[derive(Debug, Clone)]
pub struct RemoteRegistry {
    dir: PathBuf,
}

impl RemoteRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Every readable remote, sorted by id. Unreadable records are skipped.
    pub fn list(&self) -> Result<Vec<Remote>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.dir.display()))
            }
        };
        let mut remotes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match Remote::from_file(&path) {
                Ok(remote) => remotes.push(remote),
                Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable remote"),
            }
        }
        remotes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(remotes)
    }

    pub fn get(&self, id: &str) -> Result<Option<Remote>> {
        validate_id(id)?;
        let path = self.record_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        Remote::from_file(&path).map(Some)
    }

    /// Stores `remote`. Returns `false` when the same id and url already exist.
    ///
    /// # Errors
    /// [`CatalogError::ExistingRemote`] when the id is taken by another url,
    /// [`CatalogError::InvalidRemoteId`] when the id cannot name a record file.
    pub fn add(&self, remote: &Remote) -> Result<bool> {
        validate_id(&remote.id)?;
        if let Some(existing) = self.get(&remote.id)? {
            if existing.url == remote.url {
                debug!(remote = %remote.id, "remote already registered");
                return Ok(false);
            }
            return Err(CatalogError::ExistingRemote {
                id: remote.id.clone(),
                existing_url: existing.url,
                requested_url: remote.url.clone(),
            }
            .into());
        }
        remote.to_file(&self.record_path(&remote.id))?;
        Ok(true)
    }

    pub fn remove(&self, id: &str) -> Result<Remote> {
        validate_id(id)?;
        let path = self.record_path(id);
        let remote = self.get(id)?.ok_or_else(|| CatalogError::NoSuchRemote {
            id: id.to_string(),
        })?;
        fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        Ok(remote)
    }
}

fn validate_id(id: &str) -> Result<(), CatalogError> {
    let reason = if id.is_empty() {
        Some("must not be empty")
    } else if id.starts_with('.') {
        Some("must not start with '.'")
    } else if id.contains(['/', '\\']) || id.chars().any(char::is_control) {
        Some("must not contain path separators or control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(CatalogError::InvalidRemoteId {
            id: id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
