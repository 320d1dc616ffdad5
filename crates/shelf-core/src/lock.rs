use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::FileExt;

pub(crate) const LOCK_FILE: &str = "catalog.lock";

#[derive(Debug, thiserror::Error)]
#[error("another shelf operation holds {}", path.display())]
pub struct CatalogBusy {
    pub path: PathBuf,
}

/// Advisory lock held for the duration of a mutating catalog operation.
#[derive(Debug)]
pub(crate) struct CatalogLock {
    _file: File,
}

impl CatalogLock {
    pub(crate) fn try_acquire(storage_root: &Path) -> Result<Option<Self>> {
        let path = storage_root.join(LOCK_FILE);
        fs::create_dir_all(storage_root)
            .with_context(|| format!("failed to create {}", storage_root.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn acquire(storage_root: &Path) -> Result<Self> {
        Self::try_acquire(storage_root)?.ok_or_else(|| {
            CatalogBusy {
                path: storage_root.join(LOCK_FILE),
            }
            .into()
        })
    }
}
