use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::CatalogError;
use crate::metadata::{scalar_to_string, PackageMetadata};
use crate::persist::write_atomic;

pub type PackageIndex = BTreeMap<String, PackageMetadata>;

/// The persisted pair of indexes kept by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogState {
    #[serde(default)]
    pub installed: PackageIndex,
    #[serde(default)]
    pub available: PackageIndex,
}

impl CatalogState {
    /// Loads the state file, treating a missing or empty file as empty indexes.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidFile`] when the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let state: Option<Self> = serde_yaml::from_str(&contents)
            .map_err(|err| CatalogError::invalid_file(path, err.to_string()))?;
        Ok(state.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(self).context("failed to serialize catalog state")?;
        write_atomic(path, rendered.as_bytes())
    }
}

/// Parses a catalog document published by a remote.
///
/// Packages are read from the top-level `all:` mapping when present,
/// otherwise the document itself is taken as the id to metadata mapping.
///
/// # Errors
/// Returns [`CatalogError::InvalidFile`] naming `source` when the document is
/// not a mapping or an entry cannot be read as package metadata.
pub fn parse_remote_catalog(source: &str, contents: &str) -> Result<PackageIndex, CatalogError> {
    let invalid = |reason: String| CatalogError::invalid_file(source, reason);
    let document: Value = serde_yaml::from_str(contents).map_err(|err| invalid(err.to_string()))?;
    let packages = match &document {
        Value::Null => return Ok(PackageIndex::new()),
        Value::Mapping(mapping) => match mapping.get("all") {
            Some(Value::Mapping(all)) => all,
            Some(Value::Null) => return Ok(PackageIndex::new()),
            _ => mapping,
        },
        _ => return Err(invalid("expected a mapping of packages".to_string())),
    };

    let mut index = PackageIndex::new();
    for (key, value) in packages {
        let id = scalar_to_string(key).ok_or_else(|| invalid("package id is not a scalar".into()))?;
        let metadata = if value.is_null() {
            PackageMetadata::default()
        } else {
            serde_yaml::from_value(value.clone())
                .map_err(|err| invalid(format!("package {id}: {err}")))?
        };
        index.insert(id, metadata);
    }
    Ok(index)
}
