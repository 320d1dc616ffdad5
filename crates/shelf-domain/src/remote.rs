use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::CatalogError;
use crate::metadata::scalar_to_string;
use crate::persist::write_atomic;

/// A named source publishing a catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// Reads a remote record.
    ///
    /// # Errors
    /// Returns [`CatalogError::InvalidFile`] when the record is not a mapping
    /// or lacks one of `id`, `name` or `url`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::parse(path, &contents)?)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(self).context("failed to serialize remote")?;
        write_atomic(path, rendered.as_bytes())
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_yaml::from_str(contents)
            .map_err(|err| CatalogError::invalid_file(path, err.to_string()))?;
        let Some(mapping) = value.as_mapping() else {
            return Err(CatalogError::invalid_file(path, "expected a mapping"));
        };
        let field = |name: &str| {
            mapping
                .get(name)
                .and_then(scalar_to_string)
                .ok_or_else(|| CatalogError::invalid_file(path, format!("missing field '{name}'")))
        };
        Ok(Self {
            id: field("id")?,
            name: field("name")?,
            url: field("url")?,
        })
    }
}
