//! Namespaced key/value settings persisted next to the catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shelf_domain::write_atomic;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::error;

pub const SETTINGS_FILE: &str = "settings.json";
pub const HOME_PAGE_NAMESPACE: &str = "home-page";
pub const DISPLAYED_PACKAGES_KEY: &str = "displayed-package-ids";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Bool,
    Int,
    String,
    List,
}

impl SettingKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::List => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::List => "list",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SettingSpec {
    pub kind: SettingKind,
    pub default: Value,
    pub summary: &'static str,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("no such configuration namespace: {namespace}")]
    NoSuchNamespace { namespace: String },
    #[error("no such configuration key: {namespace}.{key}")]
    NoSuchKey { namespace: String, key: String },
    #[error("invalid value for {namespace}.{key}: expected {expected}, got {value}")]
    InvalidValue {
        namespace: String,
        key: String,
        expected: SettingKind,
        value: String,
    },
}

impl SettingsError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoSuchNamespace { .. } => "no_such_namespace",
            Self::NoSuchKey { .. } => "no_such_key",
            Self::InvalidValue { .. } => "invalid_value",
        }
    }
}

/// Every known namespace and key, with its type and default.
#[derive(Debug, Clone, Default)]
pub struct SettingsRegistry {
    namespaces: BTreeMap<&'static str, BTreeMap<&'static str, SettingSpec>>,
}

impl SettingsRegistry {
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(
            HOME_PAGE_NAMESPACE,
            DISPLAYED_PACKAGES_KEY,
            SettingSpec {
                kind: SettingKind::List,
                default: json!([]),
                summary: "Installed package ids shown on the home page, in display order",
            },
        );
        registry
    }

    pub fn register(&mut self, namespace: &'static str, key: &'static str, spec: SettingSpec) {
        self.namespaces.entry(namespace).or_default().insert(key, spec);
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.namespaces.keys().copied()
    }

    pub fn keys(&self, namespace: &str) -> Result<Vec<&'static str>, SettingsError> {
        self.namespaces
            .get(namespace)
            .map(|keys| keys.keys().copied().collect())
            .ok_or_else(|| SettingsError::NoSuchNamespace {
                namespace: namespace.to_string(),
            })
    }

    pub fn spec(&self, namespace: &str, key: &str) -> Result<&SettingSpec, SettingsError> {
        let keys = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| SettingsError::NoSuchNamespace {
                namespace: namespace.to_string(),
            })?;
        keys.get(key).ok_or_else(|| SettingsError::NoSuchKey {
            namespace: namespace.to_string(),
            key: key.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: Value,
    updated_at: String,
}

type StoredSettings = BTreeMap<String, BTreeMap<String, StoredValue>>;

/// One row of `shelf config list`.
#[derive(Debug, Clone, Serialize)]
pub struct SettingEntry {
    pub namespace: String,
    pub key: String,
    pub kind: SettingKind,
    pub value: Value,
    pub default: Value,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    registry: SettingsRegistry,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>, registry: SettingsRegistry) -> Self {
        Self {
            path: path.into(),
            registry,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SettingsRegistry {
        &self.registry
    }

    /// Current value, or the registered default when unset.
    ///
    /// A stored value whose type no longer matches the registry is logged
    /// and ignored.
    pub fn get(&self, namespace: &str, key: &str) -> Result<Value> {
        let spec = self.registry.spec(namespace, key)?;
        let stored = self.load()?;
        Ok(Self::effective(namespace, key, spec, &stored).0)
    }

    pub fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let spec = self.registry.spec(namespace, key)?;
        if !spec.kind.accepts(&value) {
            return Err(SettingsError::InvalidValue {
                namespace: namespace.to_string(),
                key: key.to_string(),
                expected: spec.kind,
                value: value.to_string(),
            }
            .into());
        }
        let mut stored = self.load()?;
        stored.entry(namespace.to_string()).or_default().insert(
            key.to_string(),
            StoredValue {
                value,
                updated_at: now_rfc3339()?,
            },
        );
        self.save(&stored)
    }

    pub fn reset(&self, namespace: &str, key: &str) -> Result<()> {
        self.registry.spec(namespace, key)?;
        let mut stored = self.load()?;
        let removed = stored
            .get_mut(namespace)
            .and_then(|keys| keys.remove(key))
            .is_some();
        if removed {
            stored.retain(|_, keys| !keys.is_empty());
            self.save(&stored)?;
        }
        Ok(())
    }

    /// Every key of `namespace`, or of all namespaces when `None`.
    pub fn entries(&self, namespace: Option<&str>) -> Result<Vec<SettingEntry>> {
        let namespaces: Vec<&'static str> = match namespace {
            Some(name) => {
                let known = self.registry.namespaces().find(|candidate| *candidate == name);
                vec![known.ok_or_else(|| SettingsError::NoSuchNamespace {
                    namespace: name.to_string(),
                })?]
            }
            None => self.registry.namespaces().collect(),
        };
        let stored = self.load()?;
        let mut entries = Vec::new();
        for namespace in namespaces {
            for key in self.registry.keys(namespace)? {
                let spec = self.registry.spec(namespace, key)?;
                let (value, updated_at) = Self::effective(namespace, key, spec, &stored);
                entries.push(SettingEntry {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    kind: spec.kind,
                    value,
                    default: spec.default.clone(),
                    updated_at,
                });
            }
        }
        Ok(entries)
    }

    fn effective(
        namespace: &str,
        key: &str,
        spec: &SettingSpec,
        stored: &StoredSettings,
    ) -> (Value, Option<String>) {
        match stored.get(namespace).and_then(|keys| keys.get(key)) {
            Some(entry) if spec.kind.accepts(&entry.value) => {
                (entry.value.clone(), Some(entry.updated_at.clone()))
            }
            Some(entry) => {
                error!(
                    namespace,
                    key,
                    value = %entry.value,
                    expected = %spec.kind,
                    "stored setting has the wrong type; using the default"
                );
                (spec.default.clone(), None)
            }
            None => (spec.default.clone(), None),
        }
    }

    fn load(&self) -> Result<StoredSettings> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse {}", self.path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(StoredSettings::new()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    fn save(&self, stored: &StoredSettings) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(stored)?;
        contents.push(b'\n');
        write_atomic(&self.path, &contents)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format timestamp")
}

/// Applies removals then additions to the home page package list, keeping
/// order and dropping duplicates. The store is only written when the list changes.
pub fn update_displayed_packages(
    store: &SettingsStore,
    to_remove: &[String],
    to_add: &[String],
) -> Result<Vec<String>> {
    let current: Vec<String> = store
        .get(HOME_PAGE_NAMESPACE, DISPLAYED_PACKAGES_KEY)?
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut ids: IndexSet<String> = current.iter().cloned().collect();
    for id in to_remove {
        ids.shift_remove(id);
    }
    for id in to_add {
        ids.insert(id.clone());
    }
    let updated: Vec<String> = ids.into_iter().collect();
    if updated != current {
        store.set(HOME_PAGE_NAMESPACE, DISPLAYED_PACKAGES_KEY, json!(updated))?;
    }
    Ok(updated)
}
