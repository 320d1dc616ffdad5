//! Installable packages and the registry mapping a `type` tag to its behavior.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use shelf_domain::{CatalogError, PackageMetadata, PackageSize};

use crate::effects::SharedEffects;

mod archive;
mod medias;
mod site;
pub(crate) mod zim;

pub use medias::ZippedMedias;
pub use site::StaticSite;
pub use zim::ZippedZim;

/// The install target responsible for a package kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerId {
    Kiwix,
    Nginx,
    MediaCenter,
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerId::Kiwix => "kiwix",
            HandlerId::Nginx => "nginx",
            HandlerId::MediaCenter => "mediacenter",
        };
        f.write_str(name)
    }
}

/// Install and remove behavior for one package type.
///
/// `install` replaces any existing copy and must leave that copy untouched
/// when the artifact turns out to be invalid. `remove` must only touch files
/// belonging to the given package.
pub trait PackageKind: Send + Sync {
    fn typename(&self) -> &str;
    fn handler(&self) -> Option<HandlerId>;
    fn install(&self, package: &Package, download: &Path, install_dir: &Path) -> Result<()>;
    fn remove(&self, package: &Package, install_dir: &Path) -> Result<()>;
}

/// One package: an id, its metadata and the behavior selected by its type.
#[derive(Clone)]
pub struct Package {
    id: String,
    metadata: PackageMetadata,
    kind: Arc<dyn PackageKind>,
}

impl Package {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    pub fn name(&self) -> Result<&str, CatalogError> {
        self.metadata
            .name
            .as_deref()
            .ok_or_else(|| self.missing("name"))
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.metadata.version()
    }

    pub fn size(&self) -> Result<&PackageSize, CatalogError> {
        self.metadata.size.as_ref().ok_or_else(|| self.missing("size"))
    }

    /// Size in human units, e.g. `274.0 MB`.
    pub fn filesize(&self) -> Result<String, CatalogError> {
        self.size().map(PackageSize::human)
    }

    /// Name for listings, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn typename(&self) -> &str {
        self.kind.typename()
    }

    #[must_use]
    pub fn handler(&self) -> Option<HandlerId> {
        self.kind.handler()
    }

    pub fn install(&self, download: &Path, install_dir: &Path) -> Result<()> {
        self.kind.install(self, download, install_dir)
    }

    pub fn remove(&self, install_dir: &Path) -> Result<()> {
        self.kind.remove(self, install_dir)
    }

    fn missing(&self, field: &str) -> CatalogError {
        CatalogError::InvalidPackageMetadata {
            id: self.id.clone(),
            field: field.to_string(),
        }
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.metadata == other.metadata
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.id)
            .field("type", &self.kind.typename())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Stands in for a type no registered kind handles; only used by listings.
struct Unhandled {
    typename: String,
}

impl PackageKind for Unhandled {
    fn typename(&self) -> &str {
        &self.typename
    }

    fn handler(&self) -> Option<HandlerId> {
        None
    }

    fn install(&self, package: &Package, _download: &Path, _install_dir: &Path) -> Result<()> {
        Err(self.unsupported(package).into())
    }

    fn remove(&self, package: &Package, _install_dir: &Path) -> Result<()> {
        Err(self.unsupported(package).into())
    }
}

impl Unhandled {
    fn unsupported(&self, package: &Package) -> CatalogError {
        CatalogError::InvalidPackageType {
            id: package.id.clone(),
            typename: self.typename.clone(),
        }
    }
}

/// Explicit mapping from `type` tags to package kinds, built once per catalog.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    kinds: BTreeMap<String, Arc<dyn PackageKind>>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the zim, static site and media bundle kinds.
    #[must_use]
    pub fn with_builtin(effects: SharedEffects) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ZippedZim));
        registry.register(Arc::new(StaticSite));
        registry.register(Arc::new(ZippedMedias::new(effects)));
        registry
    }

    /// Adds `kind`, replacing any kind registered under the same tag.
    pub fn register(&mut self, kind: Arc<dyn PackageKind>) {
        self.kinds.insert(kind.typename().to_string(), kind);
    }

    /// Builds the package for `id`, failing when its type is absent or unknown.
    pub fn instantiate(&self, id: &str, metadata: &PackageMetadata) -> Result<Package, CatalogError> {
        let typename = metadata
            .kind
            .as_deref()
            .ok_or_else(|| CatalogError::InvalidPackageMetadata {
                id: id.to_string(),
                field: "type".to_string(),
            })?;
        let kind = self
            .kinds
            .get(typename)
            .ok_or_else(|| CatalogError::InvalidPackageType {
                id: id.to_string(),
                typename: typename.to_string(),
            })?;
        Ok(Package {
            id: id.to_string(),
            metadata: metadata.clone(),
            kind: Arc::clone(kind),
        })
    }

    /// Like [`TypeRegistry::instantiate`], but unknown or missing types yield
    /// a package that can be listed and nothing else.
    #[must_use]
    pub fn instantiate_lenient(&self, id: &str, metadata: &PackageMetadata) -> Package {
        self.instantiate(id, metadata).unwrap_or_else(|_| Package {
            id: id.to_string(),
            metadata: metadata.clone(),
            kind: Arc::new(Unhandled {
                typename: metadata.kind.clone().unwrap_or_default(),
            }),
        })
    }
}
