#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Data model for the shelf content catalog: remotes, package metadata,
//! catalog state, library descriptors and media manifests.

pub mod error;
pub mod glob;
pub mod library;
pub mod manifest;
pub mod metadata;
pub mod persist;
pub mod remote;
pub mod state;

pub use error::CatalogError;
pub use library::{parse_books, render_library, Book};
pub use manifest::{MediaEntry, MediaKind, MediaManifest, MANIFEST_FILE};
pub use metadata::{human_filesize, PackageMetadata, PackageSize, DEFAULT_VERSION};
pub use persist::write_atomic;
pub use remote::Remote;
pub use state::{parse_remote_catalog, CatalogState, PackageIndex};
