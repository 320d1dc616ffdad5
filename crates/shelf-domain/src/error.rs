use std::path::PathBuf;

/// Failures raised while reading catalog records or validating packages.
///
/// These travel inside `anyhow::Error` and are recovered with
/// `downcast_ref::<CatalogError>()` where callers need to tell a bad input
/// apart from an I/O failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid file {}: {reason}", path.display())]
    InvalidFile { path: PathBuf, reason: String },
    #[error("package {id} has invalid metadata: missing required field '{field}'")]
    InvalidPackageMetadata { id: String, field: String },
    #[error("package {id} has unsupported type '{typename}'")]
    InvalidPackageType { id: String, typename: String },
    #[error("package {id} has invalid content: {reason}")]
    InvalidPackageContent { id: String, reason: String },
    #[error("remote {id} already exists with url {existing_url}")]
    ExistingRemote {
        id: String,
        existing_url: String,
        requested_url: String,
    },
    #[error("remote {id} not found")]
    NoSuchRemote { id: String },
    #[error("invalid remote id '{id}': {reason}")]
    InvalidRemoteId { id: String, reason: String },
    #[error("no such package: {id}")]
    NoSuchPackage { id: String },
}

impl CatalogError {
    pub fn invalid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_content(id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPackageContent {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag used in JSON output.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidFile { .. } => "invalid_file",
            Self::InvalidPackageMetadata { .. } => "invalid_package_metadata",
            Self::InvalidPackageType { .. } => "invalid_package_type",
            Self::InvalidPackageContent { .. } => "invalid_package_content",
            Self::ExistingRemote { .. } => "existing_remote",
            Self::NoSuchRemote { .. } => "no_such_remote",
            Self::InvalidRemoteId { .. } => "invalid_remote_id",
            Self::NoSuchPackage { .. } => "no_such_package",
        }
    }
}
