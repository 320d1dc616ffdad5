//! Artifact fetching for catalog packages.
//!
//! Artifacts are looked up in extra read-only caches first, then in the
//! primary package cache (verified against the published sha256), and only
//! then downloaded. Downloads stream into a temporary file next to their
//! destination while hashing and are persisted once the checksum matches.

use std::{
    env,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use dirs_next::home_dir;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("shelf-store/", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_ATTEMPTS: usize = 3;
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub const CACHE_PATH_ENV: &str = "SHELF_CACHE_PATH";
pub const PACKAGES_DIR: &str = "packages";

/// Package artifact that should be present in the cache.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub url: Option<&'a str>,
    pub sha256: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    ExtraCache,
    PackageCache,
    Download,
}

impl ArtifactSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExtraCache => "extra-cache",
            Self::PackageCache => "package-cache",
            Self::Download => "download",
        }
    }
}

/// Result of resolving an artifact on disk.
#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub path: PathBuf,
    pub size: u64,
    pub source: ArtifactSource,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("package {id} has no url to download from")]
    MissingUrl { id: String },
    #[error("failed to read {url}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to fetch {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response for {url}: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("sha256 mismatch for {url} (expected {expected}, got {actual})")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Http { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

/// Resolves the primary cache root: `SHELF_CACHE_PATH`, then
/// `$XDG_CACHE_HOME/shelf`, then `~/.cache/shelf`.
pub fn resolve_cache_root() -> Result<CacheLocation> {
    if let Some(override_path) = env::var_os(CACHE_PATH_ENV) {
        let path = absolutize(PathBuf::from(override_path))?;
        return Ok(CacheLocation {
            path,
            source: CACHE_PATH_ENV,
        });
    }
    if let Some(xdg) = env::var_os("XDG_CACHE_HOME") {
        return Ok(CacheLocation {
            path: PathBuf::from(xdg).join("shelf"),
            source: "XDG_CACHE_HOME",
        });
    }
    let home = home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok(CacheLocation {
        path: home.join(".cache").join("shelf"),
        source: "~/.cache",
    })
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

pub fn package_cache_dir(cache_root: &Path) -> PathBuf {
    cache_root.join(PACKAGES_DIR)
}

/// Cache file name shared by the primary cache and extra caches.
pub fn artifact_filename(id: &str, version: &str) -> String {
    format!("{id}-{version}")
}

/// Ensures the artifact for `request` is on disk and returns where it lives.
///
/// # Errors
/// Returns [`FetchError::ChecksumMismatch`] when a fresh download does not
/// match the published sha256, and other [`FetchError`]s when the source
/// cannot be read.
pub fn resolve_artifact(
    cache_root: &Path,
    extra_caches: &[PathBuf],
    request: &ArtifactRequest<'_>,
) -> Result<CachedArtifact> {
    let filename = artifact_filename(request.id, request.version);
    for dir in extra_caches {
        let candidate = dir.join(&filename);
        if candidate.is_file() {
            debug!(package = request.id, path = %candidate.display(), "using extra package cache");
            let size = fs::metadata(&candidate)?.len();
            return Ok(CachedArtifact {
                path: candidate,
                size,
                source: ArtifactSource::ExtraCache,
            });
        }
    }

    let dest = package_cache_dir(cache_root).join(&filename);
    if let Some(existing) = validate_existing(&dest, request.sha256)? {
        debug!(package = request.id, path = %dest.display(), "reusing cached artifact");
        return Ok(existing);
    }

    let url = request.url.ok_or_else(|| FetchError::MissingUrl {
        id: request.id.to_string(),
    })?;
    if request.sha256.is_none() {
        warn!(package = request.id, "no sha256sum published; download is not verified");
    }
    info!(package = request.id, %url, "downloading");
    let size = download(url, &dest, request.sha256)?;
    Ok(CachedArtifact {
        path: dest,
        size,
        source: ArtifactSource::Download,
    })
}

fn validate_existing(path: &Path, expected_sha: Option<&str>) -> Result<Option<CachedArtifact>> {
    if !path.exists() {
        return Ok(None);
    }

    match (expected_sha, compute_sha256(path)) {
        (Some(expected), Ok(actual)) if actual.eq_ignore_ascii_case(expected) => {
            let size = fs::metadata(path)?.len();
            Ok(Some(CachedArtifact {
                path: path.to_path_buf(),
                size,
                source: ArtifactSource::PackageCache,
            }))
        }
        _ => {
            // Partial, corrupted or unverifiable copy: fetch it again in full.
            debug!(path = %path.display(), "discarding cached artifact");
            let _ = fs::remove_file(path);
            Ok(None)
        }
    }
}

/// Downloads `url` to `dest`, verifying `expected_sha` when given.
pub fn download(url: &str, dest: &Path, expected_sha: Option<&str>) -> Result<u64> {
    let parsed = parse_url(url)?;
    let attempts = if parsed.scheme() == "file" {
        1
    } else {
        DOWNLOAD_ATTEMPTS
    };

    let mut last_err = None;
    for attempt in 1..=attempts {
        match download_once(&parsed, dest, expected_sha) {
            Ok(size) => return Ok(size),
            Err(err) => {
                let retryable = err
                    .downcast_ref::<FetchError>()
                    .is_some_and(FetchError::is_retryable);
                if !retryable {
                    return Err(err);
                }
                debug!(%url, attempt, error = %err, "download attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to download {url}; no attempts left")))
}

fn download_once(url: &Url, dest: &Path, expected_sha: Option<&str>) -> Result<u64> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let mut reader = open_stream(url)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    let mut hasher = Sha256::new();
    let mut written: u64 = 0;
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer).map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        tmp.write_all(&buffer[..read])?;
        written += read as u64;
    }

    let actual = hex::encode(hasher.finalize());
    if let Some(expected) = expected_sha {
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(FetchError::ChecksumMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    tmp.persist(dest)
        .with_context(|| format!("unable to persist download to {}", dest.display()))?;
    Ok(written)
}

/// Reads a whole document, used for remote catalogs.
pub fn read_url(url: &str) -> Result<Vec<u8>> {
    let parsed = parse_url(url)?;
    let mut reader = open_stream(&parsed)?;
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })?;
    Ok(bytes)
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|err| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

fn open_stream(url: &Url) -> Result<Box<dyn Read>, FetchError> {
    match url.scheme() {
        "file" => {
            let path = url.to_file_path().map_err(|()| FetchError::InvalidUrl {
                url: url.to_string(),
                reason: "not a local path".to_string(),
            })?;
            let file = File::open(&path).map_err(|source| FetchError::Io {
                url: url.to_string(),
                source,
            })?;
            Ok(Box::new(file))
        }
        "http" | "https" => {
            let http_err = |source| FetchError::Http {
                url: url.to_string(),
                source,
            };
            let response = http_client()
                .map_err(http_err)?
                .get(url.as_str())
                .send()
                .map_err(http_err)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(Box::new(response))
        }
        scheme => Err(FetchError::UnsupportedScheme {
            url: url.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// Hex-encoded sha256 of a file.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 32 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .no_proxy()
        .build()
}
