use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use shelf_domain::{write_atomic, MediaKind};

/// A media record as seen by the media database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    #[serde(flatten)]
    pub fields: NewDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub credits: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub original: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PathBuf>,
    /// Owning package, if the document was created by a package install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
}

/// Document database collaborator populated by media bundle installs.
pub trait DocumentStore: Send + Sync {
    fn create(&self, document: NewDocument) -> Result<Document>;
    fn all(&self) -> Result<Vec<Document>>;
    /// Deletes every document owned by `package_id`, returning how many went away.
    fn delete_for_package(&self, package_id: &str) -> Result<usize>;

    /// Creates `documents` in order, assigning consecutive ids.
    fn create_many(&self, documents: Vec<NewDocument>) -> Result<Vec<Document>> {
        documents.into_iter().map(|document| self.create(document)).collect()
    }

    fn with_tag(&self, tag: &str) -> Result<Vec<Document>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|doc| doc.fields.tags.iter().any(|candidate| candidate == tag))
            .collect())
    }

    fn for_package(&self, package_id: &str) -> Result<Vec<Document>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|doc| doc.fields.package_id.as_deref() == Some(package_id))
            .collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    documents: Vec<Document>,
}

/// Document store kept in a single JSON file, loaded on first use.
#[derive(Debug)]
pub struct JsonDocumentStore {
    path: PathBuf,
    state: Mutex<Option<DocumentFile>>,
}

impl JsonDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_state<T>(&self, action: impl FnOnce(&mut DocumentFile) -> Result<T>) -> Result<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(load(&self.path)?);
        }
        let state = guard
            .as_mut()
            .ok_or_else(|| anyhow!("document store failed to load"))?;
        action(state)
    }

    fn persist(&self, state: &DocumentFile) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(state)?;
        contents.push(b'\n');
        write_atomic(&self.path, &contents)
    }
}

fn load(path: &Path) -> Result<DocumentFile> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(DocumentFile::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

impl DocumentStore for JsonDocumentStore {
    fn create(&self, document: NewDocument) -> Result<Document> {
        self.create_many(vec![document])?
            .pop()
            .ok_or_else(|| anyhow!("document store created nothing"))
    }

    /// Writes the file once for the whole batch.
    fn create_many(&self, documents: Vec<NewDocument>) -> Result<Vec<Document>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.with_state(|state| {
            let created: Vec<Document> = documents
                .into_iter()
                .map(|fields| {
                    state.next_id += 1;
                    Document {
                        id: state.next_id,
                        fields,
                    }
                })
                .collect();
            state.documents.extend(created.iter().cloned());
            self.persist(state)?;
            Ok(created)
        })
    }

    fn all(&self) -> Result<Vec<Document>> {
        self.with_state(|state| Ok(state.documents.clone()))
    }

    fn delete_for_package(&self, package_id: &str) -> Result<usize> {
        self.with_state(|state| {
            let before = state.documents.len();
            state
                .documents
                .retain(|doc| doc.fields.package_id.as_deref() != Some(package_id));
            let removed = before - state.documents.len();
            if removed > 0 {
                self.persist(state)?;
            }
            Ok(removed)
        })
    }
}
