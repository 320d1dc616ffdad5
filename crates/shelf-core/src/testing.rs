//! Fixtures shared by the unit tests: archives built on the fly and
//! in-memory collaborators.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use zip::write::FileOptions;
use zip::ZipWriter;

use shelf_store::CacheLocation;

use crate::config::{CacheConfig, Config, InstallConfig, ServiceConfig, StorageConfig};
use crate::documents::{Document, DocumentStore, NewDocument};
use crate::effects::{SharedEffects, SystemEffects};
use crate::services::{Service, ServiceError, ServiceManager};

pub(crate) fn write_zip(path: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let opts = FileOptions::default();
    for (name, contents) in files {
        zip.start_file(*name, opts)?;
        zip.write_all(contents)?;
    }
    zip.finish()?;
    Ok(())
}

/// A zipped zim laid out the way the kiwix packages are published.
pub(crate) struct ZimFixture {
    pub name: String,
    pub date: String,
}

impl ZimFixture {
    pub(crate) fn new(name: &str, date: &str) -> Self {
        Self {
            name: name.to_string(),
            date: date.to_string(),
        }
    }
}

pub(crate) fn write_zim_package(path: &Path, fixture: &ZimFixture) -> Result<()> {
    let name = &fixture.name;
    let content = format!("ZIM {name} {}", fixture.date);
    let library = format!(
        "<?xml version='1.0' encoding='utf-8'?>\n<library version=\"20110515\">\n  \
         <book id=\"{name}\" path=\"{name}.zim\" indexPath=\"{name}.zim.idx\" indexType=\"xapian\" \
         title=\"Wikipédia\" language=\"tum\" date=\"{}\" mediaCount=\"12\" size=\"3072\"/>\n</library>\n",
        fixture.date
    );
    let content_path = format!("data/content/{name}.zim");
    let library_path = format!("data/library/{name}.zim.xml");
    let termlist = format!("data/index/{name}.zim.idx/termlist.DB");
    let record = format!("data/index/{name}.zim.idx/record.DB");
    write_zip(
        path,
        &[
            (content_path.as_str(), content.as_bytes()),
            (library_path.as_str(), library.as_bytes()),
            (termlist.as_str(), fixture.date.as_bytes()),
            (record.as_str(), b"record".as_slice()),
        ],
    )
}

pub(crate) const MEDIA_MANIFEST: &str = "\
medias:
  - title: first
    summary: The first media
    credits: Shelf
    kind: video
    lang: fr
    tags: [tag1, tag2]
    path: videos/first.mp4
  - title: second
    summary: The second media
    credits: Shelf
    kind: pdf
    tags: [tag1, tag3]
    path: docs/second.pdf
    preview: previews/second.png
  - title: third
    summary: The third media
    credits: Shelf
    kind: audio
    tags: [tag3, tag4]
    path: audio/third.mp3
";

pub(crate) fn write_media_package(path: &Path) -> Result<()> {
    write_zip(
        path,
        &[
            ("manifest.yml", MEDIA_MANIFEST.as_bytes()),
            ("videos/first.mp4", b"first".as_slice()),
            ("docs/second.pdf", b"second".as_slice()),
            ("previews/second.png", b"preview".as_slice()),
            ("audio/third.mp3", b"third".as_slice()),
        ],
    )
}

/// Records every restart and knows only the units it was told about.
#[derive(Debug, Default)]
pub(crate) struct RecordingServiceManager {
    known: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    restarts: Mutex<Vec<String>>,
}

impl RecordingServiceManager {
    pub(crate) fn with_units(units: &[&str]) -> Self {
        let manager = Self::default();
        if let Ok(mut known) = manager.known.lock() {
            known.extend(units.iter().map(ToString::to_string));
        }
        manager
    }

    pub(crate) fn fail_restarts_of(&self, unit: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(unit.to_string());
        }
    }

    pub(crate) fn restarts(&self) -> Vec<String> {
        self.restarts.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ServiceManager for RecordingServiceManager {
    fn get_service(&self, name: &str) -> Result<Service, ServiceError> {
        let known = self.known.lock().map_err(|_| ServiceError::Failed {
            name: name.to_string(),
            action: "show",
            detail: "poisoned".into(),
        })?;
        if known.iter().any(|unit| unit == name) {
            Ok(Service {
                name: name.to_string(),
                load_state: "loaded".into(),
                active_state: "active".into(),
            })
        } else {
            Err(ServiceError::NoSuchUnit {
                name: name.to_string(),
            })
        }
    }

    fn activate(&self, _service: &Service) -> Result<(), ServiceError> {
        Ok(())
    }

    fn deactivate(&self, _service: &Service) -> Result<(), ServiceError> {
        Ok(())
    }

    fn restart(&self, service: &Service) -> Result<(), ServiceError> {
        let failing = self
            .failing
            .lock()
            .map(|units| units.contains(&service.name))
            .unwrap_or(false);
        if failing {
            return Err(ServiceError::Failed {
                name: service.name.clone(),
                action: "restart",
                detail: "unit entered failed state".into(),
            });
        }
        if let Ok(mut restarts) = self.restarts.lock() {
            restarts.push(service.name.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryDocumentStore {
    documents: Mutex<Vec<Document>>,
}

impl DocumentStore for MemoryDocumentStore {
    fn create(&self, document: NewDocument) -> Result<Document> {
        let mut documents = self.documents.lock().map_err(|_| anyhow!("poisoned"))?;
        let created = Document {
            id: documents.iter().map(|doc| doc.id).max().unwrap_or(0) + 1,
            fields: document,
        };
        documents.push(created.clone());
        Ok(created)
    }

    fn all(&self) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .clone())
    }

    fn delete_for_package(&self, package_id: &str) -> Result<usize> {
        let mut documents = self.documents.lock().map_err(|_| anyhow!("poisoned"))?;
        let before = documents.len();
        documents.retain(|doc| doc.fields.package_id.as_deref() != Some(package_id));
        Ok(before - documents.len())
    }
}

/// Effects backed by a recording service manager that knows the default
/// units, and an in-memory document store.
pub(crate) fn recording_effects() -> (SharedEffects, Arc<RecordingServiceManager>) {
    let services = Arc::new(RecordingServiceManager::with_units(&["kiwix-server", "nginx"]));
    let effects = SystemEffects::with(
        Arc::clone(&services) as Arc<dyn ServiceManager>,
        Arc::new(MemoryDocumentStore::default()),
    )
    .shared();
    (effects, services)
}

/// Configuration rooted entirely under `root`, with systemd disabled.
pub(crate) fn test_config(root: &Path) -> Config {
    Config {
        storage: StorageConfig {
            root: root.join("storage"),
        },
        cache: CacheConfig {
            location: CacheLocation {
                path: root.join("cache"),
                source: "test",
            },
            extra: Vec::new(),
        },
        install: InstallConfig {
            kiwix_root: root.join("kiwix"),
            nginx_root: root.join("nginx"),
            mediacenter_root: root.join("mediacenter"),
        },
        services: ServiceConfig {
            systemd: false,
            kiwix_unit: "kiwix-server".into(),
            nginx_unit: "nginx".into(),
        },
    }
}
