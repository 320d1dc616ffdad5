use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shelf_domain::{parse_books, render_library, write_atomic, Book};
use tracing::{debug, warn};

use super::{restart_service, Handler};
use crate::effects::SharedEffects;
use crate::package::zim::{index_dir, CONTENT_DIR, INDEX_DIR, LIBRARY_DIR};
use crate::package::HandlerId;

pub const LIBRARY_FILE: &str = "library.xml";

/// Serves installed zims through kiwix; commit rebuilds `library.xml` from
/// the per-package descriptors.
pub struct KiwixHandler {
    root: PathBuf,
    unit: String,
    effects: SharedEffects,
    pending: bool,
}

impl KiwixHandler {
    #[must_use]
    pub fn new(root: PathBuf, unit: String, effects: SharedEffects) -> Self {
        Self {
            root,
            unit,
            effects,
            pending: false,
        }
    }

    /// One book per installed descriptor, pointed at the installed files.
    fn collect_books(&self, warnings: &mut Vec<String>) -> Result<Vec<Book>> {
        let library_dir = self.root.join(LIBRARY_DIR);
        let mut descriptors = match fs::read_dir(&library_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
                .collect::<Vec<_>>(),
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", library_dir.display()))
            }
        };
        descriptors.sort();

        let mut books = Vec::new();
        for descriptor in descriptors {
            let Some(stem) = descriptor.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let parsed = fs::read_to_string(&descriptor)
                .map_err(anyhow::Error::from)
                .and_then(|contents| parse_books(&contents));
            let parsed = match parsed {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(path = %descriptor.display(), error = %err, "skipping unreadable descriptor");
                    warnings.push(format!("skipped {}: {err}", descriptor.display()));
                    continue;
                }
            };
            let index = Path::new(INDEX_DIR).join(index_dir(stem));
            let has_index = self.root.join(&index).is_dir();
            for mut book in parsed {
                book.set_attribute("path", relative(&Path::new(CONTENT_DIR).join(stem)));
                if has_index {
                    book.set_attribute("indexPath", relative(&index));
                } else {
                    book.remove_attribute("indexPath");
                    book.remove_attribute("indexType");
                }
                books.push(book);
            }
        }
        Ok(books)
    }
}

fn relative(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl Handler for KiwixHandler {
    fn id(&self) -> HandlerId {
        HandlerId::Kiwix
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn mark_pending(&mut self) {
        self.pending = true;
    }

    fn commit(&mut self) -> Result<Vec<String>> {
        let library = self.root.join(LIBRARY_FILE);
        if !self.pending && library.exists() {
            return Ok(Vec::new());
        }
        let mut warnings = Vec::new();
        let books = self.collect_books(&mut warnings)?;
        write_atomic(&library, render_library(&books).as_bytes())?;
        debug!(path = %library.display(), books = books.len(), "wrote kiwix library");

        if self.pending {
            warnings.extend(restart_service(self.effects.services(), &self.unit));
            self.pending = false;
        }
        Ok(warnings)
    }
}
