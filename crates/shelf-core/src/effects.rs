use std::sync::Arc;

use crate::config::Config;
use crate::documents::{DocumentStore, JsonDocumentStore};
use crate::services::{DisabledServiceManager, ServiceManager, SystemdServiceManager};

pub(crate) const DOCUMENTS_FILE: &str = "documents.json";

/// Collaborators the catalog reaches outside its own files.
pub trait Effects: Send + Sync {
    fn services(&self) -> &dyn ServiceManager;
    fn documents(&self) -> &dyn DocumentStore;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    services: Arc<dyn ServiceManager>,
    documents: Arc<dyn DocumentStore>,
}

impl SystemEffects {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let services: Arc<dyn ServiceManager> = if config.services.systemd {
            Arc::new(SystemdServiceManager)
        } else {
            Arc::new(DisabledServiceManager)
        };
        Self {
            services,
            documents: Arc::new(JsonDocumentStore::new(
                config.storage.root.join(DOCUMENTS_FILE),
            )),
        }
    }

    pub fn with(services: Arc<dyn ServiceManager>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            services,
            documents,
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedEffects {
        Arc::new(self)
    }
}

impl Effects for SystemEffects {
    fn services(&self) -> &dyn ServiceManager {
        self.services.as_ref()
    }

    fn documents(&self) -> &dyn DocumentStore {
        self.documents.as_ref()
    }
}
