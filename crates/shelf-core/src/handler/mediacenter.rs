use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use super::Handler;
use crate::package::HandlerId;

/// Media bundles: the document store is the aggregate state, so there is
/// nothing to write or restart on commit.
pub struct MediaCenterHandler {
    root: PathBuf,
    pending: bool,
}

impl MediaCenterHandler {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            pending: false,
        }
    }
}

impl Handler for MediaCenterHandler {
    fn id(&self) -> HandlerId {
        HandlerId::MediaCenter
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn mark_pending(&mut self) {
        self.pending = true;
    }

    fn commit(&mut self) -> Result<Vec<String>> {
        if self.pending {
            debug!(root = %self.root.display(), "media center up to date");
            self.pending = false;
        }
        Ok(Vec::new())
    }
}
