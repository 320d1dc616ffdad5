use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{restart_service, Handler};
use crate::effects::SharedEffects;
use crate::package::HandlerId;

/// Static sites live as plain directories; commit only restarts the server.
pub struct NginxHandler {
    root: PathBuf,
    unit: String,
    effects: SharedEffects,
    pending: bool,
}

impl NginxHandler {
    #[must_use]
    pub fn new(root: PathBuf, unit: String, effects: SharedEffects) -> Self {
        Self {
            root,
            unit,
            effects,
            pending: false,
        }
    }
}

impl Handler for NginxHandler {
    fn id(&self) -> HandlerId {
        HandlerId::Nginx
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn mark_pending(&mut self) {
        self.pending = true;
    }

    fn commit(&mut self) -> Result<Vec<String>> {
        if !self.pending {
            return Ok(Vec::new());
        }
        self.pending = false;
        Ok(restart_service(self.effects.services(), &self.unit)
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::recording_effects;

    #[test]
    fn restarts_only_after_changes() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (effects, services) = recording_effects();
        let mut handler = NginxHandler::new(temp.path().to_path_buf(), "nginx".into(), effects);

        handler.commit()?;
        assert!(services.restarts().is_empty());

        handler.mark_pending();
        handler.commit()?;
        handler.commit()?;
        assert_eq!(services.restarts(), vec!["nginx"]);
        Ok(())
    }

    #[test]
    fn restart_failure_is_a_warning() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let (effects, services) = recording_effects();
        services.fail_restarts_of("nginx");
        let mut handler = NginxHandler::new(temp.path().to_path_buf(), "nginx".into(), effects);

        handler.mark_pending();
        let warnings = handler.commit()?;
        assert_eq!(warnings.len(), 1);
        Ok(())
    }
}
