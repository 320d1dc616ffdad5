use std::process::Command;

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub load_state: String,
    pub active_state: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("no such unit: {name}")]
    NoSuchUnit { name: String },
    #[error("systemctl {action} {name} failed: {detail}")]
    Failed {
        name: String,
        action: &'static str,
        detail: String,
    },
}

/// Service manager collaborator used by handlers after a commit.
pub trait ServiceManager: Send + Sync {
    fn get_service(&self, name: &str) -> Result<Service, ServiceError>;
    fn activate(&self, service: &Service) -> Result<(), ServiceError>;
    fn deactivate(&self, service: &Service) -> Result<(), ServiceError>;
    fn restart(&self, service: &Service) -> Result<(), ServiceError>;
}

/// Talks to systemd through `systemctl`.
#[derive(Debug, Default)]
pub struct SystemdServiceManager;

impl SystemdServiceManager {
    fn systemctl(action: &'static str, args: &[&str], name: &str) -> Result<String, ServiceError> {
        debug!(action, unit = name, "systemctl");
        let output = Command::new("systemctl")
            .arg(action)
            .args(args)
            .arg(name)
            .output()
            .map_err(|err| ServiceError::Failed {
                name: name.to_string(),
                action,
                detail: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(ServiceError::Failed {
                name: name.to_string(),
                action,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ServiceManager for SystemdServiceManager {
    fn get_service(&self, name: &str) -> Result<Service, ServiceError> {
        let stdout = Self::systemctl(
            "show",
            &["--property=LoadState", "--property=ActiveState"],
            name,
        )?;
        parse_show_output(name, &stdout)
    }

    fn activate(&self, service: &Service) -> Result<(), ServiceError> {
        Self::systemctl("start", &[], &service.name).map(drop)
    }

    fn deactivate(&self, service: &Service) -> Result<(), ServiceError> {
        Self::systemctl("stop", &[], &service.name).map(drop)
    }

    fn restart(&self, service: &Service) -> Result<(), ServiceError> {
        Self::systemctl("restart", &[], &service.name).map(drop)
    }
}

/// Used when systemd integration is turned off: every unit is unknown.
#[derive(Debug, Default)]
pub struct DisabledServiceManager;

impl ServiceManager for DisabledServiceManager {
    fn get_service(&self, name: &str) -> Result<Service, ServiceError> {
        Err(ServiceError::NoSuchUnit {
            name: name.to_string(),
        })
    }

    fn activate(&self, _service: &Service) -> Result<(), ServiceError> {
        Ok(())
    }

    fn deactivate(&self, _service: &Service) -> Result<(), ServiceError> {
        Ok(())
    }

    fn restart(&self, _service: &Service) -> Result<(), ServiceError> {
        Ok(())
    }
}

fn parse_show_output(name: &str, stdout: &str) -> Result<Service, ServiceError> {
    let mut service = Service {
        name: name.to_string(),
        load_state: String::new(),
        active_state: String::new(),
    };
    for line in stdout.lines() {
        match line.split_once('=') {
            Some(("LoadState", value)) => service.load_state = value.trim().to_string(),
            Some(("ActiveState", value)) => service.active_state = value.trim().to_string(),
            _ => {}
        }
    }
    if service.load_state.is_empty() || service.load_state == "not-found" {
        return Err(ServiceError::NoSuchUnit {
            name: name.to_string(),
        });
    }
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_loaded_unit() {
        let service = parse_show_output("nginx", "LoadState=loaded\nActiveState=active\n").unwrap();
        assert_eq!(service.load_state, "loaded");
        assert_eq!(service.active_state, "active");
    }

    #[test]
    fn missing_unit_is_distinguished() {
        let err = parse_show_output("kiwix-server", "LoadState=not-found\nActiveState=inactive\n")
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::NoSuchUnit {
                name: "kiwix-server".into()
            }
        );
    }

    #[test]
    fn disabled_manager_knows_no_units() {
        let manager = DisabledServiceManager;
        assert!(matches!(
            manager.get_service("nginx"),
            Err(ServiceError::NoSuchUnit { .. })
        ));
    }
}
