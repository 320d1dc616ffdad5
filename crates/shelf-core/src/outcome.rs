use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use shelf_domain::CatalogError;

use crate::lock::CatalogBusy;
use crate::settings::SettingsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

impl CommandStatus {
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            CommandStatus::Ok => 0,
            CommandStatus::UserError => 1,
            CommandStatus::Failure => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandGroup {
    Remotes,
    Cache,
    Install,
    Remove,
    Upgrade,
    Reinstall,
    List,
    Config,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Remotes => "remotes",
            CommandGroup::Cache => "cache",
            CommandGroup::Install => "install",
            CommandGroup::Remove => "remove",
            CommandGroup::Upgrade => "upgrade",
            CommandGroup::Reinstall => "reinstall",
            CommandGroup::List => "list",
            CommandGroup::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let group_name = info.group.to_string();
    let prefix = if group_name == info.name {
        format!("shelf {}", info.name)
    } else {
        format!("shelf {} {}", group_name, info.name)
    };
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}

#[must_use]
pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

/// Maps errors caused by the caller's input to a user-error outcome.
///
/// Returns `None` for everything else, which the CLI reports as an internal failure.
#[must_use]
pub fn user_error_outcome(err: &anyhow::Error) -> Option<ExecutionOutcome> {
    if let Some(catalog) = err.downcast_ref::<CatalogError>() {
        return Some(ExecutionOutcome::user_error(
            catalog.to_string(),
            json!({ "reason": catalog.reason() }),
        ));
    }
    if let Some(settings) = err.downcast_ref::<SettingsError>() {
        return Some(ExecutionOutcome::user_error(
            settings.to_string(),
            json!({ "reason": settings.reason() }),
        ));
    }
    if let Some(busy) = err.downcast_ref::<CatalogBusy>() {
        return Some(ExecutionOutcome::user_error(
            busy.to_string(),
            json!({
                "reason": "catalog_busy",
                "hint": "Wait for the other shelf command to finish, then retry.",
            }),
        ));
    }
    None
}
