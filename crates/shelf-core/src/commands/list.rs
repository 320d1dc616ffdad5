use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CommandContext;
use crate::catalog::PackageSummary;
use crate::ExecutionOutcome;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    #[default]
    Available,
    Installed,
    Upgradable,
    /// Available packages whose type has no handler.
    NotHandled,
}

impl fmt::Display for ListScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListScope::Available => "available",
            ListScope::Installed => "installed",
            ListScope::Upgradable => "upgradable",
            ListScope::NotHandled => "nothandled",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ListRequest {
    pub scope: ListScope,
    pub patterns: Vec<String>,
}

/// Lists packages of one index. Patterns that match nothing are not errors.
pub fn list_packages(ctx: &CommandContext, request: &ListRequest) -> Result<ExecutionOutcome> {
    let catalog = ctx.catalog(&[])?;
    let packages = match request.scope {
        ListScope::Available => catalog.list_available(&request.patterns),
        ListScope::Installed => catalog.list_installed(&request.patterns),
        ListScope::Upgradable => catalog.list_upgradable(&request.patterns),
        ListScope::NotHandled => catalog.list_nothandled(&request.patterns),
    };
    let summaries: Vec<PackageSummary> = packages.iter().map(PackageSummary::from_package).collect();
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|summary| {
            vec![
                summary.id.clone(),
                summary.version.clone(),
                summary.size.clone().unwrap_or_else(|| "-".to_string()),
                summary.name.clone(),
            ]
        })
        .collect();

    let message = match summaries.len() {
        0 => format!("no {} packages", request.scope),
        1 => format!("1 {} package", request.scope),
        count => format!("{count} {} packages", request.scope),
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "scope": request.scope,
            "packages": summaries,
            "table": { "columns": ["id", "version", "size", "name"], "rows": rows },
        }),
    ))
}
