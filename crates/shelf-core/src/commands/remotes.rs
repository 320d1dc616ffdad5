use anyhow::Result;
use serde_json::json;

use super::CommandContext;
use crate::catalog::RefreshReport;
use crate::ExecutionOutcome;

#[derive(Clone, Debug)]
pub struct RemoteAddRequest {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct RemoteRemoveRequest {
    pub id: String,
}

fn refresh_warnings(report: &RefreshReport) -> Vec<String> {
    report
        .skipped
        .iter()
        .map(|skipped| format!("skipped remote {}: {}", skipped.id, skipped.error))
        .collect()
}

/// Registers a remote, then refreshes the catalog cache.
///
/// # Errors
/// Returns an error if the remote conflicts with an existing one or the
/// catalog cannot be written.
pub fn remotes_add(ctx: &CommandContext, request: &RemoteAddRequest) -> Result<ExecutionOutcome> {
    let mut catalog = ctx.catalog(&[])?;
    let added = catalog.add_remote(&request.id, &request.name, &request.url)?;
    let refresh = catalog.update_cache()?;
    let message = if added {
        format!("added remote {} ({} packages available)", request.id, refresh.available)
    } else {
        format!("remote {} is already registered", request.id)
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "remote": { "id": request.id, "name": request.name, "url": request.url },
            "added": added,
            "refresh": refresh,
            "warnings": refresh_warnings(&refresh),
        }),
    ))
}

/// Unregisters a remote, then refreshes the catalog cache.
///
/// # Errors
/// Returns [`shelf_domain::CatalogError::NoSuchRemote`] for an unknown id.
pub fn remotes_remove(
    ctx: &CommandContext,
    request: &RemoteRemoveRequest,
) -> Result<ExecutionOutcome> {
    let mut catalog = ctx.catalog(&[])?;
    let removed = catalog.remove_remote(&request.id)?;
    let refresh = catalog.update_cache()?;
    Ok(ExecutionOutcome::success(
        format!("removed remote {}", removed.id),
        json!({
            "remote": removed,
            "refresh": refresh,
            "warnings": refresh_warnings(&refresh),
        }),
    ))
}

pub fn remotes_list(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let remotes = ctx.catalog(&[])?.list_remotes()?;
    let rows: Vec<Vec<String>> = remotes
        .iter()
        .map(|remote| vec![remote.id.clone(), remote.name.clone(), remote.url.clone()])
        .collect();
    let message = match remotes.len() {
        0 => "no remotes configured".to_string(),
        1 => "1 remote".to_string(),
        count => format!("{count} remotes"),
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "remotes": remotes,
            "table": { "columns": ["id", "name", "url"], "rows": rows },
        }),
    ))
}
