use anyhow::Result;
use serde_json::json;

use super::CommandContext;
use crate::ExecutionOutcome;

/// Refreshes the available index from every registered remote.
pub fn cache_update(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let mut catalog = ctx.catalog(&[])?;
    let report = catalog.update_cache()?;
    let warnings: Vec<String> = report
        .skipped
        .iter()
        .map(|skipped| format!("skipped remote {}: {}", skipped.id, skipped.error))
        .collect();
    let message = format!(
        "{} packages available from {} of {} remotes",
        report.available,
        report.remotes.len(),
        report.remotes.len() + report.skipped.len()
    );
    Ok(ExecutionOutcome::success(
        message,
        json!({ "refresh": report, "warnings": warnings }),
    ))
}

/// Forgets the available and installed indexes. Installed files stay on disk.
pub fn cache_clear(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let mut catalog = ctx.catalog(&[])?;
    catalog.clear_cache()?;
    Ok(ExecutionOutcome::success(
        "catalog cache cleared",
        json!({ "storage": catalog.storage_root() }),
    ))
}
