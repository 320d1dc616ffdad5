use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;

use super::CommandContext;
use crate::catalog::{BatchReport, Catalog};
use crate::ExecutionOutcome;

#[derive(Clone, Debug, Default)]
pub struct PackagesRequest {
    /// Package ids or `*` globs.
    pub patterns: Vec<String>,
    /// Extra read-only caches searched for artifacts.
    pub package_caches: Vec<PathBuf>,
}

type BatchOp = fn(&mut Catalog, &[String]) -> Result<BatchReport>;

fn run_batch(
    ctx: &CommandContext,
    request: &PackagesRequest,
    done: &str,
    op: BatchOp,
) -> Result<ExecutionOutcome> {
    let mut catalog = ctx.catalog(&request.package_caches)?;
    let report = op(&mut catalog, &request.patterns)?;

    let mut message = match report.processed.len() {
        0 => format!("nothing {done}"),
        1 => format!("{done} {}", report.processed[0]),
        count => format!("{done} {count} packages"),
    };
    if report.has_failures() {
        message.push_str(&format!(" ({} failed)", report.failed.len()));
    }

    let mut warnings: Vec<String> = report
        .failed
        .iter()
        .map(|failed| format!("{}: {}", failed.id, failed.error))
        .collect();
    warnings.extend(report.warnings.iter().cloned());
    let notes: Vec<String> = report
        .skipped
        .iter()
        .map(|skipped| format!("{}: {}", skipped.id, skipped.reason))
        .collect();

    Ok(ExecutionOutcome::success(
        message,
        json!({
            "report": report,
            "warnings": warnings,
            "notes": notes,
        }),
    ))
}

/// Installs available packages; failures of single packages are reported,
/// not raised.
///
/// # Errors
/// Returns an error when an explicit id is unknown, a package type is
/// invalid, or the catalog cannot be read or written.
pub fn packages_install(ctx: &CommandContext, request: &PackagesRequest) -> Result<ExecutionOutcome> {
    run_batch(ctx, request, "installed", Catalog::install_packages)
}

pub fn packages_remove(ctx: &CommandContext, request: &PackagesRequest) -> Result<ExecutionOutcome> {
    run_batch(ctx, request, "removed", Catalog::remove_packages)
}

pub fn packages_upgrade(ctx: &CommandContext, request: &PackagesRequest) -> Result<ExecutionOutcome> {
    run_batch(ctx, request, "upgraded", Catalog::upgrade_packages)
}

pub fn packages_reinstall(
    ctx: &CommandContext,
    request: &PackagesRequest,
) -> Result<ExecutionOutcome> {
    run_batch(ctx, request, "reinstalled", Catalog::reinstall_packages)
}
