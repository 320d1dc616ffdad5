use anyhow::Result;
use serde_json::{json, Value};

use super::CommandContext;
use crate::ExecutionOutcome;

#[derive(Clone, Debug, Default)]
pub struct ConfigListRequest {
    pub namespace: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ConfigGetRequest {
    pub namespace: String,
    pub key: String,
}

#[derive(Clone, Debug)]
pub struct ConfigSetRequest {
    pub namespace: String,
    pub key: String,
    /// JSON text; anything that does not parse is taken as a plain string.
    pub value: String,
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn config_list(ctx: &CommandContext, request: &ConfigListRequest) -> Result<ExecutionOutcome> {
    let entries = ctx.settings().entries(request.namespace.as_deref())?;
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                format!("{}.{}", entry.namespace, entry.key),
                entry.kind.to_string(),
                entry.value.to_string(),
            ]
        })
        .collect();
    Ok(ExecutionOutcome::success(
        format!("{} settings", entries.len()),
        json!({
            "settings": entries,
            "table": { "columns": ["key", "type", "value"], "rows": rows },
        }),
    ))
}

pub fn config_get(ctx: &CommandContext, request: &ConfigGetRequest) -> Result<ExecutionOutcome> {
    let value = ctx.settings().get(&request.namespace, &request.key)?;
    Ok(ExecutionOutcome::success(
        value.to_string(),
        json!({
            "namespace": request.namespace,
            "key": request.key,
            "value": value,
            "passthrough": true,
        }),
    ))
}

/// Stores a value after checking it against the registered type.
///
/// # Errors
/// Returns [`SettingsError`](crate::settings::SettingsError) for unknown
/// namespaces or keys and for values of the wrong type.
pub fn config_set(ctx: &CommandContext, request: &ConfigSetRequest) -> Result<ExecutionOutcome> {
    let value = parse_value(&request.value);
    ctx.settings()
        .set(&request.namespace, &request.key, value.clone())?;
    Ok(ExecutionOutcome::success(
        format!("{}.{} = {value}", request.namespace, request.key),
        json!({ "namespace": request.namespace, "key": request.key, "value": value }),
    ))
}

pub fn config_reset(ctx: &CommandContext, request: &ConfigGetRequest) -> Result<ExecutionOutcome> {
    let settings = ctx.settings();
    settings.reset(&request.namespace, &request.key)?;
    let value = settings.get(&request.namespace, &request.key)?;
    Ok(ExecutionOutcome::success(
        format!("{}.{} reset to {value}", request.namespace, request.key),
        json!({ "namespace": request.namespace, "key": request.key, "value": value }),
    ))
}
