#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Catalog orchestration for shelf: package kinds, install handlers, the
//! settings store and the command functions behind the CLI.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod documents;
pub mod effects;
pub mod handler;
mod lock;
mod outcome;
pub mod package;
pub mod services;
pub mod settings;

#[cfg(test)]
mod testing;

pub use catalog::{BatchReport, Catalog, PackageSummary, RefreshReport};
pub use commands::CommandContext;
pub use config::{Config, EnvSnapshot, GlobalOptions};
pub use effects::{Effects, SharedEffects, SystemEffects};
pub use lock::CatalogBusy;
pub use outcome::{
    format_status_message, to_json_response, user_error_outcome, CommandGroup, CommandInfo,
    CommandStatus, ExecutionOutcome,
};
pub use package::{HandlerId, Package, PackageKind, TypeRegistry};
pub use settings::{SettingsError, SettingsStore};
