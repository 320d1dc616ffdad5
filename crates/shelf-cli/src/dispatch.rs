use color_eyre::Result;
use shelf_core::commands::{
    self, ConfigGetRequest, ConfigListRequest, ConfigSetRequest, ListRequest, ListScope,
    PackagesRequest, RemoteAddRequest, RemoteRemoveRequest,
};
use shelf_core::{CommandContext, CommandGroup, CommandInfo, ExecutionOutcome};

use crate::cli::{
    CacheCommand, CommandGroupCli, ConfigCommand, FetchingArgs, ListCommand, PackageArgs,
    RemotesCommand,
};

pub fn dispatch_command(
    ctx: &CommandContext,
    group: &CommandGroupCli,
) -> Result<(CommandInfo, ExecutionOutcome)> {
    match group {
        CommandGroupCli::Remotes(cmd) => match cmd {
            RemotesCommand::Add(args) => {
                let info = CommandInfo::new(CommandGroup::Remotes, "add");
                let request = RemoteAddRequest {
                    id: args.id.clone(),
                    name: args.name.clone(),
                    url: args.url.clone(),
                };
                core_call(info, || commands::remotes_add(ctx, &request))
            }
            RemotesCommand::Remove(args) => {
                let info = CommandInfo::new(CommandGroup::Remotes, "remove");
                let request = RemoteRemoveRequest {
                    id: args.id.clone(),
                };
                core_call(info, || commands::remotes_remove(ctx, &request))
            }
            RemotesCommand::List => {
                let info = CommandInfo::new(CommandGroup::Remotes, "list");
                core_call(info, || commands::remotes_list(ctx))
            }
        },
        CommandGroupCli::Cache(cmd) => match cmd {
            CacheCommand::Update => {
                let info = CommandInfo::new(CommandGroup::Cache, "update");
                core_call(info, || commands::cache_update(ctx))
            }
            CacheCommand::Clear => {
                let info = CommandInfo::new(CommandGroup::Cache, "clear");
                core_call(info, || commands::cache_clear(ctx))
            }
        },
        CommandGroupCli::Install(args) => {
            let info = CommandInfo::new(CommandGroup::Install, "install");
            let request = fetching_request(args);
            core_call(info, || commands::packages_install(ctx, &request))
        }
        CommandGroupCli::Remove(args) => {
            let info = CommandInfo::new(CommandGroup::Remove, "remove");
            let request = packages_request(args);
            core_call(info, || commands::packages_remove(ctx, &request))
        }
        CommandGroupCli::Upgrade(args) => {
            let info = CommandInfo::new(CommandGroup::Upgrade, "upgrade");
            let request = fetching_request(args);
            core_call(info, || commands::packages_upgrade(ctx, &request))
        }
        CommandGroupCli::Reinstall(args) => {
            let info = CommandInfo::new(CommandGroup::Reinstall, "reinstall");
            let request = fetching_request(args);
            core_call(info, || commands::packages_reinstall(ctx, &request))
        }
        CommandGroupCli::List(args) => {
            let info = CommandInfo::new(CommandGroup::List, "list");
            let request = list_request(args.scope.as_ref());
            core_call(info, || commands::list_packages(ctx, &request))
        }
        CommandGroupCli::Config(cmd) => match cmd {
            ConfigCommand::List(args) => {
                let info = CommandInfo::new(CommandGroup::Config, "list");
                let request = ConfigListRequest {
                    namespace: args.namespace.clone(),
                };
                core_call(info, || commands::config_list(ctx, &request))
            }
            ConfigCommand::Get(args) => {
                let info = CommandInfo::new(CommandGroup::Config, "get");
                let request = ConfigGetRequest {
                    namespace: args.namespace.clone(),
                    key: args.key.clone(),
                };
                core_call(info, || commands::config_get(ctx, &request))
            }
            ConfigCommand::Set(args) => {
                let info = CommandInfo::new(CommandGroup::Config, "set");
                let request = ConfigSetRequest {
                    namespace: args.key.namespace.clone(),
                    key: args.key.key.clone(),
                    value: args.value.clone(),
                };
                core_call(info, || commands::config_set(ctx, &request))
            }
            ConfigCommand::Reset(args) => {
                let info = CommandInfo::new(CommandGroup::Config, "reset");
                let request = ConfigGetRequest {
                    namespace: args.namespace.clone(),
                    key: args.key.clone(),
                };
                core_call(info, || commands::config_reset(ctx, &request))
            }
        },
    }
}

fn packages_request(args: &PackageArgs) -> PackagesRequest {
    PackagesRequest {
        patterns: args.packages.clone(),
        package_caches: Vec::new(),
    }
}

fn fetching_request(args: &FetchingArgs) -> PackagesRequest {
    PackagesRequest {
        package_caches: args.package_caches.clone(),
        ..packages_request(&args.packages)
    }
}

fn list_request(scope: Option<&ListCommand>) -> ListRequest {
    let (scope, patterns) = match scope {
        None => (ListScope::Available, Vec::new()),
        Some(ListCommand::Available(args)) => (ListScope::Available, args.patterns.clone()),
        Some(ListCommand::Installed(args)) => (ListScope::Installed, args.patterns.clone()),
        Some(ListCommand::Upgradable(args)) => (ListScope::Upgradable, args.patterns.clone()),
        Some(ListCommand::Nothandled(args)) => (ListScope::NotHandled, args.patterns.clone()),
    };
    ListRequest { scope, patterns }
}

/// Runs a core command, turning errors into outcomes: input problems become
/// user errors and everything else an internal failure.
pub fn core_call<F>(info: CommandInfo, action: F) -> Result<(CommandInfo, ExecutionOutcome)>
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => Ok((info, outcome)),
        Err(err) => {
            if let Some(outcome) = shelf_core::user_error_outcome(&err) {
                return Ok((info, outcome));
            }
            let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
            Ok((
                info,
                ExecutionOutcome::failure(
                    err.to_string(),
                    serde_json::json!({
                        "reason": "internal_error",
                        "error": err.to_string(),
                        "issues": issues,
                        "hint": "Re-run with `-vv` for more detail, or open an issue if this persists.",
                    }),
                ),
            ))
        }
    }
}
