use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

pub const SHELF_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const SHELF_BEFORE_HELP: &str = concat!(
    "shelf ",
    env!("CARGO_PKG_VERSION"),
    " – Offline content catalog\n\n",
    "\x1b[1;36mCatalog\x1b[0m\n",
    "  remotes          Add, remove or list the catalogs packages come from.\n",
    "  cache            Refresh or clear the merged catalog of available packages.\n",
    "  list             Show available, installed, upgradable or unhandled packages.\n\n",
    "\x1b[1;36mPackages\x1b[0m\n",
    "  install          Download, verify and install packages by id or glob.\n",
    "  remove           Remove installed packages.\n",
    "  upgrade          Replace installed packages with the available version.\n",
    "  reinstall        Fetch and install packages again to repair local changes.\n\n",
    "\x1b[1;36mSettings\x1b[0m\n",
    "  config           Read and change stored settings.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = SHELF_BEFORE_HELP,
    help_template = SHELF_HELP_TEMPLATE
)]
pub struct ShelfCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(
        about = "Manage the remotes catalogs are fetched from.",
        override_usage = "shelf remotes <add|remove|list>",
        subcommand
    )]
    Remotes(RemotesCommand),
    #[command(
        about = "Refresh or clear the catalog cache.",
        override_usage = "shelf cache <update|clear>",
        subcommand
    )]
    Cache(CacheCommand),
    #[command(
        about = "Install packages from the catalog.",
        override_usage = "shelf install <PACKAGE> [PACKAGE ...] [--package-cache DIR]"
    )]
    Install(FetchingArgs),
    #[command(
        about = "Remove installed packages.",
        override_usage = "shelf remove <PACKAGE> [PACKAGE ...]"
    )]
    Remove(PackageArgs),
    #[command(
        about = "Upgrade installed packages to the available version.",
        override_usage = "shelf upgrade <PACKAGE> [PACKAGE ...] [--package-cache DIR]"
    )]
    Upgrade(FetchingArgs),
    #[command(
        about = "Fetch and install packages again, repairing local changes.",
        override_usage = "shelf reinstall <PACKAGE> [PACKAGE ...] [--package-cache DIR]"
    )]
    Reinstall(FetchingArgs),
    #[command(
        about = "List packages (available by default).",
        override_usage = "shelf list [available|installed|upgradable|nothandled] [PATTERN ...]"
    )]
    List(ListArgs),
    #[command(
        about = "Read and change settings.",
        override_usage = "shelf config <list|get|set|reset>",
        subcommand
    )]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum RemotesCommand {
    #[command(about = "Register a remote and refresh the cache.")]
    Add(RemoteAddArgs),
    #[command(about = "Unregister a remote and refresh the cache.")]
    Remove(RemoteRemoveArgs),
    #[command(about = "List registered remotes.")]
    List,
}

#[derive(Args, Debug)]
pub struct RemoteAddArgs {
    #[arg(value_name = "ID", help = "Short identifier, also the record file name")]
    pub id: String,
    #[arg(value_name = "NAME", help = "Human readable name")]
    pub name: String,
    #[arg(value_name = "URL", help = "Catalog document url (http, https or file)")]
    pub url: String,
}

#[derive(Args, Debug)]
pub struct RemoteRemoveArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    #[command(about = "Fetch every remote and rebuild the available packages.")]
    Update,
    #[command(about = "Forget available and installed packages (files stay on disk).")]
    Clear,
}

#[derive(Args, Debug)]
pub struct PackageArgs {
    #[arg(
        value_name = "PACKAGE",
        required = true,
        help = "Package ids or globs such as 'wikipedia.*'"
    )]
    pub packages: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FetchingArgs {
    #[command(flatten)]
    pub packages: PackageArgs,
    #[arg(
        long = "package-cache",
        value_name = "DIR",
        action = ArgAction::Append,
        help = "Extra directory holding <id>-<version> artifacts (repeatable)"
    )]
    pub package_caches: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(subcommand)]
    pub scope: Option<ListCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    #[command(about = "Packages published by the remotes.")]
    Available(PatternArgs),
    #[command(about = "Packages installed on this machine.")]
    Installed(PatternArgs),
    #[command(about = "Installed packages with another available version.")]
    Upgradable(PatternArgs),
    #[command(about = "Available packages of a type shelf cannot install.")]
    Nothandled(PatternArgs),
}

#[derive(Args, Debug, Default)]
pub struct PatternArgs {
    #[arg(value_name = "PATTERN", help = "Ids or globs; everything when omitted")]
    pub patterns: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    #[command(about = "Show settings, optionally for one namespace.")]
    List(ConfigListArgs),
    #[command(about = "Print one setting as JSON.")]
    Get(ConfigKeyArgs),
    #[command(about = "Store a setting; VALUE is JSON, bare words are strings.")]
    Set(ConfigSetArgs),
    #[command(about = "Restore a setting to its default.")]
    Reset(ConfigKeyArgs),
}

#[derive(Args, Debug)]
pub struct ConfigListArgs {
    #[arg(value_name = "NAMESPACE")]
    pub namespace: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigKeyArgs {
    #[arg(value_name = "NAMESPACE")]
    pub namespace: String,
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    #[command(flatten)]
    pub key: ConfigKeyArgs,
    #[arg(value_name = "VALUE")]
    pub value: String,
}
