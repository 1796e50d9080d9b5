//! Clap derive structures for the `sasesync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sasesync -- push security-policy configuration between tenants
#[derive(Debug, Parser)]
#[command(
    name = "sasesync",
    version,
    about = "Sync security-policy configuration between two tenants",
    long_about = "Resolves the dependency closure of a selection from a captured\n\
        source-tenant snapshot, detects name conflicts at the destination,\n\
        and pushes items in dependency order.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Source/destination tenant pair to use
    #[arg(long, short = 'p', env = "SASESYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file path (default: platform config dir)
    #[arg(long, env = "SASESYNC_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SASESYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates at the destination
    #[arg(long, short = 'k', env = "SASESYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SASESYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the push plan without touching the destination
    Plan(PlanArgs),

    /// Push the selection to the destination tenant
    Push(PushArgs),

    /// Show which selected items already exist at the destination
    #[command(alias = "cf")]
    Conflicts(ConflictsArgs),

    /// List destination items of one kind
    #[command(alias = "inv")]
    Inventory(InventoryArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Selection Arguments ───────────────────────────────────────

/// Snapshot and selection flags shared by plan, push, and conflicts.
#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Snapshot capture file (JSON)
    #[arg(long, short = 'f', value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Item selector `kind:location:name` (repeatable)
    #[arg(long, short = 's', value_name = "SELECTOR")]
    pub select: Vec<String>,

    /// File with one selector per line ('#' starts a comment)
    #[arg(long, value_name = "FILE")]
    pub selection_file: Option<PathBuf>,
}

/// Conflict-handling flags shared by plan, push, and conflicts.
#[derive(Debug, Args)]
pub struct PolicyArgs {
    /// Default handling for items that already exist at the destination
    #[arg(long, default_value = "skip", value_enum)]
    pub policy: PolicyArg,

    /// Suffix appended by the rename policy
    #[arg(long, default_value = "-copy", value_name = "SUFFIX")]
    pub rename_suffix: String,

    /// Per-item rename override `kind:location:name=new-name` (repeatable)
    #[arg(long = "rename", value_name = "SELECTOR=NEW_NAME")]
    pub renames: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Leave existing destination items untouched
    Skip,
    /// Replace existing destination items
    Overwrite,
    /// Push under a suffixed name, rewriting references
    Rename,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PLAN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Treat the destination as empty (offline, no API calls)
    #[arg(long)]
    pub assume_new: bool,

    /// Overwrite by updating in place instead of delete-and-recreate
    #[arg(long)]
    pub in_place: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PUSH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PushArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Overwrite by updating in place instead of delete-and-recreate
    #[arg(long)]
    pub in_place: bool,

    /// Destination calls in flight at once (default: profile setting)
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFLICTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConflictsArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  INVENTORY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct InventoryArgs {
    /// Configuration kind (e.g. address, ike-gateway, security-rule)
    pub kind: String,

    /// Container to list from (default: global)
    #[arg(long, short = 'l', default_value = "global")]
    pub location: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration (keys redacted)
    Show,

    /// Print the config file path
    Path,

    /// Set a tenant setting on the active profile
    Set {
        /// Config key (url, tenant, api_key, api_key_env, ca_cert, insecure, timeout)
        key: String,

        /// Value to set
        value: String,

        /// Which side of the profile to modify
        #[arg(long, default_value = "destination", value_enum)]
        side: ProfileSide,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProfileSide {
    /// Tenant snapshots are captured from
    Source,
    /// Tenant pushes go to
    Destination,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
