//! Shared helpers for command handlers.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::str::FromStr;

use sasesync_core::conflict::detect;
use sasesync_core::{
    ConfigKind, ConflictPolicy, ConflictSet, DependencyGraph, DestinationInventory, GraphBuilder,
    Identity, Location, RemoteDestination, Resolution, RuleSet, Snapshot, SnapshotFile,
};

use crate::cli::{GlobalOpts, PolicyArg, PolicyArgs, SelectionArgs};
use crate::error::CliError;

// ── Snapshot & selection loading ─────────────────────────────────────

/// Read and index a snapshot capture file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    let file: SnapshotFile = serde_json::from_str(&contents)?;
    Ok(file.into_snapshot()?)
}

/// Parse one `kind:location:name` selector.
pub fn parse_selector(input: &str) -> Result<Identity, CliError> {
    Identity::from_str(input).map_err(|_| CliError::InvalidSelector {
        input: input.to_owned(),
    })
}

/// Resolve the selection from flags and the optional selection file.
///
/// An empty selection means "everything in the snapshot".
pub fn selection(args: &SelectionArgs, snapshot: &Snapshot) -> Result<Vec<Identity>, CliError> {
    let mut selectors: Vec<Identity> = args
        .select
        .iter()
        .map(|s| parse_selector(s))
        .collect::<Result<_, _>>()?;

    if let Some(ref path) = args.selection_file {
        let contents = std::fs::read_to_string(path).map_err(|source| CliError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            selectors.push(parse_selector(line)?);
        }
    }

    if selectors.is_empty() {
        selectors = snapshot.identities().cloned().collect();
    }
    Ok(selectors)
}

/// Build the dependency graph for a selection.
pub fn build_graph(snapshot: &Snapshot, selected: &[Identity]) -> Result<DependencyGraph, CliError> {
    let rules = RuleSet::builtin();
    Ok(GraphBuilder::new(snapshot, &rules).build(selected)?)
}

// ── Conflict policy & overrides ──────────────────────────────────────

pub fn default_policy(args: &PolicyArgs) -> ConflictPolicy {
    match args.policy {
        PolicyArg::Skip => ConflictPolicy::Skip,
        PolicyArg::Overwrite => ConflictPolicy::Overwrite,
        PolicyArg::Rename => ConflictPolicy::Rename {
            suffix: args.rename_suffix.clone(),
        },
    }
}

/// Parse one `kind:location:name=new-name` rename override.
pub fn parse_rename_override(input: &str) -> Result<(Identity, String), CliError> {
    let (selector, new_name) = input.split_once('=').ok_or_else(|| CliError::Validation {
        field: "rename".into(),
        reason: format!("expected SELECTOR=NEW_NAME, got '{input}'"),
    })?;
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(CliError::Validation {
            field: "rename".into(),
            reason: format!("empty new name in '{input}'"),
        });
    }
    Ok((parse_selector(selector.trim())?, new_name.to_owned()))
}

/// Detect conflicts and apply `--rename` overrides on top.
pub async fn detect_conflicts<P: DestinationInventory>(
    graph: &DependencyGraph,
    provider: &P,
    args: &PolicyArgs,
) -> Result<ConflictSet, CliError> {
    let policy = default_policy(args);
    let mut conflicts = detect(graph, provider, &policy).await?;

    for raw in &args.renames {
        let (identity, new_name) = parse_rename_override(raw)?;
        let record = conflicts
            .get_mut(&identity)
            .ok_or_else(|| CliError::Resolution {
                reason: format!("rename override targets {identity}, which is not in the selection"),
            })?;
        record.set_resolution(Resolution::Rename { new_name })?;
    }
    Ok(conflicts)
}

/// Inventory stand-in for `--assume-new`: the destination is empty.
pub struct AssumeNew;

impl DestinationInventory for AssumeNew {
    fn list_names(
        &self,
        _kind: ConfigKind,
        _location: &Location,
    ) -> impl Future<Output = Result<Vec<String>, sasesync_core::CoreError>> + Send {
        std::future::ready(Ok(Vec::new()))
    }
}

// ── Destination connection ───────────────────────────────────────────

/// Destination side of the active profile, ready for API calls.
pub struct ActiveDestination {
    pub profile: String,
    pub remote: RemoteDestination,
    pub concurrency: usize,
}

/// Load config, pick the active profile, and connect its destination.
pub fn connect_destination(global: &GlobalOpts) -> Result<ActiveDestination, CliError> {
    let cfg = match global.config {
        Some(ref path) => sasesync_config::load_config_from(path)?,
        None => sasesync_config::load_config_or_default(),
    };

    let name = global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into());

    let profile = cfg.profile(&name).map_err(|_| {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        CliError::ProfileNotFound {
            name: name.clone(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        }
    })?;

    let mut tenant = sasesync_config::tenant_to_config(&profile.destination, &name, &cfg.defaults)?;
    if global.insecure {
        tenant.tls = sasesync_core::TlsVerification::DangerAcceptInvalid;
    }
    if let Some(seconds) = global.timeout {
        tenant.timeout = std::time::Duration::from_secs(seconds);
    }

    let remote = tenant.destination()?;
    Ok(ActiveDestination {
        profile: name,
        remote,
        concurrency: cfg.defaults.concurrency,
    })
}

// ── Warnings ─────────────────────────────────────────────────────────

/// Print unresolvable-reference and blocked-item warnings to stderr.
pub fn print_graph_warnings(graph: &DependencyGraph, color: bool, quiet: bool) {
    use owo_colors::OwoColorize;

    if quiet {
        return;
    }
    let tag = |msg: String| {
        if color {
            eprintln!("{} {msg}", "warning:".yellow().bold());
        } else {
            eprintln!("warning: {msg}");
        }
    };

    for external in graph.externals() {
        tag(format!(
            "{} references {} at '{}', which is not in the snapshot; pushing as-is",
            external.referrer, external.target, external.path
        ));
    }
    for blocked in graph.blocked() {
        tag(format!(
            "{} excluded: {} is not transferable ({})",
            blocked.identity, blocked.blocked_by, blocked.reason
        ));
    }
}

// ── Confirmation ─────────────────────────────────────────────────────

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Fails rather than hangs when stdin is not a terminal.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.to_owned(),
        });
    }

    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{message} [y/N] ")?;
    stderr.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
