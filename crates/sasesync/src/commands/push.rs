//! `sasesync push` -- plan, confirm, and execute against the destination.

use std::sync::Arc;

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::Tabled;

use sasesync_core::plan::{PlanOptions, plan};
use sasesync_core::push::{self, ProgressSink, PushOptions, PushPhase, PushResult, PushStatus};
use sasesync_core::rewrite::{RenameMap, rewrite_items};
use sasesync_core::{GraphBuilder, PushReport, RuleSet};

use crate::cli::{GlobalOpts, OutputFormat, PushArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

// ── Live progress ────────────────────────────────────────────────────

/// Prints one line per settled item as the push runs.
struct ConsoleProgress {
    quiet: bool,
    color: bool,
}

impl ProgressSink for ConsoleProgress {
    fn phase_changed(&self, phase: PushPhase) {
        if self.quiet {
            return;
        }
        match phase {
            PushPhase::Deleting => eprintln!("-- delete phase"),
            PushPhase::Creating => eprintln!("-- create phase"),
            _ => {}
        }
    }

    fn item_settled(&self, result: &PushResult) {
        if self.quiet {
            return;
        }
        let label = status_label(result.status);
        if self.color {
            match result.status {
                s if s.is_success() => eprintln!("  {} {}", label.green(), result.identity),
                PushStatus::Skipped => eprintln!("  {} {}", label.dimmed(), result.identity),
                _ => eprintln!("  {} {}", label.red(), result.identity),
            }
        } else {
            eprintln!("  {label} {}", result.identity);
        }
    }
}

fn status_label(status: PushStatus) -> &'static str {
    match status {
        PushStatus::Created => "created",
        PushStatus::Updated => "updated",
        PushStatus::Renamed => "renamed",
        PushStatus::Skipped => "skipped",
        PushStatus::Failed => "failed",
        PushStatus::SkippedDueToDependencyFailure => "blocked",
    }
}

// ── Report rendering ─────────────────────────────────────────────────

#[derive(Debug, Tabled, Serialize)]
struct ResultRow {
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "LOCATION")]
    location: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

impl From<&PushResult> for ResultRow {
    fn from(result: &PushResult) -> Self {
        Self {
            status: status_label(result.status).to_owned(),
            kind: result.identity.kind.to_string(),
            location: result.identity.location.to_string(),
            name: result.identity.name.clone(),
            detail: result.detail.clone().unwrap_or_default(),
        }
    }
}

fn render_report(report: &PushReport, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
            output::render_table(&rows)
        }
        OutputFormat::Json => output::render_json_pretty(report),
        OutputFormat::JsonCompact => output::render_json_compact(report),
        OutputFormat::Plain => report
            .results
            .iter()
            .map(|r| format!("{}\t{}", status_label(r.status), r.identity))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: PushArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::load_snapshot(&args.selection.snapshot)?;
    let selected = util::selection(&args.selection, &snapshot)?;

    let rules = RuleSet::builtin();
    let graph = GraphBuilder::new(&snapshot, &rules).build(&selected)?;

    let dest = util::connect_destination(global)?;
    let conflicts = util::detect_conflicts(&graph, &dest.remote, &args.policy).await?;

    let push_plan = plan(
        &graph,
        &conflicts,
        PlanOptions {
            in_place_updates: args.in_place,
        },
    )?;

    let color = output::should_color(&global.color);
    util::print_graph_warnings(&graph, color, global.quiet);

    if push_plan.is_empty() {
        output::print_output("nothing to push", global.quiet);
        return Ok(());
    }

    if !push_plan.delete_order.is_empty() {
        let action = format!(
            "delete and recreate {} destination item(s)",
            push_plan.delete_order.len()
        );
        if !util::confirm(&format!("About to {action}. Continue?"), global.yes)? {
            output::print_output("aborted", global.quiet);
            return Ok(());
        }
    }

    let renames = RenameMap::from_conflicts(&conflicts, &graph)?;
    let items = rewrite_items(&graph, &renames, &rules);

    let progress = Arc::new(ConsoleProgress {
        quiet: global.quiet,
        color,
    });
    let options = PushOptions {
        concurrency: args.concurrency.unwrap_or(dest.concurrency),
    };

    let handle = push::start(
        &graph,
        &push_plan,
        &conflicts,
        items,
        Arc::new(dest.remote),
        progress,
        options,
    )?;
    let report = handle.wait().await?;

    let rendered = render_report(&report, &global.output);
    output::print_output(&rendered, global.quiet);

    if !global.quiet {
        eprintln!(
            "pushed {}, failed {}, skipped {} (attempt {})",
            report.succeeded(),
            report.failed(),
            report.skipped(),
            report.attempt_id
        );
    }

    if report.cancelled {
        return Err(CliError::Cancelled);
    }
    if !report.is_clean() {
        return Err(CliError::PushIncomplete {
            failed: report.failed(),
            skipped: report.skipped(),
        });
    }
    Ok(())
}
