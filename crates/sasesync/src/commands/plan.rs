//! `sasesync plan` -- compute and display the push plan.

use serde::Serialize;
use tabled::Tabled;

use sasesync_core::plan::{PlanOptions, plan};
use sasesync_core::{ConflictSet, DependencyGraph, PushPlan, Resolution};

use crate::cli::{GlobalOpts, OutputFormat, PlanArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

// ── Views ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StepView {
    op: String,
    kind: String,
    location: String,
    name: String,
    /// Name the item will carry at the destination.
    pushed_as: String,
}

#[derive(Debug, Serialize)]
struct PlanView {
    delete: Vec<StepView>,
    create: Vec<StepView>,
    blocked: Vec<String>,
    warnings: Vec<String>,
}

#[derive(Debug, Tabled)]
struct PlanRow {
    #[tabled(rename = "STEP")]
    step: usize,
    #[tabled(rename = "OP")]
    op: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "LOCATION")]
    location: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PUSHED AS")]
    pushed_as: String,
}

fn step_views(push_plan: &PushPlan, conflicts: &ConflictSet) -> (Vec<StepView>, Vec<StepView>) {
    let create_op = |resolution: &Resolution| -> String {
        match resolution {
            Resolution::Overwrite if push_plan.in_place_updates => "update".into(),
            Resolution::Overwrite => "recreate".into(),
            Resolution::Rename { .. } => "create (renamed)".into(),
            _ => "create".into(),
        }
    };

    let view = |identity: &sasesync_core::Identity, op: String| StepView {
        op,
        kind: identity.kind.to_string(),
        location: identity.location.to_string(),
        name: identity.name.clone(),
        pushed_as: conflicts
            .get(identity)
            .map_or_else(|| identity.name.clone(), |r| r.destination_name().to_owned()),
    };

    let delete = push_plan
        .delete_order
        .iter()
        .map(|id| view(id, "delete".into()))
        .collect();
    let create = push_plan
        .create_order
        .iter()
        .map(|id| {
            let op = conflicts
                .get(id)
                .map_or_else(|| "create".into(), |r| create_op(r.resolution()));
            view(id, op)
        })
        .collect();
    (delete, create)
}

fn render(
    push_plan: &PushPlan,
    conflicts: &ConflictSet,
    graph: &DependencyGraph,
    format: &OutputFormat,
) -> String {
    let (delete, create) = step_views(push_plan, conflicts);

    match format {
        OutputFormat::Table => {
            let rows: Vec<PlanRow> = delete
                .iter()
                .chain(create.iter())
                .enumerate()
                .map(|(i, s)| PlanRow {
                    step: i + 1,
                    op: s.op.clone(),
                    kind: s.kind.clone(),
                    location: s.location.clone(),
                    name: s.name.clone(),
                    pushed_as: s.pushed_as.clone(),
                })
                .collect();
            if rows.is_empty() {
                "nothing to push".into()
            } else {
                output::render_table(&rows)
            }
        }
        OutputFormat::Plain => push_plan
            .create_order
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
        format => {
            let view = PlanView {
                delete,
                create,
                blocked: graph
                    .blocked()
                    .iter()
                    .map(|b| b.identity.to_string())
                    .collect(),
                warnings: graph
                    .externals()
                    .iter()
                    .map(|e| format!("{} references {} (not in snapshot)", e.referrer, e.target))
                    .collect(),
            };
            match format {
                OutputFormat::JsonCompact => output::render_json_compact(&view),
                _ => output::render_json_pretty(&view),
            }
        }
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: PlanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::load_snapshot(&args.selection.snapshot)?;
    let selected = util::selection(&args.selection, &snapshot)?;
    let graph = util::build_graph(&snapshot, &selected)?;

    let conflicts = if args.assume_new {
        util::detect_conflicts(&graph, &util::AssumeNew, &args.policy).await?
    } else {
        let dest = util::connect_destination(global)?;
        util::detect_conflicts(&graph, &dest.remote, &args.policy).await?
    };

    let push_plan = plan(
        &graph,
        &conflicts,
        PlanOptions {
            in_place_updates: args.in_place,
        },
    )?;

    util::print_graph_warnings(&graph, output::should_color(&global.color), global.quiet);
    let rendered = render(&push_plan, &conflicts, &graph, &global.output);
    output::print_output(&rendered, global.quiet);
    Ok(())
}
