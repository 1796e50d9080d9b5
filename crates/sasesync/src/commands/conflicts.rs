//! `sasesync conflicts` -- show destination collisions for a selection.

use serde::Serialize;
use tabled::Tabled;

use sasesync_core::{ConflictRecord, Resolution};

use crate::cli::{ConflictsArgs, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct RecordView {
    kind: String,
    location: String,
    name: String,
    exists: bool,
    resolution: Resolution,
    pushed_as: String,
}

#[derive(Debug, Tabled)]
struct RecordRow {
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "LOCATION")]
    location: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "EXISTS")]
    exists: String,
    #[tabled(rename = "RESOLUTION")]
    resolution: String,
    #[tabled(rename = "PUSHED AS")]
    pushed_as: String,
}

fn row(view: &RecordView) -> RecordRow {
    RecordRow {
        kind: view.kind.clone(),
        location: view.location.clone(),
        name: view.name.clone(),
        exists: if view.exists { "yes" } else { "no" }.into(),
        resolution: resolution_label(&view.resolution).into(),
        pushed_as: view.pushed_as.clone(),
    }
}

fn resolution_label(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Create => "create",
        Resolution::Skip => "skip",
        Resolution::Overwrite => "overwrite",
        Resolution::Rename { .. } => "rename",
    }
}

fn view(record: &ConflictRecord) -> RecordView {
    let identity = record.identity();
    RecordView {
        kind: identity.kind.to_string(),
        location: identity.location.to_string(),
        name: identity.name.clone(),
        exists: record.exists_at_destination(),
        resolution: record.resolution().clone(),
        pushed_as: record.destination_name().to_owned(),
    }
}

pub async fn handle(args: ConflictsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::load_snapshot(&args.selection.snapshot)?;
    let selected = util::selection(&args.selection, &snapshot)?;
    let graph = util::build_graph(&snapshot, &selected)?;

    let dest = util::connect_destination(global)?;
    let conflicts = util::detect_conflicts(&graph, &dest.remote, &args.policy).await?;

    // Only items that collide; the full classification is in the plan.
    let views: Vec<RecordView> = conflicts
        .iter()
        .filter(|r| r.exists_at_destination())
        .map(view)
        .collect();

    if views.is_empty() {
        output::print_output("no conflicts", global.quiet);
        return Ok(());
    }

    let rendered = output::render_list(&global.output, &views, row, |v| {
        format!("{}:{}:{}", v.kind, v.location, v.name)
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}
