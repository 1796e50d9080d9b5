//! `sasesync inventory` -- list destination items of one kind.

use std::str::FromStr;

use serde::Serialize;
use tabled::Tabled;

use sasesync_core::{ConfigKind, DestinationInventory, Location};

use crate::cli::{GlobalOpts, InventoryArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct InventoryRow {
    #[tabled(rename = "NAME")]
    name: String,
}

pub async fn handle(args: InventoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let kind = ConfigKind::from_str(&args.kind).map_err(|_| CliError::Validation {
        field: "kind".into(),
        reason: format!("unknown configuration kind '{}'", args.kind),
    })?;
    let location = Location::from(args.location.as_str());

    let dest = util::connect_destination(global)?;
    let mut names = dest.remote.list_names(kind, &location).await?;
    names.sort_unstable();

    let views: Vec<InventoryRow> = names.into_iter().map(|name| InventoryRow { name }).collect();
    let rendered = output::render_list(&global.output, &views, |v| InventoryRow {
        name: v.name.clone(),
    }, |v| v.name.clone());
    output::print_output(&rendered, global.quiet);
    Ok(())
}
