//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod config_cmd;
pub mod conflicts;
pub mod inventory;
pub mod plan;
pub mod push;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Plan(args) => plan::handle(args, global).await,
        Command::Push(args) => push::handle(args, global).await,
        Command::Conflicts(args) => conflicts::handle(args, global).await,
        Command::Inventory(args) => inventory::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
