//! Command dispatch.

pub mod config_cmd;
pub mod devices;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        Command::Devices(args) => devices::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        // Config and Completions are handled before dispatch; reaching
        // here is a wiring bug.
        Command::Config(_) | Command::Completions(_) => unreachable!("handled in main"),
    }
}
