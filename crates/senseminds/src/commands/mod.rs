//! Command dispatch: bridges CLI args -> realtime service -> output formatting.

pub mod config_cmd;
pub mod poll;
pub mod status;
pub mod util;
pub mod watch;

use senseminds_core::RealtimeConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a deployment-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: RealtimeConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Status(args) => status::handle(config, args, global).await,
        Command::Poll => poll::handle(config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
