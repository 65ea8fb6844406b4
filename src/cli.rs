use clap::Parser;

use crate::cmd::Commands;

/// Terminal client for a Taskboard server.
/// Session state lives in ~/.taskboard (override with TASKBOARD_DIR).
#[derive(Parser)]
#[command(name = "tb", version, about = "Kanban board client for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}
