//! # TB - Taskboard terminal client
//!
//! A terminal client for a Taskboard server: CLI commands for workspaces
//! and boards, plus an interactive Kanban board view (TUI) with mouse
//! drag-and-drop.
//!
//! ## Quick Start
//!
//! ```bash
//! # Store the server and token once
//! tb login --server https://taskboard.example.com/api --token <token>
//!
//! # Find a board
//! tb workspaces
//! tb boards <workspace-id>
//!
//! # Open the interactive board view
//! tb ui --workspace <workspace-id> --board <board-id>
//!
//! # Reopen the last board
//! tb ui
//! ```
//!
//! ## Board view
//!
//! Cards and columns are dragged with the mouse; a short press is a click
//! and opens the task detail popup. Every drop is applied to the local
//! board immediately and synced to the server in the background; if the
//! server disagrees, the board reloads to its authoritative state.
//!
//! Session state lives in `~/.taskboard/` (override with `TASKBOARD_DIR`).
//! TUI traces go to `~/.taskboard/taskboard.log`, filtered by `RUST_LOG`.

use clap::Parser;

pub mod api;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod drag;
pub mod fields;
pub mod model;
pub mod snapshot;
pub mod sync;
pub mod tui {
    pub mod board;
    pub mod board_run;
    pub mod colors;
    pub mod input;
}

use cli::Cli;
use cmd::*;
use config::Config;

fn main() {
    let cli = Cli::parse();

    let dir = config::config_dir();
    let mut config = Config::load(&dir);

    match cli.command {
        Commands::Login { server, token } => cmd_login(&mut config, &dir, server, token),
        Commands::Logout => cmd_logout(&mut config, &dir),
        Commands::Workspaces => cmd_workspaces(&config),
        Commands::WorkspaceNew { name, desc } => cmd_workspace_new(&config, name, desc),
        Commands::Boards { workspace } => cmd_boards(&config, workspace),
        Commands::BoardNew {
            workspace,
            name,
            desc,
        } => cmd_board_new(&config, workspace, name, desc),
        Commands::Ui { workspace, board } => cmd_ui(&mut config, &dir, workspace, board),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}
