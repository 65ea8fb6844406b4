//! Command implementations for the CLI interface.
//!
//! Everything outside the board TUI is plain CRUD glue over the API:
//! resolve the session, make the call, print a table or an error. The
//! `ui` command wires the API client into the sync controller and hands
//! off to the board view.

use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::api::ApiClient;
use crate::config::{Config, RecentBoard, Session};
use crate::sync::SyncController;
use crate::tui::board_run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Store the server URL and access token for subsequent commands.
    Login {
        /// Base URL of the Taskboard server, e.g. https://taskboard.example.com/api.
        #[arg(long)]
        server: String,
        /// Access token issued by the server.
        #[arg(long)]
        token: String,
    },

    /// Forget the stored access token.
    Logout,

    /// List workspaces visible to the session.
    Workspaces,

    /// Create a workspace.
    WorkspaceNew {
        /// Workspace name.
        name: String,
        /// Optional description.
        #[arg(long)]
        desc: Option<String>,
    },

    /// List boards in a workspace.
    Boards {
        /// Workspace ID.
        workspace: String,
    },

    /// Create a board in a workspace.
    BoardNew {
        /// Workspace ID.
        workspace: String,
        /// Board name.
        name: String,
        /// Optional description.
        #[arg(long)]
        desc: Option<String>,
    },

    /// Open the interactive board view.
    Ui {
        /// Workspace ID. Defaults to the most recently opened board.
        #[arg(long)]
        workspace: Option<String>,
        /// Board ID. Defaults to the most recently opened board.
        #[arg(long)]
        board: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Build an API client from the stored session, or bail with the hint.
fn client_for(session: &Session) -> ApiClient {
    match ApiClient::new(&session.server_url, &session.token) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to initialise HTTP client: {e}");
            std::process::exit(1);
        }
    }
}

fn require_session(config: &Config) -> Session {
    match config.session() {
        Ok(session) => session,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    }
}

pub fn cmd_login(config: &mut Config, dir: &Path, server: String, token: String) {
    config.server_url = Some(server.trim_end_matches('/').to_string());
    config.access_token = Some(token);
    match config.save(dir) {
        Ok(()) => println!("Session stored in {}", dir.display()),
        Err(e) => {
            eprintln!("Failed to save config: {e}");
            std::process::exit(1);
        }
    }
}

pub fn cmd_logout(config: &mut Config, dir: &Path) {
    config.access_token = None;
    if let Err(e) = config.save(dir) {
        eprintln!("Failed to save config: {e}");
        std::process::exit(1);
    }
    println!("Logged out.");
}

pub fn cmd_workspaces(config: &Config) {
    let session = require_session(config);
    let client = client_for(&session);
    match client.workspaces() {
        Ok(workspaces) => {
            println!("{:<26} {:<18} {:<8} {:<8} {}", "ID", "Name", "Plan", "Boards", "Slug");
            for ws in workspaces {
                let boards = ws.counts.as_ref().map(|c| c.boards).unwrap_or(0);
                println!(
                    "{:<26} {:<18} {:<8} {:<8} {}",
                    ws.id, ws.name, ws.plan_tier, boards, ws.slug
                );
            }
        }
        Err(e) => {
            eprintln!("Failed to list workspaces: {e}");
            std::process::exit(1);
        }
    }
}

pub fn cmd_workspace_new(config: &Config, name: String, desc: Option<String>) {
    let session = require_session(config);
    let client = client_for(&session);
    match client.create_workspace(&name, desc.as_deref()) {
        Ok(ws) => println!("Created workspace {} ({})", ws.name, ws.id),
        Err(e) => {
            eprintln!("Failed to create workspace: {e}");
            std::process::exit(1);
        }
    }
}

pub fn cmd_boards(config: &Config, workspace: String) {
    let session = require_session(config);
    let client = client_for(&session);
    match client.boards(&workspace) {
        Ok(boards) => {
            println!("{:<26} {:<22} {:<8} {}", "ID", "Name", "Tasks", "Description");
            for board in boards {
                let tasks = board.counts.as_ref().map(|c| c.tasks).unwrap_or(0);
                println!(
                    "{:<26} {:<22} {:<8} {}",
                    board.id,
                    board.name,
                    tasks,
                    board.description.as_deref().unwrap_or("-")
                );
            }
        }
        Err(e) => {
            eprintln!("Failed to list boards: {e}");
            std::process::exit(1);
        }
    }
}

pub fn cmd_board_new(config: &Config, workspace: String, name: String, desc: Option<String>) {
    let session = require_session(config);
    let client = client_for(&session);
    match client.create_board(&workspace, &name, desc.as_deref()) {
        Ok(board) => println!("Created board {} ({})", board.name, board.id),
        Err(e) => {
            eprintln!("Failed to create board: {e}");
            std::process::exit(1);
        }
    }
}

pub fn cmd_ui(
    config: &mut Config,
    dir: &Path,
    workspace: Option<String>,
    board: Option<String>,
) {
    let session = require_session(config);

    // Fall back to the most recently opened board, like `pm ui` falls back
    // to the most recent project.
    let (workspace_id, board_id) = match (workspace, board) {
        (Some(w), Some(b)) => (w, b),
        (None, None) => match &config.recent_board {
            Some(recent) => {
                println!("Opening recent board: {}", recent.board_name);
                (recent.workspace_id.clone(), recent.board_id.clone())
            }
            None => {
                eprintln!("No recent board. Pass --workspace and --board (see `tb boards`).");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("--workspace and --board must be given together.");
            std::process::exit(1);
        }
    };

    init_logging(dir);

    let client = Arc::new(client_for(&session));
    let mut controller = SyncController::spawn(Arc::clone(&client), &workspace_id, &board_id);
    if let Err(e) = controller.load() {
        // An unloadable board never enters the TUI.
        eprintln!("Failed to load board: {e}");
        std::process::exit(1);
    }

    config.recent_board = Some(RecentBoard {
        workspace_id: workspace_id.clone(),
        board_id: board_id.clone(),
        board_name: controller.snapshot().name.clone(),
    });
    if let Err(e) = config.save(dir) {
        eprintln!("Warning: failed to record recent board: {e}");
    }

    if let Err(e) = run_board_tui(controller, client) {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    let mut cmd = crate::cli::Cli::command();
    generate(shell, &mut cmd, "tb", &mut std::io::stdout());
}

/// File logging for the TUI session; stdout is owned by the alternate
/// screen, so traces go to `<config dir>/taskboard.log`.
fn init_logging(dir: &Path) {
    use tracing_subscriber::EnvFilter;

    let appender = tracing_appender::rolling::never(dir, "taskboard.log");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("taskboard=info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .finish();
    // A second `ui` invocation in-process would fail to set the global
    // subscriber; logging is best-effort.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
