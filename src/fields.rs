//! Closed enumerations shared between the CLI, the wire format, and the TUI.
//!
//! These mirror the values the server accepts; anything outside them is a
//! protocol error rather than a client-side choice.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task priority as persisted by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Next priority in the cycle used by the detail popup.
    pub fn cycled(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Critical,
            Priority::Critical => Priority::Low,
        }
    }
}

/// Format a priority for display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}
