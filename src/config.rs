//! Persisted client configuration and session state.
//!
//! Lives in `~/.taskboard/config.json` (override the directory with the
//! `TASKBOARD_DIR` environment variable). Holds the server URL, the access
//! token supplied at login, and the most recently opened board so `tb ui`
//! can go straight back to it. The session is constructed explicitly and
//! handed to whatever needs it; nothing here is process-global.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk client configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_url: Option<String>,
    pub access_token: Option<String>,
    #[serde(default)]
    pub recent_board: Option<RecentBoard>,
}

/// The board most recently opened in the TUI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentBoard {
    pub workspace_id: String,
    pub board_id: String,
    pub board_name: String,
}

/// An authenticated session resolved from config.
#[derive(Debug, Clone)]
pub struct Session {
    pub server_url: String,
    pub token: String,
}

impl Config {
    /// Load the config, starting fresh when the file is missing or
    /// unreadable.
    pub fn load(dir: &Path) -> Config {
        let path = dir.join("config.json");
        if !path.exists() {
            return Config::default();
        }
        let mut buf = String::new();
        match File::open(&path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error parsing config, starting fresh: {e}");
                    Config::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading config, starting fresh: {e}");
                Config::default()
            }
        }
    }

    /// Save the config using an atomic write (temp file + rename).
    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join("config.json");
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self).unwrap();
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Resolve the stored session, or explain what is missing.
    pub fn session(&self) -> Result<Session, String> {
        let server_url = self
            .server_url
            .clone()
            .ok_or("No server configured. Run: tb login --server URL --token TOKEN")?;
        let token = self
            .access_token
            .clone()
            .ok_or("Not logged in. Run: tb login --server URL --token TOKEN")?;
        Ok(Session { server_url, token })
    }
}

/// Resolve the config directory: `TASKBOARD_DIR` when set, `~/.taskboard`
/// otherwise.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TASKBOARD_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".taskboard")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            server_url: Some("https://api.example.test".to_string()),
            access_token: Some("tok".to_string()),
            recent_board: Some(RecentBoard {
                workspace_id: "w1".to_string(),
                board_id: "b1".to_string(),
                board_name: "Launch".to_string(),
            }),
        };
        config.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path());
        assert_eq!(loaded.server_url.as_deref(), Some("https://api.example.test"));
        assert_eq!(loaded.recent_board.unwrap().board_id, "b1");
    }

    #[test]
    fn missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path());
        assert!(config.server_url.is_none());
        assert!(config.session().is_err());
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let config = Config::load(dir.path());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn session_requires_both_fields() {
        let config = Config {
            server_url: Some("https://api.example.test".to_string()),
            ..Config::default()
        };
        assert!(config.session().is_err());
        let config = Config {
            server_url: Some("https://api.example.test".to_string()),
            access_token: Some("tok".to_string()),
            ..Config::default()
        };
        assert!(config.session().is_ok());
    }
}
