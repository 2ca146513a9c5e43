//! Configuration for the lock engine.
//!
//! A small TOML section the host daemon embeds in its config file. All keys
//! are optional; the defaults enable locking with no external notification.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Master switch; when off the engine ignores all lock traffic.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// External command run once per completed lock; `%s` is replaced with
    /// the hex transaction hash. Empty means no notification.
    #[serde(default)]
    pub notify_command: String,

    /// Confirmations at which the user surface treats a locked transaction
    /// as final.
    #[serde(default = "default_depth")]
    pub depth: u32,
}

fn default_true() -> bool {
    true
}

fn default_depth() -> u32 {
    5
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_command: String::new(),
            depth: default_depth(),
        }
    }
}

impl LockConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LockConfig::default();
        assert!(config.enabled);
        assert!(config.notify_command.is_empty());
        assert_eq!(config.depth, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LockConfig = toml::from_str("notify_command = \"notify-send %s\"").unwrap();
        assert!(config.enabled);
        assert_eq!(config.notify_command, "notify-send %s");
        assert_eq!(config.depth, 5);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swiftlock.toml");

        let config = LockConfig {
            enabled: false,
            notify_command: "logger locked %s".to_string(),
            depth: 9,
        };
        config.save_to_file(&path).unwrap();

        let loaded = LockConfig::load_from_file(&path).unwrap();
        assert!(!loaded.enabled);
        assert_eq!(loaded.notify_command, "logger locked %s");
        assert_eq!(loaded.depth, 9);
    }
}
