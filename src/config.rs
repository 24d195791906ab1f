//! Server configuration stored as server.json in the base directory

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    // Where save-desktop writes; None means the user's desktop
    pub desktop_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            desktop_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join(SERVER_CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(config) => {
                    debug!(path = %path.display(), "Server config loaded");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse server config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!("No server config found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, base_dir: &Path) {
        let path = base_dir.join(SERVER_CONFIG_FILE);
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(error = %e, "Failed to save server config");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize server config"),
        }
    }

    pub fn desktop_dir_or_default(&self) -> PathBuf {
        self.desktop_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(dirs::desktop_dir)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("Desktop")
            })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolved directory layout of a workshop base directory
#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub data: PathBuf,
    pub creative_images: PathBuf,
    pub desktop: PathBuf,
}

impl Paths {
    pub fn new(base: &Path, desktop: PathBuf) -> Self {
        Self {
            base: base.to_path_buf(),
            input: base.join(INPUT_DIR),
            output: base.join(OUTPUT_DIR),
            data: base.join(DATA_DIR),
            creative_images: base.join(CREATIVE_IMAGES_DIR),
            desktop,
        }
    }

    pub fn from_config(base: &Path, config: &ServerConfig) -> Self {
        Self::new(base, config.desktop_dir_or_default())
    }

    pub fn creative_ideas_file(&self) -> PathBuf {
        self.data.join(CREATIVE_IDEAS_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.data.join(HISTORY_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data.join(SETTINGS_FILE)
    }

    pub fn desktop_items_file(&self) -> PathBuf {
        self.data.join(DESKTOP_ITEMS_FILE)
    }

    pub fn logs(&self) -> PathBuf {
        self.base.join(LOGS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ServerConfig::load(dir.path()), ServerConfig::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_CONFIG_FILE), r#"{"port": 9000}"#).unwrap();
        let config = ServerConfig::load(dir.path());
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.addr(), "127.0.0.1:9000");
    }

    #[test]
    fn invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_CONFIG_FILE), "not json").unwrap();
        assert_eq!(ServerConfig::load(dir.path()), ServerConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            desktop_dir: Some("/tmp/desk".into()),
            ..Default::default()
        };
        config.save(dir.path());
        let loaded = ServerConfig::load(dir.path());
        assert_eq!(loaded.desktop_dir_or_default(), PathBuf::from("/tmp/desk"));
    }
}
