//! Application constants and configuration

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;

/// Path prefix every API endpoint lives under
pub const API_BASE: &str = "/api";

/// Class applied to icons when the caller gives none
pub const DEFAULT_ICON_CLASS: &str = "w-6 h-6";

/// Extensions listed by the file browser endpoints
pub const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".webp", ".gif"];

/// Maximum number of history records kept on disk
pub const HISTORY_LIMIT: usize = 500;

pub const CACHE_MAX_AGE: &str = "max-age=31536000";

// Directory layout under the base dir
pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";
pub const DATA_DIR: &str = "data";
pub const CREATIVE_IMAGES_DIR: &str = "creative_images";
pub const LOGS_DIR: &str = "logs";

// Data files under DATA_DIR
pub const CREATIVE_IDEAS_FILE: &str = "creative_ideas.json";
pub const HISTORY_FILE: &str = "history.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const DESKTOP_ITEMS_FILE: &str = "desktop_items.json";

/// Server configuration file under the base dir
pub const SERVER_CONFIG_FILE: &str = "server.json";
