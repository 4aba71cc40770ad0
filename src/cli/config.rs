//! SecureStore configuration file handling
//!
//! Configuration files are TOML and live next to the database under the
//! platform data directory. The bot token is deliberately not part of the
//! config (see `token.rs`).

use securestore::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_INACTIVITY_TIMEOUT: &str = "30s";

const DEFAULT_PAGE_SIZE: usize = 7;

/// SecureStore bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureStoreConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database
    pub database_path: PathBuf,
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Inactivity window as a humantime duration ("30s", "5m")
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout: String,

    #[serde(default = "default_true")]
    pub clear_history_on_logout: bool,

    #[serde(default)]
    pub clear_history_on_alarm: bool,

    #[serde(default = "default_page_size")]
    pub browse_page_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_inactivity_timeout() -> String {
    DEFAULT_INACTIVITY_TIMEOUT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: default_inactivity_timeout(),
            clear_history_on_logout: true,
            clear_history_on_alarm: false,
            browse_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl SessionSettings {
    /// Validated settings for the session core
    pub fn to_session_config(&self) -> Result<SessionConfig, Box<dyn std::error::Error>> {
        let inactivity_timeout = humantime::parse_duration(&self.inactivity_timeout).map_err(|e| {
            format!(
                "Invalid session.inactivity_timeout '{}': {}",
                self.inactivity_timeout, e
            )
        })?;
        if inactivity_timeout.is_zero() {
            return Err("session.inactivity_timeout must be greater than zero".into());
        }
        if self.browse_page_size == 0 {
            return Err("session.browse_page_size must be at least 1".into());
        }

        Ok(SessionConfig {
            inactivity_timeout,
            clear_history_on_logout: self.clear_history_on_logout,
            clear_history_on_alarm: self.clear_history_on_alarm,
            browse_page_size: self.browse_page_size,
        })
    }
}

impl SecureStoreConfig {
    /// Create a new configuration with the given database path
    #[allow(dead_code)]
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            storage: StorageConfig { database_path },
            session: SessionSettings::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: SecureStoreConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config
            .session
            .to_session_config()
            .map_err(|e| format!("Invalid config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(database_path: &Path) -> String {
        format!(
            r#"# SecureStore Bot Configuration
#
# The Telegram bot token is NOT stored here. Provide it with --token-file,
# the SECURESTORE_BOT_TOKEN environment variable, a token.txt file next to
# this config, or the interactive prompt.

[storage]
# SQLite database holding accounts and encrypted records
database_path = "{database_path}"

[session]
# Authorized chats are logged out after this much inactivity
inactivity_timeout = "30s"

# Delete the bot's messages when the user logs out
clear_history_on_logout = true

# Delete the bot's messages when the inactivity timer fires
clear_history_on_alarm = false

# Records shown per page when browsing
browse_page_size = 7

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/securestore/securestore.log"
"#,
            database_path = database_path.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        database_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(database_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Directory holding the config, database and token file
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("securestore")
}

/// Default config path: `~/.local/share/securestore/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Default database path: `~/.local/share/securestore/securestore.db`
pub fn default_database_path() -> PathBuf {
    default_data_dir().join("securestore.db")
}

/// Token file kept next to the config
pub fn default_token_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("token.txt")
}
