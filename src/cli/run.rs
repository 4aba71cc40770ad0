use super::config::{
    default_config_path, default_database_path, default_token_path, LoggingConfig,
    SecureStoreConfig,
};
use super::token::{determine_token_source, read_token};
use securestore::chat::{Router, TelegramTransport};
use securestore::storage::SqliteAccountStore;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run the bot service
///
/// ## Configuration Loading
///
/// 1. `--config` flag if provided
/// 2. Default config at `~/.local/share/securestore/config.toml`
///
/// If the config file doesn't exist, a default one is generated.
/// `--database` overrides `[storage] database_path`.
///
/// ## Token Loading
///
/// 1. `--token-file` flag if provided
/// 2. `SECURESTORE_BOT_TOKEN` environment variable
/// 3. `token.txt` next to the config
/// 4. Interactive prompt (stdin)
pub async fn execute(
    config_path: Option<String>,
    database: Option<String>,
    token_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Starting SecureStore bot...");
    println!();

    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let mut config = if config_path.exists() {
        SecureStoreConfig::load(&config_path)?
    } else {
        println!("📝 No config file found. Creating default configuration...");
        SecureStoreConfig::create_default(&config_path, &default_database_path())?;
        println!("   Created: {}", config_path.display());
        SecureStoreConfig::load(&config_path)?
    };
    if let Some(database) = database {
        config.storage.database_path = PathBuf::from(database);
    }

    println!("Config: {}", config_path.display());
    println!("Database: {}", config.storage.database_path.display());
    println!();

    init_logging(&config.logging)?;
    let session_config = config.session.to_session_config()?;

    let token = read_token(determine_token_source(
        token_file,
        &default_token_path(&config_path),
    ))?;

    let store = Arc::new(SqliteAccountStore::open(&config.storage.database_path).await?);
    info!(
        database = %config.storage.database_path.display(),
        "Account store opened"
    );

    let transport = TelegramTransport::new(&token);
    let (inbound, dispatcher) = transport.spawn_dispatcher();

    info!(
        inactivity_timeout = ?session_config.inactivity_timeout,
        clear_history_on_logout = session_config.clear_history_on_logout,
        clear_history_on_alarm = session_config.clear_history_on_alarm,
        "Bot running, press Ctrl-C to stop"
    );
    Router::new(store, transport, session_config, inbound)
        .run()
        .await;

    dispatcher.await?;
    println!("👋 SecureStore bot stopped");
    Ok(())
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. A configured file receives
/// plain (non-ANSI) output in append mode.
pub fn init_logging(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| format!("Invalid log level '{}': {}", logging.level, e))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create log directory: {}", e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| format!("Failed to initialise logging: {}", e).into())
}
