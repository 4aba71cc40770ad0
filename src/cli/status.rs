use super::config::{default_config_path, SecureStoreConfig};
use securestore::storage::SqliteAccountStore;
use std::path::PathBuf;

/// Show database contents and effective session settings
///
/// Reads the config, opens the database if it exists, and prints:
/// - Account and record counts
/// - Inactivity timeout and history purge settings
/// - Browse page size
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        return Err(format!(
            "Config file not found: {} (start the bot once with `securestore run`)",
            config_path.display()
        )
        .into());
    }

    let config = SecureStoreConfig::load(&config_path)?;
    let session = config.session.to_session_config()?;
    let database_path = &config.storage.database_path;

    println!("📊 SecureStore Status");
    println!();
    println!("Config: {}", config_path.display());
    println!("Database: {}", database_path.display());

    if database_path.exists() {
        let store = SqliteAccountStore::open(database_path).await?;
        let (accounts, records) = store.totals().await?;
        println!("  Accounts: {}", accounts);
        println!("  Records: {}", records);
    } else {
        println!("  (not created yet)");
    }

    println!();
    println!("Session:");
    println!(
        "  Inactivity timeout: {}",
        humantime::format_duration(session.inactivity_timeout)
    );
    println!("  Clear history on logout: {}", session.clear_history_on_logout);
    println!("  Clear history on alarm: {}", session.clear_history_on_alarm);
    println!("  Browse page size: {}", session.browse_page_size);

    Ok(())
}
