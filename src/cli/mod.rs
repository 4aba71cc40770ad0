use clap::{Parser, Subcommand};

pub mod config;
pub mod run;
pub mod status;
pub mod token;
pub mod version;

#[derive(Parser)]
#[command(name = "securestore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telegram bot keeping password-protected secret records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.local/share/securestore/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to the SQLite database (overrides the config)
        #[arg(long)]
        database: Option<String>,

        /// Path to file containing the Telegram bot token
        /// Default: token.txt next to the config
        #[arg(long)]
        token_file: Option<String>,
    },

    /// Show account/record counts and session settings
    Status {
        /// Path to config file (default: ~/.local/share/securestore/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            config,
            database,
            token_file,
        } => run::execute(config, database, token_file).await,
        Commands::Status { config } => status::execute(config).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
