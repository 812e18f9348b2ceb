//! CLI Module
//!
//! Command-line interface for the DISPERKIM report bot using Clap v4.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// DISPERKIM Kota Semarang WhatsApp report bot
#[derive(Parser, Debug)]
#[command(name = "disperkim-bot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug mode (creates log files in the data directory)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the socket channel only (QR-paired, local ledger)
    Socket,

    /// Run the Cloud API webhook channel only (Meta callback, Google Sheets)
    Webhook,

    /// Initialize configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    Config,
}

/// Main CLI entry point
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => run_enabled_channels(&config).await,
        Some(Commands::Socket) => run_socket(&config).await,
        Some(Commands::Webhook) => run_webhook(&config).await,
        Some(Commands::Init { force }) => cmd_init(force),
        Some(Commands::Config) => cmd_config(&config),
    }
}

/// Load configuration from file or defaults
fn load_config(config_path: Option<&str>) -> Result<crate::config::Config> {
    use crate::config::Config;

    let config = if let Some(path) = config_path {
        tracing::info!("Loading configuration from custom path: {}", path);
        Config::load_from_path(path)?
    } else {
        tracing::debug!("Loading default configuration");
        Config::load()?
    };

    config.validate()?;
    Ok(config)
}

/// Default mode: run whichever channels the config enables.
async fn run_enabled_channels(config: &crate::config::Config) -> Result<()> {
    let socket = config.channels.socket.enabled;
    let webhook = config.channels.webhook.enabled;

    match (socket, webhook) {
        (true, true) => {
            tokio::try_join!(run_socket(config), run_webhook(config))?;
            Ok(())
        }
        (true, false) => run_socket(config).await,
        (false, true) => run_webhook(config).await,
        (false, false) => anyhow::bail!(
            "No channel enabled. Set channels.socket.enabled or channels.webhook.enabled \
             in the config file, or run the `socket` / `webhook` subcommand."
        ),
    }
}

#[cfg(feature = "socket")]
async fn run_socket(config: &crate::config::Config) -> Result<()> {
    tracing::info!("Starting socket channel");
    crate::channels::socket::run(&config.storage).await
}

#[cfg(not(feature = "socket"))]
async fn run_socket(_config: &crate::config::Config) -> Result<()> {
    anyhow::bail!("This build does not include the socket channel (feature `socket`)")
}

#[cfg(feature = "webhook")]
async fn run_webhook(config: &crate::config::Config) -> Result<()> {
    tracing::info!("Starting webhook channel");
    crate::channels::webhook::run(&config.channels.webhook).await
}

#[cfg(not(feature = "webhook"))]
async fn run_webhook(_config: &crate::config::Config) -> Result<()> {
    anyhow::bail!("This build does not include the webhook channel (feature `webhook`)")
}

/// Initialize configuration file
fn cmd_init(force: bool) -> Result<()> {
    use crate::config::Config;

    let config_path = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("disperkim-bot")
        .join("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    let default_config = Config::default();
    default_config.save(&config_path)?;

    println!("Configuration initialized at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Enable a channel under [channels.socket] or [channels.webhook]");
    println!("   2. For the webhook channel, set WHATSAPP_TOKEN, PHONE_NUMBER_ID,");
    println!("      VERIFY_TOKEN and GOOGLE_SHEET_ID (env or config)");
    println!("   3. Run 'disperkim-bot' to start");

    Ok(())
}

/// Show configuration (secrets omitted)
fn cmd_config(config: &crate::config::Config) -> Result<()> {
    println!("DISPERKIM bot configuration\n");
    println!("Log level:   {}", config.logging.level);
    println!("Ledger:      {}", config.storage.ledger_path.display());
    println!("Uploads:     {}", config.storage.uploads_dir.display());
    println!("Session dir: {}", config.storage.session_dir.display());
    println!("\nChannels:");
    println!("  socket:  enabled={}", config.channels.socket.enabled);
    println!(
        "  webhook: enabled={} bind={}:{}",
        config.channels.webhook.enabled,
        config.channels.webhook.bind,
        config.channels.webhook.port
    );
    Ok(())
}
