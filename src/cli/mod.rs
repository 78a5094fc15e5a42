//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run the bot
//! - `config show|path` -- inspect the loaded configuration
//! - `version` -- print build/version info

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{BotConfig, ConfigError, DEFAULT_CONFIG_PATH};

/// VotaBot, a Discord poll bot.
#[derive(Parser, Debug)]
#[command(
    name = "vota",
    version = env!("CARGO_PKG_VERSION"),
    about = "VotaBot: create, tally, and auto-close community polls"
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bot (default when no subcommand is given).
    Start,

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (token redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

impl Cli {
    /// The configuration file path this invocation resolves to.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load the configuration this invocation points at.
    pub fn load_config(&self) -> Result<BotConfig, ConfigError> {
        BotConfig::load(&self.config_path())
    }
}

/// Handle the `config` subcommands.
pub fn handle_config(cli: &Cli, command: &ConfigCommand) -> Result<(), ConfigError> {
    match command {
        ConfigCommand::Show => {
            let config = cli.load_config()?;
            println!("{}", config.redacted_json());
        }
        ConfigCommand::Path => {
            println!("{}", cli.config_path().display());
        }
    }
    Ok(())
}

/// Handle the `version` subcommand.
pub fn handle_version() {
    println!(
        "vota {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("VOTABOT_GIT_HASH"),
        env!("VOTABOT_BUILD_DATE"),
    );
}
