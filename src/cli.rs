//! Command-line interface definition and config loading.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cq_domain::config::Config;

#[derive(Parser)]
#[command(name = "colloquy", version, about = "Conversational agent runtime")]
pub struct Cli {
    /// Path to the config file.  Defaults to
    /// `~/.config/colloquy/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Interactive console session (default).
    Chat,
    /// Run a single turn and exit.
    Run {
        /// The user message.
        text: String,
    },
    /// Inspect or validate the configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate the configuration and exit non-zero on errors.
    Validate,
}

/// Resolve the config path: `--config` wins, then the default location.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("colloquy")
            .join("config.toml")
    })
}

/// Load the config file.  A missing file yields the defaults so
/// `config show` and `version` still work; `validate` reports the
/// missing model.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let path = config_path(cli);
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
    Ok(config)
}
