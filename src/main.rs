mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand};
use cq_domain::config::{Config, ConfigSeverity};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        // Default to chat when no subcommand is given.
        None | Some(Command::Chat) => {
            init_tracing();
            let config = Arc::new(load_validated(&cli)?);
            let observer = cq_observer::from_config(&config.observability);
            console::chat(config, observer).await
        }
        Some(Command::Run { text }) => {
            init_tracing();
            let config = Arc::new(load_validated(&cli)?);
            let observer = cq_observer::from_config(&config.observability);
            console::run_once(config, observer, text).await
        }
        Some(Command::Config {
            command: ConfigCommand::Show,
        }) => {
            let config = cli::load_config(&cli)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Config {
            command: ConfigCommand::Validate,
        }) => {
            let config = cli::load_config(&cli)?;
            let issues = config.validate();
            for issue in &issues {
                match issue.severity {
                    ConfigSeverity::Warning => println!("warning: {issue}"),
                    ConfigSeverity::Error => println!("error: {issue}"),
                }
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            println!("config ok");
            Ok(())
        }
        Some(Command::Version) => {
            println!("colloquy {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the config and abort on validation errors.  Config problems are
/// startup-only: nothing re-validates inside the core.
fn load_validated(cli: &Cli) -> anyhow::Result<Config> {
    let config = cli::load_config(cli)?;
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(config)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cq_runtime=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}
