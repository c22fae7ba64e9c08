use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands available for all services
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log filter implied by the verbosity flags, `None` defers to `RUST_LOG`
    pub fn log_level(args: &CommonArgs) -> Option<&'static str> {
        if args.quiet {
            Some("warn")
        } else if args.verbose {
            Some("debug")
        } else {
            None
        }
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let filter = match log_level(args) {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };

        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("PromQL AST Server Configuration:");
            println!("================================");
            println!("Listen address: {}", config.server.listen_addr);
            println!("Upstream URL: {}", config.upstream.url);
            match config.upstream.timeout {
                Some(timeout) => println!("Upstream timeout: {timeout:?}"),
                None => println!("Upstream timeout: none"),
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        config
            .listen_socket_addr()
            .context("Listen address is invalid")?;
        config.upstream_url().context("Upstream URL is invalid")?;

        if let Some(timeout) = config.upstream.timeout
            && timeout.is_zero()
        {
            anyhow::bail!("Upstream timeout must be greater than zero when set");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting services
    ///
    /// Returns `true` when the command was handled and the process should exit.
    pub async fn handle_common_command(
        command: &CommonCommands,
        config: &Configuration,
        version: &str,
    ) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{version}");
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }
}
