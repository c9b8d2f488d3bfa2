use clap::{Args, Subcommand};
use std::path::PathBuf;

/// CLI arguments shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Configuration inspection commands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration and exit
    Show {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log level implied by the verbosity flags; `RUST_LOG` takes precedence.
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format.
    ///
    /// The access token is never printed.
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        let mut redacted = config.clone();
        if redacted.hubspot.token.is_some() {
            redacted.hubspot.token = Some("<redacted>".to_string());
        }

        if json {
            let json = serde_json::to_string_pretty(&redacted)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("HubSpot Deleter Configuration:");
            println!("==============================");
            println!("Base URL: {}", redacted.hubspot.base_url);
            println!(
                "Token: {}",
                redacted.hubspot.token.as_deref().unwrap_or("<unset>")
            );
            println!(
                "Listing: page size {}, on failure {}",
                redacted.listing.page_size, redacted.listing.failure_policy
            );
            println!(
                "Search: page limit {}, leg cap {}, leg cooldown {:?}, page delay {:?}, on failure {}",
                redacted.search.page_limit,
                redacted.search.leg_cap,
                redacted.search.leg_cooldown,
                redacted.search.page_delay,
                redacted.search.failure_policy
            );
            println!(
                "Deletion: batch size {}, dry run {}",
                redacted.deletion.batch_size, redacted.deletion.dry_run
            );
            println!(
                "External list: id column '{}', category column '{}'",
                redacted.external_list.id_column, redacted.external_list.category_column
            );
            println!("Categories: {}", redacted.categories.builtin.join(", "));
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        tracing::info!("Validating configuration...");
        config.validate().context("Invalid configuration")?;
        tracing::info!("Configuration validation passed");
        Ok(())
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
