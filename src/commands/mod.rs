pub mod delete;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::Configuration;
use common::cli::{CommonArgs, ConfigCommands, utils};
use deleter::{Engine, RecordStore, SeedKind, Seeder, SleepPacer};
use hubspot_sdk::HubSpotClient;
use tokio_util::sync::CancellationToken;

/// HubSpot Record Deletion Tool: delete records from a HubSpot portal
/// based on various criteria.
#[derive(Parser, Debug)]
#[command(name = "hubspot-deleter", version, about)]
pub struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// HubSpot private app access token
    #[arg(long, env = "HUBSPOT_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// HubSpot API base URL
    #[arg(long, env = "HUBSPOT_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Enumerate and count records without deleting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Delete(delete::DeleteCommand),
    /// Create synthetic records in a sandbox portal
    Seed {
        /// contacts, companies or deals
        kind: SeedKind,
        /// Number of records to create
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        utils::init_logging(&self.common);
        tracing::debug!(version = %utils::version_info(), "Starting");

        let mut config = utils::load_config(self.common.config.as_ref())?;
        if let Some(token) = self.token {
            config.hubspot.token = Some(token);
        }
        if let Some(base_url) = self.base_url {
            config.hubspot.base_url = base_url;
        }
        if self.dry_run {
            config.deletion.dry_run = true;
        }

        match self.command {
            Commands::Config { action } => match action {
                ConfigCommands::Show { json } => utils::display_config(&config, json || self.json),
                ConfigCommands::Validate => {
                    utils::validate_config(&config)?;
                    println!("Configuration is valid");
                    Ok(())
                }
            },
            Commands::Delete(command) => {
                let cancel = cancel_on_interrupt();
                let store = connect(&config)?;
                let engine = Engine::new(&config, store, Arc::new(SleepPacer), cancel)
                    .context("Failed to set up deletion engine")?;
                command.run(&engine, self.json).await
            }
            Commands::Seed { kind, count } => {
                let cancel = cancel_on_interrupt();
                let store = connect(&config)?;
                let created = Seeder::new(store, cancel).seed(kind, count).await?;
                println!("Successfully created {} {kind}", created.len());
                Ok(())
            }
        }
    }
}

fn connect(config: &Configuration) -> anyhow::Result<Arc<dyn RecordStore>> {
    let token = config.hubspot.token.as_deref().context(
        "HubSpot access token required: pass --token, set HUBSPOT_TOKEN or hubspot.token",
    )?;
    Ok(Arc::new(HubSpotClient::new(&config.hubspot.base_url, token)))
}

/// A token that trips on Ctrl-C. The engine stops before its next request.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current request");
            trigger.cancel();
        }
    });
    cancel
}
