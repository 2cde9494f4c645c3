//! # rentx
//!
//! Terminal driver for the RentX offline-first client.
//!
//! ## Commands
//!
//! - `cars`: List cached cars
//! - `car`: Show one car, refreshed when online
//! - `rentals`: List rentals, refreshed when online
//! - `sync`: Run one sync cycle
//! - `watch`: Keep syncing on connectivity changes until Ctrl-C
//! - `status`: Show checkpoint, record counts and pending changes
//! - `profile`: Edit the local user profile
//! - `reset`: Wipe all local data
//!
//! ## Example
//!
//! ```bash
//! # Browse whatever is cached, without touching the network
//! rentx --offline cars
//!
//! # Pull the catalog and push profile edits
//! rentx sync
//!
//! # Edit a profile offline; it is pushed on the next sync
//! rentx --offline profile 42 name=Ana driver_license=123456
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rentx_client::{Config, ConnectivityMonitor, RentxClient};
use rentx_core::Connectivity;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{cars, profile, rentals, reset, status, sync};

/// Config file looked up in the data directory when `--config` is absent.
const CONFIG_FILE: &str = "rentx.toml";

/// Terminal driver for the RentX offline-first client.
#[derive(Parser, Debug)]
#[command(name = "rentx")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the local store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/rentx.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report the network as unreachable; no remote call is made
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List cached cars
    Cars,

    /// Show one car
    Car {
        /// Car id
        id: String,
    },

    /// List rentals
    Rentals,

    /// Run one sync cycle
    Sync,

    /// Sync on every reconnect until Ctrl-C
    Watch,

    /// Show local sync state
    Status,

    /// Edit the local user profile
    Profile {
        /// User id
        user_id: String,

        /// Fields to set, as field=value (value parsed as JSON when possible)
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Wipe all local data
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let explicit_config = cli.config.is_some();
    let config_path = cli
        .config
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    let config = load_config(&config_path, explicit_config)?;

    init_logging(&config.logging.filter);
    tracing::debug!(data_dir = %data_dir.display(), config = %config_path.display(), "starting");

    // No reachability probe in a terminal; the flag is the platform reading.
    let reading = Connectivity::from_reachability(Some(!cli.offline));
    let monitor = ConnectivityMonitor::with_state(reading);
    let client = RentxClient::open(&config, &data_dir, monitor)
        .await
        .context("Failed to open local store")?;

    match cli.command {
        Commands::Cars => cars::list(&client).await?,
        Commands::Car { id } => cars::show(&client, &id).await?,
        Commands::Rentals => rentals::run(&client).await?,
        Commands::Sync => sync::once(&client).await?,
        Commands::Watch => {
            sync::watch(&client, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?
        }
        Commands::Status => status::run(&client).await?,
        Commands::Profile { user_id, fields } => profile::run(&client, &user_id, &fields).await?,
        Commands::Reset { yes } => {
            if !yes {
                anyhow::bail!("Refusing to wipe local data without --yes");
            }
            reset::run(&client).await?;
        }
    }

    Ok(())
}

/// Load the config file. An explicit `--config` must exist.
fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    let config = if explicit {
        Config::from_file(path)?
    } else {
        Config::load_or_default(path)?
    };
    Ok(config)
}

/// Log to stderr; `RUST_LOG` overrides the configured filter.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for rentx.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "rentx", "rentx")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
