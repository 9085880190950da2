//! Polaris Service - Network measurement collector and uploader.
//!
//! Run with: `cargo run -p polaris-service`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn};

use polaris_service::{
    AppState, Config, HttpUplink, Monitor, Permissions, SyncLoop, event_channel, source,
};
use polaris_store::{RecordQuery, Store};

/// Polaris Service - Network measurement collector and uploader.
#[derive(Parser, Debug)]
#[command(name = "polaris-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Collection endpoint base URL (overrides config).
    #[arg(short, long, global = true)]
    endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run {
        /// Replay newline-delimited JSON host events from a file ("-" for stdin).
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Print records waiting for upload as JSON.
    Pending {
        /// Maximum number of records to print.
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Run a single upload cycle and exit.
    Sync,

    /// Load and validate the configuration.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("polaris_service=info".parse()?)
                .add_directive("polaris_store=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Run { events }) => run_service(config, events).await,
        None => run_service(config, None).await,
        Some(Command::Pending { limit }) => print_pending(&config, limit),
        Some(Command::Sync) => sync_once(config).await,
        Some(Command::CheckConfig) => check_config(&config),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.uplink.endpoint = endpoint.clone();
    }

    Ok(config)
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    println!("Configuration is valid");
    println!("  endpoint: {}", config.uplink.submit_url());
    println!("  database: {}", config.storage.path.display());
    println!("  sync interval: {}s", config.sync.interval_secs);
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::open(&config.storage.path)
        .with_context(|| format!("opening database {}", config.storage.path.display()))
}

fn print_pending(config: &Config, limit: Option<u32>) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let mut query = RecordQuery::new();
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    let records = store.query(&query)?;

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn sync_once(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let uplink = Arc::new(HttpUplink::new(&config.uplink)?);
    let state = AppState::new(open_store(&config)?, config);

    let outcome = SyncLoop::new(Arc::clone(&state), uplink).run_cycle().await;
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

async fn run_service(config: Config, events: Option<PathBuf>) -> anyhow::Result<()> {
    config.validate()?;

    let uplink = Arc::new(HttpUplink::new(&config.uplink)?);
    info!("Uploading to {}", uplink.url());

    let (sender, receiver) = event_channel(config.collector.event_buffer);
    let state = AppState::new(open_store(&config)?, config);

    // Without a host platform bridge the permissions are implied.
    let monitor = Monitor::start(Arc::clone(&state), uplink, receiver, Permissions::granted())?;

    let replay = events.map(|path| {
        let sender = sender.clone();
        tokio::spawn(async move {
            let result = if path.as_os_str() == "-" {
                source::replay(BufReader::new(tokio::io::stdin()), &sender).await
            } else {
                match tokio::fs::File::open(&path).await {
                    Ok(file) => source::replay(BufReader::new(file), &sender).await,
                    Err(e) => Err(e),
                }
            };
            if let Err(e) = result {
                warn!("Event replay failed: {}", e);
            }
        })
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl-C, shutting down");
        }
        _ = monitor.stopped() => {
            warn!("Service stopped on its own");
        }
    }

    if let Some(handle) = replay {
        handle.abort();
    }
    drop(sender);

    let status = monitor.shutdown().await;
    info!(
        "Final status: {} stored, {} uploaded, {} pending",
        status.records_stored,
        status.records_uploaded,
        status
            .pending
            .map_or_else(|| "unknown".to_string(), |p| p.to_string())
    );
    if let Some(error) = status.last_error {
        info!("Last error: {}", error);
    }

    Ok(())
}
