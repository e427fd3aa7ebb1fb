//! `DeviceBridge` operator binary
//!
//! Opens the bridge database and runs maintenance: the background GC job,
//! one-shot GC, listings and raw statements.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use devbridge::jobs;
use devbridge::storage::{BridgeDatabase, BridgeStore, RowStream};
use devbridge_core::config::{Config, default_database_path, load_config};
use devbridge_core::tracing_init::init_tracing;
use devbridge_crypto::CallbackCipher;

#[derive(Parser, Debug)]
#[command(name = "devbridge")]
#[command(
    version,
    about = "DeviceBridge - hub affinity cache and webhook subscription store"
)]
struct Args {
    /// Explicit JSON config file, layered over the global settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Hex-encoded master secret for callback URL encryption.
    #[arg(long, global = true, env = "DEVBRIDGE_ENCRYPTION_KEY", hide_env_values = true)]
    encryption_key: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run background hub cache garbage collection until Ctrl-C.
    Run,
    /// Collect stale, orphaned hub cache rows once.
    Gc,
    /// Print subscriptions as JSON lines.
    Subscriptions {
        /// Only this device.
        #[arg(long)]
        device: Option<String>,
    },
    /// Print hub cache entries as JSON lines.
    HubCache,
    /// Execute a maintenance statement.
    Exec {
        /// SQL to run against the bridge database.
        statement: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("devbridge=info", args.log_json)?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = &args.db_path {
        config.database.path = Some(path.clone());
    }

    let encryption_key = args.encryption_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!("--encryption-key or DEVBRIDGE_ENCRYPTION_KEY is required")
    })?;
    let db = open_database(&config, encryption_key).await?;
    let cancel = CancellationToken::new();

    match args.command {
        Command::Run => run(db, &config, cancel).await?,
        Command::Gc => {
            let removed = jobs::collect_garbage(&db, None, &cancel).await?;
            info!(removed, "Hub cache GC finished");
        }
        Command::Subscriptions { device: Some(device) } => {
            let subscriptions = db.list_subscriptions_for_device(&device).await?;
            let mut out = std::io::stdout().lock();
            for subscription in subscriptions {
                write_json_line(&mut out, &subscription)?;
            }
        }
        Command::Subscriptions { device: None } => {
            print_stream(db.list_all_subscriptions(cancel)).await?;
        }
        Command::HubCache => print_stream(db.list_hub_cache_entries(cancel)).await?,
        Command::Exec { statement } => {
            let affected = db.execute(&statement).await?;
            info!(affected, "Statement executed");
        }
    }

    Ok(())
}

async fn open_database(config: &Config, encryption_key: &str) -> anyhow::Result<BridgeDatabase> {
    let cipher = CallbackCipher::from_hex_secret(encryption_key)?;
    let path = match config.database.path.clone().or_else(default_database_path) {
        Some(path) => path,
        None => default_db_path()?,
    };

    info!(path = %path.display(), "Opening bridge database");
    Ok(BridgeDatabase::open(&path, &config.database, Arc::new(cipher)).await?)
}

async fn run(db: BridgeDatabase, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let interval =
        Duration::from_secs(config.hub_cache.gc_interval_secs).max(jobs::MIN_JOB_INTERVAL);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        gc_interval_secs = interval.as_secs(),
        "Starting devbridge"
    );

    let store: Arc<dyn BridgeStore> = Arc::new(db);
    let gc = jobs::spawn_gc_job(store, None, interval, cancel.clone());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    cancel.cancel();
    gc.await?;

    info!("Devbridge stopped");
    Ok(())
}

async fn print_stream<T: Serialize>(mut rows: RowStream<'_, T>) -> anyhow::Result<()> {
    let mut count = 0usize;
    while let Some(row) = rows.next().await {
        let row = row?;
        write_json_line(&mut std::io::stdout().lock(), &row)?;
        count += 1;
    }
    info!(count, "Listing finished");
    Ok(())
}

fn write_json_line<T: Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Fallback database path: ~/.devbridge/bridge.db
fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".devbridge").join("bridge.db"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn encryption_key_is_accepted_after_subcommand() {
        let args = Args::try_parse_from(["devbridge", "gc", "--encryption-key", "00ff"]).unwrap();
        assert_eq!(args.encryption_key.as_deref(), Some("00ff"));
        assert!(matches!(args.command, Command::Gc));

        let args = Args::try_parse_from([
            "devbridge",
            "--encryption-key",
            "00ff",
            "subscriptions",
            "--device",
            "dev-1",
        ])
        .unwrap();
        assert_eq!(args.encryption_key.as_deref(), Some("00ff"));
    }
}
