//! # Loyalty Outbox Worker
//!
//! Drains pending loyalty accruals that checkout could not apply inline.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load PosConfig (TALLY_CONFIG / platform dir / defaults, TALLY_* env)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  open database ──► OutboxProcessor::run ◄── poll every interval         │
//! │                          │                                              │
//! │  Ctrl+C / SIGTERM ──► shutdown watch ──► finish current batch, exit     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! TALLY_DATABASE_PATH=./tally.db cargo run -p tally-pos --bin tally-outbox-worker
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use tally_db::Database;
use tally_pos::telemetry::init_tracing;
use tally_pos::{OutboxProcessor, PosConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PosConfig::load(None)?;
    init_tracing(&config.logging);

    info!(
        database = %config.database.path.display(),
        poll_interval_secs = config.outbox.poll_interval_secs,
        "Starting loyalty outbox worker"
    );

    let db = Arc::new(Database::new(config.database.db_config()).await?);
    let processor = OutboxProcessor::new(db.clone(), config.outbox.clone());

    let pending = processor.pending_count().await?;
    info!(pending, "Outbox entries waiting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(processor.run(shutdown_rx));

    shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        error!("Outbox processor exited before shutdown");
    }
    worker.await?;

    db.close().await;
    info!("Outbox worker shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
