//! RFID gate service (hort-gate) - Main entry point
//!
//! Serves the scan endpoints for classroom RFID terminals and runs the
//! check-in/check-out workflow engine against the attendance database.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hort_common::config::{GateConfig, GateConfigOverrides};
use hort_gate::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for hort-gate
#[derive(Parser, Debug)]
#[command(name = "hort-gate")]
#[command(about = "RFID attendance gate service for hort")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "HORT_GATE_PORT")]
    port: Option<u16>,

    /// Path to the attendance database
    #[arg(short, long, env = "HORT_DATABASE")]
    database: Option<PathBuf>,

    /// Daily-checkout cutoff time (HH:MM)
    #[arg(long, env = "HORT_DAILY_CUTOFF")]
    daily_cutoff: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hort_gate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = GateConfig::resolve(GateConfigOverrides {
        port: args.port,
        database_path: args.database,
        daily_cutoff: args.daily_cutoff,
    })
    .context("Failed to resolve configuration")?;

    info!("Starting hort gate service on port {}", config.port);
    info!("Database: {}", config.database_path.display());

    // Connect and initialize schema
    let pool = hort_common::db::connect(&config.database_path)
        .await
        .context("Failed to open attendance database")?;
    hort_common::db::init::create_schema(&pool)
        .await
        .context("Failed to initialize database schema")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(pool, config);
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
