//! Rollcall - attendance counting from participant-panel screenshots
//!
//! Web variant: serves the interactive form and JSON API. The screenshot is
//! sent to a hosted vision model for name extraction; counts accumulate in
//! an in-memory session until exported to a delimited file.
//!
//! Module structure:
//! - `domain/` - Core business types (Roster, CaptureEvent, SessionPhase)
//! - `io/` - External interfaces (extraction service, export file, web UI)
//! - `services/` - Business logic (Session, Normalizer)
//! - `infra/` - Infrastructure (Config, Stats)

use clap::Parser;
use rollcall::infra::{Config, Stats};
use rollcall::io::extractor::VisionExtractor;
use rollcall::io::server::start_server;
use rollcall::services::Session;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Rollcall - participant-panel attendance counter
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for phase-transition visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("rollcall starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        api_base_url = %config.api_base_url(),
        api_model = %config.api_model(),
        api_timeout_ms = %config.api_timeout_ms(),
        server_port = %config.server_port(),
        export_dir = %config.export_dir(),
        stats_interval_secs = %config.stats_interval_secs(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stats = Arc::new(Stats::new());
    let extractor = VisionExtractor::new(&config)?;
    let session = Arc::new(Mutex::new(Session::new(&config, extractor, stats.clone())));

    // Credential from the environment, held in memory only; otherwise the
    // user supplies it through the web form
    match std::env::var("ROLLCALL_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            session.lock().await.set_credential(key);
        }
        _ => info!("credential_awaiting_entry"),
    }

    // Start stats reporter
    let stats_reporter = stats.clone();
    let session_reporter = session.clone();
    let stats_interval = config.stats_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(stats_interval));
        loop {
            interval.tick().await;
            let attendees = session_reporter.lock().await.roster_len();
            stats_reporter.report(attendees).log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    // Run the web server until shutdown
    start_server(config.server_port(), session, stats, shutdown_rx).await?;

    info!("rollcall shutdown complete");
    Ok(())
}
