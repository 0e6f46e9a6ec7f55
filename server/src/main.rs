//! Ball Tracker Server
//!
//! Streams a simulated bouncing ball to media clients and scores their
//! position estimates against the ground truth.
use anyhow::Context;
use clap::{Arg, Command};
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use ball_tracker_core::core::config;
use ball_tracker_core::{log_error, log_info, log_warn};
use ball_tracker_server::api;
use ball_tracker_server::constants::SHUTDOWN_GRACE_SECS;
use ball_tracker_server::core::create_app_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let matches = Command::new("ball-tracker-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bouncing ball video tracking server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
        )
        .get_matches();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    log_info!("Starting ball tracker server");

    // Load configuration
    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let config = config::load_config_or_default(config_path);

    let app_state = create_app_state(config);
    log_info!("AppState created successfully");

    let listener = api::bind(&app_state)
        .await
        .with_context(|| format!("failed to bind {}", app_state.config.server.http_addr))?;

    // Start the HTTP server
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut api_handle = tokio::spawn(api::serve(listener, app_state.clone(), async move {
        let _ = stop_rx.await;
    }));

    // Wait for shutdown signal
    tokio::select! {
        _ = shutdown_signal() => {
            log_warn!("Received shutdown signal, cleaning up");
        }
        result = &mut api_handle => {
            log_error!("HTTP server terminated unexpectedly: {:?}", result);
            app_state.shutdown();
            return Err(anyhow::anyhow!("HTTP server terminated unexpectedly"));
        }
    }

    // Channel clients, then media connections, then the listener
    let released = app_state.shutdown();
    log_info!("Released {} media connections", released);

    let _ = stop_tx.send(());
    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), api_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log_error!("HTTP server error during shutdown: {}", e),
        Ok(Err(e)) => log_error!("HTTP server task failed: {}", e),
        Err(_) => log_warn!("HTTP server did not drain within {}s", SHUTDOWN_GRACE_SECS),
    }

    log_info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log_error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log_error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
