mod auth;
mod error;
mod routes;
mod state;


use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use mail2drive::scheduler::PeriodicScheduler;
use mail2drive::{load_config_from_env, telemetry};
use tokio::sync::broadcast;

use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("mail2drive-server: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_from_env()?;
    telemetry::init_tracing(&config.logging)?;

    info!("Starting mail2drive-server v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config)?;

    let scheduler = if config.scheduler.enabled {
        let scheduler = PeriodicScheduler::new(
            Arc::clone(&state.batch),
            Duration::from_secs(config.scheduler.interval_secs),
        );
        let (trigger_tx, trigger_rx) = broadcast::channel(4);
        let handle = scheduler.start(trigger_rx);
        info!("Periodic batch every {}s", config.scheduler.interval_secs);
        Some((scheduler, trigger_tx, handle))
    } else {
        None
    };

    let app = routes::router(state);
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((scheduler, trigger_tx, handle)) = scheduler {
        scheduler.stop();
        // Wake the select loop so it sees the shutdown flag
        let _ = trigger_tx.send(());
        if let Err(e) = handle.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("mail2drive-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
