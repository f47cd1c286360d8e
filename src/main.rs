use solar_relay::{
    config::RelayConfig,
    logging,
    mqtt::{build_options, TelemetrySource},
    ws::{create_router, AppState, Hub},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("solar_relay=info,tower_http=info", false);

    info!("Starting solar-relay service");

    let config = RelayConfig::from_env()?;
    info!(
        "Configuration loaded: broker={}, port={}",
        config.mqtt.url, config.server.port
    );

    let hub = Arc::new(Hub::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the telemetry source
    let options = build_options(&config.mqtt)?;
    let source = TelemetrySource::new(
        options,
        hub.clone(),
        Duration::from_millis(config.mqtt.reconnect_delay_ms),
    );
    let source_shutdown = shutdown_rx.clone();
    let source_task = tokio::spawn(async move {
        if let Err(e) = source.run(source_shutdown).await {
            error!("Telemetry source error: {}", e);
        }
    });

    let state = Arc::new(AppState::new(
        hub,
        config.server.max_connections,
        shutdown_rx,
    ));
    let app = create_router(state.clone(), &config.server.static_dir);

    // Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        "Serving dashboard from {} and push channel on /ws",
        config.server.static_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Tell the telemetry source and open sessions to stop.
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Upgraded sessions outlive the listener; let them send their close frames.
    if !state.drain_sessions(SESSION_DRAIN_TIMEOUT).await {
        warn!(
            "{} sessions still open after {:?}",
            state.active_sessions(),
            SESSION_DRAIN_TIMEOUT
        );
    }

    if let Err(e) = source_task.await {
        error!("Telemetry source task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
