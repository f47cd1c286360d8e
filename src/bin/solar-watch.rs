use solar_relay::{
    config::WatchConfig,
    dashboard::{
        render::TerminalRenderer, socket::SocketClient, Dashboard, EventKind, EventRegistry,
    },
    logging,
};
use std::cell::RefCell;
use std::io::{stdout, IsTerminal};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init("solar_relay=warn", true);

    let config = WatchConfig::from_env()?;
    info!(
        "Watching {} with {} appliances",
        config.relay_url,
        config.appliances.len()
    );

    let renderer = TerminalRenderer::new(stdout(), stdout().is_terminal());
    let dashboard = Rc::new(RefCell::new(Dashboard::new(config.appliances, renderer)));

    let mut registry = EventRegistry::new();
    let handle = dashboard.clone();
    registry.on_many(
        &[
            EventKind::DataReceived,
            EventKind::Connected,
            EventKind::Disconnected,
            EventKind::Reconnecting,
            EventKind::Error,
        ],
        move |event| {
            handle
                .try_borrow_mut()
                .map_err(|e| anyhow::anyhow!("dashboard busy: {}", e))?
                .handle_event(event);
            Ok(())
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let client = SocketClient::new(
        config.relay_url,
        Duration::from_millis(config.reconnect_delay_ms),
        Duration::from_secs(config.heartbeat_secs),
    );

    let run = client.run(&mut registry, shutdown_rx);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
            run.await?;
        }
    }

    Ok(())
}
