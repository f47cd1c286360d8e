use crate::ws::connection::handle_connection;
use crate::ws::hub::Hub;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct AppState {
    pub hub: Arc<Hub>,
    pub max_connections: usize,
    active_sessions: Arc<AtomicUsize>,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(hub: Arc<Hub>, max_connections: usize, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            hub,
            max_connections,
            active_sessions: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Reserve a session slot, or `None` when the relay is full.
    pub fn try_acquire_session(&self) -> Option<SessionGuard> {
        let max = self.max_connections;
        self.active_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| SessionGuard(self.active_sessions.clone()))
    }

    /// Wait for every open session to finish its close handshake.
    ///
    /// Returns `false` if sessions are still open when `timeout` elapses.
    pub async fn drain_sessions(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, async {
            while self.active_sessions() > 0 {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;
        drained.is_ok()
    }
}

/// Releases its session slot when dropped.
pub struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle WebSocket upgrade request
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let guard = state.try_acquire_session().ok_or_else(|| {
        warn!(
            "Rejecting WebSocket upgrade: {} sessions already open",
            state.max_connections
        );
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let client_id = uuid::Uuid::new_v4().to_string();
    let hub = state.hub.clone();
    let shutdown = state.shutdown.clone();

    // Upgrade to WebSocket
    Ok(ws.on_upgrade(move |socket: WebSocket| {
        handle_connection(socket, hub, client_id, shutdown, guard)
    }))
}
