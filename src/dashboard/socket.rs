//! Push-channel client transport.
//!
//! Connection lifecycle is reported through the [`EventRegistry`]; reconnects
//! use a fixed delay and the dashboard itself never retries.

use crate::dashboard::events::{EventRegistry, SocketEvent};
use crate::error::Result;
use crate::ws::protocol::{decode_server_frame, ClientMessage, Incoming};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Lost,
    Shutdown,
}

pub struct SocketClient {
    url: String,
    reconnect_delay: Duration,
    heartbeat: Duration,
}

impl SocketClient {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration, heartbeat: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            heartbeat,
        }
    }

    /// Connect, stream events into `registry`, and reconnect until shutdown.
    pub async fn run(
        &self,
        registry: &mut EventRegistry,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut attempt: u64 = 0;

        loop {
            if attempt > 0 {
                registry.emit(&SocketEvent::Reconnecting);
            }
            attempt += 1;

            info!("Connecting to {}", self.url);
            let connected = tokio::select! {
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
                _ = shutdown.changed() => return Ok(()),
            };

            match connected {
                Ok((stream, _)) => {
                    info!("Connected to relay");
                    attempt = 1;
                    registry.emit(&SocketEvent::Connected);
                    let end = self.session(stream, registry, &mut shutdown).await;
                    registry.emit(&SocketEvent::Disconnected);
                    if end == SessionEnd::Shutdown {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("Connection to {} failed: {}", self.url, e);
                    registry.emit(&SocketEvent::Error(e.to_string()));
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn session(
        &self,
        stream: Stream,
        registry: &mut EventRegistry,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (mut write, mut read) = stream.split();
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        // The first tick fires immediately.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = event_for_frame(text.as_str()) {
                            registry.emit(&event);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Relay closed the connection");
                        return SessionEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return SessionEnd::Lost;
                    }
                },
                _ = heartbeat.tick() => {
                    let ping = match serde_json::to_string(&ClientMessage::Ping) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to encode heartbeat: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::text(ping)).await {
                        warn!("Heartbeat failed: {}", e);
                        return SessionEnd::Lost;
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            }
        }
    }
}

/// Map a server text frame to the event the dashboard should see.
pub fn event_for_frame(text: &str) -> Option<SocketEvent> {
    match decode_server_frame(text) {
        Some(Incoming::Power(delta)) if !delta.is_empty() => Some(SocketEvent::Data(delta)),
        Some(Incoming::Power(_)) => {
            debug!("Frame carried no valid phase values");
            None
        }
        Some(Incoming::Pong) => {
            debug!("Heartbeat acknowledged");
            None
        }
        Some(Incoming::Error(message)) => {
            warn!("Relay reported an error: {}", message);
            None
        }
        None => {
            debug!("Ignoring unrecognised frame");
            None
        }
    }
}
