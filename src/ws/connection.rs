use crate::error::{AppError, Result};
use crate::ws::handler::SessionGuard;
use crate::ws::hub::Hub;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

const CLOSE_GOING_AWAY: u16 = 1001;

/// Handle a WebSocket connection
pub async fn handle_connection(
    socket: WebSocket,
    hub: Arc<Hub>,
    client_id: String,
    mut shutdown: watch::Receiver<bool>,
    _guard: SessionGuard,
) {
    info!("WebSocket client connected: {}", client_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The snapshot goes to this session alone, before any delta.
    let (snapshot, mut rx) = hub.join().await;
    if let Err(e) = send_message(&mut ws_sender, &ServerMessage::Snapshot(snapshot)).await {
        warn!("Failed to send snapshot to {}: {}", client_id, e);
        return;
    }

    // Replies to client frames are written by the send task.
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(16);

    let send_client_id = client_id.clone();
    let recv_client_id = client_id.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let msg = match received {
                        Ok(delta) => ServerMessage::Update(delta),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(
                                "Client {} lagged by {} updates, resending snapshot",
                                send_client_id, skipped
                            );
                            let (snapshot, fresh) = hub.join().await;
                            rx = fresh;
                            ServerMessage::Snapshot(snapshot)
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };

                    if let Err(e) = send_message(&mut ws_sender, &msg).await {
                        error!("Failed to send message to WebSocket: {}", e);
                        break;
                    }
                }
                Some(reply) = reply_rx.recv() => {
                    if let Err(e) = send_message(&mut ws_sender, &reply).await {
                        error!("Failed to send reply to WebSocket: {}", e);
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Closing client {} for shutdown", send_client_id);
                    let frame = CloseFrame {
                        code: CLOSE_GOING_AWAY,
                        reason: Utf8Bytes::from_static("server shutting down"),
                    };
                    let _ = ws_sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => {
                    warn!("WebSocket error from {}: {}", recv_client_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => {
                            debug!("Received ping from client {}", recv_client_id);
                            ServerMessage::pong()
                        }
                        Err(e) => {
                            warn!("Failed to parse client message: {}", e);
                            ServerMessage::error("Unrecognised message", "invalid_message")
                        }
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    info!("Client {} closed connection", recv_client_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                Message::Binary(_) => {
                    warn!("Received unexpected binary message from client {}", recv_client_id);
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => {
            debug!("Send task completed for client {}", client_id);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected: {}", client_id);
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| AppError::WebSocket(e.to_string()))
}
