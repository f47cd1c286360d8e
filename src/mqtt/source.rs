//! Telemetry source: subscribes to the three phase topics and feeds the hub.

use crate::error::Result;
use crate::mqtt::client::{self, AsyncClient, EventLoop, MqttOptions};
use crate::power::{Phase, PowerDelta};
use crate::ws::hub::Hub;
use rumqttc::{Event, Outgoing, Packet, Publish, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One topic per phase, in phase order.
pub const PHASE_TOPICS: [&str; 3] = [
    "shellies/ipe/sotano/cuadro/emeter/0/power",
    "shellies/ipe/sotano/cuadro/emeter/1/power",
    "shellies/ipe/sotano/cuadro/emeter/2/power",
];

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn phase_for_topic(topic: &str) -> Option<Phase> {
    PHASE_TOPICS
        .iter()
        .position(|t| *t == topic)
        .and_then(Phase::from_index)
}

/// Parse a payload as a finite watt value. Anything else is rejected.
pub fn parse_payload(payload: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(payload).ok()?;
    text.trim().parse::<f64>().ok().filter(|w| w.is_finite())
}

/// Turn one publish into a single-phase delta, or `None` if it should be dropped.
pub fn delta_for_publish(topic: &str, payload: &[u8]) -> Option<PowerDelta> {
    let Some(phase) = phase_for_topic(topic) else {
        debug!(topic = %topic, "ignoring message on unknown topic");
        return None;
    };

    match parse_payload(payload) {
        Some(watts) => Some(PowerDelta::single(phase, watts)),
        None => {
            debug!(
                topic = %topic,
                payload = %String::from_utf8_lossy(payload),
                "dropping non-numeric telemetry payload"
            );
            None
        }
    }
}

/// Apply a publish to the hub; returns the delta that was broadcast.
pub async fn forward_publish(hub: &Hub, publish: &Publish) -> Option<PowerDelta> {
    let delta = delta_for_publish(&publish.topic, &publish.payload)?;
    let sessions = hub.publish(delta).await;
    debug!(topic = %publish.topic, sessions, "telemetry forwarded");
    Some(delta)
}

pub struct TelemetrySource {
    client: AsyncClient,
    eventloop: EventLoop,
    hub: Arc<Hub>,
    reconnect_delay: Duration,
}

impl TelemetrySource {
    pub fn new(options: MqttOptions, hub: Arc<Hub>, reconnect_delay: Duration) -> Self {
        let (client, eventloop) = client::new(options);
        Self {
            client,
            eventloop,
            hub,
            reconnect_delay,
        }
    }

    /// Drive the broker connection until shutdown is signalled.
    ///
    /// rumqttc reconnects on the next poll after an error; subscriptions are
    /// issued again on every ConnAck. Messages published while disconnected are lost.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let TelemetrySource {
            client,
            mut eventloop,
            hub,
            reconnect_delay,
        } = self;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("shutdown requested, disconnecting from MQTT broker");
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                        subscribe_all(&client);
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        debug!(pkid = ack.pkid, "subscription acknowledged");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        forward_publish(&hub, &publish).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("mqtt error: {e}; reconnecting in {:?}", reconnect_delay);
                        tokio::select! {
                            _ = tokio::time::sleep(reconnect_delay) => {}
                            _ = shutdown.changed() => {
                                info!("shutdown requested during reconnect backoff");
                                break;
                            }
                        }
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            warn!("failed to queue MQTT disconnect: {}", e);
            return Ok(());
        }

        // Keep polling so the DISCONNECT packet is actually written.
        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            warn!("timed out waiting for MQTT disconnect");
        }

        info!("MQTT connection closed");
        Ok(())
    }
}

fn subscribe_all(client: &AsyncClient) {
    for topic in PHASE_TOPICS {
        match client.try_subscribe(topic, QoS::AtMostOnce) {
            Ok(()) => debug!(topic = %topic, "subscribe requested"),
            Err(e) => warn!(topic = %topic, error = %e, "failed to request subscription"),
        }
    }
}
