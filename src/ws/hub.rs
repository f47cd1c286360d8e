use crate::power::{PowerDelta, PowerSnapshot};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Owns the live snapshot and the broadcast side of the fan-out channel.
///
/// Applying a delta and broadcasting it happen under the same write lock, and
/// `join` reads the snapshot and subscribes under the read lock, so a session
/// sees exactly the deltas that are newer than its snapshot.
pub struct Hub {
    snapshot: RwLock<PowerSnapshot>,
    tx: broadcast::Sender<PowerDelta>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            snapshot: RwLock::new(PowerSnapshot::default()),
            tx,
        }
    }

    /// Merge a delta into the snapshot and push it to every session.
    ///
    /// Returns the number of sessions the delta was queued for.
    pub async fn publish(&self, delta: PowerDelta) -> usize {
        if delta.is_empty() {
            return 0;
        }

        let mut snapshot = self.snapshot.write().await;
        snapshot.apply(&delta);

        match self.tx.send(delta) {
            Ok(count) => {
                debug!("Broadcast update to {} sessions", count);
                count
            }
            Err(_) => {
                debug!("No sessions connected, snapshot updated only");
                0
            }
        }
    }

    /// Register a new session: its starting snapshot plus a receiver for later deltas.
    pub async fn join(&self) -> (PowerSnapshot, broadcast::Receiver<PowerDelta>) {
        let snapshot = self.snapshot.read().await;
        (*snapshot, self.tx.subscribe())
    }

    pub async fn snapshot(&self) -> PowerSnapshot {
        *self.snapshot.read().await
    }

    pub fn session_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(100)
    }
}
