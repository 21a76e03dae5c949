//! Push Connection Registry
//!
//! Tracks live dashboard connections keyed by client id. Each connection
//! is a bounded channel whose receiving end is turned into an SSE stream
//! by the API layer. Dispatch works on a copy of the connection set so no
//! map shard lock is held while sending.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::bus::{Broadcaster, DispatchReport};
use crate::error::DispatchError;

/// Message delivered to one push client
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    /// First message on every connection
    Connected { client_id: String },
    /// Serialized `AlarmEvent`, shared by all recipients of one dispatch
    Alarm(Arc<str>),
    /// Server is going away
    Shutdown,
}

#[derive(Debug)]
struct PushConnection {
    connection_id: u64,
    tx: mpsc::Sender<PushMessage>,
    connected_at: DateTime<Utc>,
}

/// Receiving side of a fresh connection
#[derive(Debug)]
pub struct Subscription {
    pub client_id: String,
    pub connection_id: u64,
    pub receiver: mpsc::Receiver<PushMessage>,
}

/// Live push connections
#[derive(Debug)]
pub struct PushConnectionRegistry {
    connections: DashMap<String, PushConnection>,
    next_connection_id: AtomicU64,
    client_buffer: usize,
}

impl PushConnectionRegistry {
    pub fn new(client_buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
            client_buffer: client_buffer.max(1),
        }
    }

    /// Register a client, replacing and closing any previous connection it had
    pub fn subscribe(&self, client_id: &str) -> Subscription {
        self.subscribe_at(client_id, Utc::now())
    }

    /// `subscribe` with an explicit connect timestamp
    pub fn subscribe_at(&self, client_id: &str, connected_at: DateTime<Utc>) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.client_buffer);
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        // Buffer is at least one and the receiver is still ours
        let _ = tx.try_send(PushMessage::Connected {
            client_id: client_id.to_string(),
        });

        let previous = self.connections.insert(
            client_id.to_string(),
            PushConnection {
                connection_id,
                tx,
                connected_at,
            },
        );
        // Dropping the old sender ends the old stream
        if let Some(old) = previous {
            info!(
                "Push client {} reconnected, closing connection {}",
                client_id, old.connection_id
            );
        } else {
            info!("Push client {} connected ({} live)", client_id, self.len());
        }

        Subscription {
            client_id: client_id.to_string(),
            connection_id,
            receiver,
        }
    }

    /// Remove a client; returns whether it was connected
    pub fn remove(&self, client_id: &str) -> bool {
        let removed = self.connections.remove(client_id).is_some();
        if removed {
            info!("Push client {} removed", client_id);
        }
        removed
    }

    /// Remove a client only if it is still on the given connection
    ///
    /// Used when a stream ends so a newer connection for the same client
    /// survives.
    pub fn remove_connection(&self, client_id: &str, connection_id: u64) -> bool {
        let removed = self
            .connections
            .remove_if(client_id, |_, conn| conn.connection_id == connection_id)
            .is_some();
        if removed {
            debug!("Push client {} stream closed", client_id);
        }
        removed
    }

    /// Evict connections older than `timeout` or whose receiver is gone
    pub fn sweep_stale(&self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let before = self.connections.len();
        self.connections.retain(|client_id, conn| {
            let stale = (now - conn.connected_at)
                .to_std()
                .is_ok_and(|age| age > timeout);
            let closed = conn.tx.is_closed();
            if stale || closed {
                debug!(
                    "Evicting push client {} (stale={}, closed={})",
                    client_id, stale, closed
                );
            }
            !(stale || closed)
        });
        let evicted = before.saturating_sub(self.connections.len());
        if evicted > 0 {
            info!("Stale sweep evicted {} push connections", evicted);
        }
        evicted
    }

    pub fn connected_at(&self, client_id: &str) -> Option<DateTime<Utc>> {
        self.connections.get(client_id).map(|c| c.connected_at)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.connections.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send a shutdown notice to everyone, then drop every connection
    ///
    /// Notices still pending after `grace` are abandoned.
    pub async fn close_all(&self, grace: Duration) -> usize {
        let targets: Vec<mpsc::Sender<PushMessage>> =
            self.connections.iter().map(|c| c.tx.clone()).collect();
        let total = targets.len();

        let notices = join_all(targets.iter().map(|tx| tx.send(PushMessage::Shutdown)));
        if tokio::time::timeout(grace, notices).await.is_err() {
            warn!(
                "Shutdown notice not delivered to all clients within {:?}, forcing close",
                grace
            );
        }

        drop(targets);
        self.connections.clear();
        info!("Closed {} push connections", total);
        total
    }
}

impl Broadcaster for PushConnectionRegistry {
    fn broadcast(&self, payload: Arc<str>) -> Result<DispatchReport, DispatchError> {
        let snapshot: Vec<(String, u64, mpsc::Sender<PushMessage>)> = self
            .connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.connection_id, entry.tx.clone()))
            .collect();

        let mut report = DispatchReport::default();
        let mut dead = Vec::new();

        for (client_id, connection_id, tx) in snapshot {
            match tx.try_send(PushMessage::Alarm(Arc::clone(&payload))) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Closed(_)) => {
                    debug!("Push client {} disconnected", client_id);
                    report.disconnected += 1;
                    dead.push((client_id, connection_id));
                },
                Err(TrySendError::Full(_)) => {
                    warn!("Push client {} buffer full, dropping connection", client_id);
                    report.failed += 1;
                    dead.push((client_id, connection_id));
                },
            }
        }

        for (client_id, connection_id) in dead {
            self.connections
                .remove_if(&client_id, |_, conn| conn.connection_id == connection_id);
        }

        Ok(report)
    }

    fn connection_count(&self) -> usize {
        self.len()
    }
}

/// Removes its connection from the registry when dropped
///
/// Held by the stream handed to the HTTP layer, so a client that goes
/// away is unregistered without waiting for the next dispatch or sweep.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: Arc<PushConnectionRegistry>,
    client_id: String,
    connection_id: u64,
}

impl ConnectionGuard {
    pub fn new(registry: Arc<PushConnectionRegistry>, subscription: &Subscription) -> Self {
        Self {
            registry,
            client_id: subscription.client_id.clone(),
            connection_id: subscription.connection_id,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry
            .remove_connection(&self.client_id, self.connection_id);
    }
}
