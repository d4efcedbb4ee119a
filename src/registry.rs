//! ==============================================================================
//! registry.rs - connected client registry and broadcaster
//! ==============================================================================
//!
//! purpose:
//!     tracks every open websocket session and fans frames out to them.
//!
//! design:
//!     - each client owns a bounded outbox. its socket task drains the
//!       outbox, so a slow socket only delays itself. once a client falls
//!       `capacity` frames behind, new frames for it are dropped.
//!     - a client is "open" while its outbox receiver is alive. once the
//!       socket task exits the receiver drops and broadcasts skip it.
//!     - broadcast copies the handles out under the read lock and sends
//!       after releasing it, so connect/disconnect never races iteration.
//!
//! ==============================================================================

use crate::domain::ClientId;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

/// frames a client may have queued before new ones are dropped
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// the socket-side half of a registered client
pub struct ClientConnection {
    pub id: ClientId,
    /// serialized frames waiting to be written to the socket
    pub outbox: mpsc::Receiver<String>,
}

pub struct ClientRegistry {
    next_id: AtomicU64,
    capacity: usize,
    clients: RwLock<HashMap<ClientId, mpsc::Sender<String>>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// register a client. `first` is resolved while the write lock is held
    /// and queued before the client becomes visible to broadcast, so it is
    /// always the first frame delivered and never older than a broadcast
    /// the client missed.
    ///
    /// an update that lands after `first` resolved but before the caller
    /// starts draining is broadcast to this client as well, so it can see
    /// the same snapshot twice in a row. frames are full snapshots, so the
    /// repeat is harmless.
    pub async fn register_with<F>(&self, first: F) -> ClientConnection
    where
        F: Future<Output = Option<String>>,
    {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, outbox) = mpsc::channel(self.capacity);

        let mut clients = self.clients.write().await;
        if let Some(frame) = first.await {
            // fresh channel with capacity >= 1, cannot be full
            let _ = tx.try_send(frame);
        }
        clients.insert(id, tx);

        ClientConnection { id, outbox }
    }

    pub async fn register(&self) -> ClientConnection {
        self.register_with(async { None }).await
    }

    /// returns whether the client was still registered
    pub async fn unregister(&self, id: ClientId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// unicast. false if the client is gone, closed, or too far behind.
    pub async fn send_to(&self, id: ClientId, frame: String) -> bool {
        let tx = match self.clients.read().await.get(&id) {
            Some(tx) => tx.clone(),
            None => return false,
        };
        offer(id, &tx, frame)
    }

    /// send one frame to every open client, returns how many were reached
    pub async fn broadcast(&self, frame: &str) -> usize {
        let targets: Vec<(ClientId, mpsc::Sender<String>)> = self
            .clients
            .read()
            .await
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        targets
            .iter()
            .filter(|(id, tx)| offer(*id, tx, frame.to_owned()))
            .count()
    }
}

fn offer(id: ClientId, tx: &mpsc::Sender<String>, frame: String) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!(client = %id, "outbox full, dropping frame");
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(client = %id, "skipping closed client");
            false
        }
    }
}
