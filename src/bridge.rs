//! ==============================================================================
//! bridge.rs - the owned bridge object
//! ==============================================================================
//!
//! purpose:
//!     ties the cache, client registry, telemetry store and feed publisher
//!     together behind one clone-able handle. the broker task and every
//!     websocket session get a clone.
//!
//! relationships:
//!     - ingest.rs adds on_sensor_message (broker -> clients)
//!     - persist.rs owns the store behind a single writer thread
//!     - commands.rs adds on_client_message (client -> broker)
//!     - used by: broker.rs, server.rs, main.rs
//!
//! ==============================================================================

use crate::broker::FeedPublisher;
use crate::config::BridgeConfig;
use crate::domain::{ClientId, LatestSnapshot, ServerEnvelope};
use crate::persist::PersistWorker;
use crate::registry::{ClientConnection, ClientRegistry, DEFAULT_OUTBOX_CAPACITY};
use crate::state::SharedState;
use crate::store::TelemetryStore;

use anyhow::Result;
use std::sync::Arc;

/// runtime knobs taken from the config file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeOptions {
    pub show_sensor_data: bool,
    pub client_outbox: usize,
    pub persist_queue: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            show_sensor_data: true,
            client_outbox: DEFAULT_OUTBOX_CAPACITY,
            persist_queue: 256,
        }
    }
}

impl From<&BridgeConfig> for BridgeOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            show_sensor_data: config.logging.show_sensor_data,
            client_outbox: config.server.client_outbox,
            persist_queue: config.store.queue_capacity,
        }
    }
}

pub(crate) struct BridgeInner {
    pub(crate) state: SharedState,
    pub(crate) clients: ClientRegistry,
    pub(crate) persist: PersistWorker,
    pub(crate) publisher: Arc<dyn FeedPublisher>,
    pub(crate) show_sensor_data: bool,
}

#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

impl Bridge {
    /// fails only if the persistence thread cannot be started
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        publisher: Arc<dyn FeedPublisher>,
        options: BridgeOptions,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(BridgeInner {
                state: SharedState::new(),
                clients: ClientRegistry::new(options.client_outbox),
                persist: PersistWorker::spawn(store, options.persist_queue)?,
                publisher,
                show_sensor_data: options.show_sensor_data,
            }),
        })
    }

    pub fn state(&self) -> &SharedState {
        &self.inner.state
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.inner.clients
    }

    /// register a new session. once any sensor value is known the client gets
    /// the current snapshot as its first frame.
    pub async fn on_client_connect(&self) -> ClientConnection {
        let state = self.inner.state.clone();
        let conn = self
            .inner
            .clients
            .register_with(async move {
                let snapshot = state.snapshot().await;
                if snapshot.is_empty() {
                    None
                } else {
                    sensor_frame(snapshot)
                }
            })
            .await;
        tracing::info!(client = %conn.id, "client connected");
        conn
    }

    /// wait until every reading accepted so far has been written
    pub async fn flush_persistence(&self) {
        self.inner.persist.flush().await;
    }

    pub async fn on_client_disconnect(&self, id: ClientId) {
        if self.inner.clients.unregister(id).await {
            tracing::info!(client = %id, "client disconnected");
        }
    }

    /// push the sensor envelope to every open client
    pub(crate) async fn broadcast_sensor(&self, snapshot: LatestSnapshot) -> usize {
        match sensor_frame(snapshot) {
            Some(frame) => self.inner.clients.broadcast(&frame).await,
            None => 0,
        }
    }
}

fn sensor_frame(snapshot: LatestSnapshot) -> Option<String> {
    match serde_json::to_string(&ServerEnvelope::Sensor { data: snapshot }) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize sensor envelope");
            None
        }
    }
}
