//! ==============================================================================
//! state.rs - latest-state cache and feeding schedule slot
//! ==============================================================================
//!
//! purpose:
//!     holds the most recent value per sensor and the most recent schedule
//!     request. this is the only mutable shared state in the bridge.
//!
//! we use arc<rwlock<>> for thread-safe sharing:
//!     - arc: the broker task and every websocket session hold a clone
//!     - rwlock: many snapshot readers, one writer per message
//!
//! every mutation is a single write-lock critical section, so a sensor
//! message and a client command can never interleave half a write.
//!
//! ==============================================================================

use crate::domain::{FeedingSchedule, LatestSnapshot};

use serde_json::Number;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct BridgeState {
    latest: LatestSnapshot,
    schedule: FeedingSchedule,
}

/// clone-able handle to the shared cache
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<BridgeState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// overwrite all three sensor values at once and return the new snapshot
    pub async fn update_sensors(&self, temperature: f64, ph: f64, turbidity: f64) -> LatestSnapshot {
        let mut guard = self.inner.write().await;
        guard.latest = LatestSnapshot {
            temperature: Some(temperature),
            ph: Some(ph),
            turbidity: Some(turbidity),
        };
        guard.latest
    }

    pub async fn snapshot(&self) -> LatestSnapshot {
        self.inner.read().await.latest
    }

    /// replace (never merge) the pending schedule and return a copy of it
    pub async fn replace_schedule(&self, time: String, quantity: Number) -> FeedingSchedule {
        let mut guard = self.inner.write().await;
        guard.schedule = FeedingSchedule {
            time: Some(time),
            quantity: Some(quantity),
        };
        guard.schedule.clone()
    }

    pub async fn schedule(&self) -> FeedingSchedule {
        self.inner.read().await.schedule.clone()
    }
}
