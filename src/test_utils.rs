//! Recording fakes for the store and the broker
//!
//! They capture every call so tests can assert on exactly what the bridge
//! tried to persist and publish, without sqlite or an mqtt broker.

use crate::bridge::{Bridge, BridgeOptions};
use crate::broker::FeedPublisher;
use crate::domain::{SensorKind, SensorReading};
use crate::store::TelemetryStore;

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// remembers every insert attempt, optionally failing for chosen kinds
#[derive(Default)]
pub struct RecordingStore {
    attempts: Mutex<Vec<SensorReading>>,
    failing: Mutex<HashSet<SensorKind>>,
    delays: Mutex<Vec<(f64, Duration)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make every insert of `kind` fail from now on
    pub fn fail_on(&self, kind: SensorKind) {
        self.failing.lock().unwrap().insert(kind);
    }

    /// make every insert of a reading equal to `value` stall for `delay`
    pub fn delay_on(&self, value: f64, delay: Duration) {
        self.delays.lock().unwrap().push((value, delay));
    }

    /// every insert attempted, in call order (failed ones included)
    pub fn attempts(&self) -> Vec<SensorReading> {
        self.attempts.lock().unwrap().clone()
    }
}

impl TelemetryStore for RecordingStore {
    fn insert(&self, reading: &SensorReading) -> Result<()> {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(value, _)| *value == reading.value)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.attempts.lock().unwrap().push(reading.clone());
        if self.failing.lock().unwrap().contains(&reading.kind) {
            return Err(anyhow!("simulated {} insert failure", reading.kind));
        }
        Ok(())
    }
}

/// remembers every published payload as parsed json
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<serde_json::Value>>,
    fail: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn published(&self) -> Vec<serde_json::Value> {
        self.published.lock().unwrap().clone()
    }
}

impl FeedPublisher for RecordingPublisher {
    fn publish(&self, payload: &[u8]) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("simulated broker outage"));
        }
        let value = serde_json::from_slice(payload)?;
        self.published.lock().unwrap().push(value);
        Ok(())
    }
}

/// a bridge wired to fresh recorders
pub fn test_bridge() -> (Bridge, Arc<RecordingStore>, Arc<RecordingPublisher>) {
    test_bridge_with(RecordingStore::new())
}

/// a bridge around a pre-configured store and a fresh publisher
pub fn test_bridge_with(store: RecordingStore) -> (Bridge, Arc<RecordingStore>, Arc<RecordingPublisher>) {
    let store = Arc::new(store);
    let publisher = Arc::new(RecordingPublisher::new());
    let options = BridgeOptions { show_sensor_data: false, ..BridgeOptions::default() };
    let bridge = Bridge::new(store.clone(), publisher.clone(), options).expect("persistence worker starts");
    (bridge, store, publisher)
}
