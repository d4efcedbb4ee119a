//! ==============================================================================
//! domain.rs - readings, snapshot, feeding commands and wire envelopes
//! ==============================================================================
//!
//! purpose:
//!     the plain data types that flow through the bridge.
//!     everything here is serde-friendly because nearly all of it ends up
//!     as json on either the broker or a websocket.
//!
//! relationships:
//!     - used by: state.rs, store.rs, ingest.rs, commands.rs, registry.rs
//!
//! ==============================================================================

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// the three sensors in the tank, in persistence order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Ph,
    Turbidity,
}

impl SensorKind {
    /// fixed order used for every insert batch
    pub const ALL: [SensorKind; 3] = [SensorKind::Temperature, SensorKind::Ph, SensorKind::Turbidity];

    /// field name on the wire (note the mixed-case "pH")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Ph => "pH",
            Self::Turbidity => "turbidity",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// one persisted value. built at arrival time, handed to the store, dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub value: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SensorReading {
    /// `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `HH:MM:SS`
    pub fn time_string(&self) -> String {
        self.time.format("%H:%M:%S").to_string()
    }
}

/// latest known value per sensor. `None` until the first valid message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestSnapshot {
    pub temperature: Option<f64>,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    pub turbidity: Option<f64>,
}

impl LatestSnapshot {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.ph.is_none() && self.turbidity.is_none()
    }
}

/// most recent schedule request. single slot, overwritten on every request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedingSchedule {
    pub time: Option<String>,
    pub quantity: Option<Number>,
}

/// one-shot feed, published and forgotten
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstantFeedCommand {
    pub feed_now: bool,
    pub quantity: Number,
}

impl InstantFeedCommand {
    pub fn new(quantity: Number) -> Self {
        Self { feed_now: true, quantity }
    }
}

/// server -> client push frames
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEnvelope {
    Sensor { data: LatestSnapshot },
}

/// direct reply to a command, sent to the originating client only
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub status: String,
    pub message: String,
}

impl CommandReply {
    pub fn success(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
        }
    }
}

/// identity of one websocket session inside the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}
