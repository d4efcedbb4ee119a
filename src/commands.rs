//! ==============================================================================
//! commands.rs - feed command router (client -> broker)
//! ==============================================================================
//!
//! a client frame is one of:
//!     {"feed_now": true, "quantity": 5}        instant feed
//!     {"time": "08:00", "quantity": 10}        schedule request
//!
//! the instant shape wins when both could match. anything else is logged
//! and ignored without a reply. replies go to the sender only.
//!
//! quantity must be a json number greater than zero. a zero-gram feed
//! would be a no-op on the hardware, so it is treated as unrecognized.
//!
//! ==============================================================================

use crate::bridge::Bridge;
use crate::domain::{ClientId, CommandReply, InstantFeedCommand};
use crate::error::PayloadError;

use serde::Serialize;
use serde_json::{Number, Value};

pub const INSTANT_FEED_REPLY: &str = "Instant feeding triggered";
pub const SCHEDULE_REPLY: &str = "Feeding schedule received successfully";

#[derive(Clone, Debug, PartialEq)]
pub enum FeedCommand {
    Instant { quantity: Number },
    Schedule { time: String, quantity: Number },
}

fn positive_quantity(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|q| q > 0.0) => Some(n.clone()),
        _ => None,
    }
}

pub fn parse_feed_command(raw: &[u8]) -> Result<FeedCommand, PayloadError> {
    let data: Value = serde_json::from_slice(raw)?;
    let quantity = data.get("quantity").and_then(positive_quantity);

    if let (Some(Value::Bool(true)), Some(quantity)) = (data.get("feed_now"), quantity.clone()) {
        return Ok(FeedCommand::Instant { quantity });
    }

    let time = data
        .get("time")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty());
    if let (Some(time), Some(quantity)) = (time, quantity) {
        return Ok(FeedCommand::Schedule {
            time: time.to_string(),
            quantity,
        });
    }

    Err(PayloadError::Unrecognized(data.to_string()))
}

impl Bridge {
    /// handle one frame from a connected client
    pub async fn on_client_message(&self, client: ClientId, raw: &[u8]) {
        let command = match parse_feed_command(raw) {
            Ok(c) => c,
            Err(e) if e.is_malformed() => {
                tracing::error!(client = %client, error = %e, "failed to parse client message");
                return;
            }
            Err(e) => {
                tracing::warn!(client = %client, error = %e, "unknown or incomplete message");
                return;
            }
        };

        let reply = match command {
            FeedCommand::Instant { quantity } => {
                tracing::info!(client = %client, quantity = %quantity, "instant feed request");
                self.publish_feed(&InstantFeedCommand::new(quantity));
                INSTANT_FEED_REPLY
            }
            FeedCommand::Schedule { time, quantity } => {
                tracing::info!(client = %client, time = %time, quantity = %quantity, "feeding schedule received");
                let schedule = self.inner.state.replace_schedule(time, quantity).await;
                self.publish_feed(&schedule);
                SCHEDULE_REPLY
            }
        };

        self.reply(client, &CommandReply::success(reply)).await;
    }

    fn publish_feed<T: Serialize>(&self, command: &T) {
        let payload = match serde_json::to_vec(command) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize feed command");
                return;
            }
        };
        match self.inner.publisher.publish(&payload) {
            Ok(()) => tracing::info!(payload = %String::from_utf8_lossy(&payload), "published feed command"),
            Err(e) => {
                let cause = format!("{e:#}");
                tracing::error!(error = %cause, "failed to publish feed command");
            }
        }
    }

    async fn reply(&self, client: ClientId, reply: &CommandReply) {
        let frame = match serde_json::to_string(reply) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize reply");
                return;
            }
        };
        if !self.inner.clients.send_to(client, frame).await {
            tracing::debug!(client = %client, "client went away before reply");
        }
    }
}
