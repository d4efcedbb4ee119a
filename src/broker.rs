//! ==============================================================================
//! broker.rs - mqtt link to the feeder hardware
//! ==============================================================================
//!
//! purpose:
//!     thin adapter over rumqttc.
//!     - inbound: subscribe to the sensor topic and hand each payload to the bridge
//!     - outbound: publish feed commands on the control topic
//!
//! delivery:
//!     feed commands go out at qos 0 (at most once). the hardware side never
//!     asked for acknowledged delivery and a lost command is resent by the user.
//!
//! resilience:
//!     rumqttc reconnects on the next poll after an error. we log, wait
//!     `reconnect_delay_secs`, and poll again. the subscription is renewed on
//!     every connack because a clean session forgets it.
//!
//! ==============================================================================

use crate::bridge::Bridge;
use crate::config::BrokerConfig;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::time::Duration;

/// outbound side of the broker, swapped for a recorder in tests
pub trait FeedPublisher: Send + Sync {
    /// best-effort, must not block
    fn publish(&self, payload: &[u8]) -> Result<()>;
}

/// requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 64;

pub struct MqttLink {
    client: AsyncClient,
    sensor_topic: String,
    feed_topic: String,
    reconnect_delay: Duration,
}

impl MqttLink {
    /// build the client. nothing touches the network until the event loop is polled.
    pub fn connect(config: &BrokerConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let link = Self {
            client,
            sensor_topic: config.sensor_topic.clone(),
            feed_topic: config.feed_topic.clone(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        };
        (link, eventloop)
    }

    fn subscribe(&self) -> bool {
        match self.client.try_subscribe(&self.sensor_topic, QoS::AtMostOnce) {
            Ok(()) => {
                tracing::info!(topic = %self.sensor_topic, "subscribing to sensor topic");
                true
            }
            Err(e) => {
                tracing::error!(topic = %self.sensor_topic, error = %e, "failed to subscribe to sensor topic");
                false
            }
        }
    }
}

impl FeedPublisher for MqttLink {
    fn publish(&self, payload: &[u8]) -> Result<()> {
        self.client
            .try_publish(&self.feed_topic, QoS::AtMostOnce, false, payload.to_vec())
            .with_context(|| format!("failed to publish to {}", self.feed_topic))
    }
}

/// what one event loop event turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// connack: subscribe request queued (false if it could not be queued)
    Subscribing(bool),
    Subscribed,
    SubscribeRejected,
    /// publish on the sensor topic, with whether the bridge accepted it
    Sensor(bool),
    OtherTopic,
    Ignored,
}

/// react to one event from the mqtt event loop
pub async fn handle_event(link: &MqttLink, bridge: &Bridge, event: Event) -> Handled {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => {
            tracing::info!("connected to mqtt broker");
            Handled::Subscribing(link.subscribe())
        }
        Event::Incoming(Packet::SubAck(ack)) => {
            if ack
                .return_codes
                .iter()
                .any(|code| matches!(code, SubscribeReasonCode::Failure))
            {
                tracing::error!(topic = %link.sensor_topic, "broker rejected sensor subscription");
                Handled::SubscribeRejected
            } else {
                tracing::info!(topic = %link.sensor_topic, "subscribed to sensor topic");
                Handled::Subscribed
            }
        }
        Event::Incoming(Packet::Publish(publish)) => {
            if publish.topic == link.sensor_topic {
                Handled::Sensor(bridge.on_sensor_message(&publish.payload).await)
            } else {
                tracing::debug!(topic = %publish.topic, "ignoring message on unexpected topic");
                Handled::OtherTopic
            }
        }
        _ => Handled::Ignored,
    }
}

/// drive the mqtt event loop forever
pub async fn run(link: std::sync::Arc<MqttLink>, mut eventloop: EventLoop, bridge: Bridge) {
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                handle_event(&link, &bridge, event).await;
            }
            Err(e) => {
                tracing::error!(error = %e, retry_in = ?link.reconnect_delay, "mqtt connection error");
                tokio::time::sleep(link.reconnect_delay).await;
            }
        }
    }
}
