//! ==============================================================================
//! ingest.rs - sensor message pipeline (broker -> store, cache, clients)
//! ==============================================================================
//!
//! flow for one message on the sensor topic:
//!
//! ```text
//!     payload ──parse/validate──> SensorPayload
//!        │ (reject whole message on any bad field)
//!        ├──> one timestamp, three SensorReadings ──> persistence worker
//!        ├──> cache update (single critical section)
//!        └──> broadcast {"type":"sensor","data":...}
//! ```
//!
//! the worker is not awaited. it writes batches in arrival order; a failed
//! insert is logged and the remaining kinds are still written. cache and
//! broadcast never wait on it.
//!
//! ==============================================================================

use crate::bridge::Bridge;
use crate::domain::{SensorKind, SensorReading};
use crate::error::PayloadError;

use chrono::Local;
use serde_json::Value;

/// a validated sensor message
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorPayload {
    pub temperature: f64,
    pub ph: f64,
    pub turbidity: f64,
}

impl SensorPayload {
    pub fn value(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Ph => self.ph,
            SensorKind::Turbidity => self.turbidity,
        }
    }
}

/// numbers or numeric strings, as long as the result is finite
fn finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn required(data: &Value, kind: SensorKind) -> Result<f64, PayloadError> {
    let field = kind.as_str();
    match data.get(field) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(field)),
        Some(raw) => finite_number(raw).ok_or_else(|| PayloadError::InvalidField {
            field,
            got: raw.to_string(),
        }),
    }
}

/// all three readings or nothing
pub fn parse_sensor_payload(raw: &[u8]) -> Result<SensorPayload, PayloadError> {
    let data: Value = serde_json::from_slice(raw)?;
    Ok(SensorPayload {
        temperature: required(&data, SensorKind::Temperature)?,
        ph: required(&data, SensorKind::Ph)?,
        turbidity: required(&data, SensorKind::Turbidity)?,
    })
}

impl Bridge {
    /// handle one payload from the sensor topic.
    ///
    /// returns whether the message was accepted. its readings are handed to
    /// the persistence worker and written in arrival order; use
    /// [`Bridge::flush_persistence`] to wait for them.
    pub async fn on_sensor_message(&self, raw: &[u8]) -> bool {
        tracing::debug!(bytes = raw.len(), "sensor message received");

        let payload = match parse_sensor_payload(raw) {
            Ok(p) => p,
            Err(e) if e.is_malformed() => {
                tracing::error!(error = %e, "failed to parse sensor message");
                return false;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(raw),
                    "incomplete sensor data, dropping message"
                );
                return false;
            }
        };

        if self.inner.show_sensor_data {
            tracing::info!(
                temperature = payload.temperature,
                ph = payload.ph,
                turbidity = payload.turbidity,
                "sensor data received"
            );
        }

        let now = Local::now().naive_local();
        let readings: Vec<SensorReading> = SensorKind::ALL
            .iter()
            .map(|&kind| SensorReading {
                kind,
                value: payload.value(kind),
                date: now.date(),
                time: now.time(),
            })
            .collect();

        self.inner.persist.submit(readings);

        let snapshot = self
            .inner
            .state
            .update_sensors(payload.temperature, payload.ph, payload.turbidity)
            .await;
        let reached = self.broadcast_sensor(snapshot).await;
        tracing::debug!(clients = reached, "sensor update broadcast");

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_numbers() {
        let p = parse_sensor_payload(br#"{"temperature": 25.4, "pH": 7.1, "turbidity": 3}"#).unwrap();
        assert_eq!(p, SensorPayload { temperature: 25.4, ph: 7.1, turbidity: 3.0 });
    }

    #[test]
    fn test_accepts_numeric_strings_and_zero() {
        let p = parse_sensor_payload(br#"{"temperature": "24.5", "pH": " 6.8 ", "turbidity": 0}"#).unwrap();
        assert_eq!(p.temperature, 24.5);
        assert_eq!(p.ph, 6.8);
        assert_eq!(p.turbidity, 0.0);
    }

    #[test]
    fn test_missing_field_rejected() {
        let err = parse_sensor_payload(br#"{"temperature": 25.0, "turbidity": 3.0}"#).unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("pH")));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = parse_sensor_payload(br#"{"temperature": null, "pH": 7, "turbidity": 3}"#).unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("temperature")));
    }

    #[test]
    fn test_non_numeric_rejected() {
        for body in [
            r#"{"temperature": "warm", "pH": 7, "turbidity": 3}"#,
            r#"{"temperature": 25, "pH": true, "turbidity": 3}"#,
            r#"{"temperature": 25, "pH": 7, "turbidity": "NaN"}"#,
            r#"{"temperature": 25, "pH": 7, "turbidity": "inf"}"#,
        ] {
            let err = parse_sensor_payload(body.as_bytes()).unwrap_err();
            assert!(matches!(err, PayloadError::InvalidField { .. }), "{body}");
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_sensor_payload(b"{temperature: 25").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_non_object_is_missing_fields() {
        let err = parse_sensor_payload(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("temperature")));
    }
}
