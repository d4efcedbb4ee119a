//! ==============================================================================
//! aquafeed-bridge - mqtt <-> websocket bridge for the aquarium feeder
//! ==============================================================================
//!
//! the feeder's microcontroller publishes sensor readings on `sensor/data`
//! and listens for commands on `feeder/control`. dashboards connect over a
//! websocket. this crate sits in between:
//!
//! ```text
//!     ┌──────────────┐  sensor/data   ┌──────────────────────────────┐
//!     │  feeder mcu  │ ─────────────> │ ingest ─> store (sqlite)      │
//!     │  (mqtt)      │                │   │                           │
//!     │              │ <───────────── │   └─> cache ─> broadcast ───┐ │
//!     └──────────────┘ feeder/control │ commands <─────────────────┐│ │
//!                                     └────────────────────────────┼┼─┘
//!                                                       websocket  ││
//!                                                     ┌────────────┴▼─┐
//!                                                     │  dashboards   │
//!                                                     └───────────────┘
//! ```
//!
//! ==============================================================================

pub mod bridge;
pub mod broker;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod persist;
pub mod registry;
pub mod server;
pub mod state;
pub mod store;
pub mod test_utils;

pub use bridge::{Bridge, BridgeOptions};
pub use config::BridgeConfig;
