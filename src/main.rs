//! ==============================================================================
//! main.rs - aquafeed bridge entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load bridge.toml (or defaults) and set up logging
//!     - open the sqlite telemetry store
//!     - start the mqtt event loop (sensor/data in, feeder/control out)
//!     - serve the websocket endpoint until ctrl-c
//!
//! relationships:
//!     - uses: config.rs, logging.rs, store.rs, broker.rs, server.rs
//!     - everything stateful lives behind bridge::Bridge
//!
//! ==============================================================================

use aquafeed_bridge::{broker, config, logging, server, store, Bridge, BridgeOptions};

use anyhow::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  AquaFeed Bridge");
    println!("  MQTT telemetry <-> WebSocket dashboards");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::BridgeConfig::load_or_default();
    config.print_summary();
    logging::init(&config.logging.level);

    // step 2: open the telemetry store
    let store = match store::SqliteStore::open(&config.store.path) {
        Ok(s) => {
            tracing::info!(path = %config.store.path.display(), "telemetry store ready");
            Arc::new(s)
        }
        Err(e) => {
            let cause = format!("{e:#}");
            tracing::error!(error = %cause, "fatal: failed to open telemetry store");
            return Err(e);
        }
    };

    // step 3: broker link and the bridge itself
    let (link, eventloop) = broker::MqttLink::connect(&config.broker);
    let link = Arc::new(link);
    let bridge = Bridge::new(store, link.clone(), BridgeOptions::from(&config))?;

    // step 4: mqtt event loop in background
    tracing::info!(
        host = %config.broker.host,
        port = config.broker.port,
        "starting mqtt link"
    );
    tokio::spawn(broker::run(link, eventloop, bridge.clone()));

    // step 5: websocket server until ctrl-c
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down");
    };
    server::run_server(bridge.clone(), &config.server.bind_addr(), shutdown).await?;

    // step 6: let queued readings reach the store before exiting
    bridge.flush_persistence().await;
    Ok(())
}
