//! ==============================================================================
//! server.rs - websocket listener for dashboard clients
//! ==============================================================================
//!
//! routes:
//!     GET /            websocket upgrade (dashboard live feed + feed commands)
//!     GET /api/state   current snapshot and pending schedule as json
//!
//! each session runs one loop that both drains the client's outbox and
//! reads its frames, so a stalled socket never holds up anyone else.
//!
//! ==============================================================================

use crate::bridge::Bridge;
use crate::domain::{FeedingSchedule, LatestSnapshot};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::future::Future;
use tower_http::cors::CorsLayer;

pub fn router(bridge: Bridge) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/api/state", get(state_handler))
        .layer(CorsLayer::permissive())
        .with_state(bridge)
}

/// bind and serve until `shutdown` resolves
pub async fn run_server<F>(bridge: Bridge, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind websocket listener on {addr}"))?;
    tracing::info!(addr = %addr, "websocket server running");
    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(bridge): State<Bridge>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, bridge))
}

async fn handle_socket(mut socket: WebSocket, bridge: Bridge) {
    let mut conn = bridge.on_client_connect().await;

    loop {
        tokio::select! {
            outgoing = conn.outbox.recv() => match outgoing {
                Some(frame) => {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => bridge.on_client_message(conn.id, text.as_bytes()).await,
                Some(Ok(Message::Binary(bytes))) => bridge.on_client_message(conn.id, &bytes).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(client = %conn.id, error = %e, "websocket read error");
                    break;
                }
            },
        }
    }

    bridge.on_client_disconnect(conn.id).await;
}

#[derive(Debug, Serialize)]
pub struct StateView {
    pub sensor: LatestSnapshot,
    pub schedule: FeedingSchedule,
}

async fn state_handler(State(bridge): State<Bridge>) -> Json<StateView> {
    Json(StateView {
        sensor: bridge.state().snapshot().await,
        schedule: bridge.state().schedule().await,
    })
}
