// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WebSocket endpoints for the real-time map and donation feeds.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::services::{Group, GroupEvent, RealtimeHub};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/locations/", get(locations_socket))
        .route("/ws/donations/", get(donations_socket))
}

async fn locations_socket(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_group(socket, state.realtime.clone(), Group::Locations))
}

async fn donations_socket(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_group(socket, state.realtime.clone(), Group::Donations))
}

/// Parse a client frame; only JSON text is relayed.
fn client_payload(message: &Message) -> Option<Value> {
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
        _ => None,
    }
}

/// Forward group events to the socket and relay the client's JSON frames
/// back into the group until either side closes.
async fn serve_group(socket: WebSocket, hub: RealtimeHub, group: Group) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = hub.subscribe(group);
    tracing::debug!(
        group = group.name(),
        subscribers = hub.subscriber_count(group),
        "WebSocket connected"
    );

    let mut outgoing = tokio::spawn(async move {
        loop {
            let event: GroupEvent = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(group = group.name(), skipped, "WebSocket subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode group event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let relay_hub = hub.clone();
    let mut incoming = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
            match client_payload(&message) {
                Some(data) => relay_hub.publish(group, group.relay_kind(), data),
                None => tracing::debug!(group = group.name(), "Ignoring non-JSON frame"),
            }
        }
    });

    tokio::select! {
        _ = &mut outgoing => incoming.abort(),
        _ = &mut incoming => outgoing.abort(),
    }
    tracing::debug!(group = group.name(), "WebSocket disconnected");
}
