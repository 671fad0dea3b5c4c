//! WebSocket route and router construction: CORS + trace layer + route
//! table, plus a split-socket/spawned-send-task/read-loop-to-detect-
//! disconnect pattern. No auth handshake, message batching, or token
//! binding.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::protocol::{ServerMessage, WsFrame};

use super::{handlers, AppState};

#[derive(Deserialize)]
pub struct WsQuery {
    pub device_id: String,
}

/// Builds the full HTTP + WebSocket router.
pub fn router(cors_origins: &str) -> Router<AppState> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();
        if origins.is_empty() {
            tracing::warn!("no valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    Router::new()
        .route("/lobby/create", post(handlers::create_lobby))
        .route("/lobby/join", post(handlers::join_lobby))
        .route("/lobby/leave", post(handlers::leave_lobby))
        .route("/lobby/ready", post(handlers::set_ready))
        .route("/lobby/status", get(handlers::lobby_status))
        .route("/lobby/find_match", post(handlers::find_match))
        .route("/lobby/leave_queue", post(handlers::leave_queue))
        .route("/lobby/queue_status", get(handlers::queue_status))
        .route("/ws/lobby/:code", get(lobby_ws))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn lobby_ws(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, code, params.device_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, code: String, device_id: String) {
    let (lobby_id, rx) = match state.hub.connect(&code, device_id.clone()).await {
        Ok(pair) => pair,
        Err(err) => {
            reject(socket, err.kind().description()).await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    let mut rx = rx;

    let send_task = tokio::spawn(async move {
        while let Some(broadcast) = rx.recv().await {
            let bytes = broadcast.get_or_serialize_json();
            let Ok(text) = std::str::from_utf8(&bytes) else {
                continue;
            };
            if sender.send(Message::Text(text.to_string())).await.is_err() {
                break;
            }
        }
    });

    // The server is send-only in the normal path; it still reads frames so
    // it notices a close (clean or abrupt) promptly.
    while receiver.next().await.is_some() {}

    send_task.abort();
    state.hub.disconnect(lobby_id, &device_id).await;
}

async fn reject(socket: WebSocket, message: &str) {
    let (mut sender, _receiver) = socket.split();
    let frame = WsFrame::new(ServerMessage::Error {
        message: message.to_string(),
    });
    if let Ok(body) = serde_json::to_string(&frame) {
        let _ = sender.send(Message::Text(body)).await;
    }
    let _ = sender.close().await;
}
