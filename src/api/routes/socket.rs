//! WebSocket progress endpoint.

use crate::api::AppState;
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::Response,
};

/// GET /ws/progress/{owner_id} - Bidirectional progress socket
///
/// Server-to-client messages are the JSON progress shapes
/// (`progress`, `task_complete`, `error`); the client may send
/// `{"type":"ping"}` and receives `{"type":"pong"}`. The connection is
/// registered in the socket registry on upgrade, so producers in any
/// process can reach it, and buffered pending messages are replayed on
/// connect.
#[utoipa::path(
    get,
    path = "/api/v1/ws/progress/{owner_id}",
    tag = "progress",
    params(
        ("owner_id" = String, Path, description = "Owner whose progress to watch")
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket")
    )
)]
pub async fn ws_progress(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, owner_id))
}

/// Pump messages between the registry and one socket until either side closes
async fn handle_socket(mut socket: WebSocket, state: AppState, owner_id: String) {
    let registry = state.coordinator.progress().sockets.clone();
    let mut conn = registry.register(&owner_id).await;

    loop {
        tokio::select! {
            outbound = conn.recv() => {
                let Some(message) = outbound else {
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(owner_id = %owner_id, error = %e, "failed to serialize progress message");
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(json)).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        if is_ping(&text)
                            && socket
                                .send(WsMessage::Text(r#"{"type":"pong"}"#.to_string()))
                                .await
                                .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    conn.close().await;
    tracing::debug!(owner_id = %owner_id, "websocket closed");
}

/// Whether a client text frame is a ping message
fn is_ping(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| {
            value
                .get("type")
                .and_then(|t| t.as_str())
                .map(|t| t == "ping")
        })
        .unwrap_or(false)
}
