// crates/mtp-sim-monitor/src/server.rs

//! Implements the web server and WebSocket logic using axum.

use crate::model::{
    ErrorResponse, MonitorMessage, UploadQuery, UploadResponse, WriteRequest, WriteResponse,
};
use crate::sink::BroadcastSink;
use crate::EVENT_CAPACITY;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, error, info, trace, warn};
use mtp_sim::{Simulator, VariableInfo};
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};

/// Largest descriptor upload accepted, in bytes.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// The shared application state.
#[derive(Clone)]
pub(super) struct AppState {
    pub(super) simulator: Arc<Simulator>,
    /// Sender for broadcasting events to all connected clients.
    pub(super) events_tx: broadcast::Sender<MonitorMessage>,
}

/// Subscribes the monitor to the simulator and serves until the server fails.
pub(super) async fn run(listener: TcpListener, simulator: Arc<Simulator>) -> io::Result<()> {
    let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let subscription = simulator.subscribe(Arc::new(BroadcastSink::new(events_tx.clone())));
    let app = router(AppState {
        simulator: Arc::clone(&simulator),
        events_tx,
    });

    if let Ok(addr) = listener.local_addr() {
        info!("[Monitor] Web monitor listening on http://{}", addr);
    }
    let result = axum::serve(listener, app).await;

    simulator.unsubscribe(subscription);
    if let Err(e) = &result {
        error!("[Monitor] Web server encountered an error: {}", e);
    }
    result
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/variables", get(variables_handler))
        .route("/api/write", post(write_handler))
        .route("/api/mtp/upload", post(upload_handler))
        .route("/ws", get(websocket_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Serves the embedded monitor page.
async fn root_handler() -> impl IntoResponse {
    Html(include_str!("web/monitor.html"))
}

async fn variables_handler(State(state): State<AppState>) -> Json<Vec<VariableInfo>> {
    Json(state.simulator.variables())
}

/// Writes a value to a known variable. The store is touched on a blocking thread.
async fn write_handler(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Json<WriteResponse> {
    let simulator = Arc::clone(&state.simulator);
    let outcome = tokio::task::spawn_blocking(move || {
        if simulator.address_space().variable(&request.node_id).is_none() {
            warn!("[Monitor] Write to unknown node '{}' ignored", request.node_id);
            return false;
        }
        match simulator.write_value(&request.node_id, request.tag_value()) {
            Ok(change) => {
                debug!("[Monitor] Wrote {} = {}", change.key, change.value);
                true
            }
            Err(e) => {
                error!("[Monitor] Write to '{}' failed: {}", request.node_id, e);
                false
            }
        }
    })
    .await;

    let success = outcome.unwrap_or_else(|e| {
        error!("[Monitor] Write task failed: {}", e);
        false
    });
    Json(WriteResponse { success })
}

/// Parses an uploaded descriptor and loads it into the simulator.
///
/// The body is the raw file; `fileName` selects document or archive mode.
async fn upload_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("file missing"))).into_response();
    }

    let simulator = Arc::clone(&state.simulator);
    let file_name = query.file_name.clone();
    let loaded = tokio::task::spawn_blocking(move || -> Result<Vec<VariableInfo>, String> {
        let root = mtp_sim_aml::parse_bytes(&file_name, &body).map_err(|e| e.to_string())?;
        simulator.load_nodes(root).map_err(|e| e.to_string())?;
        Ok(simulator.variables())
    })
    .await;

    match loaded {
        Ok(Ok(variables)) => {
            let count = variables.len();
            info!(
                "[Monitor] Loaded upload '{}' with {} variable(s)",
                query.file_name, count
            );
            let _ = state.events_tx.send(MonitorMessage::Variables { variables });
            Json(UploadResponse {
                success: true,
                count,
            })
            .into_response()
        }
        Ok(Err(reason)) => {
            warn!("[Monitor] Upload '{}' rejected: {}", query.file_name, reason);
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(reason))).into_response()
        }
        Err(e) => {
            error!("[Monitor] Upload task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("upload could not be processed")),
            )
                .into_response()
        }
    }
}

/// Upgrades `/ws` requests to a WebSocket connection.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_message(socket: &mut WebSocket, message: &MonitorMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json_payload) => socket.send(Message::Text(json_payload.into())).await.is_ok(),
        Err(e) => {
            // Drop the message, keep the client.
            error!("[Monitor] Failed to serialize message to JSON: {}", e);
            true
        }
    }
}

/// Task for one WebSocket client: sends the current variable list, then every
/// broadcast event as a JSON message.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("[Monitor] New WebSocket client connected.");

    // Subscribe before the snapshot so no change falls in between.
    let mut events_rx = state.events_tx.subscribe();
    let snapshot = MonitorMessage::Variables {
        variables: state.simulator.variables(),
    };
    if !send_message(&mut socket, &snapshot).await {
        info!("[Monitor] WebSocket client disconnected (send error).");
        return;
    }

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Ok(message) => {
                    trace!("[Monitor] Forwarding {:?}", message);
                    if !send_message(&mut socket, &message).await {
                        info!("[Monitor] WebSocket client disconnected (send error).");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[Monitor] WebSocket client lagging, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    info!("[Monitor] WebSocket client disconnected.");
                    break;
                }
                // Pings are answered by axum; other client messages are ignored.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("[Monitor] WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtp_sim::{MemoryStore, Node, SimulationConfig, TagValue};
    use serde_json::Value;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn spawn_monitor() -> (SocketAddr, Arc<Simulator>) {
        let simulator = Arc::new(Simulator::new(
            SimulationConfig::default(),
            Arc::new(MemoryStore::new()),
        ));
        simulator
            .load_nodes(
                Node::folder("MTP")
                    .with_child(Node::variable("R0001", "xs:string").with_identifier("R0001"))
                    .with_child(Node::variable("Temp", "xs:double").with_identifier("ns=2;s=Temp")),
            )
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run(listener, Arc::clone(&simulator)));
        (addr, simulator)
    }

    /// Minimal HTTP/1.1 client: returns the status code and body.
    async fn request(addr: SocketAddr, method: &str, path: &str, body: &[u8]) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let head = format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw).into_owned();
        let status = text
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap();
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        (status, body)
    }

    #[tokio::test]
    async fn test_index_and_variables() {
        let (addr, _) = spawn_monitor().await;

        let (status, body) = request(addr, "GET", "/", b"").await;
        assert_eq!(status, 200);
        assert!(body.contains("<html"));

        let (status, body) = request(addr, "GET", "/api/variables", b"").await;
        assert_eq!(status, 200);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["nodeId"], "ns=2;s=R0001");
        assert_eq!(json[1]["dataType"], "xs:double");
    }

    #[tokio::test]
    async fn test_write_known_and_unknown_nodes() {
        let (addr, simulator) = spawn_monitor().await;

        let (status, body) = request(
            addr,
            "POST",
            "/api/write",
            br#"{"nodeId": "NS2|String|R0001", "value": "42"}"#,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["success"], true);
        assert_eq!(simulator.read_value("R0001"), Some(TagValue::Text("42".into())));

        let (_, body) = request(addr, "POST", "/api/write", br#"{"nodeId": "Nope", "value": 1}"#).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["success"], false);
    }

    #[tokio::test]
    async fn test_upload_replaces_variables() {
        let (addr, simulator) = spawn_monitor().await;
        let xml = br#"<CAEXFile><Variable Name="Flow" DataType="Float"/></CAEXFile>"#;

        let (status, body) = request(addr, "POST", "/api/mtp/upload?fileName=flow.aml", xml).await;
        assert_eq!(status, 200);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(simulator.variables()[0].node_id.as_str(), "ns=2;s=Flow");
    }

    #[tokio::test]
    async fn test_upload_failures_keep_previous_tree() {
        let (addr, simulator) = spawn_monitor().await;

        let (status, _) = request(addr, "POST", "/api/mtp/upload?fileName=a.aml", b"").await;
        assert_eq!(status, 400);

        let (status, body) = request(addr, "POST", "/api/mtp/upload?fileName=a.txt", b"<a/>").await;
        assert_eq!(status, 400);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["success"], false);

        let (status, _) = request(addr, "POST", "/api/mtp/upload?fileName=a.aml", b"<a>").await;
        assert_eq!(status, 400);

        assert_eq!(simulator.variables().len(), 2);
    }
}
