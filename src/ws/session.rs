//! WebSocket upgrade and the per-connection session.
//!
//! Handshake: `GET /ws?userId=<id>`. A connection without a `userId` is
//! accepted but not tracked for presence — it still receives broadcast
//! events, it just cannot be targeted.
//!
//! Each session splits the socket: a writer task drains the connection's
//! outbound mpsc queue into the sink (preserving emission order per
//! connection), while the read loop dispatches typed client events. All
//! cleanup runs when the read loop ends, however the connection died.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::state::AppState;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::service::RealtimeService;
use crate::ws::types::ConnectionHandle;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// `GET /ws` — upgrades and hands the socket to the session loop.
#[instrument(skip_all, fields(user_id = ?query.user_id))]
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let realtime = state.realtime.clone();
    ws.on_upgrade(move |socket| run_session(socket, realtime, query.user_id))
}

#[instrument(skip(socket, realtime), fields(conn_id))]
async fn run_session(socket: WebSocket, realtime: Arc<RealtimeService>, user_id: Option<String>) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let handle = ConnectionHandle::new(tx.clone());
    tracing::Span::current().record("conn_id", tracing::field::display(handle.id));

    let writer = tokio::spawn(write_outbound(sink, rx));

    realtime.connect(user_id.as_deref(), handle.clone());
    info!("client connected");

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    debug!(?event, "client event");
                    match event {
                        ClientEvent::JoinGroup(group_id) => realtime.join_room(&group_id, handle.id),
                        ClientEvent::LeaveGroup(group_id) => {
                            realtime.leave_room(&group_id, handle.id)
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "unparseable client frame");
                    let response = ServerEvent::Error {
                        message: "Invalid message format".to_string(),
                    };
                    if let Ok(json) = serde_json::to_string(&response) {
                        let _ = tx.send(Message::Text(json.into()));
                    }
                }
            },
            Message::Close(_) => {
                debug!("close frame from client");
                break;
            }
            // Pings are answered by axum; everything else is ignored.
            _ => {}
        }
    }

    realtime.disconnect(user_id.as_deref(), handle.id);
    // Dropping our sender lets the writer drain and exit on its own.
    drop(tx);
    drop(handle);
    let _ = writer.await;
    info!("client disconnected");
}

/// Writer task: forwards queued frames to the socket until the queue closes
/// or the socket dies.
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if sink.send(msg).await.is_err() {
            // Connection is gone; the read loop will notice and clean up.
            break;
        }
    }
}
