//! WebSocket handler — event dispatch for the session coordinator.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client events → parse + dispatch in a single match
//! - Broadcast events from room peers → forward to the client
//!
//! All state mutation lives in `services::room`; this layer owns parsing,
//! the connection's current-room bookkeeping, and replies to the sender.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `connected` with the connection's `socketId`
//! 2. Client sends events → dispatch → coordinator mutates + broadcasts
//! 3. Close or transport drop → same cleanup as an explicit leave
//!
//! Per-connection FIFO ordering comes from this single task; malformed
//! events are logged and dropped, never fatal to the connection.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{ClientEvent, ServerEvent};
use crate::services::room;
use crate::state::AppState;

/// Outbound channel depth per connection. A peer that falls this far behind
/// starts dropping broadcasts (latest-wins for cursor traffic).
const OUTBOUND_BUFFER: usize = 256;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel for broadcasts from room peers.
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    if send_event(&mut socket, &ServerEvent::Connected { socket_id: connection_id })
        .await
        .is_err()
    {
        return;
    }

    info!(%connection_id, "ws: client connected");

    // The room this connection has joined, if any. A connection belongs to
    // at most one room; joining another project leaves the first.
    let mut current_room: Option<String> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut current_room, connection_id, &tx, &text).await;
                        let mut closed = false;
                        for event in replies {
                            if send_event(&mut socket, &event).await.is_err() {
                                closed = true;
                                break;
                            }
                        }
                        if closed {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Transport drop and explicit leave share this exact cleanup path, so
    // no orphaned locks survive either way.
    if let Some(project_id) = current_room {
        room::leave(&state, &project_id, connection_id).await;
    }
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// EVENT DISPATCH
// =============================================================================

/// Parse and process one inbound text event, returning replies for the
/// sender. Broadcasts to peers happen inside the coordinator.
///
/// Split from the socket loop so tests can exercise dispatch end-to-end
/// without a live transport.
async fn process_inbound_text(
    state: &AppState,
    current_room: &mut Option<String>,
    connection_id: Uuid,
    tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: malformed event dropped");
            return vec![];
        }
    };

    match event {
        ClientEvent::JoinProject { project_id, user } => {
            // Rejoining a different project leaves the first room; rejoining
            // the same project is treated as leave + fresh join.
            if let Some(old_room) = current_room.take() {
                room::leave(state, &old_room, connection_id).await;
            }
            let snapshot = room::join(state, &project_id, connection_id, user, tx.clone()).await;
            *current_room = Some(project_id);
            vec![snapshot]
        }
        event => dispatch_joined(state, current_room.as_deref(), connection_id, event).await,
    }
}

/// Dispatch an event that requires a prior join targeting the same project.
async fn dispatch_joined(
    state: &AppState,
    current_room: Option<&str>,
    connection_id: Uuid,
    event: ClientEvent,
) -> Vec<ServerEvent> {
    let Some(room_id) = current_room else {
        warn!(%connection_id, event_project = event.project_id(), "ws: event before join dropped");
        return vec![];
    };
    if room_id != event.project_id() {
        warn!(
            %connection_id,
            joined = room_id,
            event_project = event.project_id(),
            "ws: event for foreign project dropped"
        );
        return vec![];
    }

    match event {
        ClientEvent::JoinProject { .. } => vec![],
        ClientEvent::CursorMove { x, y, slide_id, .. } => {
            if let Err(e) = room::move_cursor(state, room_id, connection_id, x, y, slide_id).await {
                warn!(%connection_id, error = %e, "ws: cursor-move dropped");
            }
            vec![]
        }
        ClientEvent::SlideChange { slide_id, .. } => {
            if let Err(e) = room::change_slide(state, room_id, connection_id, slide_id).await {
                warn!(%connection_id, error = %e, "ws: slide-change dropped");
            }
            vec![]
        }
        ClientEvent::RequestSlideLock { slide_id, .. } => {
            // Every request resolves to exactly one grant/deny reply; an
            // unknown participant is answered with a denial rather than
            // leaving the client to hit its timeout.
            match room::request_lock(state, room_id, connection_id, slide_id).await {
                Ok(decision) => {
                    if decision.is_granted() {
                        vec![ServerEvent::LockGranted]
                    } else {
                        vec![ServerEvent::LockDenied]
                    }
                }
                Err(e) => {
                    warn!(%connection_id, error = %e, "ws: lock request from unknown participant");
                    vec![ServerEvent::LockDenied]
                }
            }
        }
        ClientEvent::ReleaseSlideLock { slide_id, .. } => {
            room::release_lock(state, room_id, connection_id, slide_id).await;
            vec![]
        }
        ClientEvent::SlideUpdate { slide_id, content, operation, .. } => {
            if let Err(e) = room::relay_update(state, room_id, connection_id, slide_id, content, operation).await {
                warn!(%connection_id, error = %e, "ws: slide-update dropped");
            }
            vec![]
        }
        ClientEvent::ChatMessage { message, .. } => {
            if let Err(e) = room::relay_chat(state, room_id, connection_id, message).await {
                warn!(%connection_id, error = %e, "ws: chat-message dropped");
            }
            vec![]
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
