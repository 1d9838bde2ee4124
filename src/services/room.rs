//! Room service — the session coordinator.
//!
//! DESIGN
//! ======
//! One room per project, created lazily on the first join and evicted as
//! soon as the last participant leaves. Slide locks are advisory and
//! first-come-first-served: a vacant slide is granted to whoever the
//! check-and-set under the room lock observes first, the loser is denied,
//! and disconnect releases everything the departing connection held.
//!
//! CONCURRENCY
//! ===========
//! Every operation takes the room-map write lock for the duration of one
//! event, mutates, and emits its broadcasts before releasing it, so a
//! grant/deny decision is always on the wire before the next event for the
//! room is processed. Sends are non-blocking `try_send`: a peer whose
//! channel is full drops the event rather than building backlog, which for
//! cursor traffic converges to the latest position.

use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::event::{RoomUser, ServerEvent, UserInfo};
use crate::state::{AppState, COLOR_PALETTE, CursorPos, Participant, Room};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("no room for project: {0}")]
    UnknownRoom(String),
    #[error("connection {connection_id} is not a participant of project {project_id}")]
    UnknownParticipant { project_id: String, connection_id: Uuid },
}

/// Outcome of a lock request. Repeated requests from the current holder are
/// idempotent successes and do not re-broadcast `slide-locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    Granted,
    AlreadyHeld,
    Denied,
}

impl LockDecision {
    #[must_use]
    pub fn is_granted(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Join a project room, creating it if absent. Peers are notified with
/// `user-joined`; the returned `room-state` snapshot (participants including
/// the joiner, plus all held locks) goes to the joiner only.
pub async fn join(
    state: &AppState,
    project_id: &str,
    connection_id: Uuid,
    user: UserInfo,
    tx: mpsc::Sender<ServerEvent>,
) -> ServerEvent {
    let color = user
        .color
        .filter(|c| !c.is_empty())
        .unwrap_or_else(assign_color);
    let participant = Participant::new(user.user_id, user.user_name, color);

    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(project_id.to_string()).or_insert_with(Room::new);

    // Notify existing participants before the joiner's sender is registered.
    broadcast_room(
        room,
        &ServerEvent::UserJoined { socket_id: connection_id, user: participant.clone() },
        None,
    );

    room.participants.insert(connection_id, participant);
    room.senders.insert(connection_id, tx);

    let users = room
        .participants
        .iter()
        .map(|(id, p)| RoomUser { socket_id: *id, user: p.clone() })
        .collect();
    let locks = room.locks.iter().map(|(slide, holder)| (*slide, *holder)).collect();

    info!(%project_id, %connection_id, participants = room.participants.len(), "participant joined room");
    ServerEvent::RoomState { users, locks }
}

/// Leave a room. Releases every lock the connection held (broadcasting
/// `slide-unlocked` for each before `user-left`) and evicts the room when
/// empty. Idempotent: leaving an unknown room or connection is a no-op.
/// Transport-detected disconnects route through this exact path.
pub async fn leave(state: &AppState, project_id: &str, connection_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(project_id) else {
        return;
    };

    room.senders.remove(&connection_id);
    if room.participants.remove(&connection_id).is_none() {
        return;
    }

    let mut released: Vec<i64> = room
        .locks
        .iter()
        .filter(|(_, holder)| **holder == connection_id)
        .map(|(slide, _)| *slide)
        .collect();
    released.sort_unstable();
    for slide_id in released {
        room.locks.remove(&slide_id);
        broadcast_room(room, &ServerEvent::SlideUnlocked { slide_id }, None);
    }

    broadcast_room(room, &ServerEvent::UserLeft { socket_id: connection_id }, None);
    info!(%project_id, %connection_id, remaining = room.participants.len(), "participant left room");

    if room.participants.is_empty() {
        rooms.remove(project_id);
        info!(%project_id, "evicted empty room");
    }
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Update a participant's cursor position and current slide, then broadcast
/// the full updated participant to peers. No acknowledgment to the sender.
pub async fn move_cursor(
    state: &AppState,
    project_id: &str,
    connection_id: Uuid,
    x: f64,
    y: f64,
    slide_id: i64,
) -> Result<(), RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = room_mut(&mut rooms, project_id)?;
    let participant = participant_mut(room, project_id, connection_id)?;

    participant.cursor = Some(CursorPos { x, y });
    participant.current_slide = Some(slide_id);
    participant.touch();
    let snapshot = participant.clone();

    broadcast_room(
        room,
        &ServerEvent::CursorUpdate { socket_id: connection_id, user: snapshot },
        Some(connection_id),
    );
    Ok(())
}

/// Record that a participant navigated to a slide (without a cursor move)
/// and broadcast `user-slide-change` to peers.
pub async fn change_slide(
    state: &AppState,
    project_id: &str,
    connection_id: Uuid,
    slide_id: i64,
) -> Result<(), RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = room_mut(&mut rooms, project_id)?;
    let participant = participant_mut(room, project_id, connection_id)?;

    participant.current_slide = Some(slide_id);
    participant.touch();

    broadcast_room(
        room,
        &ServerEvent::UserSlideChange { socket_id: connection_id, slide_id },
        Some(connection_id),
    );
    Ok(())
}

// =============================================================================
// SLIDE LOCKS
// =============================================================================

/// First-come-first-served lock check-and-set. Resolves synchronously
/// against local state; the caller is answered before the room lock is
/// released, so no decision is ever silently dropped.
pub async fn request_lock(
    state: &AppState,
    project_id: &str,
    connection_id: Uuid,
    slide_id: i64,
) -> Result<LockDecision, RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = room_mut(&mut rooms, project_id)?;
    participant_mut(room, project_id, connection_id)?.touch();

    let decision = match room.locks.get(&slide_id) {
        None => {
            room.locks.insert(slide_id, connection_id);
            broadcast_room(
                room,
                &ServerEvent::SlideLocked { slide_id, socket_id: connection_id },
                Some(connection_id),
            );
            LockDecision::Granted
        }
        Some(holder) if *holder == connection_id => LockDecision::AlreadyHeld,
        Some(_) => LockDecision::Denied,
    };
    Ok(decision)
}

/// Release a lock if and only if the caller holds it. Releasing a foreign
/// or absent lock is intentionally silent: races between release-on-navigate
/// and another participant's grant are expected and harmless.
pub async fn release_lock(state: &AppState, project_id: &str, connection_id: Uuid, slide_id: i64) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(project_id) else {
        return;
    };
    if let Some(participant) = room.participants.get_mut(&connection_id) {
        participant.touch();
    }

    if room.locks.get(&slide_id) == Some(&connection_id) {
        room.locks.remove(&slide_id);
        broadcast_room(room, &ServerEvent::SlideUnlocked { slide_id }, None);
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Relay a slide content update to peers verbatim. The coordinator does not
/// interpret, merge, or persist the payload; conflict resolution belongs to
/// the storage layer listening on its own connection.
pub async fn relay_update(
    state: &AppState,
    project_id: &str,
    connection_id: Uuid,
    slide_id: i64,
    content: serde_json::Value,
    operation: Option<serde_json::Value>,
) -> Result<(), RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = room_mut(&mut rooms, project_id)?;
    participant_mut(room, project_id, connection_id)?.touch();

    broadcast_room(
        room,
        &ServerEvent::SlideSynced { slide_id, content, operation, author: connection_id },
        Some(connection_id),
    );
    Ok(())
}

/// Relay a chat message to peers, stamped with the sender's participant
/// record as the coordinator knows it and an ISO-8601 timestamp.
pub async fn relay_chat(
    state: &AppState,
    project_id: &str,
    connection_id: Uuid,
    message: String,
) -> Result<(), RoomError> {
    let mut rooms = state.rooms.write().await;
    let room = room_mut(&mut rooms, project_id)?;
    let participant = participant_mut(room, project_id, connection_id)?;
    participant.touch();
    let user = participant.clone();

    broadcast_room(
        room,
        &ServerEvent::ChatMessage {
            socket_id: connection_id,
            user,
            message,
            timestamp: now_rfc3339(),
        },
        Some(connection_id),
    );
    Ok(())
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// One participant in a diagnostics snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub socket_id: Uuid,
    pub user_id: i64,
    pub user_name: String,
    pub current_slide: Option<i64>,
    pub idle_seconds: u64,
}

/// Point-in-time view of one room for the admin "who's editing what" view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub project_id: String,
    pub participants: Vec<ParticipantSummary>,
    pub locks: Vec<(i64, Uuid)>,
}

/// Snapshot every live room. Returns owned data, never live references, so
/// diagnostics cannot observe a room mid-mutation.
pub async fn list_rooms(state: &AppState) -> Vec<RoomSummary> {
    let rooms = state.rooms.read().await;
    let mut summaries: Vec<RoomSummary> = rooms
        .iter()
        .map(|(project_id, room)| RoomSummary {
            project_id: project_id.clone(),
            participants: room
                .participants
                .iter()
                .map(|(id, p)| ParticipantSummary {
                    socket_id: *id,
                    user_id: p.user_id,
                    user_name: p.user_name.clone(),
                    current_slide: p.current_slide,
                    idle_seconds: p.last_activity_at.elapsed().as_secs(),
                })
                .collect(),
            locks: room.locks.iter().map(|(slide, holder)| (*slide, *holder)).collect(),
        })
        .collect();
    summaries.sort_by(|a, b| a.project_id.cmp(&b.project_id));
    summaries
}

// =============================================================================
// HELPERS
// =============================================================================

/// Send an event to every sender in a room, optionally excluding one
/// connection. Best-effort: a full channel drops the event for that peer.
fn broadcast_room(room: &Room, event: &ServerEvent, exclude: Option<Uuid>) {
    for (connection_id, tx) in &room.senders {
        if exclude == Some(*connection_id) {
            continue;
        }
        let _ = tx.try_send(event.clone());
    }
}

fn room_mut<'a>(
    rooms: &'a mut std::collections::HashMap<String, Room>,
    project_id: &str,
) -> Result<&'a mut Room, RoomError> {
    rooms
        .get_mut(project_id)
        .ok_or_else(|| RoomError::UnknownRoom(project_id.to_string()))
}

fn participant_mut<'a>(
    room: &'a mut Room,
    project_id: &str,
    connection_id: Uuid,
) -> Result<&'a mut Participant, RoomError> {
    room.participants
        .get_mut(&connection_id)
        .ok_or_else(|| RoomError::UnknownParticipant { project_id: project_id.to_string(), connection_id })
}

fn assign_color() -> String {
    let idx = rand::rng().random_range(0..COLOR_PALETTE.len());
    COLOR_PALETTE[idx].to_string()
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
