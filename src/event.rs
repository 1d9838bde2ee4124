//! Event — the wire contract for `SlideCollab`.
//!
//! ARCHITECTURE
//! ============
//! Every message is a JSON object tagged by an `event` field. Clients send
//! `ClientEvent`s over WebSocket, the server dispatches on the variant in a
//! single match, and `ServerEvent`s flow back out. Event names are
//! kebab-case and payload fields camelCase — this shape is consumed by the
//! existing slide-editor front end and must not drift.
//!
//! DESIGN
//! ======
//! - `lock-granted` / `lock-denied` carry no payload: the requesting client
//!   correlates them with its own pending lock request.
//! - `room-state` goes only to the joining connection; everything else that
//!   leaves the server is a room broadcast excluding the originator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::Participant;

// =============================================================================
// INBOUND
// =============================================================================

/// User identity attached to a join. Verified upstream by the auth layer;
/// trusted as-is here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: i64,
    pub user_name: String,
    /// Preferred presence color. Assigned server-side from the palette
    /// when absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
}

/// Events a client may send. Unknown event names fail to parse and are
/// dropped with a logged warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinProject {
        project_id: String,
        user: UserInfo,
    },
    CursorMove {
        project_id: String,
        x: f64,
        y: f64,
        slide_id: i64,
    },
    SlideChange {
        project_id: String,
        slide_id: i64,
    },
    RequestSlideLock {
        project_id: String,
        slide_id: i64,
    },
    ReleaseSlideLock {
        project_id: String,
        slide_id: i64,
    },
    SlideUpdate {
        project_id: String,
        slide_id: i64,
        content: serde_json::Value,
        #[serde(default)]
        operation: Option<serde_json::Value>,
    },
    ChatMessage {
        project_id: String,
        message: String,
        /// Sender identity as the client sees it. The server relays the
        /// participant it has on record instead.
        #[serde(default)]
        user: Option<UserInfo>,
    },
}

impl ClientEvent {
    /// The project this event targets. Every inbound event carries one.
    #[must_use]
    pub fn project_id(&self) -> &str {
        match self {
            Self::JoinProject { project_id, .. }
            | Self::CursorMove { project_id, .. }
            | Self::SlideChange { project_id, .. }
            | Self::RequestSlideLock { project_id, .. }
            | Self::ReleaseSlideLock { project_id, .. }
            | Self::SlideUpdate { project_id, .. }
            | Self::ChatMessage { project_id, .. } => project_id,
        }
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// One room-state entry: a participant plus the connection that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub socket_id: Uuid,
    #[serde(flatten)]
    pub user: Participant,
}

/// Events the server emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent once on upgrade so the client learns its connection ID.
    Connected {
        socket_id: Uuid,
    },
    /// Full snapshot for a joining connection: every participant currently
    /// in the room (the joiner included) and every held lock.
    RoomState {
        users: Vec<RoomUser>,
        locks: Vec<(i64, Uuid)>,
    },
    UserJoined {
        socket_id: Uuid,
        user: Participant,
    },
    UserLeft {
        socket_id: Uuid,
    },
    CursorUpdate {
        socket_id: Uuid,
        user: Participant,
    },
    UserSlideChange {
        socket_id: Uuid,
        slide_id: i64,
    },
    SlideLocked {
        slide_id: i64,
        socket_id: Uuid,
    },
    SlideUnlocked {
        slide_id: i64,
    },
    LockGranted,
    LockDenied,
    SlideSynced {
        slide_id: i64,
        content: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        operation: Option<serde_json::Value>,
        author: Uuid,
    },
    ChatMessage {
        socket_id: Uuid,
        user: Participant,
        message: String,
        timestamp: String,
    },
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
