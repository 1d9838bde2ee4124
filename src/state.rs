//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the live room map: one `Room` per project, created lazily on
//! first join and evicted as soon as the last participant leaves. Rooms
//! and their participant/lock maps are owned exclusively by the
//! coordinator in `services::room`; everything else reads them through
//! snapshot accessors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::event::ServerEvent;

// =============================================================================
// COLOR PALETTE
// =============================================================================

/// Presence colors assigned to participants. Collision-tolerant: two
/// participants in the same room may share a color.
pub const COLOR_PALETTE: [&str; 6] = [
    "#3B82F6", // blue
    "#10B981", // green
    "#F59E0B", // amber
    "#EF4444", // red
    "#8B5CF6", // purple
    "#EC4899", // pink
];

// =============================================================================
// PARTICIPANT
// =============================================================================

/// Last-known pointer position, in coordinates relative to the slide canvas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CursorPos {
    pub x: f64,
    pub y: f64,
}

/// One connected editing session within a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: i64,
    pub user_name: String,
    /// Presence color (hex). Stable for the lifetime of the connection.
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cursor: Option<CursorPos>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_slide: Option<i64>,
    /// Refreshed on every inbound event from this connection. Monotonic,
    /// never sent over the wire; diagnostics report it as idle seconds.
    #[serde(skip, default = "Instant::now")]
    pub last_activity_at: Instant,
}

impl Participant {
    #[must_use]
    pub fn new(user_id: i64, user_name: String, color: String) -> Self {
        Self { user_id, user_name, color, cursor: None, current_slide: None, last_activity_at: Instant::now() }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// Per-project live state. Exists only while at least one participant is
/// connected; a process restart loses all rooms, locks, and presence (locks
/// are advisory UX aids, not a correctness mechanism).
pub struct Room {
    /// Connected participants keyed by connection ID.
    pub participants: HashMap<Uuid, Participant>,
    /// Slide locks: `slide_id` -> connection ID of the holder. A slide
    /// appears here only while its holder is in `participants`.
    pub locks: HashMap<i64, Uuid>,
    /// Outbound channels: connection ID -> sender for server events.
    pub senders: HashMap<Uuid, mpsc::Sender<ServerEvent>>,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self { participants: HashMap::new(), locks: HashMap::new(), senders: HashMap::new() }
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — the room map is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
