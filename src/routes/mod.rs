//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The coordinator itself exposes no HTTP surface; it is reached only over
//! the WebSocket at `/ws`. The routes here are the hosting shell's:
//! liveness and a read-only diagnostics view built from room snapshots.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::services::room;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/rooms", get(rooms_index))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Admin "who's editing what" view. Reads only snapshots, never live room
/// references.
async fn rooms_index(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Vec<room::RoomSummary>> {
    Json(room::list_rooms(&state).await)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
