//! Domain services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the coordinator's state transitions so route
//! handlers can stay focused on protocol translation.

pub mod room;
