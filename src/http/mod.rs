//! HTTP control surface
//!
//! Stands in for the floating control window: start/stop recording, relay
//! fire-and-forget control commands, and expose status and transcript.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
