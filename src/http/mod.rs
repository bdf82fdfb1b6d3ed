//! HTTP API consumed by the UI:
//! - POST /transcribe - artifact in, text out (mode is server config)
//! - POST /notes - persist a note with optional annotation fields
//! - GET  /notes?owner_id= - list an owner's notes
//! - POST /identity - allocate a new owner identity
//! - GET  /identity/stats - sequence pool usage
//! - GET  /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
