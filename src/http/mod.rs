//! HTTP API server for the embedding host (the UI shell)
//!
//! This module provides a REST boundary over the singleton recording manager:
//! - POST /calls/record/start|pause|resume|stop|retry - lifecycle operations
//! - DELETE /calls/record - purge the recording
//! - GET /calls/record/progress - aggregate progress polling
//! - GET|DELETE /calls/record/recovery, POST /calls/record/recovery/resume
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
