//! HTTP API handlers for rollcall-collator

pub mod attendance;
pub mod health;
pub mod sse;
pub mod streams;

use serde::Serialize;

pub use attendance::attendance_routes;
pub use health::health_routes;
pub use sse::event_stream;
pub use streams::stream_routes;

/// `{"status": "..."}` acknowledgement body
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
