//! rollcall-collator library
//!
//! Presence ledger fed by live detection streams:
//! - [`ledger`]: concurrent per-entity attendance records
//! - [`registry`]: active stream set with per-stream cancellation
//! - [`ingest`]: reader/committer pair that applies detections to the ledger
//! - [`collator`]: control surface tying the above together
//! - [`api`]: HTTP routes over the control surface

pub mod api;
pub mod collator;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod registry;
pub mod roster;

pub use crate::collator::Collator;
pub use crate::error::{ApiError, ApiResult, CollatorError};

use axum::Router;
use tower_http::trace::TraceLayer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub collator: Collator,
}

impl AppState {
    pub fn new(collator: Collator) -> Self {
        Self { collator }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::attendance_routes())
        .merge(api::stream_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
