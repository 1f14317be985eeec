//! Attendance API handlers
//!
//! Roster upload, manual check-in/toggle, counts and snapshot export.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::StatusResponse;
use crate::error::{ApiError, ApiResult};
use crate::ledger::AttendanceCount;
use crate::AppState;

/// `?name=` query for per-entity operations
#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

/// POST /api/roster response
#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub status: &'static str,
    pub loaded: usize,
}

/// POST /api/roster
///
/// Body is the raw roster JSON document. Replaces the ledger contents.
pub async fn load_roster(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<RosterResponse>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("roster document is empty".to_string()));
    }

    let loaded = state.collator.load_roster(&body).await?;
    info!("Loaded data from roster upload");

    Ok(Json(RosterResponse {
        status: "ok",
        loaded,
    }))
}

/// POST /api/attendance/toggle?name=
///
/// Unknown names are ignored.
pub async fn toggle_attendance(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Json<StatusResponse> {
    state.collator.toggle(&query.name).await;
    Json(StatusResponse::ok())
}

/// POST /api/attendance/check-in?name=
///
/// Same effect as a stream detection. Unknown names are ignored.
pub async fn check_in(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Json<StatusResponse> {
    state.collator.check_in(&query.name).await;
    Json(StatusResponse::ok())
}

/// GET /api/attendance/count
pub async fn get_count(State(state): State<AppState>) -> Json<AttendanceCount> {
    Json(state.collator.count().await)
}

/// GET /api/attendance
///
/// Returns the snapshot document and persists it to the snapshot file.
/// A failed write is logged; the export is still returned.
pub async fn fetch_attendance(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.collator.export_snapshot().await?;

    if let Err(e) = state.collator.persist_snapshot(&snapshot).await {
        warn!(
            path = %state.collator.snapshot_path().display(),
            error = %e,
            "Failed to persist snapshot"
        );
    }

    Ok(([(header::CONTENT_TYPE, "application/json")], snapshot))
}

/// Build attendance routes
pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/roster", post(load_roster))
        .route("/api/attendance", get(fetch_attendance))
        .route("/api/attendance/count", get(get_count))
        .route("/api/attendance/toggle", post(toggle_attendance))
        .route("/api/attendance/check-in", post(check_in))
}
