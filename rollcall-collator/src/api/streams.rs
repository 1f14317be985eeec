//! Detection stream API handlers
//!
//! POST /api/streams, DELETE /api/streams?url=, GET /api/streams

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StatusResponse;
use crate::error::ApiResult;
use crate::registry::{StartOutcome, StreamDescriptor};
use crate::AppState;

/// POST /api/streams request
#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub url: String,
    pub update_interval_ms: u64,
}

/// POST /api/streams response
#[derive(Debug, Serialize)]
pub struct StartStreamResponse {
    /// `started` or `already_running`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<Uuid>,
}

/// `?url=` query for DELETE /api/streams
#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

/// One entry of GET /api/streams
#[derive(Debug, Serialize)]
pub struct StreamSummary {
    pub id: Uuid,
    pub url: String,
    pub update_interval_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl From<StreamDescriptor> for StreamSummary {
    fn from(stream: StreamDescriptor) -> Self {
        Self {
            id: stream.id,
            url: stream.url,
            update_interval_ms: u64::try_from(stream.update_interval.as_millis()).unwrap_or(u64::MAX),
            started_at: stream.started_at,
        }
    }
}

/// POST /api/streams
///
/// Starting a URL that is already streaming is not an error.
pub async fn start_stream(
    State(state): State<AppState>,
    Json(request): Json<StartStreamRequest>,
) -> ApiResult<Json<StartStreamResponse>> {
    let outcome = state
        .collator
        .start_stream(&request.url, request.update_interval_ms)
        .await?;

    let response = match outcome {
        StartOutcome::Started(handle) => StartStreamResponse {
            status: "started",
            stream_id: Some(handle.id),
        },
        StartOutcome::AlreadyRunning => StartStreamResponse {
            status: "already_running",
            stream_id: None,
        },
    };
    Ok(Json(response))
}

/// DELETE /api/streams?url=
///
/// Unknown URLs are a no-op.
pub async fn stop_stream(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Json<StatusResponse> {
    state.collator.stop_stream(&query.url).await;
    Json(StatusResponse::ok())
}

/// GET /api/streams
pub async fn list_streams(State(state): State<AppState>) -> Json<Vec<StreamSummary>> {
    let streams = state.collator.streams().await;
    Json(streams.into_iter().map(StreamSummary::from).collect())
}

/// Build stream routes
pub fn stream_routes() -> Router<AppState> {
    Router::new().route(
        "/api/streams",
        get(list_streams).post(start_stream).delete(stop_stream),
    )
}
