//! Snatch history handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use encore_core::library::SnatchRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::albums::album_error;
use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListSnatchedParams {
    /// Only rows for this album
    pub album_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListSnatchedResponse {
    pub snatches: Vec<SnatchRecord>,
    pub limit: i64,
}

/// Most recent snatches first
pub async fn list_snatched(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSnatchedParams>,
) -> Result<Json<ListSnatchedResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state
        .history()
        .list_snatches(params.album_id.as_deref(), limit)
    {
        Ok(snatches) => Ok(Json(ListSnatchedResponse { snatches, limit })),
        Err(e) => Err(album_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
