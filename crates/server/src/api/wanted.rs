//! Wanted-album pass and scheduler status.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use encore_core::selection::WantedReport;
use serde::Serialize;
use std::sync::Arc;

use super::albums::album_error;
use crate::scheduler::SchedulerStatus;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WantedRunResponse {
    pub reports: Vec<WantedReport>,
}

/// Search every wanted album now
pub async fn run_wanted(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WantedRunResponse>, impl IntoResponse> {
    match state.scheduler().run_now().await {
        Ok(reports) => Ok(Json(WantedRunResponse { reports })),
        Err(e) => Err(album_error(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler().status().await)
}
