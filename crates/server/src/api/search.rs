//! Manual search, candidate listing and explicit snatch.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use encore_core::library::{AlbumRecord, QualityTier};
use encore_core::{AlbumRequest, CandidateRecord, SearchMode, SearchOutcome};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::albums::load_album;
use crate::state::AppState;

/// Query parameters shared by search and candidate listing
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Overrides the configured tier for this search only
    pub quality: Option<QualityTier>,
}

fn manual_request(state: &AppState, album: &AlbumRecord, params: &SearchParams) -> AlbumRequest {
    let tier = params
        .quality
        .unwrap_or(state.pipeline().preferences().quality);
    // user-triggered, so previously snatched releases stay eligible
    AlbumRequest::from_record(album, tier, false)
}

/// Search now and snatch the best release
pub async fn search_album(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchOutcome>, impl IntoResponse> {
    let album = match load_album(&state, &id) {
        Ok(album) => album,
        Err(e) => return Err(e),
    };
    let request = manual_request(&state, &album, &params);

    info!(album_id = %id, tier = request.quality.as_str(), "Manual search requested");
    let outcome = state.pipeline().search(&request, SearchMode::Automatic).await;
    Ok(Json(outcome))
}

/// List every release matching the album without snatching anything
pub async fn list_candidates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchOutcome>, impl IntoResponse> {
    let album = match load_album(&state, &id) {
        Ok(album) => album,
        Err(e) => return Err(e),
    };
    let request = manual_request(&state, &album, &params);

    let outcome = state
        .pipeline()
        .search(&request, SearchMode::ChooseSpecific)
        .await;
    Ok(Json(outcome))
}

/// Snatch a release the user picked from the candidate list
pub async fn snatch_candidate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(candidate): Json<CandidateRecord>,
) -> Result<Json<SearchOutcome>, impl IntoResponse> {
    let album = match load_album(&state, &id) {
        Ok(album) => album,
        Err(e) => return Err(e),
    };
    let request = manual_request(&state, &album, &SearchParams::default());

    info!(album_id = %id, title = %candidate.title, "Manual snatch requested");
    let outcome = state.pipeline().snatch(&request, candidate).await;
    Ok(Json(outcome))
}
