//! Library album handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use encore_core::library::{AlbumFilter, AlbumRecord, AlbumStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// Maximum allowed limit for album queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for album queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for adding or replacing an album
#[derive(Debug, Deserialize)]
pub struct UpsertAlbumBody {
    pub album_id: String,
    pub artist_name: String,
    pub album_title: String,
    pub release_date: Option<String>,
    pub album_type: Option<String>,
    pub duration_ms: Option<u64>,
    /// Literal search term overriding the derived one
    pub search_term: Option<String>,
    /// Defaults to `Wanted`
    pub status: Option<AlbumStatus>,
}

/// Request body for changing an album's status
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: AlbumStatus,
}

/// Query parameters for listing albums
#[derive(Debug, Deserialize)]
pub struct ListAlbumsParams {
    /// Filter by status, e.g. `Wanted` or `Wanted Lossless`
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListAlbumsResponse {
    pub albums: Vec<AlbumRecord>,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct AlbumErrorResponse {
    pub error: String,
}

pub(crate) fn album_error(
    status: StatusCode,
    error: impl Into<String>,
) -> (StatusCode, Json<AlbumErrorResponse>) {
    (
        status,
        Json(AlbumErrorResponse {
            error: error.into(),
        }),
    )
}

/// Look up an album or produce the 404/500 response.
pub(crate) fn load_album(
    state: &AppState,
    id: &str,
) -> Result<AlbumRecord, (StatusCode, Json<AlbumErrorResponse>)> {
    match state.albums().get_album(id) {
        Ok(Some(album)) => Ok(album),
        Ok(None) => Err(album_error(
            StatusCode::NOT_FOUND,
            format!("Album not found: {}", id),
        )),
        Err(e) => Err(album_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Add an album to the library, or replace it
pub async fn upsert_album(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertAlbumBody>,
) -> Result<(StatusCode, Json<AlbumRecord>), impl IntoResponse> {
    for (field, value) in [
        ("album_id", &body.album_id),
        ("artist_name", &body.artist_name),
        ("album_title", &body.album_title),
    ] {
        if value.trim().is_empty() {
            return Err(album_error(
                StatusCode::BAD_REQUEST,
                format!("{} cannot be empty", field),
            ));
        }
    }

    let album = AlbumRecord {
        album_id: body.album_id,
        artist_name: body.artist_name,
        album_title: body.album_title,
        release_date: body.release_date,
        album_type: body.album_type,
        duration_ms: body.duration_ms,
        search_term: body.search_term.filter(|t| !t.trim().is_empty()),
        status: body.status.unwrap_or(AlbumStatus::Wanted),
    };

    match state.albums().upsert_album(&album) {
        Ok(()) => Ok((StatusCode::CREATED, Json(album))),
        Err(e) => Err(album_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Get an album by id
pub async fn get_album(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AlbumRecord>, impl IntoResponse> {
    load_album(&state, &id).map(Json)
}

/// List albums with an optional status filter
pub async fn list_albums(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAlbumsParams>,
) -> Result<Json<ListAlbumsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = AlbumFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        match AlbumStatus::parse(status) {
            Some(status) => filter = filter.with_status(status),
            None => {
                return Err(album_error(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown album status: {}", status),
                ))
            }
        }
    }

    match state.albums().list_albums(&filter) {
        Ok(albums) => Ok(Json(ListAlbumsResponse {
            albums,
            limit,
            offset,
        })),
        Err(e) => Err(album_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Change an album's status, e.g. mark it wanted again
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<AlbumRecord>, impl IntoResponse> {
    let mut album = match load_album(&state, &id) {
        Ok(album) => album,
        Err(e) => return Err(e),
    };
    album.status = body.status;

    match state.albums().upsert_album(&album) {
        Ok(()) => Ok(Json(album)),
        Err(e) => Err(album_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
