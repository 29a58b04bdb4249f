use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{albums, handlers, middleware::metrics_middleware, search, snatched, wanted};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Library
        .route("/albums", get(albums::list_albums))
        .route("/albums", post(albums::upsert_album))
        .route("/albums/{id}", get(albums::get_album))
        .route("/albums/{id}/status", put(albums::update_status))
        // Search and snatch
        .route("/albums/{id}/search", post(search::search_album))
        .route("/albums/{id}/candidates", get(search::list_candidates))
        .route("/albums/{id}/snatch", post(search::snatch_candidate))
        // History
        .route("/snatched", get(snatched::list_snatched))
        // Wanted pass
        .route("/wanted/search", post(wanted::run_wanted))
        .route("/scheduler", get(wanted::scheduler_status))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
