//! Common test utilities for in-process API testing with mocks.
//!
//! The fixture wires a real SQLite library to mock providers, a mock NZB
//! backend and a mock payload resolver, then drives the router with
//! `oneshot` requests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use encore_core::{
    config::{DatabaseConfig, ServerConfig},
    download::{BackendHandle, BackendRole, DownloadBackend},
    searcher::ProviderClass,
    testing::{MockBackend, MockPayloadResolver, MockProvider},
    AlbumStore, Config, DownloadDispatcher, HistoryStore, Provider, SelectionPipeline,
    SqliteLibrary,
};
use encore_server::state::AppState;

/// Re-export fixtures for test convenience
pub use encore_core::testing::fixtures;

/// In-process server with controllable collaborators.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub library: Arc<SqliteLibrary>,
    /// Usenet indexer mock
    pub nzb_provider: MockProvider,
    /// Torznab indexer mock
    pub torrent_provider: MockProvider,
    /// The only configured backend; handles NZB candidates
    pub nzb_backend: MockBackend,
    pub resolver: MockPayloadResolver,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            ..Default::default()
        };

        let library = Arc::new(SqliteLibrary::new(&db_path).expect("Failed to open library"));

        let nzb_provider = MockProvider::new("nzbgeek", ProviderClass::Nzb);
        let torrent_provider = MockProvider::new("Jackett_public", ProviderClass::Torrent);
        let nzb_backend = MockBackend::new("mock-nzb", BackendRole::NzbClient);
        nzb_backend
            .set_handle(BackendHandle {
                id: Some("SABnzbd_nzo_1".to_string()),
                name: Some("Foo - Bar".to_string()),
            })
            .await;
        let resolver = MockPayloadResolver::new();

        let history: Arc<dyn HistoryStore> = library.clone();
        let dispatcher = DownloadDispatcher::new(
            Some(Arc::new(nzb_backend.clone()) as Arc<dyn DownloadBackend>),
            None,
            history.clone(),
        );
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(nzb_provider.clone()),
            Arc::new(torrent_provider.clone()),
        ];
        let pipeline = Arc::new(SelectionPipeline::new(
            config.search.clone(),
            providers,
            history.clone(),
            Arc::new(resolver.clone()),
            Arc::new(dispatcher),
        ));

        let albums: Arc<dyn AlbumStore> = library.clone();
        let state = Arc::new(AppState::new(config, albums, history, pipeline));
        let router = encore_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            library,
            nzb_provider,
            torrent_provider,
            nzb_backend,
            resolver,
            temp_dir,
        }
    }

    /// Insert a `Wanted` album released in 2010.
    pub fn add_wanted(&self, album_id: &str, artist: &str, album: &str) {
        self.library
            .upsert_album(&fixtures::album_record(album_id, artist, album))
            .expect("Failed to insert album");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// GET a non-JSON endpoint and return the raw text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
