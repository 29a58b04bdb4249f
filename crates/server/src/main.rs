use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_core::{
    build_backends, build_notifiers, create_notification_system, load_config, validate_config,
    AlbumStore, DownloadDispatcher, HistoryStore, HttpPayloadResolver, NewznabProvider,
    PayloadResolver, Provider, SelectionPipeline, SessionCache, SqliteLibrary, TorznabProvider,
};

use encore_server::api::create_router;
use encore_server::state::AppState;

/// How long to wait for queued notifications after shutdown
const NOTIFY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ENCORE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(config_hash = &config_hash[..16], "Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    let timeout_secs = config.search.timeout_secs;

    // Library and snatch history share one database
    let library = Arc::new(
        SqliteLibrary::new(&config.database.path).context("Failed to open library database")?,
    );
    let albums: Arc<dyn AlbumStore> = library.clone();
    let history: Arc<dyn HistoryStore> = library.clone();

    // Providers, in configuration order
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    for p in config.providers.newznab.iter().filter(|p| p.enabled) {
        info!("Initializing Newznab provider {} at {}", p.id, p.url);
        providers.push(Arc::new(
            NewznabProvider::new(p.clone(), timeout_secs)
                .with_context(|| format!("Failed to create provider {}", p.id))?,
        ));
    }
    for p in config.providers.torznab.iter().filter(|p| p.enabled) {
        info!("Initializing Torznab provider {} ({})", p.id, p.indexer);
        providers.push(Arc::new(
            TorznabProvider::new(p.clone(), timeout_secs)
                .with_context(|| format!("Failed to create provider {}", p.id))?,
        ));
    }
    if providers.is_empty() {
        warn!("No providers enabled; searches will find nothing");
    }

    // Download backends
    let sessions = Arc::new(SessionCache::new());
    let backends = build_backends(&config.download, sessions, timeout_secs)
        .await
        .context("Failed to initialize download backends")?;
    match (&backends.nzb, &backends.torrent) {
        (None, None) => warn!("No download backend configured; nothing can be snatched"),
        (nzb, torrent) => info!(
            nzb = nzb.as_ref().map(|b| b.name()).unwrap_or("none"),
            torrent = torrent.as_ref().map(|b| b.name()).unwrap_or("none"),
            "Download backends ready"
        ),
    }

    let resolver: Arc<dyn PayloadResolver> = Arc::new(
        HttpPayloadResolver::new(&config.providers, timeout_secs)
            .context("Failed to create payload resolver")?,
    );

    // Notifications
    let notifiers = build_notifiers(&config.notifications, timeout_secs)
        .context("Failed to create notifiers")?;
    info!("{} notification channel(s) configured", notifiers.len());
    let (notify, notify_worker) =
        create_notification_system(notifiers, config.notifications.buffer_size);
    let worker_handle = tokio::spawn(notify_worker.run());

    let dispatcher = DownloadDispatcher::new(backends.nzb, backends.torrent, history.clone())
        .with_notifications(notify)
        .with_seed_ratios(config.providers.seed_ratios())
        .with_post_submit(&config.download);

    let pipeline = Arc::new(SelectionPipeline::new(
        config.search.clone(),
        providers,
        history.clone(),
        resolver,
        Arc::new(dispatcher),
    ));

    let state = Arc::new(AppState::new(config.clone(), albums, history, pipeline));

    if config.scheduler.enabled {
        state.scheduler().start();
    } else {
        info!("Wanted scheduler disabled in config");
    }

    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    state.scheduler().stop();

    // The dispatcher inside the state holds the last notify handle.
    drop(state);
    if tokio::time::timeout(NOTIFY_DRAIN_TIMEOUT, worker_handle)
        .await
        .is_err()
    {
        warn!("Notification worker did not drain in time");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
