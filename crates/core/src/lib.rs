pub mod config;
pub mod download;
pub mod library;
pub mod metrics;
pub mod notify;
pub mod payload;
pub mod searcher;
pub mod selection;
pub mod session;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    SearchPreferences,
};
pub use download::{build_backends, DownloadBackend, DownloadDispatcher, DownloadOutcome};
pub use library::{AlbumRecord, AlbumRequest, AlbumStore, HistoryStore, SqliteLibrary};
pub use notify::{build_notifiers, create_notification_system, NotifyHandle};
pub use payload::{HttpPayloadResolver, PayloadResolver};
pub use searcher::{CandidateKind, CandidateRecord, NewznabProvider, Provider, TorznabProvider};
pub use selection::{SearchMode, SearchOutcome, SelectionPipeline, WantedSearch};
pub use session::SessionCache;
