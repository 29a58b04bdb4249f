use std::sync::Arc;

use encore_core::{
    AlbumStore, Config, HistoryStore, SanitizedConfig, SelectionPipeline, WantedSearch,
};

use crate::scheduler::WantedScheduler;

/// Shared application state
pub struct AppState {
    config: Config,
    albums: Arc<dyn AlbumStore>,
    history: Arc<dyn HistoryStore>,
    pipeline: Arc<SelectionPipeline>,
    /// Always present; only started when `[scheduler] enabled` is set.
    scheduler: Arc<WantedScheduler>,
}

impl AppState {
    pub fn new(
        config: Config,
        albums: Arc<dyn AlbumStore>,
        history: Arc<dyn HistoryStore>,
        pipeline: Arc<SelectionPipeline>,
    ) -> Self {
        let wanted = Arc::new(WantedSearch::new(Arc::clone(&albums), Arc::clone(&pipeline)));
        let scheduler = Arc::new(WantedScheduler::new(
            wanted,
            config.scheduler.interval_minutes,
        ));
        Self {
            config,
            albums,
            history,
            pipeline,
            scheduler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn albums(&self) -> &dyn AlbumStore {
        self.albums.as_ref()
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    pub fn pipeline(&self) -> &SelectionPipeline {
        self.pipeline.as_ref()
    }

    pub fn scheduler(&self) -> &Arc<WantedScheduler> {
        &self.scheduler
    }
}
