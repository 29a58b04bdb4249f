//! Periodic search for every wanted album.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{error, info, warn};

use encore_core::selection::{WantedReport, WantedResult};
use encore_core::WantedSearch;

use crate::metrics::{WANTED_RUNS_TOTAL, WANTED_SCHEDULER_RUNNING};

/// Summary of the most recent pass.
#[derive(Debug, Clone, Serialize)]
pub struct WantedRunSummary {
    pub finished_at: DateTime<Utc>,
    pub albums: usize,
    pub searched: usize,
    pub snatched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WantedRunSummary {
    fn from_reports(reports: &[WantedReport]) -> Self {
        let searched: Vec<_> = reports
            .iter()
            .filter_map(|r| match &r.result {
                WantedResult::Searched { outcome } => Some(outcome),
                WantedResult::Skipped { .. } => None,
            })
            .collect();
        Self {
            finished_at: Utc::now(),
            albums: reports.len(),
            searched: searched.len(),
            snatched: searched.iter().filter(|o| o.is_snatched()).count(),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            finished_at: Utc::now(),
            albums: 0,
            searched: 0,
            snatched: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_minutes: u64,
    pub last_run: Option<WantedRunSummary>,
}

/// Runs `WantedSearch::run_once` every interval until stopped.
///
/// Passes never overlap: a manual run and a scheduled one share one lock.
pub struct WantedScheduler {
    search: Arc<WantedSearch>,
    interval: Duration,
    running: Arc<AtomicBool>,
    pass_lock: Arc<Mutex<()>>,
    last_run: Arc<RwLock<Option<WantedRunSummary>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WantedScheduler {
    pub fn new(search: Arc<WantedSearch>, interval_minutes: u64) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            search,
            interval: Duration::from_secs(interval_minutes.max(1) * 60),
            running: Arc::new(AtomicBool::new(false)),
            pass_lock: Arc::new(Mutex::new(())),
            last_run: Arc::new(RwLock::new(None)),
            shutdown_tx,
        }
    }

    /// Override the interval (tests use milliseconds).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Wanted scheduler already running");
            return;
        }
        WANTED_SCHEDULER_RUNNING.set(1);

        let search = Arc::clone(&self.search);
        let running = Arc::clone(&self.running);
        let pass_lock = Arc::clone(&self.pass_lock);
        let last_run = Arc::clone(&self.last_run);
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Wanted scheduler started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Wanted scheduler received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::pass(&search, &pass_lock, &last_run, "scheduled").await;
                    }
                }
            }
            info!("Wanted scheduler stopped");
        });
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        WANTED_SCHEDULER_RUNNING.set(0);
        let _ = self.shutdown_tx.send(());
    }

    /// Run one pass now, waiting for any pass already in progress.
    pub async fn run_now(&self) -> Result<Vec<WantedReport>, String> {
        Self::pass(&self.search, &self.pass_lock, &self.last_run, "manual").await
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            interval_minutes: self.interval.as_secs() / 60,
            last_run: self.last_run.read().await.clone(),
        }
    }

    async fn pass(
        search: &WantedSearch,
        pass_lock: &Mutex<()>,
        last_run: &RwLock<Option<WantedRunSummary>>,
        trigger: &str,
    ) -> Result<Vec<WantedReport>, String> {
        let _guard = pass_lock.lock().await;

        match search.run_once().await {
            Ok(reports) => {
                let summary = WantedRunSummary::from_reports(&reports);
                info!(
                    trigger,
                    albums = summary.albums,
                    snatched = summary.snatched,
                    "Wanted pass complete"
                );
                WANTED_RUNS_TOTAL.with_label_values(&["ok"]).inc();
                *last_run.write().await = Some(summary);
                Ok(reports)
            }
            Err(e) => {
                error!(trigger, error = %e, "Wanted pass failed");
                WANTED_RUNS_TOTAL.with_label_values(&["error"]).inc();
                *last_run.write().await = Some(WantedRunSummary::failed(e.to_string()));
                Err(e.to_string())
            }
        }
    }
}
