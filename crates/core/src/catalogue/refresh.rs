use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalogue::cache::{dedup_catalogue, CacheOrigin, CatalogueCache, CatalogueView, RestoreOutcome};
use crate::catalogue::normalize::{country_names, Normalizer};
use crate::catalogue::raw::RawBundle;
use crate::catalogue::snapshot::{SnapshotStore, DEFAULT_SNAPSHOT_KEY};
use crate::catalogue::upstream::{CatalogueSource, UpstreamError};
use crate::config::CatalogueConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshSettings {
    pub cache_ttl: Duration,
    pub page_delay: Duration,
    pub page_retry_delay: Duration,
    pub bootstrap_retry: Duration,
    pub misconfigured_retry: Duration,
    pub watchdog: Duration,
    pub force_rebuild: bool,
    pub snapshot_key: String,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(1800),
            page_delay: Duration::from_millis(500),
            page_retry_delay: Duration::from_secs(2),
            bootstrap_retry: Duration::from_secs(60),
            misconfigured_retry: Duration::from_secs(300),
            watchdog: Duration::from_secs(900),
            force_rebuild: false,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

impl From<&CatalogueConfig> for RefreshSettings {
    fn from(config: &CatalogueConfig) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            page_delay: Duration::from_millis(config.page_delay_ms),
            page_retry_delay: Duration::from_millis(config.page_retry_delay_ms),
            bootstrap_retry: Duration::from_secs(config.bootstrap_retry_secs),
            misconfigured_retry: Duration::from_secs(config.misconfigured_retry_secs),
            watchdog: Duration::from_secs(config.watchdog_secs),
            force_rebuild: config.force_rebuild,
            snapshot_key: config.snapshot_key.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("catalogue source is not configured: {0}")]
    Misconfigured(UpstreamError),
    #[error("bootstrap page could not be loaded: {0}")]
    Bootstrap(UpstreamError),
    #[error("refresh cycle exceeded watchdog of {0:?}")]
    Watchdog(Duration),
    #[error("catalogue produced no usable packages from {bundles} bundles")]
    EmptyCatalogue { bundles: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub pages: u32,
    pub bundles: usize,
    pub packages: usize,
    pub seeded: bool,
    pub persisted: bool,
}

/// Loads the upstream catalogue into the shared cache, one cycle at a time.
pub struct CatalogueRefresher {
    source: Arc<dyn CatalogueSource>,
    store: Arc<dyn SnapshotStore>,
    cache: Arc<CatalogueCache>,
    normalizer: Arc<Normalizer>,
    settings: RefreshSettings,
}

impl CatalogueRefresher {
    pub fn new(
        source: Arc<dyn CatalogueSource>,
        store: Arc<dyn SnapshotStore>,
        cache: Arc<CatalogueCache>,
        normalizer: Arc<Normalizer>,
        settings: RefreshSettings,
    ) -> Self {
        Self { source, store, cache, normalizer, settings }
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    pub fn cache(&self) -> Arc<CatalogueCache> {
        self.cache.clone()
    }

    /// Restores the persisted catalogue into the cache. Storage failures are
    /// logged and treated as an absent snapshot.
    pub async fn restore_snapshot(&self) -> Option<RestoreOutcome> {
        let key = self.settings.snapshot_key.as_str();

        if self.settings.force_rebuild {
            let deleted = self.delete_snapshot().await;
            info!(
                event_name = "catalogue.snapshot.skipped",
                snapshot_key = key,
                deleted,
                "forced rebuild requested; ignoring stored catalogue snapshot"
            );
            return None;
        }

        match self.store.get(key).await {
            Ok(Some(snapshot)) => {
                let outcome = self.cache.restore(snapshot).await;
                info!(
                    event_name = "catalogue.snapshot.restored",
                    snapshot_key = key,
                    packages = outcome.packages,
                    stale = outcome.stale,
                    "restored catalogue snapshot"
                );
                Some(outcome)
            }
            Ok(None) => {
                info!(
                    event_name = "catalogue.snapshot.missing",
                    snapshot_key = key,
                    "no catalogue snapshot stored"
                );
                None
            }
            Err(error) => {
                warn!(
                    event_name = "catalogue.snapshot.load_failed",
                    snapshot_key = key,
                    error = %error,
                    "catalogue snapshot could not be loaded; continuing without it"
                );
                None
            }
        }
    }

    pub async fn delete_snapshot(&self) -> bool {
        match self.store.delete(&self.settings.snapshot_key).await {
            Ok(deleted) => deleted,
            Err(error) => {
                warn!(
                    event_name = "catalogue.snapshot.delete_failed",
                    snapshot_key = %self.settings.snapshot_key,
                    error = %error,
                    "catalogue snapshot could not be deleted"
                );
                false
            }
        }
    }

    /// Runs one full load: bootstrap page, paced pagination, then finalize.
    pub async fn run_cycle(&self, correlation_id: &str) -> Result<CycleReport, CycleError> {
        if !self.source.is_configured() {
            return Err(CycleError::Misconfigured(UpstreamError::NotConfigured(
                "upstream api key is not set".to_string(),
            )));
        }

        let first = self.source.fetch_page(1).await.map_err(|error| {
            if error.is_misconfiguration() {
                CycleError::Misconfigured(error)
            } else {
                CycleError::Bootstrap(error)
            }
        })?;
        let page_count = first.page_count.max(1);
        let mut bundles: Vec<RawBundle> = first.bundles;

        let seeded = self
            .cache
            .seed_if_empty(self.normalizer.normalize_all(&bundles), country_names(&bundles))
            .await;
        info!(
            event_name = "catalogue.refresh.bootstrapped",
            correlation_id,
            page_count,
            rows = first.rows,
            seeded,
            "loaded first catalogue page"
        );

        for page in 2..=page_count {
            tokio::time::sleep(self.settings.page_delay).await;
            bundles.extend(self.fetch_page_until_ok(page, correlation_id).await);
        }

        self.finalize(bundles, page_count, seeded, correlation_id).await
    }

    async fn fetch_page_until_ok(&self, page: u32, correlation_id: &str) -> Vec<RawBundle> {
        let mut attempt: u32 = 0;
        loop {
            match self.source.fetch_page(page).await {
                Ok(loaded) => {
                    debug!(
                        event_name = "catalogue.refresh.page_loaded",
                        correlation_id,
                        page,
                        bundles = loaded.bundles.len(),
                        "loaded catalogue page"
                    );
                    return loaded.bundles;
                }
                Err(error) => {
                    attempt += 1;
                    warn!(
                        event_name = "catalogue.refresh.page_failed",
                        correlation_id,
                        page,
                        attempt,
                        error = %error,
                        "catalogue page failed; retrying"
                    );
                    tokio::time::sleep(self.settings.page_retry_delay).await;
                }
            }
        }
    }

    async fn finalize(
        &self,
        bundles: Vec<RawBundle>,
        pages: u32,
        seeded: bool,
        correlation_id: &str,
    ) -> Result<CycleReport, CycleError> {
        let names = country_names(&bundles);
        let packages = dedup_catalogue(self.normalizer.normalize_all(&bundles));
        // An empty load never replaces the served view or the stored snapshot.
        if packages.is_empty() {
            return Err(CycleError::EmptyCatalogue { bundles: bundles.len() });
        }

        let view = self
            .cache
            .replace(CatalogueView::build(packages, names, CacheOrigin::Live, Utc::now()))
            .await;

        let persisted = match self.store.save(&self.settings.snapshot_key, &view.to_payload()).await {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    event_name = "catalogue.snapshot.save_failed",
                    correlation_id,
                    error = %error,
                    "catalogue snapshot could not be saved; serving from memory"
                );
                false
            }
        };

        let report = CycleReport {
            pages,
            bundles: bundles.len(),
            packages: view.full.len(),
            seeded,
            persisted,
        };
        info!(
            event_name = "catalogue.refresh.completed",
            correlation_id,
            pages = report.pages,
            bundles = report.bundles,
            packages = report.packages,
            regions = view.top.iter().filter(|package| package.is_regional_category).count(),
            persisted,
            "catalogue refresh completed"
        );
        Ok(report)
    }

    /// Cycle under the watchdog. A hung cycle is reported like a failed
    /// bootstrap so the caller backs off and starts over.
    pub async fn run_guarded_cycle(&self, correlation_id: &str) -> Result<CycleReport, CycleError> {
        match tokio::time::timeout(self.settings.watchdog, self.run_cycle(correlation_id)).await {
            Ok(result) => result,
            Err(_) => Err(CycleError::Watchdog(self.settings.watchdog)),
        }
    }

    /// Delay before the next cycle given the outcome of the previous one.
    pub fn next_delay(&self, outcome: &Result<CycleReport, CycleError>) -> Duration {
        match outcome {
            Ok(_) => self.settings.cache_ttl,
            Err(CycleError::Misconfigured(_)) => self.settings.misconfigured_retry,
            Err(CycleError::Bootstrap(_))
            | Err(CycleError::Watchdog(_))
            | Err(CycleError::EmptyCatalogue { .. }) => self.settings.bootstrap_retry,
        }
    }

    /// Restores the snapshot (unless `restore` is false) and then refreshes
    /// forever. Never returns on its own; stop it through [`RefreshHandle`].
    pub async fn run_forever(self: Arc<Self>, restore: bool) {
        if restore {
            self.restore_snapshot().await;
        }

        loop {
            let correlation_id = Uuid::new_v4().to_string();
            let outcome = self.run_guarded_cycle(&correlation_id).await;
            let delay = self.next_delay(&outcome);

            if let Err(error) = &outcome {
                warn!(
                    event_name = "catalogue.refresh.backoff",
                    correlation_id = %correlation_id,
                    error = %error,
                    retry_in_secs = delay.as_secs(),
                    "catalogue refresh failed; backing off"
                );
            }
            tokio::time::sleep(delay).await;
        }
    }
}

/// Owns the background refresh task so it can be restarted or stopped.
pub struct RefreshHandle {
    refresher: Arc<CatalogueRefresher>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshHandle {
    /// Spawns the refresh loop on the current runtime.
    pub fn start(refresher: Arc<CatalogueRefresher>) -> Self {
        let task = tokio::spawn(refresher.clone().run_forever(true));
        Self { refresher, task: Mutex::new(Some(task)) }
    }

    pub fn refresher(&self) -> &Arc<CatalogueRefresher> {
        &self.refresher
    }

    /// Drops the stored snapshot, cancels the in-flight cycle and starts a
    /// fresh one. The cache keeps serving the previous view meanwhile.
    /// Returns whether a snapshot was deleted.
    pub async fn rebuild(&self, correlation_id: &str) -> bool {
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
            let _ = previous.await;
        }

        let deleted = self.refresher.delete_snapshot().await;
        *task = Some(tokio::spawn(self.refresher.clone().run_forever(false)));

        info!(
            event_name = "catalogue.refresh.rebuild_started",
            correlation_id,
            snapshot_deleted = deleted,
            "catalogue rebuild started"
        );
        deleted
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            let _ = task.await;
            info!(event_name = "catalogue.refresh.stopped", "catalogue refresher stopped");
        }
    }
}
