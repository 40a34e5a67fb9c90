use std::sync::Arc;
use std::time::Duration;

use roamcat_core::catalogue::snapshot::{NoopSnapshotStore, SnapshotStore};
use roamcat_core::catalogue::upstream::{CatalogueSource, UpstreamError};
use roamcat_core::catalogue::{
    CatalogueCache, CatalogueRefresher, CatalogueService, Normalizer, RefreshHandle,
    RefreshSettings,
};
use roamcat_core::config::{AppConfig, ConfigError, DatabaseConfig, LoadOptions};
use roamcat_db::{connect_with_settings, migrations, DbPool, SqlSnapshotRepository};
use thiserror::Error;
use tracing::{info, warn};

use crate::health::HealthState;
use crate::routes::CatalogueState;
use crate::upstream::HttpCatalogueSource;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: Option<DbPool>,
    pub cache: Arc<CatalogueCache>,
    pub catalogue: Arc<CatalogueService>,
    pub refresh: Arc<RefreshHandle>,
}

impl Application {
    pub fn catalogue_state(&self) -> CatalogueState {
        CatalogueState { catalogue: self.catalogue.clone(), refresh: self.refresh.clone() }
    }

    pub fn health_state(&self) -> HealthState {
        HealthState {
            db_pool: self.db_pool.clone(),
            cache: self.cache.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("upstream client setup failed: {0}")]
    Upstream(#[from] UpstreamError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the catalogue engine and starts the background refresher. Snapshot
/// persistence is optional; any database failure leaves the service running
/// on an in-process cache only.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let (db_pool, store) = open_snapshot_store(&config.database).await;

    let source = Arc::new(HttpCatalogueSource::new(&config.upstream)?);
    if !source.is_configured() {
        warn!(
            event_name = "system.bootstrap.upstream_unconfigured",
            correlation_id = "bootstrap",
            "upstream api key is not set; serving cached or mock catalogue only"
        );
    }
    let source: Arc<dyn CatalogueSource> = source;

    let cache = Arc::new(CatalogueCache::new());
    let normalizer = Arc::new(Normalizer::new(config.catalogue.margin_multiplier));
    let settings = RefreshSettings::from(&config.catalogue);

    let catalogue = Arc::new(
        CatalogueService::new(
            cache.clone(),
            source.clone(),
            normalizer.clone(),
            config.catalogue.home_country.clone(),
        )
        .with_scan_page_delay(Duration::from_millis(config.catalogue.page_delay_ms)),
    );
    let refresher =
        Arc::new(CatalogueRefresher::new(source, store, cache.clone(), normalizer, settings));
    let refresh = Arc::new(RefreshHandle::start(refresher));

    info!(
        event_name = "system.bootstrap.refresher_started",
        correlation_id = "bootstrap",
        persistence = db_pool.is_some(),
        home_country = %config.catalogue.home_country,
        "catalogue refresher started"
    );

    Ok(Application { config, db_pool, cache, catalogue, refresh })
}

async fn open_snapshot_store(config: &DatabaseConfig) -> (Option<DbPool>, Arc<dyn SnapshotStore>) {
    if !config.is_enabled() {
        info!(
            event_name = "system.bootstrap.persistence_disabled",
            correlation_id = "bootstrap",
            "database url is empty; catalogue snapshots disabled"
        );
        return (None, Arc::new(NoopSnapshotStore));
    }

    let pool =
        match connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
        {
            Ok(pool) => pool,
            Err(error) => {
                warn!(
                    event_name = "system.bootstrap.database_unavailable",
                    correlation_id = "bootstrap",
                    error = %error,
                    "database connection failed; catalogue snapshots disabled"
                );
                return (None, Arc::new(NoopSnapshotStore));
            }
        };
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    if let Err(error) = migrations::run_pending(&pool).await {
        warn!(
            event_name = "system.bootstrap.migration_failed",
            correlation_id = "bootstrap",
            error = %error,
            "database migrations failed; catalogue snapshots disabled"
        );
        pool.close().await;
        return (None, Arc::new(NoopSnapshotStore));
    }
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    (Some(pool.clone()), Arc::new(SqlSnapshotRepository::new(pool)))
}
