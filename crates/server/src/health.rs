use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use roamcat_core::catalogue::{CacheOrigin, CatalogueCache, RefreshHandle};
use roamcat_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Option<DbPool>,
    pub cache: Arc<CatalogueCache>,
    pub refresh: Arc<RefreshHandle>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogueCheck {
    pub status: &'static str,
    pub packages: usize,
    pub categories: usize,
    pub origin: CacheOrigin,
    pub refreshed_at: Option<String>,
    pub rebuild_required: bool,
    pub refresher_running: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub catalogue: CatalogueCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Ready once the catalogue has a view to serve and the snapshot database (if
/// any) answers. A disabled database does not degrade readiness.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(state.db_pool.as_ref()).await;
    let catalogue = catalogue_check(&state).await;
    let ready = database.status != "degraded" && catalogue.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "roamcat-server runtime initialized".to_string(),
        },
        database,
        catalogue,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: Option<&DbPool>) -> HealthCheck {
    let Some(pool) = pool else {
        return HealthCheck {
            status: "disabled",
            detail: "snapshot persistence disabled".to_string(),
        };
    };

    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn catalogue_check(state: &HealthState) -> CatalogueCheck {
    let view = state.cache.view().await;
    let loaded = view.is_loaded();

    CatalogueCheck {
        status: if loaded { "ready" } else { "warming" },
        packages: view.full.len(),
        categories: view.top.len(),
        origin: view.origin,
        refreshed_at: (view.origin != CacheOrigin::Empty).then(|| view.refreshed_at.to_rfc3339()),
        rebuild_required: view.rebuild_required,
        refresher_running: state.refresh.is_running().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use chrono::Utc;
    use roamcat_core::catalogue::cache::{CacheOrigin, CatalogueCache, CatalogueView};
    use roamcat_core::catalogue::normalize::Normalizer;
    use roamcat_core::catalogue::snapshot::NoopSnapshotStore;
    use roamcat_core::catalogue::upstream::UnconfiguredSource;
    use roamcat_core::catalogue::{CatalogueRefresher, RefreshHandle, RefreshSettings};
    use roamcat_core::catalogue::mock::mock_catalogue;
    use roamcat_db::connect_with_settings;
    use rust_decimal::Decimal;

    use crate::health::{health, HealthState};

    fn refresh_handle(cache: Arc<CatalogueCache>) -> Arc<RefreshHandle> {
        let refresher = Arc::new(CatalogueRefresher::new(
            Arc::new(UnconfiguredSource),
            Arc::new(NoopSnapshotStore),
            cache,
            Arc::new(Normalizer::new(Decimal::TWO)),
            RefreshSettings::default(),
        ));
        Arc::new(RefreshHandle::start(refresher))
    }

    async fn loaded_cache() -> Arc<CatalogueCache> {
        let cache = Arc::new(CatalogueCache::new());
        cache
            .replace(CatalogueView::build(
                mock_catalogue(Decimal::TWO),
                BTreeMap::new(),
                CacheOrigin::Live,
                Utc::now(),
            ))
            .await;
        cache
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_and_catalogue_are_ready() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        let cache = loaded_cache().await;
        let refresh = refresh_handle(cache.clone());

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: Some(pool.clone()), cache, refresh })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.catalogue.status, "ready");
        assert!(payload.catalogue.packages > 0);
        assert!(payload.catalogue.refresher_running);

        pool.close().await;
    }

    #[tokio::test]
    async fn disabled_database_does_not_degrade_readiness() {
        let cache = loaded_cache().await;
        let refresh = refresh_handle(cache.clone());

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: None, cache, refresh })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.database.status, "disabled");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_while_catalogue_is_warming() {
        let cache = Arc::new(CatalogueCache::new());
        let refresh = refresh_handle(cache.clone());

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: None, cache, refresh })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.catalogue.status, "warming");
        assert_eq!(payload.catalogue.refreshed_at, None);
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;
        let cache = loaded_cache().await;
        let refresh = refresh_handle(cache.clone());

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: Some(pool), cache, refresh })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
