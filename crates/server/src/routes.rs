use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use roamcat_core::catalogue::regions::REGIONS;
use roamcat_core::catalogue::{CatalogueService, RefreshHandle};
use roamcat_core::domain::country::Country;
use roamcat_core::domain::package::Package;
use roamcat_core::errors::{CatalogueError, InterfaceError};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct CatalogueState {
    pub catalogue: Arc<CatalogueService>,
    pub refresh: Arc<RefreshHandle>,
}

pub fn router(state: CatalogueState) -> Router {
    Router::new()
        .route("/packages", get(list_packages))
        .route("/packages/{id}", get(package_details))
        .route("/countries", get(list_countries))
        .route("/regions", get(list_regions))
        .route("/admin/rebuild-cache", get(rebuild_cache).post(rebuild_cache))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct PackagesQuery {
    pub country: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    pub esims: Vec<Package>,
}

#[derive(Debug, Serialize)]
pub struct CountriesResponse {
    pub countries: Vec<Country>,
}

#[derive(Debug, Serialize)]
pub struct RegionSummary {
    pub slug: &'static str,
    pub name: &'static str,
    pub name_ru: &'static str,
    pub icon: &'static str,
    pub order: u32,
}

#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    pub regions: Vec<RegionSummary>,
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

/// Interface error rendered as a status code plus `{ error, correlation_id }`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        };
        let body = ErrorBody {
            error: self.0.message().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn catalogue_error(error: CatalogueError, correlation_id: &str) -> ApiError {
    ApiError(error.into_interface(correlation_id))
}

/// Reuses the caller's request id when present so client and server logs line up.
fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub async fn list_packages(
    State(state): State<CatalogueState>,
    headers: HeaderMap,
    Query(query): Query<PackagesQuery>,
) -> Result<Json<PackagesResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);

    let esims = match non_empty(query.region.as_deref()) {
        Some(region) => state
            .catalogue
            .get_region_packages(region, &correlation_id)
            .await
            .map_err(|error| catalogue_error(error, &correlation_id))?,
        None => {
            state.catalogue.get_packages(non_empty(query.country.as_deref()), &correlation_id).await
        }
    };

    Ok(Json(PackagesResponse { esims }))
}

pub async fn package_details(
    State(state): State<CatalogueState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Package>, ApiError> {
    let correlation_id = correlation_id(&headers);
    state
        .catalogue
        .get_package_details(id.trim(), &correlation_id)
        .await
        .map(Json)
        .map_err(|error| catalogue_error(error, &correlation_id))
}

pub async fn list_countries(
    State(state): State<CatalogueState>,
    headers: HeaderMap,
) -> Json<CountriesResponse> {
    let correlation_id = correlation_id(&headers);
    Json(CountriesResponse { countries: state.catalogue.get_countries(&correlation_id).await })
}

pub async fn list_regions() -> Json<RegionsResponse> {
    let regions = REGIONS
        .iter()
        .map(|region| RegionSummary {
            slug: region.slug,
            name: region.name,
            name_ru: region.name_ru,
            icon: region.icon,
            order: region.order,
        })
        .collect();
    Json(RegionsResponse { regions })
}

pub async fn rebuild_cache(
    State(state): State<CatalogueState>,
    headers: HeaderMap,
) -> Json<RebuildResponse> {
    let correlation_id = correlation_id(&headers);
    let deleted = state.refresh.rebuild(&correlation_id).await;

    info!(
        event_name = "http.admin.rebuild_cache",
        correlation_id = %correlation_id,
        snapshot_deleted = deleted,
        "cache rebuild requested"
    );

    let message = if deleted {
        "Snapshot dropped; catalogue rebuild started in background"
    } else {
        "Catalogue rebuild started in background"
    };
    Json(RebuildResponse { success: true, message: message.to_string() })
}
