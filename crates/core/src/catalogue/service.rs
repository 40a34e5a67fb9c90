use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalogue::cache::{CatalogueCache, CatalogueView, TOP_FALLBACK_LEN};
use crate::catalogue::countries::{derive_countries, finish_countries};
use crate::catalogue::mock::mock_catalogue;
use crate::catalogue::normalize::Normalizer;
use crate::catalogue::regions::{region_by_slug, RegionDefinition};
use crate::catalogue::selection::{dedup_variants, smart_filter, SelectionPolicy};
use crate::catalogue::upstream::{CatalogueSource, UpstreamError};
use crate::domain::country::Country;
use crate::domain::package::Package;
use crate::errors::CatalogueError;

/// Home country used when none is configured.
pub const DEFAULT_HOME_COUNTRY: &str = "RU";

/// Packages a query runs against: the cached view when loaded, otherwise a
/// live first page or the mock catalogue.
enum Pool {
    Cached(Arc<CatalogueView>),
    Live(Vec<Package>),
    Mock(Vec<Package>),
}

impl Pool {
    fn packages(&self) -> &[Package] {
        match self {
            Self::Cached(view) if !view.full.is_empty() => &view.full,
            Self::Cached(view) => &view.top,
            Self::Live(packages) | Self::Mock(packages) => packages,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Cached(view) if !view.full.is_empty() => "full",
            Self::Cached(_) => "top",
            Self::Live(_) => "live",
            Self::Mock(_) => "mock",
        }
    }
}

/// Read side of the catalogue. Queries never block on a refresh and never fail
/// because the provider or the snapshot store is unavailable.
pub struct CatalogueService {
    cache: Arc<CatalogueCache>,
    source: Arc<dyn CatalogueSource>,
    normalizer: Arc<Normalizer>,
    home_country: String,
    scan_page_delay: Duration,
}

impl CatalogueService {
    pub fn new(
        cache: Arc<CatalogueCache>,
        source: Arc<dyn CatalogueSource>,
        normalizer: Arc<Normalizer>,
        home_country: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            source,
            normalizer,
            home_country: home_country.into().trim().to_ascii_uppercase(),
            scan_page_delay: Duration::ZERO,
        }
    }

    /// Pause between pages of the exhaustive detail scan.
    pub fn with_scan_page_delay(mut self, delay: Duration) -> Self {
        self.scan_page_delay = delay;
        self
    }

    pub fn home_country(&self) -> &str {
        &self.home_country
    }

    pub fn is_home_country(&self, code: &str) -> bool {
        !self.home_country.is_empty() && code.trim().eq_ignore_ascii_case(&self.home_country)
    }

    pub fn cache(&self) -> &Arc<CatalogueCache> {
        &self.cache
    }

    /// Tariffs for one country, or the browsing view when `country` is `None`.
    pub async fn get_packages(&self, country: Option<&str>, correlation_id: &str) -> Vec<Package> {
        let Some(code) = country.map(str::trim).filter(|code| !code.is_empty()) else {
            return self.browse(correlation_id).await;
        };

        if self.is_home_country(code) {
            debug!(
                event_name = "catalogue.query.home_country",
                correlation_id,
                country = code,
                "home country requested; returning no packages"
            );
            return Vec::new();
        }

        let pool = self.pool(correlation_id).await;
        let candidates: Vec<Package> =
            pool.packages().iter().filter(|package| package.covers(code)).cloned().collect();
        let selected = smart_filter(&dedup_variants(&candidates), SelectionPolicy::COUNTRY);

        debug!(
            event_name = "catalogue.query.country",
            correlation_id,
            country = code,
            tier = pool.label(),
            candidates = candidates.len(),
            selected = selected.len(),
            "resolved country packages"
        );
        selected
    }

    async fn browse(&self, correlation_id: &str) -> Vec<Package> {
        match self.pool(correlation_id).await {
            Pool::Cached(view) if !view.top.is_empty() => view.top.clone(),
            pool => pool.packages().iter().take(TOP_FALLBACK_LEN).cloned().collect(),
        }
    }

    /// Every selectable variant of one regional plan family.
    pub async fn get_region_packages(
        &self,
        slug: &str,
        correlation_id: &str,
    ) -> Result<Vec<Package>, CatalogueError> {
        let region =
            region_by_slug(slug).ok_or_else(|| CatalogueError::UnknownRegion(slug.to_string()))?;

        let pool = self.pool(correlation_id).await;
        let candidates = region_candidates(region, pool.packages());
        let selected = smart_filter(&dedup_variants(&candidates), SelectionPolicy::REGION);

        debug!(
            event_name = "catalogue.query.region",
            correlation_id,
            region = region.slug,
            tier = pool.label(),
            candidates = candidates.len(),
            selected = selected.len(),
            "resolved region packages"
        );
        Ok(selected)
    }

    /// Country picker: the provider's list when it has one, otherwise derived
    /// from the cached catalogue.
    pub async fn get_countries(&self, correlation_id: &str) -> Vec<Country> {
        if self.source.is_configured() {
            match self.source.fetch_countries().await {
                Ok(countries) if !countries.is_empty() => {
                    return finish_countries(countries, &self.home_country);
                }
                Ok(_) | Err(UpstreamError::Unsupported) => {}
                Err(error) => warn!(
                    event_name = "catalogue.countries.upstream_failed",
                    correlation_id,
                    error = %error,
                    "provider countries unavailable; deriving from cache"
                ),
            }
        }

        let view = self.cache.view().await;
        let packages = if view.full.is_empty() { &view.top } else { &view.full };
        derive_countries(packages, &view.country_names, &self.home_country)
    }

    /// One package by id. Regional entries are preferred since they carry the
    /// aggregated coverage. Scans the live catalogue when nothing is cached.
    pub async fn get_package_details(
        &self,
        id: &str,
        correlation_id: &str,
    ) -> Result<Package, CatalogueError> {
        let view = self.cache.view().await;
        if let Some(package) =
            view.top.iter().chain(view.full.iter()).find(|package| package.id.0 == id)
        {
            return Ok(package.clone());
        }
        if view.is_loaded() {
            return Err(CatalogueError::NotFound(id.to_string()));
        }

        match self.scan_live(id, correlation_id).await {
            Ok(Some(package)) => Ok(package),
            Ok(None) => Err(CatalogueError::NotFound(id.to_string())),
            Err(error) => {
                warn!(
                    event_name = "catalogue.details.scan_failed",
                    correlation_id,
                    package_id = id,
                    error = %error,
                    "live catalogue scan failed; checking mock catalogue"
                );
                mock_catalogue(self.normalizer.margin())
                    .into_iter()
                    .find(|package| package.id.0 == id)
                    .ok_or_else(|| CatalogueError::NotFound(id.to_string()))
            }
        }
    }

    async fn scan_live(&self, id: &str, correlation_id: &str) -> Result<Option<Package>, UpstreamError> {
        let mut page = 1;
        loop {
            let loaded = self.source.fetch_page(page).await?;
            let found = loaded
                .bundles
                .iter()
                .find(|bundle| bundle.name.as_deref() == Some(id))
                .and_then(|bundle| self.normalizer.normalize(bundle).ok());
            if found.is_some() {
                info!(
                    event_name = "catalogue.details.scan_hit",
                    correlation_id,
                    package_id = id,
                    page,
                    "package found by live scan"
                );
                return Ok(found);
            }
            if page >= loaded.page_count {
                return Ok(None);
            }
            page += 1;
            if !self.scan_page_delay.is_zero() {
                tokio::time::sleep(self.scan_page_delay).await;
            }
        }
    }

    async fn pool(&self, correlation_id: &str) -> Pool {
        let view = self.cache.view().await;
        if view.is_loaded() {
            return Pool::Cached(view);
        }

        if self.source.is_configured() {
            match self.source.fetch_page(1).await {
                Ok(page) => return Pool::Live(self.normalizer.normalize_all(&page.bundles)),
                Err(error) => warn!(
                    event_name = "catalogue.query.live_failed",
                    correlation_id,
                    error = %error,
                    "catalogue not loaded and live page failed; serving mock catalogue"
                ),
            }
        }
        Pool::Mock(mock_catalogue(self.normalizer.margin()))
    }
}

/// Packages listed under `region`, minus entries cross-listed in its excluded
/// region. Falls back to multi-country plans inside the region's static
/// coverage when no name matches.
fn region_candidates(region: &RegionDefinition, packages: &[Package]) -> Vec<Package> {
    let excluded = |package: &Package| {
        region.excludes.is_some_and(|other| other.definition().matches(package))
    };

    let matched: Vec<Package> = packages
        .iter()
        .filter(|package| region.matches(package) && !excluded(package))
        .cloned()
        .collect();
    if !matched.is_empty() || !region.coverage_filter_fallback {
        return matched;
    }

    let coverage = region.static_coverage();
    packages
        .iter()
        .filter(|package| {
            package.coverage.len() > 1
                && package.coverage.iter().all(|code| coverage.contains(code))
                && !excluded(package)
        })
        .cloned()
        .collect()
}
