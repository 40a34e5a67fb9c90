use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::catalogue::grouping::regional_categories;
use crate::catalogue::snapshot::{has_stale_coverage, SnapshotPayload, StoredSnapshot};
use crate::domain::package::Package;

/// Raw entries exposed as the browsing view when no region family matches.
pub const TOP_FALLBACK_LEN: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOrigin {
    Empty,
    Snapshot,
    Bootstrap,
    Live,
}

/// Immutable catalogue state. Readers hold an `Arc` to one complete view; the
/// refresher swaps in a new view instead of mutating this one.
#[derive(Clone, Debug)]
pub struct CatalogueView {
    pub full: Vec<Package>,
    pub top: Vec<Package>,
    pub country_names: BTreeMap<String, String>,
    pub refreshed_at: DateTime<Utc>,
    pub origin: CacheOrigin,
    pub rebuild_required: bool,
}

impl CatalogueView {
    pub fn empty() -> Self {
        Self {
            full: Vec::new(),
            top: Vec::new(),
            country_names: BTreeMap::new(),
            refreshed_at: DateTime::<Utc>::UNIX_EPOCH,
            origin: CacheOrigin::Empty,
            rebuild_required: false,
        }
    }

    /// Builds a view from a deduplicated catalogue, deriving the regional
    /// categories (or the first raw entries when none match).
    pub fn build(
        full: Vec<Package>,
        country_names: BTreeMap<String, String>,
        origin: CacheOrigin,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        let mut top = regional_categories(&full);
        if top.is_empty() {
            top = full.iter().take(TOP_FALLBACK_LEN).cloned().collect();
        }
        Self { full, top, country_names, refreshed_at, origin, rebuild_required: false }
    }

    pub fn is_loaded(&self) -> bool {
        !self.full.is_empty() || !self.top.is_empty()
    }

    pub fn to_payload(&self) -> SnapshotPayload {
        SnapshotPayload { packages: self.full.clone(), country_names: self.country_names.clone() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub packages: usize,
    pub stale: bool,
}

pub struct CatalogueCache {
    view: RwLock<Arc<CatalogueView>>,
}

impl Default for CatalogueCache {
    fn default() -> Self {
        Self { view: RwLock::new(Arc::new(CatalogueView::empty())) }
    }
}

impl CatalogueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn view(&self) -> Arc<CatalogueView> {
        self.view.read().await.clone()
    }

    pub async fn replace(&self, view: CatalogueView) -> Arc<CatalogueView> {
        let view = Arc::new(view);
        *self.view.write().await = view.clone();
        view
    }

    /// Installs a restored snapshot. A snapshot written with free-text
    /// coverage is still served but is dated to the epoch and flagged so the
    /// next refresh supersedes it.
    pub async fn restore(&self, snapshot: StoredSnapshot) -> RestoreOutcome {
        let stale = has_stale_coverage(&snapshot.payload.packages);
        let refreshed_at =
            if stale { DateTime::<Utc>::UNIX_EPOCH } else { snapshot.updated_at };

        let mut view = CatalogueView::build(
            snapshot.payload.packages,
            snapshot.payload.country_names,
            CacheOrigin::Snapshot,
            refreshed_at,
        );
        view.rebuild_required = stale;

        let packages = view.full.len();
        self.replace(view).await;
        RestoreOutcome { packages, stale }
    }

    /// Seeds the cache from a partial catalogue only while nothing better is
    /// loaded. Returns whether the seed was installed.
    pub async fn seed_if_empty(
        &self,
        packages: Vec<Package>,
        country_names: BTreeMap<String, String>,
    ) -> bool {
        if packages.is_empty() {
            return false;
        }
        let view = CatalogueView::build(
            dedup_catalogue(packages),
            country_names,
            CacheOrigin::Bootstrap,
            DateTime::<Utc>::UNIX_EPOCH,
        );

        let mut guard = self.view.write().await;
        if !guard.full.is_empty() {
            return false;
        }
        *guard = Arc::new(view);
        true
    }
}

/// Collapses entries sharing `(name, data, validity)`, keeping the cheaper
/// one at the position of the first occurrence.
pub fn dedup_catalogue(packages: Vec<Package>) -> Vec<Package> {
    let mut kept: Vec<Package> = Vec::with_capacity(packages.len());
    let mut index: HashMap<(String, String, u32), usize> = HashMap::new();

    for package in packages {
        let key = package.catalogue_key();
        match index.get(&key) {
            Some(&position) => {
                if package.price < kept[position].price {
                    kept[position] = package;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(package);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use chrono::{DateTime, Utc};

    use super::{dedup_catalogue, CacheOrigin, CatalogueCache, CatalogueView, TOP_FALLBACK_LEN};
    use crate::catalogue::snapshot::{SnapshotPayload, StoredSnapshot};
    use crate::catalogue::testing::{covering, package};

    #[test]
    fn dedup_keeps_one_cheapest_entry_per_triple() {
        let packages = vec![
            package("a", "Turkey", "1GB", 7, 500),
            package("b", "Turkey", "1GB", 7, 300),
            package("c", "Turkey", "1GB", 15, 700),
            package("d", "Turkey", "1GB", 7, 450),
            package("e", "Georgia", "1GB", 7, 200),
        ];

        let deduped = dedup_catalogue(packages);
        let keys: HashSet<_> = deduped.iter().map(|p| p.catalogue_key()).collect();

        assert_eq!(deduped.len(), 3);
        assert_eq!(keys.len(), deduped.len());
        assert_eq!(deduped[0].id.0, "b");
        assert_eq!(dedup_catalogue(deduped.clone()), deduped);
    }

    #[test]
    fn view_falls_back_to_first_raw_entries_without_regions() {
        let packages: Vec<_> = (0..25)
            .map(|i| package(&format!("tr-{i}"), &format!("Turkey {i}"), "1GB", 7, 100 + i))
            .collect();

        let view = CatalogueView::build(packages, BTreeMap::new(), CacheOrigin::Live, Utc::now());

        assert_eq!(view.top.len(), TOP_FALLBACK_LEN);
        assert_eq!(view.top[0].id.0, "tr-0");
        assert!(!view.top[0].is_regional_category);
    }

    #[tokio::test]
    async fn stale_snapshot_is_served_but_flagged_for_rebuild() {
        let cache = CatalogueCache::new();
        let stale = covering(package("us-1", "United States", "1GB", 7, 400), &["United States"]);

        let outcome = cache
            .restore(StoredSnapshot {
                payload: SnapshotPayload { packages: vec![stale], country_names: BTreeMap::new() },
                updated_at: Utc::now(),
            })
            .await;
        let view = cache.view().await;

        assert!(outcome.stale);
        assert_eq!(view.full.len(), 1);
        assert!(view.rebuild_required);
        assert_eq!(view.refreshed_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(view.origin, CacheOrigin::Snapshot);
    }

    #[tokio::test]
    async fn fresh_snapshot_keeps_its_timestamp() {
        let cache = CatalogueCache::new();
        let updated_at = Utc::now();

        let outcome = cache
            .restore(StoredSnapshot {
                payload: SnapshotPayload {
                    packages: vec![package("tr-1", "Turkey", "1GB", 7, 300)],
                    country_names: BTreeMap::new(),
                },
                updated_at,
            })
            .await;

        assert!(!outcome.stale);
        assert_eq!(cache.view().await.refreshed_at, updated_at);
    }

    #[tokio::test]
    async fn seed_only_applies_to_empty_cache() {
        let cache = CatalogueCache::new();

        assert!(
            cache.seed_if_empty(vec![package("a", "Turkey", "1GB", 7, 300)], BTreeMap::new()).await
        );
        assert!(
            !cache.seed_if_empty(vec![package("b", "Turkey", "2GB", 7, 300)], BTreeMap::new()).await
        );
        assert_eq!(cache.view().await.full[0].id.0, "a");
    }

    #[tokio::test]
    async fn empty_load_does_not_seed() {
        let cache = CatalogueCache::new();

        assert!(!cache.seed_if_empty(Vec::new(), BTreeMap::new()).await);
        assert_eq!(cache.view().await.origin, CacheOrigin::Empty);
    }
}
