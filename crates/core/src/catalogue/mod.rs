//! Catalogue engine: provider ingestion, caching, regional grouping and
//! tariff selection.

pub mod cache;
pub mod countries;
pub mod grouping;
pub mod mock;
pub mod normalize;
pub mod raw;
pub mod refresh;
pub mod regions;
pub mod selection;
pub mod service;
pub mod snapshot;
pub mod upstream;

#[cfg(test)]
mod testing;

pub use cache::{CacheOrigin, CatalogueCache, CatalogueView, RestoreOutcome};
pub use normalize::{NormalizeError, Normalizer};
pub use raw::{CataloguePage, CountriesPayload, RawBundle, RawCountry};
pub use refresh::{CatalogueRefresher, CycleError, CycleReport, RefreshHandle, RefreshSettings};
pub use regions::{region_by_slug, RegionDefinition, RegionId, REGIONS};
pub use selection::{dedup_variants, smart_filter, SelectionPolicy};
pub use service::{CatalogueService, DEFAULT_HOME_COUNTRY};
pub use snapshot::{
    NoopSnapshotStore, SnapshotPayload, SnapshotStore, StorageError, StoredSnapshot,
    DEFAULT_SNAPSHOT_KEY,
};
pub use upstream::{CatalogueSource, UnconfiguredSource, UpstreamError};
