//! Fixtures shared by the catalogue test modules.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::catalogue::raw::{CataloguePage, RawBundle, RawCountry};
use crate::catalogue::snapshot::{SnapshotPayload, SnapshotStore, StorageError, StoredSnapshot};
use crate::catalogue::upstream::{CatalogueSource, UpstreamError};
use crate::domain::country::Country;
use crate::domain::package::{Package, PackageId};

pub fn package(id: &str, name: &str, data: &str, validity: u32, price_cents: i64) -> Package {
    let price = Decimal::new(price_cents, 2);
    Package {
        id: PackageId(id.to_string()),
        name: name.to_string(),
        data: data.to_string(),
        validity,
        country: "TR".to_string(),
        coverage: vec!["TR".to_string()],
        original_price: price / Decimal::TWO,
        price,
        is_regional_category: false,
        region_name: None,
        region_name_ru: None,
        region_icon: None,
        variants_count: None,
        region_coverage: None,
        order: None,
    }
}

pub fn covering(mut package: Package, coverage: &[&str]) -> Package {
    package.coverage = coverage.iter().map(|code| code.to_string()).collect();
    package.country = package.coverage.first().cloned().unwrap_or_default();
    package
}

pub fn bundle(
    name: &str,
    region: &str,
    iso: &[&str],
    data_mb: i64,
    days: u32,
    price: f64,
) -> RawBundle {
    RawBundle {
        name: Some(name.to_string()),
        description: Some(format!("eSIM, {data_mb}MB, {days} Days, {region}, V2")),
        countries: iso
            .iter()
            .map(|code| RawCountry {
                name: Some(format!("Country {code}")),
                region: None,
                iso: Some(code.to_string()),
            })
            .collect(),
        data_amount: Some(data_mb),
        duration: Some(days),
        price: Some(price),
        unlimited: None,
    }
}

/// Catalogue source replaying fixed pages, with an optional number of
/// failures to inject before a page succeeds.
#[derive(Default)]
pub struct ScriptedSource {
    pub pages: Vec<Vec<RawBundle>>,
    pub failures: Mutex<HashMap<u32, u32>>,
    pub calls: Mutex<Vec<u32>>,
    pub unconfigured: bool,
    pub countries: Option<Vec<Country>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Vec<RawBundle>>) -> Self {
        Self { pages, ..Self::default() }
    }

    pub fn failing(self, page: u32, times: u32) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(page, times);
        }
        self
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogueSource for ScriptedSource {
    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn fetch_page(&self, page: u32) -> Result<CataloguePage, UpstreamError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(page);
        }
        if self.unconfigured {
            return Err(UpstreamError::NotConfigured("missing api key".to_string()));
        }

        if let Ok(mut failures) = self.failures.lock() {
            if let Some(remaining) = failures.get_mut(&page) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(UpstreamError::Transport(format!("page {page} timed out")));
                }
            }
        }

        let bundles = self
            .pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .ok_or_else(|| UpstreamError::Status { status: 404, body: "no such page".into() })?;
        let rows = self.pages.iter().map(Vec::len).sum::<usize>() as u64;

        Ok(CataloguePage { bundles, page_count: self.pages.len() as u32, rows })
    }

    async fn fetch_countries(&self) -> Result<Vec<Country>, UpstreamError> {
        self.countries.clone().ok_or(UpstreamError::Unsupported)
    }
}

/// Snapshot store keeping blobs in a map, with an optional forced failure.
#[derive(Default)]
pub struct RecordingStore {
    pub snapshots: Mutex<HashMap<String, StoredSnapshot>>,
    pub broken: bool,
    pub save_delay: Option<Duration>,
}

impl RecordingStore {
    pub fn with(key: &str, snapshot: StoredSnapshot) -> Self {
        let store = Self::default();
        if let Ok(mut snapshots) = store.snapshots.lock() {
            snapshots.insert(key.to_string(), snapshot);
        }
        store
    }

    pub fn broken() -> Self {
        Self { broken: true, ..Self::default() }
    }

    /// Holds every save for `delay` before writing, to catch cycles mid-persist.
    pub fn slow(delay: Duration) -> Self {
        Self { save_delay: Some(delay), ..Self::default() }
    }

    pub fn stored(&self, key: &str) -> Option<StoredSnapshot> {
        self.snapshots.lock().ok().and_then(|snapshots| snapshots.get(key).cloned())
    }
}

#[async_trait]
impl SnapshotStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        if self.broken {
            return Err(StorageError::Unavailable("disk on fire".to_string()));
        }
        Ok(self.stored(key))
    }

    async fn save(&self, key: &str, payload: &SnapshotPayload) -> Result<(), StorageError> {
        if self.broken {
            return Err(StorageError::Unavailable("disk on fire".to_string()));
        }
        if let Some(delay) = self.save_delay {
            tokio::time::sleep(delay).await;
        }
        let snapshot = StoredSnapshot { payload: payload.clone(), updated_at: Utc::now() };
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(key.to_string(), snapshot);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        if self.broken {
            return Err(StorageError::Unavailable("disk on fire".to_string()));
        }
        Ok(self
            .snapshots
            .lock()
            .map(|mut snapshots| snapshots.remove(key).is_some())
            .unwrap_or(false))
    }
}
