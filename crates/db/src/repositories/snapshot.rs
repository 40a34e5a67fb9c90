use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};

use roamcat_core::catalogue::snapshot::{
    SnapshotPayload, SnapshotStore, StorageError, StoredSnapshot,
};

use super::RepositoryError;
use crate::DbPool;

/// Row metadata without the payload, for operator tooling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub key: String,
    pub package_count: u32,
    pub payload_bytes: u64,
    pub updated_at: DateTime<Utc>,
}

/// One row per key in `catalogue_snapshot`, payload stored as JSON text.
pub struct SqlSnapshotRepository {
    pool: DbPool,
}

impl SqlSnapshotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, key: &str) -> Result<Option<StoredSnapshot>, RepositoryError> {
        let row = sqlx::query("SELECT payload, updated_at FROM catalogue_snapshot WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(snapshot_from_row).transpose()
    }

    pub async fn upsert(
        &self,
        key: &str,
        payload: &SnapshotPayload,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let encoded =
            serde_json::to_string(payload).map_err(|error| RepositoryError::Encode(error.to_string()))?;
        let package_count = i64::try_from(payload.packages.len()).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO catalogue_snapshot (key, payload, package_count, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                package_count = excluded.package_count,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(encoded)
        .bind(package_count)
        .bind(updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM catalogue_snapshot WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn summary(&self, key: &str) -> Result<Option<SnapshotSummary>, RepositoryError> {
        let row = sqlx::query(
            "SELECT key, package_count, LENGTH(payload) AS payload_bytes, updated_at
             FROM catalogue_snapshot
             WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(SnapshotSummary {
            key: row.try_get("key")?,
            package_count: parse_u32("package_count", row.try_get("package_count")?)?,
            payload_bytes: u64::try_from(row.try_get::<i64, _>("payload_bytes")?).unwrap_or(0),
            updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        }))
    }
}

#[async_trait]
impl SnapshotStore for SqlSnapshotRepository {
    async fn get(&self, key: &str) -> Result<Option<StoredSnapshot>, StorageError> {
        Ok(self.find(key).await?)
    }

    async fn save(&self, key: &str, payload: &SnapshotPayload) -> Result<(), StorageError> {
        Ok(self.upsert(key, payload, Utc::now()).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.remove(key).await?)
    }
}

fn snapshot_from_row(row: SqliteRow) -> Result<StoredSnapshot, RepositoryError> {
    let raw: String = row.try_get("payload")?;
    let payload = serde_json::from_str::<SnapshotPayload>(&raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid snapshot payload: {error}")))?;

    Ok(StoredSnapshot {
        payload,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use roamcat_core::catalogue::snapshot::{SnapshotPayload, SnapshotStore, StorageError};
    use roamcat_core::domain::package::{Package, PackageId};

    use super::SqlSnapshotRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    const KEY: &str = "esim_catalogue_full";

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn package(id: &str, coverage: &[&str], price_cents: i64) -> Package {
        Package {
            id: PackageId(id.to_string()),
            name: "Turkey".to_string(),
            data: "1GB".to_string(),
            validity: 7,
            country: coverage.first().map(|code| code.to_string()).unwrap_or_default(),
            coverage: coverage.iter().map(|code| code.to_string()).collect(),
            original_price: Decimal::new(price_cents, 2),
            price: Decimal::new(price_cents * 2, 2),
            is_regional_category: false,
            region_name: None,
            region_name_ru: None,
            region_icon: None,
            variants_count: None,
            region_coverage: None,
            order: None,
        }
    }

    fn payload() -> SnapshotPayload {
        SnapshotPayload {
            packages: vec![package("esim_1GB_7D_TR_V2", &["TR"], 199), package("esim_b", &["GE"], 250)],
            country_names: BTreeMap::from([("TR".to_string(), "Turkey".to_string())]),
        }
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);

        assert!(repo.get(KEY).await.expect("get").is_none());
        assert!(!repo.delete(KEY).await.expect("delete"));
    }

    #[tokio::test]
    async fn save_then_get_returns_payload_and_timestamp() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);
        let updated_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("timestamp");

        repo.upsert(KEY, &payload(), updated_at).await.expect("upsert");
        let stored = repo.get(KEY).await.expect("get").expect("present");

        assert_eq!(stored.payload, payload());
        assert_eq!(stored.updated_at, updated_at);
        assert_eq!(stored.payload.packages[0].price, Decimal::new(398, 2));
    }

    #[tokio::test]
    async fn save_overwrites_and_summary_tracks_count() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);

        repo.save(KEY, &payload()).await.expect("first save");
        let mut smaller = payload();
        smaller.packages.truncate(1);
        repo.save(KEY, &smaller).await.expect("second save");

        let summary = repo.summary(KEY).await.expect("summary").expect("present");
        assert_eq!(summary.package_count, 1);
        assert!(summary.payload_bytes > 0);
        assert_eq!(repo.get(KEY).await.expect("get").expect("present").payload.packages.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let repo = SqlSnapshotRepository::new(setup_pool().await);
        repo.save(KEY, &payload()).await.expect("save");

        assert!(repo.delete(KEY).await.expect("delete"));
        assert!(repo.get(KEY).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn corrupt_payload_surfaces_as_decode_error() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO catalogue_snapshot (key, payload, package_count, updated_at)
             VALUES (?, 'not json', 0, ?)",
        )
        .bind(KEY)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let error = SqlSnapshotRepository::new(pool).get(KEY).await.unwrap_err();

        assert!(matches!(error, StorageError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_table_surfaces_as_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let error = SqlSnapshotRepository::new(pool).get(KEY).await.unwrap_err();

        assert!(matches!(error, StorageError::Unavailable(_)));
    }
}
