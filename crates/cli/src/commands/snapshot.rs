use roamcat_db::{connect_with_settings, migrations, SqlSnapshotRepository};

use crate::commands::{block_on, load_config, CommandResult};

/// Shows the stored catalogue snapshot, or drops it with `delete` so the next
/// server start rebuilds from the provider.
pub fn run(delete: bool) -> CommandResult {
    let config = match load_config("snapshot") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    if !config.database.is_enabled() {
        return CommandResult::failure(
            "snapshot",
            "persistence_disabled",
            "database.url is empty; no snapshot is stored",
            2,
        );
    }

    let key = config.catalogue.snapshot_key.clone();
    let result = block_on("snapshot", async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repository = SqlSnapshotRepository::new(pool.clone());
        let outcome = if delete {
            repository.remove(&key).await.map(SnapshotOutcome::Deleted)
        } else {
            repository.summary(&key).await.map(SnapshotOutcome::Summary)
        };
        pool.close().await;
        outcome.map_err(|error| ("snapshot_storage", error.to_string(), 6u8))
    });

    match result {
        Ok(Ok(SnapshotOutcome::Deleted(true))) => {
            CommandResult::success("snapshot", format!("deleted snapshot `{key}`"))
        }
        Ok(Ok(SnapshotOutcome::Deleted(false))) => {
            CommandResult::success("snapshot", format!("no snapshot stored under `{key}`"))
        }
        Ok(Ok(SnapshotOutcome::Summary(Some(summary)))) => CommandResult::success_with_details(
            "snapshot",
            format!(
                "snapshot `{key}` holds {} packages, updated {}",
                summary.package_count,
                summary.updated_at.to_rfc3339()
            ),
            serde_json::to_value(&summary).ok(),
        ),
        Ok(Ok(SnapshotOutcome::Summary(None))) => {
            CommandResult::success("snapshot", format!("no snapshot stored under `{key}`"))
        }
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("snapshot", error_class, message, exit_code)
        }
        Err(failure) => failure,
    }
}

enum SnapshotOutcome {
    Deleted(bool),
    Summary(Option<roamcat_db::SnapshotSummary>),
}
