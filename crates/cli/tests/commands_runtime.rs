use std::env;
use std::sync::{Mutex, OnceLock};

use roamcat_cli::commands::{config, doctor, migrate, snapshot};
use roamcat_core::catalogue::snapshot::{SnapshotPayload, SnapshotStore};
use roamcat_db::{connect_with_settings, migrations, SqlSnapshotRepository};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("ROAMCAT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_disabled_persistence() {
    with_env(&[("ROAMCAT_DATABASE_URL", "")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "persistence_disabled");
    });
}

#[test]
fn commands_return_config_failure_for_invalid_env() {
    with_env(&[("ROAMCAT_CATALOGUE_MARGIN_MULTIPLIER", "not-a-number")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");

        let result = snapshot::run(false);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn snapshot_reports_missing_snapshot() {
    with_env(&[("ROAMCAT_DATABASE_URL", "sqlite::memory:")], || {
        let result = snapshot::run(false);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "snapshot");
        assert!(payload["message"].as_str().unwrap_or_default().contains("no snapshot stored"));
    });
}

#[test]
fn snapshot_summary_and_delete_use_the_configured_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("roamcat.db").display());
    seed_snapshot(&url);

    with_env(&[("ROAMCAT_DATABASE_URL", url.as_str())], || {
        let result = snapshot::run(false);
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["details"]["package_count"], 0);
        assert_eq!(payload["details"]["key"], "esim_catalogue_full");

        let deleted = parse_payload(&snapshot::run(true).output);
        assert!(deleted["message"].as_str().unwrap_or_default().starts_with("deleted snapshot"));

        let again = parse_payload(&snapshot::run(true).output);
        assert!(again["message"].as_str().unwrap_or_default().contains("no snapshot stored"));
    });
}

#[test]
fn doctor_fails_without_api_key_and_skips_disabled_persistence() {
    with_env(&[("ROAMCAT_DATABASE_URL", "")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        let status_of = |name: &str| {
            report["checks"]
                .as_array()
                .and_then(|checks| checks.iter().find(|check| check["name"] == name))
                .map(|check| check["status"].clone())
        };
        assert_eq!(status_of("config_validation"), Some(Value::from("pass")));
        assert_eq!(status_of("upstream_api_key"), Some(Value::from("fail")));
        assert_eq!(status_of("database_connectivity"), Some(Value::from("skipped")));
    });
}

#[test]
fn doctor_passes_with_api_key_and_reachable_database() {
    with_env(
        &[
            ("ROAMCAT_DATABASE_URL", "sqlite::memory:"),
            ("ROAMCAT_UPSTREAM_API_KEY", "test-key-0123456789"),
        ],
        || {
            let result = doctor::run(false);
            assert_eq!(result.exit_code, 0, "unexpected report:\n{}", result.output);
            assert!(result.output.starts_with("doctor: all readiness checks passed"));
            assert!(result.output.contains("[skip] catalogue_snapshot"));
        },
    );
}

#[test]
fn config_redacts_api_key_and_attributes_env_source() {
    with_env(
        &[("ROAMCAT_UPSTREAM_API_KEY", "secret-key-0123456789"), ("ROAMCAT_HOME_COUNTRY", "KZ")],
        || {
            let output = config::run();

            assert!(!output.contains("secret-key-0123456789"));
            assert!(output.contains("- upstream.api_key = ***6789 (source: env (ROAMCAT_UPSTREAM_API_KEY))"));
            assert!(output.contains("catalogue.home_country = KZ (source: env (ROAMCAT_HOME_COUNTRY))"));
            assert!(output.contains("- server.port = 8080 (source: default)"));
        },
    );
}

fn seed_snapshot(url: &str) {
    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
    runtime.block_on(async {
        let pool = connect_with_settings(url, 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlSnapshotRepository::new(pool.clone())
            .save("esim_catalogue_full", &SnapshotPayload::default())
            .await
            .expect("save snapshot");
        pool.close().await;
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ROAMCAT_DATABASE_URL",
        "ROAMCAT_DATABASE_MAX_CONNECTIONS",
        "ROAMCAT_DATABASE_TIMEOUT_SECS",
        "ROAMCAT_UPSTREAM_BASE_URL",
        "ROAMCAT_UPSTREAM_API_KEY",
        "ROAMCAT_UPSTREAM_COUNTRIES_PATH",
        "ROAMCAT_CATALOGUE_MARGIN_MULTIPLIER",
        "ROAMCAT_CATALOGUE_FORCE_REBUILD",
        "ROAMCAT_CATALOGUE_HOME_COUNTRY",
        "ROAMCAT_CATALOGUE_SNAPSHOT_KEY",
        "ROAMCAT_FORCE_REBUILD",
        "ROAMCAT_HOME_COUNTRY",
        "ROAMCAT_SERVER_BIND_ADDRESS",
        "ROAMCAT_SERVER_PORT",
        "ROAMCAT_LOGGING_LEVEL",
        "ROAMCAT_LOGGING_FORMAT",
        "ROAMCAT_LOG_LEVEL",
        "ROAMCAT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
