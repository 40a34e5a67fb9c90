use roamcat_core::config::{AppConfig, LoadOptions};
use roamcat_db::{connect_with_settings, migrations, SqlSnapshotRepository};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 0 when no check failed, 1 otherwise. Skipped checks (disabled
/// persistence, no snapshot yet) do not fail the report.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_upstream_credentials(&config));
            checks.extend(check_persistence(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["upstream_api_key", "database_connectivity", "catalogue_snapshot"] {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_upstream_credentials(config: &AppConfig) -> DoctorCheck {
    if config.upstream.has_api_key() {
        DoctorCheck::new(
            "upstream_api_key",
            CheckStatus::Pass,
            format!("api key configured for `{}`", config.upstream.base_url),
        )
    } else {
        DoctorCheck::new(
            "upstream_api_key",
            CheckStatus::Fail,
            "upstream.api_key is not set; the catalogue refresher will back off and serve mock data",
        )
    }
}

fn check_persistence(config: &AppConfig) -> Vec<DoctorCheck> {
    if !config.database.is_enabled() {
        return vec![
            DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Skipped,
                "database.url is empty; snapshot persistence disabled",
            ),
            DoctorCheck::new(
                "catalogue_snapshot",
                CheckStatus::Skipped,
                "snapshot persistence disabled",
            ),
        ];
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            )];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::new(
                        "database_connectivity",
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::new(
                        "catalogue_snapshot",
                        CheckStatus::Skipped,
                        "skipped because the database is unreachable",
                    ),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::new(
            "database_connectivity",
            CheckStatus::Pass,
            format!("connected using `{}`", config.database.url),
        )];

        let snapshot = match migrations::run_pending(&pool).await {
            Ok(()) => {
                let key = config.catalogue.snapshot_key.as_str();
                match SqlSnapshotRepository::new(pool.clone()).summary(key).await {
                    Ok(Some(summary)) => DoctorCheck::new(
                        "catalogue_snapshot",
                        CheckStatus::Pass,
                        format!(
                            "`{key}` holds {} packages, updated {}",
                            summary.package_count,
                            summary.updated_at.to_rfc3339()
                        ),
                    ),
                    Ok(None) => DoctorCheck::new(
                        "catalogue_snapshot",
                        CheckStatus::Skipped,
                        format!("no snapshot stored under `{key}` yet"),
                    ),
                    Err(error) => DoctorCheck::new(
                        "catalogue_snapshot",
                        CheckStatus::Fail,
                        format!("snapshot could not be read: {error}"),
                    ),
                }
            }
            Err(error) => DoctorCheck::new(
                "catalogue_snapshot",
                CheckStatus::Fail,
                format!("migrations failed: {error}"),
            ),
        };
        checks.push(snapshot);

        pool.close().await;
        checks
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
