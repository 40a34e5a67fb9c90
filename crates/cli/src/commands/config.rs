use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use roamcat_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl Field {
    fn new(key: &'static str, env_keys: &'static [&'static str], value: impl ToString) -> Self {
        Self { key, env_keys, value: value.to_string() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let database_url =
        if config.database.is_enabled() { config.database.url.clone() } else { "<disabled>".to_string() };
    let api_key = config
        .upstream
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let countries_path = if config.upstream.countries_path.is_empty() {
        "<unset>".to_string()
    } else {
        config.upstream.countries_path.clone()
    };
    let catalogue = &config.catalogue;

    vec![
        Field::new("database.url", &["ROAMCAT_DATABASE_URL"], database_url),
        Field::new(
            "database.max_connections",
            &["ROAMCAT_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections,
        ),
        Field::new("database.timeout_secs", &["ROAMCAT_DATABASE_TIMEOUT_SECS"], config.database.timeout_secs),
        Field::new("upstream.base_url", &["ROAMCAT_UPSTREAM_BASE_URL"], &config.upstream.base_url),
        Field::new("upstream.api_key", &["ROAMCAT_UPSTREAM_API_KEY"], api_key),
        Field::new(
            "upstream.catalogue_path",
            &["ROAMCAT_UPSTREAM_CATALOGUE_PATH"],
            &config.upstream.catalogue_path,
        ),
        Field::new("upstream.countries_path", &["ROAMCAT_UPSTREAM_COUNTRIES_PATH"], countries_path),
        Field::new("upstream.timeout_secs", &["ROAMCAT_UPSTREAM_TIMEOUT_SECS"], config.upstream.timeout_secs),
        Field::new(
            "catalogue.margin_multiplier",
            &["ROAMCAT_CATALOGUE_MARGIN_MULTIPLIER"],
            catalogue.margin_multiplier,
        ),
        Field::new("catalogue.cache_ttl_secs", &["ROAMCAT_CATALOGUE_CACHE_TTL_SECS"], catalogue.cache_ttl_secs),
        Field::new("catalogue.page_delay_ms", &["ROAMCAT_CATALOGUE_PAGE_DELAY_MS"], catalogue.page_delay_ms),
        Field::new(
            "catalogue.page_retry_delay_ms",
            &["ROAMCAT_CATALOGUE_PAGE_RETRY_DELAY_MS"],
            catalogue.page_retry_delay_ms,
        ),
        Field::new(
            "catalogue.bootstrap_retry_secs",
            &["ROAMCAT_CATALOGUE_BOOTSTRAP_RETRY_SECS"],
            catalogue.bootstrap_retry_secs,
        ),
        Field::new(
            "catalogue.misconfigured_retry_secs",
            &["ROAMCAT_CATALOGUE_MISCONFIGURED_RETRY_SECS"],
            catalogue.misconfigured_retry_secs,
        ),
        Field::new("catalogue.watchdog_secs", &["ROAMCAT_CATALOGUE_WATCHDOG_SECS"], catalogue.watchdog_secs),
        Field::new(
            "catalogue.force_rebuild",
            &["ROAMCAT_CATALOGUE_FORCE_REBUILD", "ROAMCAT_FORCE_REBUILD"],
            catalogue.force_rebuild,
        ),
        Field::new(
            "catalogue.home_country",
            &["ROAMCAT_CATALOGUE_HOME_COUNTRY", "ROAMCAT_HOME_COUNTRY"],
            &catalogue.home_country,
        ),
        Field::new("catalogue.snapshot_key", &["ROAMCAT_CATALOGUE_SNAPSHOT_KEY"], &catalogue.snapshot_key),
        Field::new("server.bind_address", &["ROAMCAT_SERVER_BIND_ADDRESS"], &config.server.bind_address),
        Field::new("server.port", &["ROAMCAT_SERVER_PORT"], config.server.port),
        Field::new(
            "server.graceful_shutdown_secs",
            &["ROAMCAT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs,
        ),
        Field::new("logging.level", &["ROAMCAT_LOGGING_LEVEL", "ROAMCAT_LOG_LEVEL"], &config.logging.level),
        Field::new(
            "logging.format",
            &["ROAMCAT_LOGGING_FORMAT", "ROAMCAT_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["roamcat.toml", "config/roamcat.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long keys so operators can tell keys apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 12 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn redaction_never_reveals_short_keys() {
        assert_eq!(redact_key("   "), "<empty>");
        assert_eq!(redact_key("abc123"), "<redacted>");
        assert_eq!(redact_key("0123456789abcdef"), "***cdef");
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[catalogue]\nhome_country = \"RU\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "catalogue.home_country"));
        assert!(!contains_path(&doc, "catalogue.snapshot_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
