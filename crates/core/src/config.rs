use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalogue::snapshot::DEFAULT_SNAPSHOT_KEY;
use crate::domain::package::is_iso2;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub catalogue: CatalogueConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Empty disables snapshot persistence.
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub catalogue_path: String,
    /// Empty when the provider has no countries endpoint.
    pub countries_path: String,
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct CatalogueConfig {
    pub margin_multiplier: Decimal,
    pub cache_ttl_secs: u64,
    pub page_delay_ms: u64,
    pub page_retry_delay_ms: u64,
    pub bootstrap_retry_secs: u64,
    pub misconfigured_retry_secs: u64,
    pub watchdog_secs: u64,
    pub force_rebuild: bool,
    pub home_country: String,
    pub snapshot_key: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub upstream_base_url: Option<String>,
    pub upstream_api_key: Option<String>,
    pub force_rebuild: Option<bool>,
    pub home_country: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://roamcat.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            upstream: UpstreamConfig {
                base_url: "https://api.esim-go.com/v2.4".to_string(),
                api_key: None,
                catalogue_path: "/catalogue".to_string(),
                countries_path: String::new(),
                timeout_secs: 30,
            },
            catalogue: CatalogueConfig {
                margin_multiplier: Decimal::TWO,
                cache_ttl_secs: 1800,
                page_delay_ms: 500,
                page_retry_delay_ms: 2000,
                bootstrap_retry_secs: 60,
                misconfigured_retry_secs: 300,
                watchdog_secs: 900,
                force_rebuild: false,
                home_country: "RU".to_string(),
                snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Blank keys count as unset so `api_key = ""` does not look configured.
fn secret_value(value: String) -> Option<SecretString> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.into())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("roamcat.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(upstream) = patch.upstream {
            if let Some(base_url) = upstream.base_url {
                self.upstream.base_url = base_url;
            }
            if let Some(api_key) = upstream.api_key {
                self.upstream.api_key = secret_value(api_key);
            }
            if let Some(catalogue_path) = upstream.catalogue_path {
                self.upstream.catalogue_path = catalogue_path;
            }
            if let Some(countries_path) = upstream.countries_path {
                self.upstream.countries_path = countries_path;
            }
            if let Some(timeout_secs) = upstream.timeout_secs {
                self.upstream.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalogue) = patch.catalogue {
            if let Some(margin_multiplier) = catalogue.margin_multiplier {
                self.catalogue.margin_multiplier = margin_multiplier;
            }
            if let Some(cache_ttl_secs) = catalogue.cache_ttl_secs {
                self.catalogue.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(page_delay_ms) = catalogue.page_delay_ms {
                self.catalogue.page_delay_ms = page_delay_ms;
            }
            if let Some(page_retry_delay_ms) = catalogue.page_retry_delay_ms {
                self.catalogue.page_retry_delay_ms = page_retry_delay_ms;
            }
            if let Some(bootstrap_retry_secs) = catalogue.bootstrap_retry_secs {
                self.catalogue.bootstrap_retry_secs = bootstrap_retry_secs;
            }
            if let Some(misconfigured_retry_secs) = catalogue.misconfigured_retry_secs {
                self.catalogue.misconfigured_retry_secs = misconfigured_retry_secs;
            }
            if let Some(watchdog_secs) = catalogue.watchdog_secs {
                self.catalogue.watchdog_secs = watchdog_secs;
            }
            if let Some(force_rebuild) = catalogue.force_rebuild {
                self.catalogue.force_rebuild = force_rebuild;
            }
            if let Some(home_country) = catalogue.home_country {
                self.catalogue.home_country = home_country;
            }
            if let Some(snapshot_key) = catalogue.snapshot_key {
                self.catalogue.snapshot_key = snapshot_key;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Set but empty is meaningful here: it turns persistence off.
        if let Ok(value) = env::var("ROAMCAT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ROAMCAT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("ROAMCAT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ROAMCAT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ROAMCAT_UPSTREAM_BASE_URL") {
            self.upstream.base_url = value;
        }
        if let Some(value) = read_env("ROAMCAT_UPSTREAM_API_KEY") {
            self.upstream.api_key = secret_value(value);
        }
        if let Some(value) = read_env("ROAMCAT_UPSTREAM_CATALOGUE_PATH") {
            self.upstream.catalogue_path = value;
        }
        if let Some(value) = read_env("ROAMCAT_UPSTREAM_COUNTRIES_PATH") {
            self.upstream.countries_path = value;
        }
        if let Some(value) = read_env("ROAMCAT_UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_u64("ROAMCAT_UPSTREAM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ROAMCAT_CATALOGUE_MARGIN_MULTIPLIER") {
            self.catalogue.margin_multiplier =
                parse_decimal("ROAMCAT_CATALOGUE_MARGIN_MULTIPLIER", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_CACHE_TTL_SECS") {
            self.catalogue.cache_ttl_secs = parse_u64("ROAMCAT_CATALOGUE_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_PAGE_DELAY_MS") {
            self.catalogue.page_delay_ms = parse_u64("ROAMCAT_CATALOGUE_PAGE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_PAGE_RETRY_DELAY_MS") {
            self.catalogue.page_retry_delay_ms =
                parse_u64("ROAMCAT_CATALOGUE_PAGE_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_BOOTSTRAP_RETRY_SECS") {
            self.catalogue.bootstrap_retry_secs =
                parse_u64("ROAMCAT_CATALOGUE_BOOTSTRAP_RETRY_SECS", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_MISCONFIGURED_RETRY_SECS") {
            self.catalogue.misconfigured_retry_secs =
                parse_u64("ROAMCAT_CATALOGUE_MISCONFIGURED_RETRY_SECS", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_WATCHDOG_SECS") {
            self.catalogue.watchdog_secs = parse_u64("ROAMCAT_CATALOGUE_WATCHDOG_SECS", &value)?;
        }
        for key in ["ROAMCAT_CATALOGUE_FORCE_REBUILD", "ROAMCAT_FORCE_REBUILD"] {
            if let Some(value) = read_env(key) {
                self.catalogue.force_rebuild = parse_bool(key, &value)?;
                break;
            }
        }
        let home_country = read_env("ROAMCAT_CATALOGUE_HOME_COUNTRY")
            .or_else(|| read_env("ROAMCAT_HOME_COUNTRY"));
        if let Some(value) = home_country {
            self.catalogue.home_country = value;
        }
        if let Some(value) = read_env("ROAMCAT_CATALOGUE_SNAPSHOT_KEY") {
            self.catalogue.snapshot_key = value;
        }

        if let Some(value) = read_env("ROAMCAT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ROAMCAT_SERVER_PORT") {
            self.server.port = parse_u16("ROAMCAT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ROAMCAT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ROAMCAT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("ROAMCAT_LOGGING_LEVEL").or_else(|| read_env("ROAMCAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ROAMCAT_LOGGING_FORMAT").or_else(|| read_env("ROAMCAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.upstream_base_url {
            self.upstream.base_url = base_url;
        }
        if let Some(api_key) = overrides.upstream_api_key {
            self.upstream.api_key = secret_value(api_key);
        }
        if let Some(force_rebuild) = overrides.force_rebuild {
            self.catalogue.force_rebuild = force_rebuild;
        }
        if let Some(home_country) = overrides.home_country {
            self.catalogue.home_country = home_country;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_upstream(&self.upstream)?;
        validate_catalogue(&self.catalogue)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("roamcat.toml"), PathBuf::from("config/roamcat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    if url.is_empty() {
        return Ok(());
    }

    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be empty or a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), ConfigError> {
    let base_url = upstream.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "upstream.base_url must start with http:// or https://".to_string(),
        ));
    }

    if !upstream.catalogue_path.starts_with('/') {
        return Err(ConfigError::Validation(
            "upstream.catalogue_path must start with `/`".to_string(),
        ));
    }

    let countries_path = upstream.countries_path.trim();
    if !countries_path.is_empty() && !countries_path.starts_with('/') {
        return Err(ConfigError::Validation(
            "upstream.countries_path must be empty or start with `/`".to_string(),
        ));
    }

    if upstream.timeout_secs == 0 || upstream.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "upstream.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalogue(catalogue: &CatalogueConfig) -> Result<(), ConfigError> {
    if catalogue.margin_multiplier <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "catalogue.margin_multiplier must be greater than zero".to_string(),
        ));
    }

    let positive = [
        ("catalogue.cache_ttl_secs", catalogue.cache_ttl_secs),
        ("catalogue.bootstrap_retry_secs", catalogue.bootstrap_retry_secs),
        ("catalogue.misconfigured_retry_secs", catalogue.misconfigured_retry_secs),
        ("catalogue.watchdog_secs", catalogue.watchdog_secs),
    ];
    if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
    }

    let home_country = catalogue.home_country.trim();
    if !home_country.is_empty() && !is_iso2(home_country) {
        return Err(ConfigError::Validation(
            "catalogue.home_country must be empty or a two-letter ISO code".to_string(),
        ));
    }

    if catalogue.snapshot_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "catalogue.snapshot_key must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    upstream: Option<UpstreamPatch>,
    catalogue: Option<CataloguePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    catalogue_path: Option<String>,
    countries_path: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CataloguePatch {
    margin_multiplier: Option<Decimal>,
    cache_ttl_secs: Option<u64>,
    page_delay_ms: Option<u64>,
    page_retry_delay_ms: Option<u64>,
    bootstrap_retry_secs: Option<u64>,
    misconfigured_retry_secs: Option<u64>,
    watchdog_secs: Option<u64>,
    force_rebuild: Option<bool>,
    home_country: Option<String>,
    snapshot_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
