use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalogue::raw::RawBundle;
use crate::domain::package::{Package, PackageId, UNLIMITED_DATA};

const DEFAULT_DATA: &str = "1GB";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("bundle is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("bundle `{name}` has an invalid price: {detail}")]
    InvalidPrice { name: String, detail: String },
}

/// Maps raw provider bundles onto priced [`Package`] values.
pub struct Normalizer {
    margin: Decimal,
    sample_logged: AtomicBool,
}

impl Normalizer {
    pub fn new(margin: Decimal) -> Self {
        Self { margin, sample_logged: AtomicBool::new(false) }
    }

    pub fn margin(&self) -> Decimal {
        self.margin
    }

    /// Quoted price for an upstream price: `round(original * margin, 2)`.
    pub fn quote(&self, original_price: Decimal) -> Decimal {
        quote_price(original_price, self.margin)
    }

    pub fn normalize(&self, raw: &RawBundle) -> Result<Package, NormalizeError> {
        let id = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(NormalizeError::MissingField("name"))?;
        let validity = raw.duration.ok_or(NormalizeError::MissingField("duration"))?;
        let raw_price = raw.price.ok_or(NormalizeError::MissingField("price"))?;

        let original_price = Decimal::try_from(raw_price).map_err(|error| {
            NormalizeError::InvalidPrice { name: id.to_string(), detail: error.to_string() }
        })?;
        if original_price.is_sign_negative() {
            return Err(NormalizeError::InvalidPrice {
                name: id.to_string(),
                detail: format!("negative price {raw_price}"),
            });
        }

        let coverage: Vec<String> = raw
            .countries
            .iter()
            .filter_map(|country| country.iso.as_deref())
            .map(|iso| iso.trim().to_ascii_uppercase())
            .filter(|iso| !iso.is_empty())
            .collect();
        let country = coverage.first().cloned().unwrap_or_default();

        let package = Package {
            id: PackageId(id.to_string()),
            name: display_name(raw, id),
            data: data_display(raw),
            validity,
            country,
            coverage,
            original_price,
            price: self.quote(original_price),
            is_regional_category: false,
            region_name: None,
            region_name_ru: None,
            region_icon: None,
            variants_count: None,
            region_coverage: None,
            order: None,
        };

        self.log_global_light_sample(raw, &package);
        Ok(package)
    }

    /// Normalizes a batch, logging and skipping rejected records.
    pub fn normalize_all(&self, bundles: &[RawBundle]) -> Vec<Package> {
        let mut packages = Vec::with_capacity(bundles.len());
        let mut rejected = 0_usize;

        for bundle in bundles {
            match self.normalize(bundle) {
                Ok(package) => packages.push(package),
                Err(error) => {
                    rejected += 1;
                    warn!(
                        event_name = "catalogue.normalize.rejected",
                        bundle = bundle.name.as_deref().unwrap_or("unknown"),
                        error = %error,
                        "skipping malformed upstream bundle"
                    );
                }
            }
        }

        if rejected > 0 {
            warn!(
                event_name = "catalogue.normalize.summary",
                accepted = packages.len(),
                rejected,
                "normalized upstream bundles with rejections"
            );
        }

        packages
    }

    fn log_global_light_sample(&self, raw: &RawBundle, package: &Package) {
        let compact: String =
            package.name.chars().filter(char::is_ascii_alphanumeric).collect::<String>();
        if !compact.eq_ignore_ascii_case("globallight") {
            return;
        }
        if self.sample_logged.swap(true, Ordering::Relaxed) {
            return;
        }

        info!(
            event_name = "catalogue.normalize.global_light_sample",
            bundle = %package.id,
            description = raw.description.as_deref().unwrap_or(""),
            country_count = raw.countries.len(),
            first_coverage = package.coverage.first().map(String::as_str).unwrap_or(""),
            data = %package.data,
            validity = package.validity,
            "first Global Light bundle sample"
        );
    }
}

pub fn quote_price(original_price: Decimal, margin: Decimal) -> Decimal {
    (original_price * margin).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Display allowance for a bundle, falling back to the free-text description
/// when the provider omitted `dataAmount`.
pub fn data_display(raw: &RawBundle) -> String {
    if raw.unlimited == Some(true) {
        return UNLIMITED_DATA.to_string();
    }

    match raw.data_amount {
        Some(amount) => format_data_amount(amount),
        None => raw
            .description
            .as_deref()
            .and_then(data_from_description)
            .unwrap_or_else(|| DEFAULT_DATA.to_string()),
    }
}

pub fn format_data_amount(megabytes: i64) -> String {
    if megabytes < 0 {
        return UNLIMITED_DATA.to_string();
    }
    if megabytes >= 1000 {
        if megabytes % 1000 == 0 {
            return format!("{}GB", megabytes / 1000);
        }
        return format!("{:.1}GB", megabytes as f64 / 1000.0);
    }
    format!("{megabytes}MB")
}

fn allowance_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(gb|mb)\b").ok()).as_ref()
}

/// Pulls an allowance such as `"3GB"` out of a provider description.
pub fn data_from_description(description: &str) -> Option<String> {
    let lowered = description.to_lowercase();
    if lowered.contains("unlimited") || lowered.contains("безлимит") {
        return Some(UNLIMITED_DATA.to_string());
    }

    let captures = allowance_pattern()?.captures(description)?;
    let amount = captures.get(1)?.as_str().replace(',', ".");
    let unit = captures.get(2)?.as_str().to_ascii_uppercase();
    Some(format!("{amount}{unit}"))
}

/// The region or country segment of descriptions shaped like
/// `"eSIM, 1GB, 7 Days, Global - Light, V2"`.
pub fn display_name(raw: &RawBundle, fallback: &str) -> String {
    let Some(description) = raw.description.as_deref().map(str::trim).filter(|d| !d.is_empty())
    else {
        return fallback.to_string();
    };

    let segments: Vec<&str> = description.split(',').map(str::trim).collect();
    if segments.len() >= 4 && segments[0].eq_ignore_ascii_case("esim") && !segments[3].is_empty() {
        return segments[3].to_string();
    }

    description.to_string()
}

/// ISO-2 → display name pairs carried by the raw bundles.
pub fn country_names(bundles: &[RawBundle]) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    for country in bundles.iter().flat_map(|bundle| bundle.countries.iter()) {
        let (Some(iso), Some(name)) = (country.iso.as_deref(), country.name.as_deref()) else {
            continue;
        };
        let iso = iso.trim().to_ascii_uppercase();
        if crate::domain::package::is_iso2(&iso) && !name.trim().is_empty() {
            names.entry(iso).or_insert_with(|| name.trim().to_string());
        }
    }
    names
}
