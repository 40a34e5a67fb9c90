use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display value the storefront shows for plans without a data cap.
pub const UNLIMITED_DATA: &str = "Безлимит";

/// Megabyte sentinel used for unlimited plans when ranking.
pub const UNLIMITED_MB: i64 = -1;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub String);

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A purchasable tariff variant after normalization and markup.
///
/// The regional fields are only populated on synthesized category entries
/// produced by the grouping engine; catalogue entries leave them empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub data: String,
    pub validity: u32,
    pub country: String,
    #[serde(default)]
    pub coverage: Vec<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub original_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_regional_category: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name_ru: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_coverage: Option<Vec<String>>,
    #[serde(rename = "_order", default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl Package {
    pub fn is_unlimited(&self) -> bool {
        data_to_mb(&self.data) == UNLIMITED_MB
    }

    pub fn data_mb(&self) -> i64 {
        data_to_mb(&self.data)
    }

    /// True when the plan is sold for `code` either as its primary country or
    /// through its coverage list.
    pub fn covers(&self, code: &str) -> bool {
        self.country.eq_ignore_ascii_case(code)
            || self.coverage.iter().any(|entry| entry.eq_ignore_ascii_case(code))
    }

    /// Key used to collapse duplicate rows in the full catalogue.
    pub fn catalogue_key(&self) -> (String, String, u32) {
        (self.name.clone(), self.data.clone(), self.validity)
    }
}

/// Converts a display allowance (`"5GB"`, `"500MB"`, `"1.5 GB"`, `"Безлимит"`)
/// into megabytes. Unlimited plans map to [`UNLIMITED_MB`]; unreadable values
/// map to zero so they rank with the unprioritized plans.
pub fn data_to_mb(data: &str) -> i64 {
    let normalized = data.trim().to_lowercase();
    if normalized == UNLIMITED_DATA.to_lowercase() || normalized.contains("unlimited") {
        return UNLIMITED_MB;
    }

    let compact: String = normalized.chars().filter(|ch| !ch.is_whitespace()).collect();
    let (number, multiplier) = if let Some(value) = compact.strip_suffix("gb") {
        (value, 1000.0)
    } else if let Some(value) = compact.strip_suffix("mb") {
        (value, 1.0)
    } else {
        (compact.as_str(), 1.0)
    };

    number
        .replace(',', ".")
        .parse::<f64>()
        .map(|value| (value * multiplier).round() as i64)
        .unwrap_or(0)
}

/// True when `value` looks like an ISO 3166-1 alpha-2 code.
pub fn is_iso2(value: &str) -> bool {
    value.len() == 2 && value.chars().all(|ch| ch.is_ascii_alphabetic())
}
