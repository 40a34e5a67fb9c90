//! Wire shapes returned by the upstream eSIM catalogue API.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CataloguePage {
    #[serde(default)]
    pub bundles: Vec<RawBundle>,
    #[serde(default = "default_page_count")]
    pub page_count: u32,
    #[serde(default)]
    pub rows: u64,
}

fn default_page_count() -> u32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCountry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub iso: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBundle {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub countries: Vec<RawCountry>,
    /// Allowance in megabytes; `-1` marks an unlimited bundle.
    #[serde(default)]
    pub data_amount: Option<i64>,
    /// Validity in days.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub unlimited: Option<bool>,
}

/// Shape of the optional upstream countries endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CountriesPayload {
    #[serde(default)]
    pub countries: Vec<RawCountry>,
}
