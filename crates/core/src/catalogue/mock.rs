//! Last-resort catalogue served when no cache tier is loaded and the provider
//! cannot be reached, so listing responses keep their shape.

use rust_decimal::Decimal;

use crate::catalogue::normalize::quote_price;
use crate::domain::package::{Package, PackageId, UNLIMITED_DATA};

struct MockEntry {
    id: &'static str,
    name: &'static str,
    data: &'static str,
    validity: u32,
    country: &'static str,
    coverage: &'static [&'static str],
    price_cents: i64,
}

const MOCK_ENTRIES: &[MockEntry] = &[
    MockEntry {
        id: "mock_global_light_1gb_7d",
        name: "Global - Light",
        data: "1GB",
        validity: 7,
        country: "GLOBAL",
        coverage: &[],
        price_cents: 450,
    },
    MockEntry {
        id: "mock_global_light_3gb_30d",
        name: "Global - Light",
        data: "3GB",
        validity: 30,
        country: "GLOBAL",
        coverage: &[],
        price_cents: 1100,
    },
    MockEntry {
        id: "mock_eu_3gb_15d",
        name: "Europe",
        data: "3GB",
        validity: 15,
        country: "EU",
        coverage: &["DE", "FR", "IT", "ES"],
        price_cents: 600,
    },
    MockEntry {
        id: "mock_eu_unlimited_7d",
        name: "Europe",
        data: UNLIMITED_DATA,
        validity: 7,
        country: "EU",
        coverage: &["DE", "FR", "IT", "ES"],
        price_cents: 1500,
    },
    MockEntry {
        id: "mock_tr_1gb_7d",
        name: "Turkey",
        data: "1GB",
        validity: 7,
        country: "TR",
        coverage: &["TR"],
        price_cents: 300,
    },
    MockEntry {
        id: "mock_tr_5gb_30d",
        name: "Turkey",
        data: "5GB",
        validity: 30,
        country: "TR",
        coverage: &["TR"],
        price_cents: 900,
    },
    MockEntry {
        id: "mock_ae_1gb_7d",
        name: "United Arab Emirates",
        data: "1GB",
        validity: 7,
        country: "AE",
        coverage: &["AE"],
        price_cents: 500,
    },
    MockEntry {
        id: "mock_th_1gb_7d",
        name: "Thailand",
        data: "1GB",
        validity: 7,
        country: "TH",
        coverage: &["TH"],
        price_cents: 350,
    },
];

/// Mock packages priced with the configured margin.
pub fn mock_catalogue(margin: Decimal) -> Vec<Package> {
    MOCK_ENTRIES
        .iter()
        .map(|entry| {
            let original_price = Decimal::new(entry.price_cents, 2);
            Package {
                id: PackageId(entry.id.to_string()),
                name: entry.name.to_string(),
                data: entry.data.to_string(),
                validity: entry.validity,
                country: entry.country.to_string(),
                coverage: entry.coverage.iter().map(|code| code.to_string()).collect(),
                original_price,
                price: quote_price(original_price, margin),
                is_regional_category: false,
                region_name: None,
                region_name_ru: None,
                region_icon: None,
                variants_count: None,
                region_coverage: None,
                order: None,
            }
        })
        .collect()
}
