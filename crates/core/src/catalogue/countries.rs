use std::collections::{BTreeMap, BTreeSet};

use crate::domain::country::Country;
use crate::domain::package::{is_iso2, Package};

/// Destinations always offered in the picker, even before the catalogue
/// lists them.
pub const MUST_HAVE_COUNTRIES: &[(&str, &str)] = &[
    ("AE", "United Arab Emirates"),
    ("AM", "Armenia"),
    ("CN", "China"),
    ("CY", "Cyprus"),
    ("DE", "Germany"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FR", "France"),
    ("GE", "Georgia"),
    ("ID", "Indonesia"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("KZ", "Kazakhstan"),
    ("LK", "Sri Lanka"),
    ("ME", "Montenegro"),
    ("MV", "Maldives"),
    ("RS", "Serbia"),
    ("TH", "Thailand"),
    ("TR", "Turkey"),
    ("US", "United States"),
    ("UZ", "Uzbekistan"),
    ("VN", "Vietnam"),
];

fn must_have_name(code: &str) -> Option<&'static str> {
    MUST_HAVE_COUNTRIES
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, name)| *name)
}

/// Derives the country picker from cached packages: the distinct ISO codes of
/// each entry's primary country (or first coverage value), plus the
/// must-have destinations, minus the home country, sorted by name.
pub fn derive_countries(
    packages: &[Package],
    names: &BTreeMap<String, String>,
    home_country: &str,
) -> Vec<Country> {
    let mut codes: BTreeSet<String> = packages
        .iter()
        .filter_map(|package| {
            [Some(package.country.as_str()), package.coverage.first().map(String::as_str)]
                .into_iter()
                .flatten()
                .find(|code| is_iso2(code))
                .map(str::to_ascii_uppercase)
        })
        .collect();
    codes.extend(MUST_HAVE_COUNTRIES.iter().map(|(code, _)| code.to_string()));

    let countries = codes
        .into_iter()
        .map(|code| {
            let name = names
                .get(&code)
                .cloned()
                .or_else(|| must_have_name(&code).map(str::to_string))
                .unwrap_or_else(|| code.clone());
            Country::new(code, name)
        })
        .collect();

    finish_countries(countries, home_country)
}

/// Fills missing flags, drops the home country and sorts by display name.
pub fn finish_countries(countries: Vec<Country>, home_country: &str) -> Vec<Country> {
    let mut countries: Vec<Country> = countries
        .into_iter()
        .filter(|country| !country.code.eq_ignore_ascii_case(home_country))
        .map(|country| match country.flag {
            Some(_) => country,
            None => Country::new(country.code, country.name),
        })
        .collect();
    countries.sort_by(|left, right| left.name.cmp(&right.name).then_with(|| left.code.cmp(&right.code)));
    countries
}
