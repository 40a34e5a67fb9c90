//! Declarative table of the regional plan families.
//!
//! The grouping engine and the `/packages?region=` listing both read this
//! table, so a region's matcher, display metadata and static coverage live in
//! one place.

use crate::domain::package::Package;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionId {
    GlobalLight,
    EuropeUsa,
    MiddleEast,
    GlobalStandard,
    Asia,
    Americas,
    Africa,
    EuropeBusinessHubs,
    SouthEastEurope,
    GlobalMax,
}

/// Substring matcher over a package name reduced to lowercase alphanumerics,
/// so `"Europe + USA"` and `"Europe+USA"` both compact to `"europeusa"`.
#[derive(Clone, Copy, Debug)]
pub struct NameMatcher {
    pub any_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        let compacted = compact(name);
        self.any_of.iter().any(|needle| compacted.contains(needle))
            && !self.none_of.iter().any(|needle| compacted.contains(needle))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RegionDefinition {
    pub id: RegionId,
    pub slug: &'static str,
    pub name: &'static str,
    pub name_ru: &'static str,
    pub icon: &'static str,
    pub order: u32,
    pub matcher: NameMatcher,
    /// Region whose entries are cross-listed under this one and must be
    /// removed from its listing.
    pub excludes: Option<RegionId>,
    /// Fall back to filtering multi-country plans by static coverage when no
    /// name matches.
    pub coverage_filter_fallback: bool,
}

impl RegionDefinition {
    pub fn matches(&self, package: &Package) -> bool {
        self.matcher.matches(&package.name)
    }

    pub fn static_coverage(&self) -> Vec<String> {
        static_coverage(self.name).unwrap_or_default()
    }
}

/// Display order is fixed so similar "Global" tiers are not shown side by side.
pub static REGIONS: [RegionDefinition; 10] = [
    RegionDefinition {
        id: RegionId::GlobalLight,
        slug: "global-light",
        name: "Global - Light",
        name_ru: "Глобальный Лайт",
        icon: "🌐",
        order: 1,
        matcher: NameMatcher { any_of: &["globallight"], none_of: &[] },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::EuropeUsa,
        slug: "europe-usa",
        name: "Europe + USA",
        name_ru: "Европа + США",
        icon: "🇪🇺",
        order: 2,
        matcher: NameMatcher { any_of: &["europeusa", "europeandusa"], none_of: &[] },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::MiddleEast,
        slug: "middle-east",
        name: "Middle East",
        name_ru: "Ближний Восток",
        icon: "🕌",
        order: 3,
        matcher: NameMatcher { any_of: &["middleeast"], none_of: &[] },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::GlobalStandard,
        slug: "global-standard",
        name: "Global - Standard",
        name_ru: "Глобальный Стандарт",
        icon: "🌍",
        order: 4,
        matcher: NameMatcher { any_of: &["globalstandard"], none_of: &[] },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::Asia,
        slug: "asia",
        name: "Asia",
        name_ru: "Азия",
        icon: "🌏",
        order: 5,
        matcher: NameMatcher { any_of: &["asia"], none_of: &["eurasia"] },
        excludes: Some(RegionId::MiddleEast),
        coverage_filter_fallback: true,
    },
    RegionDefinition {
        id: RegionId::Americas,
        slug: "americas",
        name: "Americas",
        name_ru: "Америка",
        icon: "🌎",
        order: 6,
        matcher: NameMatcher {
            any_of: &["americas", "northamerica", "latinamerica", "southamerica"],
            none_of: &[],
        },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::Africa,
        slug: "africa",
        name: "Africa",
        name_ru: "Африка",
        icon: "🦁",
        order: 7,
        matcher: NameMatcher { any_of: &["africa"], none_of: &["middleeast"] },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::EuropeBusinessHubs,
        slug: "europe-business-hubs",
        name: "Europe + Business Hubs",
        name_ru: "Европа + бизнес-хабы",
        icon: "💼",
        order: 8,
        matcher: NameMatcher { any_of: &["businesshub", "europebusiness"], none_of: &[] },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::SouthEastEurope,
        slug: "south-east-europe",
        name: "South East Europe",
        name_ru: "Юго-Восточная Европа",
        icon: "🏔️",
        order: 9,
        matcher: NameMatcher {
            any_of: &["southeasteurope", "southeasterneurope", "balkans"],
            none_of: &[],
        },
        excludes: None,
        coverage_filter_fallback: false,
    },
    RegionDefinition {
        id: RegionId::GlobalMax,
        slug: "global-max",
        name: "Global - Max",
        name_ru: "Глобальный Макс",
        icon: "🚀",
        order: 10,
        matcher: NameMatcher { any_of: &["globalmax"], none_of: &[] },
        excludes: None,
        coverage_filter_fallback: false,
    },
];

impl RegionId {
    pub fn definition(self) -> &'static RegionDefinition {
        REGIONS.iter().find(|region| region.id == self).unwrap_or(&REGIONS[0])
    }
}

pub fn region_by_slug(slug: &str) -> Option<&'static RegionDefinition> {
    let slug = slug.trim().to_ascii_lowercase();
    REGIONS.iter().find(|region| region.slug == slug)
}

pub fn compact(name: &str) -> String {
    name.chars().filter(|ch| ch.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

const EUROPE: &[&str] = &[
    "AT", "BE", "BG", "CH", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GB", "GR", "HR", "HU",
    "IE", "IS", "IT", "LI", "LT", "LU", "LV", "MT", "NL", "NO", "PL", "PT", "RO", "SE", "SI", "SK",
];
const USA: &[&str] = &["US"];
const BUSINESS_HUBS: &[&str] = &["US", "CA", "AE", "SG", "HK", "JP", "KR", "TR", "IL"];
const ASIA: &[&str] = &[
    "CN", "HK", "MO", "JP", "KR", "TW", "TH", "VN", "MY", "SG", "ID", "PH", "IN", "LK", "KH", "LA",
    "BD", "PK", "NP", "MN", "UZ", "KZ", "KG",
];
const MIDDLE_EAST: &[&str] = &["AE", "SA", "QA", "KW", "BH", "OM", "JO", "IL", "TR", "EG", "IQ"];
const AMERICAS: &[&str] = &[
    "US", "CA", "MX", "BR", "AR", "CL", "CO", "PE", "EC", "UY", "PY", "BO", "CR", "PA", "GT", "HN",
    "SV", "NI", "DO", "PR", "JM",
];
const AFRICA: &[&str] = &[
    "ZA", "EG", "MA", "TN", "KE", "TZ", "UG", "NG", "GH", "SN", "CI", "CM", "ZM", "MW", "MZ", "MG",
    "MU", "RW", "BW", "NA",
];
const BALKANS: &[&str] = &["AL", "BA", "BG", "HR", "ME", "MK", "RO", "RS", "SI", "GR", "XK", "MD"];
const CARIBBEAN: &[&str] = &[
    "AG", "AI", "AW", "BB", "BS", "CW", "DM", "DO", "GD", "HT", "JM", "KN", "KY", "LC", "PR", "TC",
    "TT", "VC", "VG",
];
const GLOBAL_EXTRA: &[&str] = &["AU", "NZ", "GE", "AM", "AZ", "RS", "ME", "AL", "MK", "BA", "UA"];

struct CoverageEntry {
    aliases: &'static [&'static str],
    parts: &'static [&'static [&'static str]],
}

const STATIC_COVERAGE: &[CoverageEntry] = &[
    CoverageEntry {
        aliases: &["global", "globallight", "globalstandard", "globalmax", "world", "worldwide"],
        parts: &[EUROPE, AMERICAS, ASIA, MIDDLE_EAST, AFRICA, GLOBAL_EXTRA],
    },
    CoverageEntry { aliases: &["europeusa", "europeandusa"], parts: &[EUROPE, USA] },
    CoverageEntry {
        aliases: &["europebusinesshubs", "europebusiness", "businesshubs"],
        parts: &[EUROPE, BUSINESS_HUBS],
    },
    CoverageEntry { aliases: &["europe", "eu", "europeanunion"], parts: &[EUROPE] },
    CoverageEntry { aliases: &["asia", "asiapacific", "apac"], parts: &[ASIA] },
    CoverageEntry { aliases: &["middleeast", "mena", "gulf"], parts: &[MIDDLE_EAST] },
    CoverageEntry {
        aliases: &["americas", "northamerica", "latinamerica", "southamerica", "latam"],
        parts: &[AMERICAS],
    },
    CoverageEntry { aliases: &["africa"], parts: &[AFRICA] },
    CoverageEntry {
        aliases: &["southeasteurope", "southeasterneurope", "balkans"],
        parts: &[BALKANS],
    },
    CoverageEntry { aliases: &["caribbean", "caribbeanislands"], parts: &[CARIBBEAN] },
];

/// Hand-maintained ISO coverage for a region name or one of its synonyms.
/// Exact alias matches win over partial ones.
pub fn static_coverage(name: &str) -> Option<Vec<String>> {
    let key = compact(name);
    if key.is_empty() {
        return None;
    }

    let entry = STATIC_COVERAGE
        .iter()
        .find(|entry| entry.aliases.contains(&key.as_str()))
        .or_else(|| {
            STATIC_COVERAGE
                .iter()
                .find(|entry| entry.aliases.iter().any(|alias| key.contains(alias)))
        })?;

    let mut codes: Vec<String> = Vec::new();
    for code in entry.parts.iter().flat_map(|part| part.iter()) {
        if !codes.iter().any(|existing| existing == code) {
            codes.push((*code).to_string());
        }
    }
    Some(codes)
}
