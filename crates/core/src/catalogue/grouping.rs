use crate::catalogue::regions::{RegionDefinition, REGIONS};
use crate::domain::package::{is_iso2, Package};

/// One representative entry per known region family, in display order.
/// Regions without any matching plan are skipped; an empty result means the
/// caller should fall back to raw catalogue entries.
pub fn regional_categories(catalogue: &[Package]) -> Vec<Package> {
    let mut categories: Vec<Package> =
        REGIONS.iter().filter_map(|region| category_for(region, catalogue)).collect();
    categories.sort_by_key(|category| category.order);
    categories
}

fn category_for(region: &RegionDefinition, catalogue: &[Package]) -> Option<Package> {
    let variants: Vec<&Package> =
        catalogue.iter().filter(|package| region.matches(package)).collect();

    let representative = cheapest(variants.iter().copied().filter(|p| !p.is_unlimited()))
        .or_else(|| cheapest(variants.iter().copied()))?;

    let mut coverage: Vec<String> = Vec::new();
    for code in variants.iter().flat_map(|variant| variant.coverage.iter()) {
        if !coverage.contains(code) {
            coverage.push(code.clone());
        }
    }
    if coverage.first().map_or(true, |first| !is_iso2(first)) {
        coverage = region.static_coverage();
    }

    let mut category = representative.clone();
    category.is_regional_category = true;
    category.region_name = Some(region.name.to_string());
    category.region_name_ru = Some(region.name_ru.to_string());
    category.region_icon = Some(region.icon.to_string());
    category.variants_count = Some(variants.len());
    category.region_coverage = Some(coverage);
    category.order = Some(region.order);
    Some(category)
}

fn cheapest<'a>(packages: impl Iterator<Item = &'a Package>) -> Option<&'a Package> {
    packages.fold(None, |best: Option<&Package>, candidate| match best {
        Some(current) if current.price <= candidate.price => Some(current),
        _ => Some(candidate),
    })
}
