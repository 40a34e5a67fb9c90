//! Tariff selection ("smart filter"): bounds a candidate list to a short,
//! policy-ordered list that balances fixed-allowance and unlimited plans.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::package::Package;

/// Preferred limited plans as `(megabytes, days)`, best first.
pub const LIMITED_PRIORITY: [(i64, u32); 5] =
    [(1000, 7), (2000, 15), (5000, 30), (10000, 30), (50000, 30)];

/// Rank of limited plans missing from [`LIMITED_PRIORITY`].
pub const UNPRIORITIZED: usize = 999;

/// Preferred validity order for unlimited plans.
pub const UNLIMITED_VALIDITY_ORDER: [u32; 6] = [1, 3, 5, 7, 15, 30];

pub const GUARANTEED_VALIDITY_DAYS: u32 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub limit: usize,
    pub max_unlimited: usize,
    pub reserve_unlimited: bool,
    pub guarantee_seven_day: bool,
}

impl SelectionPolicy {
    /// Per-country tariff list.
    pub const COUNTRY: Self =
        Self { limit: 10, max_unlimited: 6, reserve_unlimited: true, guarantee_seven_day: true };

    /// Per-region "all variants" listing.
    pub const REGION: Self =
        Self { limit: 50, max_unlimited: 10, reserve_unlimited: true, guarantee_seven_day: true };
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::COUNTRY
    }
}

pub fn limited_priority(data_mb: i64, validity: u32) -> usize {
    LIMITED_PRIORITY
        .iter()
        .position(|&(mb, days)| mb == data_mb && days == validity)
        .unwrap_or(UNPRIORITIZED)
}

fn unlimited_rank(validity: u32) -> usize {
    UNLIMITED_VALIDITY_ORDER
        .iter()
        .position(|&days| days == validity)
        .unwrap_or(UNLIMITED_VALIDITY_ORDER.len())
}

fn compare_limited(a: &Package, b: &Package) -> Ordering {
    limited_priority(a.data_mb(), a.validity)
        .cmp(&limited_priority(b.data_mb(), b.validity))
        .then_with(|| a.price.cmp(&b.price))
}

fn compare_unlimited(a: &Package, b: &Package) -> Ordering {
    unlimited_rank(a.validity)
        .cmp(&unlimited_rank(b.validity))
        .then_with(|| a.price.cmp(&b.price))
}

pub fn smart_filter(candidates: &[Package], policy: SelectionPolicy) -> Vec<Package> {
    if policy.limit == 0 {
        return Vec::new();
    }

    let (mut limited, mut unlimited): (Vec<&Package>, Vec<&Package>) =
        candidates.iter().partition(|package| !package.is_unlimited());
    limited.sort_by(|a, b| compare_limited(a, b));
    unlimited.sort_by(|a, b| compare_unlimited(a, b));

    let unlimited_slots = if policy.reserve_unlimited && !unlimited.is_empty() {
        unlimited.len().min(policy.max_unlimited).min(policy.limit)
    } else {
        0
    };
    let limited_slots = policy.limit - unlimited_slots;

    let mut selected_limited: Vec<&Package> = limited.iter().take(limited_slots).copied().collect();
    let mut selected_unlimited: Vec<&Package> =
        unlimited.iter().take(unlimited_slots).copied().collect();

    if policy.guarantee_seven_day {
        guarantee_seven_day(&limited, &mut selected_limited, selected_unlimited.len(), policy.limit);
    }

    // Slots left unused by the reservation go to whatever remains, limited first.
    let mut free = policy.limit.saturating_sub(selected_limited.len() + selected_unlimited.len());
    for package in &limited {
        if free == 0 {
            break;
        }
        if !contains(&selected_limited, package) {
            selected_limited.push(*package);
            free -= 1;
        }
    }
    for package in &unlimited {
        if free == 0 {
            break;
        }
        if !contains(&selected_unlimited, package) {
            selected_unlimited.push(*package);
            free -= 1;
        }
    }

    let mut result: Vec<Package> =
        selected_limited.into_iter().chain(selected_unlimited).cloned().collect();
    result.truncate(policy.limit);
    result
}

fn guarantee_seven_day<'a>(
    ranked_limited: &[&'a Package],
    selected_limited: &mut Vec<&'a Package>,
    selected_unlimited: usize,
    limit: usize,
) {
    let Some(seven_day) =
        ranked_limited.iter().copied().find(|p| p.validity == GUARANTEED_VALIDITY_DAYS)
    else {
        return;
    };
    if contains(selected_limited, seven_day) {
        return;
    }

    if selected_limited.len() + selected_unlimited < limit {
        selected_limited.insert(0, seven_day);
        return;
    }

    let costliest = selected_limited
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.price.cmp(&b.price))
        .map(|(index, _)| index);
    if let Some(index) = costliest {
        selected_limited.remove(index);
        selected_limited.insert(0, seven_day);
    }
}

fn contains(selected: &[&Package], package: &Package) -> bool {
    selected.iter().any(|existing| std::ptr::eq(*existing, package))
}

/// Collapses candidates sharing `(data, validity)`.
///
/// A "Standard" tier plan beats an unlimited plan without a tier marker;
/// otherwise the cheaper plan wins. First-seen order is preserved.
pub fn dedup_variants(candidates: &[Package]) -> Vec<Package> {
    let mut kept: Vec<Package> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<(String, u32), usize> = HashMap::new();

    for candidate in candidates {
        let key = (candidate.data.clone(), candidate.validity);
        match index.get(&key) {
            Some(&position) => {
                if prefers(candidate, &kept[position]) {
                    kept[position] = candidate.clone();
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(candidate.clone());
            }
        }
    }

    kept
}

fn prefers(candidate: &Package, existing: &Package) -> bool {
    if is_standard_tier(candidate) && is_untiered_unlimited(existing) {
        return true;
    }
    if is_standard_tier(existing) && is_untiered_unlimited(candidate) {
        return false;
    }
    candidate.price < existing.price
}

fn is_standard_tier(package: &Package) -> bool {
    package.name.to_lowercase().contains("standard")
}

fn is_untiered_unlimited(package: &Package) -> bool {
    !is_standard_tier(package)
        && (package.name.to_lowercase().contains("unlimited") || package.is_unlimited())
}

#[cfg(test)]
mod tests {
    use super::{dedup_variants, limited_priority, smart_filter, SelectionPolicy, UNPRIORITIZED};
    use crate::catalogue::testing::package;
    use crate::domain::package::{Package, UNLIMITED_DATA};

    fn ids(packages: &[Package]) -> Vec<&str> {
        packages.iter().map(|p| p.id.0.as_str()).collect()
    }

    fn limited(count: usize) -> Vec<Package> {
        (0..count)
            .map(|i| package(&format!("l{i}"), "Turkey", &format!("{}GB", i + 1), 30, 500 + i as i64))
            .collect()
    }

    fn unlimited(validities: &[u32]) -> Vec<Package> {
        validities
            .iter()
            .map(|&days| package(&format!("u{days}"), "Turkey", UNLIMITED_DATA, days, 900))
            .collect()
    }

    #[test]
    fn priority_table_ranks_known_combinations() {
        assert_eq!(limited_priority(1000, 7), 0);
        assert_eq!(limited_priority(50_000, 30), 4);
        assert_eq!(limited_priority(3000, 30), UNPRIORITIZED);
    }

    #[test]
    fn result_never_exceeds_limit() {
        let mut candidates = limited(15);
        candidates.extend(unlimited(&[1, 3, 5, 7, 15, 30, 60, 90]));

        for limit in [0, 1, 5, 10, 50] {
            let policy = SelectionPolicy { limit, ..SelectionPolicy::COUNTRY };
            assert!(smart_filter(&candidates, policy).len() <= limit);
        }
    }

    #[test]
    fn small_candidate_sets_are_returned_whole() {
        let mut candidates = limited(2);
        candidates.extend(unlimited(&[1, 3, 5, 7, 15, 30, 60, 90]));

        let result = smart_filter(&candidates, SelectionPolicy::COUNTRY);
        assert_eq!(result.len(), candidates.len());
    }

    #[test]
    fn reservation_keeps_every_candidate_when_under_limit() {
        let mut candidates = limited(3);
        candidates.extend(unlimited(&[30, 1, 7, 3]));

        let result = smart_filter(&candidates, SelectionPolicy::COUNTRY);

        assert_eq!(result.len(), 7);
        assert_eq!(ids(&result), vec!["l0", "l1", "l2", "u1", "u3", "u7", "u30"]);
    }

    #[test]
    fn reservation_caps_unlimited_share() {
        let mut candidates = limited(12);
        candidates.extend(unlimited(&[1, 3, 5, 7, 15, 30, 60, 90]));

        let result = smart_filter(&candidates, SelectionPolicy::COUNTRY);
        let unlimited_count = result.iter().filter(|p| p.is_unlimited()).count();

        assert_eq!(result.len(), 10);
        assert_eq!(unlimited_count, 6);
    }

    #[test]
    fn limited_plans_follow_priority_then_price() {
        let candidates = vec![
            package("odd", "Turkey", "3GB", 10, 100),
            package("5gb-cheap", "Turkey", "5GB", 30, 1200),
            package("2gb", "Turkey", "2GB", 15, 700),
            package("5gb-dear", "Turkey", "5GB", 30, 1500),
            package("1gb", "Turkey", "1GB", 7, 400),
        ];

        let result = smart_filter(&candidates, SelectionPolicy::COUNTRY);
        assert_eq!(ids(&result), vec!["1gb", "2gb", "5gb-cheap", "5gb-dear", "odd"]);
    }

    #[test]
    fn costly_seven_day_plan_replaces_most_expensive_selection() {
        let candidates = vec![
            package("p1", "Turkey", "2GB", 15, 500),
            package("p2", "Turkey", "5GB", 30, 900),
            package("p3", "Turkey", "10GB", 30, 1400),
            package("week", "Turkey", "3GB", 7, 2500),
        ];
        let policy = SelectionPolicy { limit: 3, ..SelectionPolicy::COUNTRY };

        let result = smart_filter(&candidates, policy);

        assert_eq!(ids(&result), vec!["week", "p1", "p2"]);
    }

    #[test]
    fn seven_day_one_gigabyte_plan_survives_even_when_pricier() {
        let mut candidates = limited(12);
        candidates.push(package("week-1gb", "Turkey", "1GB", 7, 5000));

        let result = smart_filter(&candidates, SelectionPolicy::COUNTRY);

        assert!(ids(&result).contains(&"week-1gb"));
        assert_eq!(result.len(), 10);
    }

    #[test]
    fn reservation_can_be_disabled() {
        let mut candidates = limited(12);
        candidates.extend(unlimited(&[1, 3]));
        let policy = SelectionPolicy { reserve_unlimited: false, ..SelectionPolicy::COUNTRY };

        let result = smart_filter(&candidates, policy);
        assert!(result.iter().all(|p| !p.is_unlimited()));
    }

    #[test]
    fn dedup_prefers_cheaper_variant() {
        let candidates = vec![
            package("a", "Turkey", "1GB", 7, 500),
            package("b", "Turkey", "1GB", 7, 400),
            package("c", "Turkey", "2GB", 15, 700),
        ];

        assert_eq!(ids(&dedup_variants(&candidates)), vec!["b", "c"]);
    }

    #[test]
    fn dedup_prefers_standard_tier_over_untiered_unlimited() {
        let candidates = vec![
            package("plain", "Global Unlimited", UNLIMITED_DATA, 7, 1000),
            package("standard", "Global - Standard", UNLIMITED_DATA, 7, 1800),
        ];
        assert_eq!(ids(&dedup_variants(&candidates)), vec!["standard"]);

        let reversed = vec![candidates[1].clone(), candidates[0].clone()];
        assert_eq!(ids(&dedup_variants(&reversed)), vec!["standard"]);
    }
}
