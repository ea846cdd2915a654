//! Property-based tests for the harmonization stages.
//!
//! These tests use proptest to generate random bucketings, counts and
//! region layouts and verify that each stage keeps its invariants.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p harmonize --test property_tests
//!
//! # More cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p harmonize --test property_tests
//! ```

use indexmap::IndexMap;
use proptest::prelude::*;

use harmonize::apportion::{
    apply_ratio_groups, apply_static, CategoryWeightMap, RatioGroups, Term,
};
use harmonize::cohort::{parse_label, remap, CohortResolver, ExplicitCoverage, LabelCoverage};
use harmonize::geo::{aggregate, RemainderRules};
use harmonize::rates::{MetricPair, RateCalculator};
use harmonize::schema::{Coverage, AGE_BAND_COHORTS, OPEN_COHORT};
use harmonize::{CategorySet, HarmonizeError, ObservationTable, RawRecord, RowKey, Sex};

// =============================================================================
// Test Strategies
// =============================================================================

/// Cut points splitting the cohorts 1..=18 into contiguous buckets.
fn cohort_partition() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::btree_set(2u8..=OPEN_COHORT, 0..10).prop_map(|cuts| {
        let mut buckets = Vec::new();
        let mut start = 1u8;
        for cut in cuts {
            buckets.push((start, cut - 1));
            start = cut;
        }
        buckets.push((start, OPEN_COHORT));
        buckets
    })
}

fn bucket_label(first: u8, last: u8) -> String {
    let lower = (first as u32 - 1) * 5;
    if last == OPEN_COHORT {
        format!("{} years and over", lower)
    } else {
        format!("{} to {} years", lower, (last as u32 - 1) * 5 + 4)
    }
}

fn count() -> impl Strategy<Value = f64> {
    0.0f64..1.0e6
}

fn region_id() -> impl Strategy<Value = String> {
    prop_oneof![
        "(24|35|59)",
        "(24|35|59)[0-9]{3}",
        "(24|35|59)[0-9]{3}(24|35|59)",
    ]
}

fn key(region: &str, cohort: u8) -> RowKey {
    RowKey::new(region, Some(2016), cohort, Sex::Female)
}

// =============================================================================
// Cohort Resolution
// =============================================================================

proptest! {
    /// Any contiguous bucketing with a total resolves every cohort.
    #[test]
    fn resolver_assigns_every_cohort(partition in cohort_partition()) {
        let mut labels = IndexMap::new();
        labels.insert("T".to_string(), "Total".to_string());
        for (i, (first, last)) in partition.iter().enumerate() {
            labels.insert(format!("B{}", i), bucket_label(*first, *last));
        }

        let assignment = CohortResolver::new()
            .resolve(&LabelCoverage::new(labels))
            .unwrap();

        prop_assert_eq!(assignment.bucket_for(0), Some("T"));
        for cohort in AGE_BAND_COHORTS {
            let bucket = assignment.bucket_for(cohort);
            prop_assert!(bucket.is_some(), "cohort {} unassigned", cohort);
            let coverage = assignment.coverage_of(bucket.unwrap()).unwrap();
            prop_assert!(coverage.contains(cohort));
        }
    }

    /// Every bucketing that leaves a cohort uncovered is a mapping gap.
    #[test]
    fn resolver_reports_uncovered_cohort(partition in cohort_partition(), drop in 0usize..10) {
        let drop = drop % partition.len();
        let (first, _) = partition[drop];

        let mut sets = IndexMap::new();
        sets.insert("T".to_string(), Coverage::total());
        for (i, (a, b)) in partition.iter().enumerate() {
            if i != drop {
                sets.insert(format!("B{}", i), Coverage::from_cohorts(*a..=*b));
            }
        }

        match CohortResolver::new().resolve(&ExplicitCoverage::new(sets)) {
            Err(HarmonizeError::MappingGap { cohort }) => prop_assert_eq!(cohort, first),
            other => prop_assert!(false, "expected a mapping gap, got {:?}", other),
        }
    }

    /// Five-year labels land on exactly one cohort.
    #[test]
    fn five_year_label_is_one_cohort(cohort in 1u8..OPEN_COHORT) {
        let lower = (cohort as u32 - 1) * 5;
        let coverage = parse_label(&format!("{}-{} Years", lower, lower + 4));
        prop_assert_eq!(coverage.iter().collect::<Vec<_>>(), vec![cohort]);
    }

    /// "Under N" never covers the cohort that starts at N.
    #[test]
    fn under_label_is_exclusive(age in (1u32..18).prop_map(|c| c * 5)) {
        let coverage = parse_label(&format!("Under {} years", age));
        prop_assert!(!coverage.contains((1 + age / 5) as u8));
        prop_assert_eq!(coverage.len(), (age / 5) as usize);
    }

    /// Splitting a bucket evenly keeps its count.
    #[test]
    fn remap_preserves_bucket_mass(partition in cohort_partition(), value in count()) {
        let mut sets = IndexMap::new();
        sets.insert("T".to_string(), Coverage::total());
        for (i, (a, b)) in partition.iter().enumerate() {
            sets.insert(format!("B{}", i), Coverage::from_cohorts(*a..=*b));
        }
        let assignment = CohortResolver::new()
            .resolve(&ExplicitCoverage::new(sets))
            .unwrap();

        let records = (0..partition.len()).map(|i| {
            RawRecord::new("35", Some(2016), format!("B{}", i), Sex::Female, "E", value)
        });
        let outcome = remap(records, &assignment);

        let total: f64 = AGE_BAND_COHORTS
            .filter_map(|c| outcome.table.get(&key("35", c), "E"))
            .sum();
        let expected = value * partition.len() as f64;
        prop_assert!((total - expected).abs() <= 1e-6 * expected.max(1.0));
    }
}

// =============================================================================
// Category Apportionment
// =============================================================================

proptest! {
    /// Static weights that sum to one per source category keep the total.
    #[test]
    fn static_mapping_preserves_mass(values in prop::collection::vec(count(), 4)) {
        let categories = CategorySet::new(["E", "W", "B", "Y"], "E");
        let mut map = CategoryWeightMap::new();
        map.insert("1", "W", 1.0);
        map.insert("2", "B", 1.0);
        map.insert("3", "W", 0.5);
        map.insert("3", "Y", 0.5);
        map.insert("4", "Y", 1.0);

        let mut table = ObservationTable::new();
        for (code, value) in ["1", "2", "3", "4"].iter().zip(&values) {
            table.insert(key("35", 5), *code, *value);
        }
        apply_static(&mut table, &map, &categories);

        let row = table.row(&key("35", 5)).unwrap();
        let mapped = row.sum_of(categories.disjoint());
        let input: f64 = values.iter().sum();
        prop_assert!((mapped - input).abs() <= 1e-9 * input.max(1.0));
    }

    /// The disjoint groups sum to the grand total when they cover the
    /// specified keys, and the even split does so when nothing is specified.
    #[test]
    fn ratio_groups_sum_to_grand_total(
        total in count(),
        parts in prop::collection::vec(prop_oneof![Just(0.0), count()], 3),
    ) {
        let categories = CategorySet::new(["E", "W", "B", "R"], "E");
        let mut groups = IndexMap::new();
        groups.insert("W".to_string(), vec![Term::new("1", 1.0)]);
        groups.insert("B".to_string(), vec![Term::new("2", 1.0)]);
        groups.insert("R".to_string(), vec![Term::new("3", 1.0)]);
        let groups = RatioGroups {
            total_key: "T".to_string(),
            specified: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            groups,
        };

        let mut table = ObservationTable::new();
        table.insert(key("35", 5), "T", total);
        for (code, value) in ["1", "2", "3"].iter().zip(&parts) {
            table.insert(key("35", 5), *code, *value);
        }
        let stats = apply_ratio_groups(&mut table, &groups, &categories);

        let row = table.row(&key("35", 5)).unwrap();
        prop_assert_eq!(row.get("E"), total);
        let disjoint = row.sum_of(categories.disjoint());
        prop_assert!((disjoint - total).abs() <= 1e-9 * total.max(1.0));

        if parts.iter().sum::<f64>() == 0.0 {
            prop_assert_eq!(stats.fallback_rows, 1);
            prop_assert_eq!(row.get("W"), total / 3.0);
        }
    }
}

// =============================================================================
// Geographic Aggregation
// =============================================================================

proptest! {
    /// Composite counts do not depend on the order rows were inserted.
    #[test]
    fn aggregation_is_order_independent(
        rows in prop::collection::btree_map(region_id(), count(), 1..20),
        seed in any::<u64>(),
    ) {
        let rules = RemainderRules::new();
        let mut entries: Vec<(String, f64)> = rows.into_iter().collect();

        let mut forward = ObservationTable::new();
        for (region, value) in &entries {
            forward.insert(key(region, 5), "E", *value);
        }

        // Deterministic shuffle driven by the seed.
        let len = entries.len();
        for i in (1..len).rev() {
            let j = (seed.rotate_left(i as u32) % (i as u64 + 1)) as usize;
            entries.swap(i, j);
        }
        let mut shuffled = ObservationTable::new();
        for (region, value) in &entries {
            shuffled.insert(key(region, 5), "E", *value);
        }

        let (a, contributing_a) = aggregate(&forward, &rules);
        let (b, contributing_b) = aggregate(&shuffled, &rules);
        prop_assert_eq!(contributing_a, contributing_b);
        prop_assert_eq!(a.len(), b.len());
        for (k, row) in a.rows() {
            let other = b.row(k).unwrap();
            prop_assert_eq!(row.get("E").to_bits(), other.get("E").to_bits());
        }
    }
}

// =============================================================================
// Rates
// =============================================================================

proptest! {
    /// CRR has at most two decimals and is finite; ACE is exact for
    /// multiples of five.
    #[test]
    fn metric_pair_is_rounded(
        d in count(),
        bottom in count(),
        top in count(),
        middle in count(),
        step in 0i64..100_000,
    ) {
        let pair = MetricPair::compute(d, bottom, top, middle);
        prop_assert!(pair.crr.is_finite());
        prop_assert!(pair.crr >= 0.0);
        let scaled = pair.crr * 100.0;
        prop_assert!((scaled.round() - scaled).abs() <= 1e-6 * scaled.max(1.0));

        let exact = MetricPair::compute(top + 5.0 * step as f64, bottom, top, middle);
        prop_assert_eq!(exact.ace, step);
    }

    /// The same table always yields the same metrics.
    #[test]
    fn rates_are_deterministic(values in prop::collection::vec(count(), 19)) {
        let mut table = ObservationTable::new();
        for (cohort, value) in values.iter().enumerate() {
            table.insert(key("35", cohort as u8), "E", *value);
        }
        let calculator = RateCalculator::new(CategorySet::new(["E"], "E"));

        let (first, stats) = calculator.compute(&table, |_| false);
        let (second, _) = calculator.compute(&table, |_| false);
        prop_assert_eq!(stats.rated, 1);
        prop_assert_eq!(first, second);
    }
}
