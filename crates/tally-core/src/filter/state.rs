//! Filtered view of a spending model
//!
//! Recomputes every visible figure from the model's merchants and their
//! transactions. Nothing is cached between calls; an empty filter set yields
//! the model's own charges and credits.
//!
//! Charges (positive amounts) and credits (refunds) are summed apart, so hiding
//! a transaction can only lower a figure. Chart series count charges only.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{FilterKind, FilterMode, FilterSet};
use crate::analysis::SpendingModel;
use crate::merchant::Merchant;
use crate::models::{parse_month_key, Bucket, MonthRange};

/// A merchant reduced to its visible transactions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredMerchant {
    pub id: String,
    pub name: String,
    pub category_path: String,
    /// Visible charges
    pub total: f64,
    /// Visible refunds, as a positive figure
    pub credits: f64,
    /// Distinct months among visible transactions
    pub months: usize,
    pub transaction_count: usize,
    /// `total / active months`, or 0 when no months are active
    pub monthly_rate: f64,
    /// Visible charges per month
    pub monthly_totals: BTreeMap<String, f64>,
}

impl FilteredMerchant {
    pub fn net(&self) -> f64 {
        self.total - self.credits
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredSection {
    pub bucket: Bucket,
    /// Only merchants with at least one visible transaction
    pub merchants: BTreeMap<String, FilteredMerchant>,
    pub total: f64,
    pub credits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredState {
    pub sections: BTreeMap<Bucket, FilteredSection>,
    /// Charges in spending sections only
    pub grand_total: f64,
    /// Refunds in spending sections only, as a positive figure
    pub credits: f64,
    pub active_months: usize,
    /// Chart series keyed by `YYYY-MM` (spending sections, charges only)
    pub by_month: BTreeMap<String, f64>,
    /// Chart series keyed by category path (spending sections, charges only)
    pub by_category: BTreeMap<String, f64>,
}

impl FilteredState {
    pub fn section(&self, bucket: Bucket) -> Option<&FilteredSection> {
        self.sections.get(&bucket)
    }

    pub fn merchant(&self, id: &str) -> Option<(Bucket, &FilteredMerchant)> {
        self.sections
            .iter()
            .find_map(|(bucket, s)| s.merchants.get(id).map(|m| (*bucket, m)))
    }

    /// Spending after refunds
    pub fn net(&self) -> f64 {
        self.grand_total - self.credits
    }
}

/// Months covered by a month filter's text: one month, or every month of `A..B`.
/// Malformed text expands to nothing.
pub fn expand_month_range(text: &str) -> Vec<String> {
    match text.split_once("..") {
        Some((start, end)) => MonthRange {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
        }
        .months(),
        None => {
            let month = text.trim();
            if parse_month_key(month).is_some() {
                vec![month.to_string()]
            } else {
                Vec::new()
            }
        }
    }
}

/// Number of months a filtered view spans.
///
/// Month include filters define the months (their union); otherwise the
/// model's range does. Month exclude filters are removed either way.
pub fn active_months(model: &SpendingModel, filters: &FilterSet) -> usize {
    let mut months: BTreeSet<String> = if filters
        .of(FilterKind::Month, FilterMode::Include)
        .next()
        .is_some()
    {
        filters
            .of(FilterKind::Month, FilterMode::Include)
            .flat_map(|f| expand_month_range(&f.text))
            .collect()
    } else {
        model.months.iter().cloned().collect()
    };

    for filter in filters.of(FilterKind::Month, FilterMode::Exclude) {
        for month in expand_month_range(&filter.text) {
            months.remove(&month);
        }
    }

    months.len()
}

fn filter_merchant(
    merchant: &Merchant,
    filters: &FilterSet,
    active_months: usize,
) -> Option<FilteredMerchant> {
    let mut total = 0.0;
    let mut credits = 0.0;
    let mut count = 0;
    let mut months = BTreeSet::new();
    let mut monthly_totals: BTreeMap<String, f64> = BTreeMap::new();

    for txn in merchant
        .transactions
        .iter()
        .filter(|t| filters.is_visible(merchant, t))
    {
        count += 1;
        months.insert(txn.month.as_str());
        if txn.amount > 0.0 {
            total += txn.amount;
            *monthly_totals.entry(txn.month.clone()).or_insert(0.0) += txn.amount;
        } else {
            credits -= txn.amount;
        }
    }

    if count == 0 {
        return None;
    }

    Some(FilteredMerchant {
        id: merchant.id.clone(),
        name: merchant.name.clone(),
        category_path: merchant.category_path.clone(),
        total,
        credits,
        months: months.len(),
        transaction_count: count,
        monthly_rate: if active_months > 0 {
            total / active_months as f64
        } else {
            0.0
        },
        monthly_totals,
    })
}

/// Recompute sections, totals and chart series under `filters`
pub fn compute_filtered_state(model: &SpendingModel, filters: &FilterSet) -> FilteredState {
    let active_months = active_months(model, filters);

    let mut sections = BTreeMap::new();
    let mut grand_total = 0.0;
    let mut credits = 0.0;
    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();

    for (bucket, section) in &model.sections {
        let merchants: BTreeMap<String, FilteredMerchant> = section
            .merchants
            .iter()
            .filter_map(|(id, m)| filter_merchant(m, filters, active_months).map(|f| (id.clone(), f)))
            .collect();
        let total: f64 = merchants.values().map(|m| m.total).sum();
        let section_credits: f64 = merchants.values().map(|m| m.credits).sum();

        if bucket.is_spending() {
            grand_total += total;
            credits += section_credits;
            for merchant in merchants.values() {
                for (month, amount) in &merchant.monthly_totals {
                    *by_month.entry(month.clone()).or_insert(0.0) += amount;
                }
                // Refund-only merchants have no charges to chart
                if merchant.total > 0.0 {
                    *by_category
                        .entry(merchant.category_path.clone())
                        .or_insert(0.0) += merchant.total;
                }
            }
        }

        sections.insert(
            *bucket,
            FilteredSection {
                bucket: *bucket,
                merchants,
                total,
                credits: section_credits,
            },
        );
    }

    FilteredState {
        sections,
        grand_total,
        credits,
        active_months,
        by_month,
        by_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use crate::config::AnalysisConfig;
    use crate::filter::Filter;
    use crate::test_utils::{rule, sample_model, txn};
    use crate::rules::RuleSet;

    #[test]
    fn test_empty_filters_reproduce_model_totals() {
        let model = sample_model();
        let state = compute_filtered_state(&model, &FilterSet::new());

        assert_eq!(state.grand_total, model.grand_charges());
        assert_eq!(state.credits, model.credits());
        assert_eq!(state.active_months, model.months_in_range());
        for (bucket, section) in &model.sections {
            let filtered = state.section(*bucket).unwrap();
            assert_eq!(filtered.total, section.charges());
            assert_eq!(filtered.merchants.len(), section.merchants.len());
            for (id, merchant) in &section.merchants {
                assert_eq!(filtered.merchants[id].total, merchant.charges);
                assert_eq!(filtered.merchants[id].transaction_count, merchant.count);
            }
        }
    }

    fn model_with_refund() -> SpendingModel {
        let rules = RuleSet::new(vec![
            rule("AMAZON", "Amazon", "Shopping", "Online"),
            rule("WHOLE FOODS", "Whole Foods", "Food", "Grocery"),
            rule("STARBUCKS", "Starbucks", "Food", "Coffee"),
        ])
        .unwrap();
        let txns = vec![
            txn("2024-01-04", 200.0, "AMAZON MKTP").with_location("WA"),
            txn("2024-01-11", -100.0, "AMAZON REFUND").with_location("CA"),
            txn("2024-01-15", 300.0, "WHOLE FOODS #10"),
            txn("2024-01-22", 50.0, "STARBUCKS #9"),
        ];
        Analyzer::new(&rules, AnalysisConfig::default()).run(&txns).unwrap()
    }

    #[test]
    fn test_chart_series_count_charges_only() {
        let model = model_with_refund();
        let state = compute_filtered_state(&model, &FilterSet::new());

        assert_eq!(state.by_month["2024-01"], 550.0);
        assert_eq!(state.by_category["Shopping.Online"], 200.0);
        assert_eq!(state.by_category["Food.Grocery"], 300.0);
        assert_eq!(state.grand_total, 550.0);
        assert_eq!(state.credits, 100.0);
        assert_eq!(state.net(), 450.0);

        let (_, amazon) = state.merchant("amazon").unwrap();
        assert_eq!(amazon.total, 200.0);
        assert_eq!(amazon.credits, 100.0);
        assert_eq!(amazon.net(), 100.0);
        assert_eq!(amazon.transaction_count, 2);
    }

    #[test]
    fn test_excluding_refund_location_never_grows_any_figure() {
        let model = model_with_refund();
        let base = compute_filtered_state(&model, &FilterSet::new());
        let state = compute_filtered_state(
            &model,
            &FilterSet::new().with(Filter::exclude(FilterKind::Location, "CA")),
        );

        assert!(state.grand_total <= base.grand_total);
        assert!(state.credits <= base.credits);
        for (bucket, section) in &state.sections {
            let before = base.section(*bucket).unwrap();
            assert!(section.total <= before.total);
            assert!(section.credits <= before.credits);
        }
        let (_, amazon) = state.merchant("amazon").unwrap();
        assert_eq!(amazon.total, 200.0);
        assert_eq!(amazon.credits, 0.0);
        assert_eq!(state.by_month["2024-01"], 550.0);
    }

    #[test]
    fn test_month_range_filter_rate() {
        let rules = RuleSet::new(vec![rule("RENT", "Rent", "Housing", "Rent")]).unwrap();
        let txns = vec![
            txn("2024-12-01", 100.0, "RENT"),
            txn("2025-01-01", 100.0, "RENT"),
            txn("2025-02-01", 100.0, "RENT"),
            txn("2025-03-01", 100.0, "RENT"),
            txn("2025-04-01", 100.0, "RENT"),
        ];
        let model = Analyzer::new(&rules, AnalysisConfig::default()).run(&txns).unwrap();

        let filters =
            FilterSet::new().with(Filter::include(FilterKind::Month, "2025-01..2025-03"));
        let state = compute_filtered_state(&model, &filters);

        assert_eq!(state.active_months, 3);
        let (_, rent) = state.merchant("rent").unwrap();
        assert_eq!(rent.total, 300.0);
        assert_eq!(rent.months, 3);
        assert_eq!(rent.monthly_rate, 100.0);
    }

    #[test]
    fn test_category_and_month_filters_combine() {
        let model = sample_model();
        let filters = FilterSet::new()
            .with(Filter::include(FilterKind::Category, "Coffee"))
            .with(Filter::include(FilterKind::Month, "2025-01"));
        let state = compute_filtered_state(&model, &filters);

        // Only January Starbucks visits: 5 + 6
        assert_eq!(state.grand_total, 11.0);
        assert_eq!(state.active_months, 1);
        assert!(state.merchant("starbucks").is_some());
        assert!(state.merchant("blue_bottle").is_none());
        assert!(state.merchant("netflix").is_none());
        assert_eq!(state.by_month.keys().collect::<Vec<_>>(), vec!["2025-01"]);
        assert_eq!(state.by_category.keys().collect::<Vec<_>>(), vec!["Food.Coffee"]);
    }

    #[test]
    fn test_adding_include_filter_never_grows_total() {
        let model = sample_model();
        let base = compute_filtered_state(&model, &FilterSet::new());

        for (kind, text) in [
            (FilterKind::Category, "Food"),
            (FilterKind::Location, "WA"),
            (FilterKind::Merchant, "Netflix"),
            (FilterKind::Month, "2025-02"),
        ] {
            let state =
                compute_filtered_state(&model, &FilterSet::new().with(Filter::include(kind, text)));
            assert!(state.grand_total <= base.grand_total, "{} {}", kind, text);
        }
    }

    #[test]
    fn test_exclude_filters() {
        let model = sample_model();
        let filters = FilterSet::new()
            .with(Filter::exclude(FilterKind::Merchant, "Netflix"))
            .with(Filter::exclude(FilterKind::Month, "2025-03"));
        let state = compute_filtered_state(&model, &filters);

        assert!(state.merchant("netflix").is_none());
        assert_eq!(state.active_months, 2);
        assert!(!state.by_month.contains_key("2025-03"));
    }

    #[test]
    fn test_excluded_section_not_in_totals_or_charts() {
        let model = sample_model();
        let state = compute_filtered_state(&model, &FilterSet::new());

        let excluded = state.section(Bucket::Excluded).unwrap();
        assert_eq!(excluded.total, 200.0);
        assert!(!state.by_category.contains_key("Transfers.P2P"));
        let chart_total: f64 = state.by_month.values().sum();
        assert!((chart_total - state.grand_total).abs() < 1e-9);
    }

    #[test]
    fn test_zero_active_months_gives_zero_rates() {
        let model = sample_model();
        let filters = FilterSet::new()
            .with(Filter::include(FilterKind::Month, "2025-01"))
            .with(Filter::exclude(FilterKind::Month, "2025-01"));
        let state = compute_filtered_state(&model, &filters);

        assert_eq!(state.active_months, 0);
        assert_eq!(state.grand_total, 0.0);
    }

    #[test]
    fn test_expand_month_range() {
        assert_eq!(expand_month_range("2024-12..2025-02"), vec!["2024-12", "2025-01", "2025-02"]);
        assert_eq!(expand_month_range("2025-05"), vec!["2025-05"]);
        assert!(expand_month_range("2025-05..2025-01").is_empty());
        assert!(expand_month_range("May").is_empty());
    }
}
