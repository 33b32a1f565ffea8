//! Spending model builder
//!
//! Runs the batch pipeline: rule matching, merchant aggregation and
//! classification, then assembles the result into sections keyed by bucket.
//!
//! ```text
//! NewTransaction ─► RuleSet ─► aggregate ─► classify ─► SpendingModel
//!                     │
//!                     └─ no match ─► unmatched
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::classify::classify;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::merchant::{aggregate, merchant_id, Merchant};
use crate::models::{Bucket, MonthRange, NewTransaction};
use crate::rules::RuleSet;

/// Merchants classified into one bucket, keyed by merchant id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub bucket: Bucket,
    pub merchants: BTreeMap<String, Merchant>,
}

impl Section {
    fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            merchants: BTreeMap::new(),
        }
    }

    pub fn total(&self) -> f64 {
        self.merchants.values().map(|m| m.total).sum()
    }

    pub fn charges(&self) -> f64 {
        self.merchants.values().map(|m| m.charges).sum()
    }

    pub fn credits(&self) -> f64 {
        self.merchants.values().map(|m| m.credits).sum()
    }

    pub fn transaction_count(&self) -> usize {
        self.merchants.values().map(|m| m.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.merchants.is_empty()
    }
}

/// Typical spend per month for a merchant in `bucket`.
///
/// Steady merchants use their average when active; variable ones spread over
/// the analysed months; everything irregular spreads over a year.
pub fn monthly_value(bucket: Bucket, merchant: &Merchant, months_in_range: usize) -> f64 {
    match bucket {
        Bucket::Monthly => merchant.average_when_active(),
        Bucket::Variable if months_in_range > 0 => merchant.total / months_in_range as f64,
        Bucket::Variable => 0.0,
        Bucket::Annual | Bucket::Periodic | Bucket::Travel | Bucket::OneOff => merchant.total / 12.0,
        Bucket::Excluded => 0.0,
    }
}

/// The classified result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingModel {
    /// One section per bucket, in report order, possibly empty
    pub sections: BTreeMap<Bucket, Section>,
    /// Every month key in the analysed range, ascending
    pub months: Vec<String>,
    /// Transactions no rule matched
    pub unmatched: Vec<NewTransaction>,
    /// Transactions dropped for falling outside the configured period
    pub out_of_period: usize,
    pub config: AnalysisConfig,
}

impl SpendingModel {
    pub fn months_in_range(&self) -> usize {
        self.months.len()
    }

    pub fn section(&self, bucket: Bucket) -> Option<&Section> {
        self.sections.get(&bucket)
    }

    /// Every merchant with the bucket it landed in
    pub fn merchants(&self) -> impl Iterator<Item = (Bucket, &Merchant)> {
        self.sections
            .iter()
            .flat_map(|(bucket, s)| s.merchants.values().map(move |m| (*bucket, m)))
    }

    /// Look up a merchant by name: exact id first, then case-insensitive substring
    pub fn find_merchant(&self, query: &str) -> Option<(Bucket, &Merchant)> {
        let id = merchant_id(query);
        if let Some(found) = self.merchants().find(|(_, m)| m.id == id) {
            return Some(found);
        }

        let needle = query.to_lowercase();
        self.merchants()
            .find(|(_, m)| m.name.to_lowercase().contains(&needle))
    }

    /// Spending total across all sections except excluded
    pub fn grand_total(&self) -> f64 {
        self.spending_sections().map(Section::total).sum()
    }

    /// Charges (positive amounts) across all sections except excluded
    pub fn grand_charges(&self) -> f64 {
        self.spending_sections().map(Section::charges).sum()
    }

    /// Refunds across all sections except excluded, as a positive figure
    pub fn credits(&self) -> f64 {
        self.spending_sections().map(Section::credits).sum()
    }

    fn spending_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values().filter(|s| s.bucket.is_spending())
    }

    pub fn summary(&self) -> Summary {
        let months = self.months_in_range();
        let sections: Vec<SectionSummary> = self
            .sections
            .values()
            .filter(|s| s.bucket.is_spending())
            .map(|s| SectionSummary {
                bucket: s.bucket,
                label: s.bucket.label(),
                total: s.total(),
                monthly: s
                    .merchants
                    .values()
                    .map(|m| monthly_value(s.bucket, m, months))
                    .sum(),
                merchant_count: s.merchants.len(),
                transaction_count: s.transaction_count(),
            })
            .collect();

        let excluded = self.section(Bucket::Excluded);
        Summary {
            months,
            total: self.grand_total(),
            credits: self.credits(),
            monthly: sections.iter().map(|s| s.monthly).sum(),
            sections,
            excluded_total: excluded.map_or(0.0, Section::total),
            excluded_count: excluded.map_or(0, Section::transaction_count),
            unmatched_count: self.unmatched.len(),
            unmatched_total: self.unmatched.iter().map(|t| t.amount).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub bucket: Bucket,
    pub label: &'static str,
    pub total: f64,
    /// Sum of the merchants' monthly values
    pub monthly: f64,
    pub merchant_count: usize,
    pub transaction_count: usize,
}

/// Headline figures for a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub months: usize,
    /// Excludes the excluded section; refunds are netted in
    pub total: f64,
    /// Refunds included in `total`, as a positive figure
    pub credits: f64,
    pub monthly: f64,
    pub sections: Vec<SectionSummary>,
    pub excluded_total: f64,
    /// Transactions in the excluded section
    pub excluded_count: usize,
    pub unmatched_count: usize,
    pub unmatched_total: f64,
}

/// Batch pipeline over a compiled rule set and a run config
pub struct Analyzer<'a> {
    rules: &'a RuleSet,
    config: AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(rules: &'a RuleSet, config: AnalysisConfig) -> Self {
        Self { rules, config }
    }

    /// Month range to analyse: the configured period, else the span of the data
    fn month_range(&self, transactions: &[NewTransaction]) -> Result<Option<MonthRange>> {
        if let Some(period) = &self.config.period {
            return Ok(Some(period.clone()));
        }

        let first = transactions.iter().map(|t| t.date).min();
        let last = transactions.iter().map(|t| t.date).max();
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some(MonthRange::new(
                crate::models::month_key(first),
                crate::models::month_key(last),
            )?)),
            _ => Ok(None),
        }
    }

    pub fn run(&self, transactions: &[NewTransaction]) -> Result<SpendingModel> {
        self.config.validate()?;

        let range = self.month_range(transactions)?;
        let months = range.as_ref().map(MonthRange::months).unwrap_or_default();

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        let mut out_of_period = 0;

        for txn in transactions {
            if let Some(range) = &range {
                if !range.contains(&txn.month()) {
                    out_of_period += 1;
                    continue;
                }
            }
            match self.rules.resolve(txn) {
                Some(resolved) => matched.push(resolved),
                None => unmatched.push(txn.clone()),
            }
        }

        if out_of_period > 0 {
            debug!(
                "Skipped {} transactions outside {}",
                out_of_period,
                range.as_ref().map(ToString::to_string).unwrap_or_default()
            );
        }

        let mut sections: BTreeMap<Bucket, Section> = Bucket::all()
            .iter()
            .map(|b| (*b, Section::new(*b)))
            .collect();

        for (id, merchant) in aggregate(&matched) {
            let classification = classify(&merchant, months.len(), &self.config)?;
            debug!(
                "{} → {} ({} txns, {} months)",
                merchant.name,
                classification.bucket,
                merchant.count,
                merchant.months_active()
            );
            if let Some(section) = sections.get_mut(&classification.bucket) {
                section.merchants.insert(id, merchant);
            }
        }

        info!(
            "Analyzed {} transactions over {} months: {} matched, {} unmatched",
            transactions.len(),
            months.len(),
            matched.len(),
            unmatched.len()
        );

        Ok(SpendingModel {
            sections,
            months,
            unmatched,
            out_of_period,
            config: self.config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{rule, sample_model, sample_rules, sample_transactions, txn};

    fn bucket_of(model: &SpendingModel, id: &str) -> Option<Bucket> {
        model.merchants().find(|(_, m)| m.id == id).map(|(b, _)| b)
    }

    #[test]
    fn test_sample_model_sections() {
        let model = sample_model();

        assert_eq!(model.months, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(bucket_of(&model, "netflix"), Some(Bucket::Monthly));
        // Monthly totals 11, 5.5, 5 are too uneven to be steady
        assert_eq!(bucket_of(&model, "starbucks"), Some(Bucket::Variable));
        assert_eq!(bucket_of(&model, "safeway"), Some(Bucket::Variable));
        assert_eq!(bucket_of(&model, "blue_bottle"), Some(Bucket::OneOff));
        assert_eq!(bucket_of(&model, "delta"), Some(Bucket::Travel));
        assert_eq!(bucket_of(&model, "zelle"), Some(Bucket::Excluded));
        assert_eq!(model.unmatched.len(), 1);
        assert_eq!(model.unmatched[0].description, "MYSTERY SHOP 42");
    }

    #[test]
    fn test_every_transaction_lands_once() {
        let model = sample_model();
        let placed: usize = model.sections.values().map(Section::transaction_count).sum();
        assert_eq!(placed + model.unmatched.len(), sample_transactions().len());

        // Merchant ids are unique across the whole model
        let mut ids: Vec<_> = model.merchants().map(|(_, m)| m.id.clone()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_grand_total_excludes_excluded_section() {
        let model = sample_model();
        let all_matched: f64 = model.merchants().map(|(_, m)| m.total).sum();

        assert!((model.grand_total() - (all_matched - 200.0)).abs() < 1e-9);

        let summary = model.summary();
        assert_eq!(summary.excluded_count, 1);
        assert!((summary.excluded_total - 200.0).abs() < 1e-9);
        assert!((summary.total - model.grand_total()).abs() < 1e-9);
        assert_eq!(summary.unmatched_count, 1);
        assert!(summary.sections.iter().all(|s| s.bucket != Bucket::Excluded));
    }

    #[test]
    fn test_refunds_net_into_totals_and_count_as_credits() {
        let rules = RuleSet::new(vec![
            rule("TARGET", "Target", "Shopping", "Retail"),
            rule("ZELLE", "Zelle", "Transfers", "P2P"),
        ])
        .unwrap();
        let txns = vec![
            txn("2025-01-05", 100.0, "TARGET T-1234"),
            txn("2025-01-19", -30.0, "TARGET T-1234 RETURN"),
            txn("2025-01-20", -50.0, "ZELLE FROM SAM"),
        ];
        let model = Analyzer::new(&rules, AnalysisConfig::default()).run(&txns).unwrap();

        assert_eq!(model.grand_total(), 70.0);
        assert_eq!(model.grand_charges(), 100.0);
        // Excluded refunds stay out of the spending credits
        assert_eq!(model.credits(), 30.0);
        assert_eq!(model.summary().credits, 30.0);
    }

    #[test]
    fn test_monthly_value_by_bucket() {
        let model = sample_model();
        let (_, netflix) = model.find_merchant("netflix").unwrap();
        assert!((monthly_value(Bucket::Monthly, netflix, 3) - 15.0).abs() < 1e-9);
        assert!((monthly_value(Bucket::Variable, netflix, 3) - 15.0).abs() < 1e-9);
        assert!((monthly_value(Bucket::OneOff, netflix, 3) - 45.0 / 12.0).abs() < 1e-9);
        assert_eq!(monthly_value(Bucket::Excluded, netflix, 3), 0.0);
    }

    #[test]
    fn test_find_merchant() {
        let model = sample_model();
        assert_eq!(model.find_merchant("Blue Bottle").unwrap().1.name, "Blue Bottle");
        assert_eq!(model.find_merchant("bottle").unwrap().1.name, "Blue Bottle");
        assert!(model.find_merchant("nothing here").is_none());
    }

    #[test]
    fn test_period_filters_transactions() {
        let rules = sample_rules();
        let config = AnalysisConfig::default().with_period("2025-02..2025-03".parse().unwrap());
        let model = Analyzer::new(&rules, config).run(&sample_transactions()).unwrap();

        assert_eq!(model.months, vec!["2025-02", "2025-03"]);
        assert_eq!(model.out_of_period, 5);
        assert!(model
            .merchants()
            .flat_map(|(_, m)| m.transactions.iter())
            .all(|t| t.month.as_str() >= "2025-02"));
    }

    #[test]
    fn test_empty_input_builds_empty_model() {
        let rules = sample_rules();
        let model = Analyzer::new(&rules, AnalysisConfig::default()).run(&[]).unwrap();

        assert!(model.months.is_empty());
        assert!(model.sections.values().all(Section::is_empty));
        assert_eq!(model.grand_total(), 0.0);
        assert_eq!(model.sections.len(), Bucket::all().len());
    }

    #[test]
    fn test_invalid_config_fails_before_processing() {
        let rules = sample_rules();
        let mut config = AnalysisConfig::default();
        config.thresholds.recurrence = 0.0;

        let err = Analyzer::new(&rules, config)
            .run(&[txn("2025-01-01", 5.0, "STARBUCKS")])
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
