//! Merchant aggregation
//!
//! Groups resolved transactions by normalized merchant identity. The same
//! [`merchant_id`] is used by the filter engine, so a merchant filter built from
//! a display name always lands on the merchant the batch path created.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{MatchInfo, Transaction};

/// Normalized merchant identity: quotes removed, spaces to `_`, lowercased
pub fn merchant_id(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\'' && *c != '"')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// All transactions attributed to one merchant, with running aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Merchant {
    pub id: String,
    /// Display name as first seen
    pub name: String,
    pub category: String,
    pub subcategory: String,
    /// `Category.Subcategory`
    pub category_path: String,
    /// Ordered by date; same-day transactions keep input order
    pub transactions: Vec<Transaction>,
    /// Net of charges and refunds
    pub total: f64,
    /// Sum of positive amounts
    pub charges: f64,
    /// Sum of refunds as a positive figure
    pub credits: f64,
    /// Month key (`YYYY-MM`) to net spend in that month
    pub monthly_totals: BTreeMap<String, f64>,
    pub count: usize,
    pub max_payment: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Rule that matched the first transaction
    pub match_info: MatchInfo,
}

impl Merchant {
    fn from_first(txn: &Transaction) -> Self {
        Self {
            id: merchant_id(&txn.merchant),
            name: txn.merchant.clone(),
            category: txn.category.clone(),
            subcategory: txn.subcategory.clone(),
            category_path: txn.category_path(),
            transactions: Vec::new(),
            total: 0.0,
            charges: 0.0,
            credits: 0.0,
            monthly_totals: BTreeMap::new(),
            count: 0,
            max_payment: txn.amount,
            first_date: txn.date,
            last_date: txn.date,
            match_info: txn.match_info.clone(),
        }
    }

    fn push(&mut self, txn: &Transaction) {
        self.total += txn.amount;
        if txn.amount > 0.0 {
            self.charges += txn.amount;
        } else {
            self.credits -= txn.amount;
        }
        *self.monthly_totals.entry(txn.month.clone()).or_insert(0.0) += txn.amount;
        self.count += 1;
        self.max_payment = self.max_payment.max(txn.amount);
        self.first_date = self.first_date.min(txn.date);
        self.last_date = self.last_date.max(txn.date);
        self.transactions.push(txn.clone());
    }

    /// Distinct months with at least one transaction, ascending
    pub fn months(&self) -> impl Iterator<Item = &str> {
        self.monthly_totals.keys().map(String::as_str)
    }

    pub fn months_active(&self) -> usize {
        self.monthly_totals.len()
    }

    /// Total divided by the number of months the merchant appears in
    pub fn average_when_active(&self) -> f64 {
        match self.months_active() {
            0 => 0.0,
            n => self.total / n as f64,
        }
    }

    /// Calendar years with at least one transaction
    pub fn years(&self) -> BTreeSet<i32> {
        self.transactions.iter().map(|t| t.date.year()).collect()
    }
}

/// Group matched transactions into merchants keyed by [`merchant_id`].
///
/// Display name, category and match info come from the earliest transaction.
pub fn aggregate(transactions: &[Transaction]) -> BTreeMap<String, Merchant> {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.date);

    let mut merchants: BTreeMap<String, Merchant> = BTreeMap::new();
    for txn in ordered {
        merchants
            .entry(merchant_id(&txn.merchant))
            .or_insert_with(|| Merchant::from_first(txn))
            .push(txn);
    }
    merchants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::resolved;

    #[test]
    fn test_merchant_id_normalization() {
        assert_eq!(merchant_id("Trader Joe's"), "trader_joes");
        assert_eq!(merchant_id("\"Quoted\" Name"), "quoted_name");
        assert_eq!(merchant_id("STARBUCKS"), merchant_id("Starbucks"));
        assert_eq!(merchant_id("Uber Eats"), "uber_eats");
    }

    #[test]
    fn test_aggregate_groups_case_insensitively() {
        let txns = vec![
            resolved("2025-01-03", 5.0, "Starbucks", "Food", "Coffee"),
            resolved("2025-01-20", 6.0, "STARBUCKS", "Food", "Coffee"),
            resolved("2025-02-02", 4.5, "Starbucks", "Food", "Coffee"),
            resolved("2025-02-10", 60.0, "Shell", "Transport", "Gas"),
        ];
        let merchants = aggregate(&txns);

        assert_eq!(merchants.len(), 2);
        let sb = &merchants["starbucks"];
        assert_eq!(sb.name, "Starbucks");
        assert_eq!(sb.count, 3);
        assert!((sb.total - 15.5).abs() < 1e-9);
        assert_eq!(sb.months().collect::<Vec<_>>(), vec!["2025-01", "2025-02"]);
        assert!((sb.monthly_totals["2025-01"] - 11.0).abs() < 1e-9);
        assert_eq!(sb.max_payment, 6.0);
        assert_eq!(sb.category_path, "Food.Coffee");
    }

    #[test]
    fn test_aggregate_orders_transactions_by_date() {
        let txns = vec![
            resolved("2025-03-01", 10.0, "Netflix", "Subscriptions", "Streaming"),
            resolved("2025-01-01", 10.0, "Netflix", "Subscriptions", "Streaming"),
            resolved("2025-02-01", 12.0, "Netflix", "Subscriptions", "Streaming"),
        ];
        let nf = &aggregate(&txns)["netflix"];

        let dates: Vec<_> = nf.transactions.iter().map(|t| t.month.as_str()).collect();
        assert_eq!(dates, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(nf.first_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(nf.last_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!((nf.average_when_active() - 32.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_refunds_reduce_totals() {
        let txns = vec![
            resolved("2025-01-05", 100.0, "Target", "Shopping", "Retail"),
            resolved("2025-01-09", -30.0, "Target", "Shopping", "Retail"),
        ];
        let target = &aggregate(&txns)["target"];
        assert!((target.total - 70.0).abs() < 1e-9);
        assert_eq!(target.charges, 100.0);
        assert_eq!(target.credits, 30.0);
        assert_eq!(target.max_payment, 100.0);
    }

    #[test]
    fn test_aggregate_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
