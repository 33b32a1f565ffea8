//! Test utilities for tally-core
//!
//! Fixture builders for transactions, merchants and small spending models.
//! Dates are written as `YYYY-MM-DD` strings to keep test tables readable.

use chrono::NaiveDate;

use crate::analysis::{Analyzer, SpendingModel};
use crate::config::AnalysisConfig;
use crate::merchant::{aggregate, merchant_id, Merchant};
use crate::models::{MatchInfo, NewTransaction, RuleOrigin, Transaction};
use crate::rules::{Rule, RuleSet};

/// Parse a `YYYY-MM-DD` fixture date
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// An unmatched input transaction
pub fn txn(date_str: &str, amount: f64, description: &str) -> NewTransaction {
    NewTransaction::new(date(date_str), amount, description)
}

/// A transaction as if a user rule named after the merchant had matched it
pub fn resolved(
    date_str: &str,
    amount: f64,
    merchant: &str,
    category: &str,
    subcategory: &str,
) -> Transaction {
    let date = date(date_str);
    Transaction {
        date,
        amount,
        description: merchant.to_uppercase(),
        location: None,
        merchant: merchant.to_string(),
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        month: crate::models::month_key(date),
        match_info: MatchInfo {
            pattern: merchant.to_uppercase(),
            origin: RuleOrigin::User,
            rule_index: 0,
        },
    }
}

/// A merchant built from `(date, amount)` pairs
pub fn merchant_from(
    name: &str,
    category: &str,
    subcategory: &str,
    charges: &[(&str, f64)],
) -> Merchant {
    let txns: Vec<Transaction> = charges
        .iter()
        .map(|(d, a)| resolved(d, *a, name, category, subcategory))
        .collect();
    aggregate(&txns).remove(&merchant_id(name)).unwrap()
}

/// A merchant with one charge on the 15th of consecutive months from `start` (`YYYY-MM`)
pub fn monthly_series(
    name: &str,
    category: &str,
    subcategory: &str,
    start: &str,
    amounts: &[f64],
) -> Merchant {
    let (mut year, mut month) = crate::models::parse_month_key(start).unwrap();
    let mut charges = Vec::new();
    for amount in amounts {
        charges.push((format!("{:04}-{:02}-15", year, month), *amount));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    let refs: Vec<(&str, f64)> = charges.iter().map(|(d, a)| (d.as_str(), *a)).collect();
    merchant_from(name, category, subcategory, &refs)
}

/// A user rule without modifiers
pub fn rule(pattern: &str, merchant: &str, category: &str, subcategory: &str) -> Rule {
    Rule::new(pattern, merchant, category, subcategory, RuleOrigin::User)
}

/// Rules used by [`sample_model`]
pub fn sample_rules() -> RuleSet {
    RuleSet::new(vec![
        rule("STARBUCKS", "Starbucks", "Food", "Coffee"),
        rule("BLUE BOTTLE", "Blue Bottle", "Food", "Coffee"),
        rule("NETFLIX", "Netflix", "Subscriptions", "Streaming"),
        rule("SAFEWAY", "Safeway", "Food", "Grocery"),
        rule("DELTA", "Delta", "Travel", "Airfare"),
        rule("ZELLE", "Zelle", "Transfers", "P2P"),
    ])
    .unwrap()
}

/// Three months of mixed spending, locations on the coffee shops
pub fn sample_transactions() -> Vec<NewTransaction> {
    vec![
        txn("2025-01-05", 5.0, "STARBUCKS #123").with_location("WA"),
        txn("2025-01-20", 6.0, "STARBUCKS #123").with_location("WA"),
        txn("2025-02-11", 5.5, "STARBUCKS #456").with_location("CA"),
        txn("2025-03-02", 5.0, "STARBUCKS #123").with_location("WA"),
        txn("2025-02-14", 7.0, "BLUE BOTTLE COFFEE").with_location("CA"),
        txn("2025-01-01", 15.0, "NETFLIX.COM"),
        txn("2025-02-01", 15.0, "NETFLIX.COM"),
        txn("2025-03-01", 15.0, "NETFLIX.COM"),
        txn("2025-01-09", 80.0, "SAFEWAY STORE 1"),
        txn("2025-03-18", 200.0, "SAFEWAY STORE 1"),
        txn("2025-02-20", 420.0, "DELTA AIR LINES"),
        txn("2025-01-15", 200.0, "ZELLE TO ALEX"),
        txn("2025-02-03", 33.0, "MYSTERY SHOP 42"),
    ]
}

/// A model built from [`sample_rules`] and [`sample_transactions`]
pub fn sample_model() -> SpendingModel {
    Analyzer::new(&sample_rules(), AnalysisConfig::default())
        .run(&sample_transactions())
        .unwrap()
}
