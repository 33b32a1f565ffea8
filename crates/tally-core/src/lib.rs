//! Tally Core Library
//!
//! Explainable spending breakdowns from normalized bank transactions:
//! - Rule matcher with priority-ordered regex rules and inline modifiers
//! - Merchant aggregation under one shared merchant identity
//! - Spend-pattern classification with a structured decision trace
//! - Spending model builder (sections → merchants → transactions)
//! - Filter engine that re-slices the model without rerunning the pipeline
//! - Discovery of unmatched merchants with rule suggestions

pub mod analysis;
pub mod classify;
pub mod config;
pub mod discover;
pub mod error;
pub mod explain;
pub mod filter;
pub mod merchant;
pub mod models;
pub mod rules;

/// Fixture builders for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analysis::{monthly_value, Analyzer, Section, SectionSummary, SpendingModel, Summary};
pub use classify::{
    classify, coefficient_of_variation, Check, Classification, ClassificationStats, Operand,
    OperandValue, TraceStep,
};
pub use config::{AnalysisConfig, CategorySets, Thresholds};
pub use discover::{discover_unknown, suggest_merchant_name, suggest_pattern, UnknownMerchant};
pub use error::{Error, Result};
pub use explain::{
    explain_all, explain_description, explain_merchant, DescriptionExplanation,
    MerchantExplanation, RuleSummary, Verbosity,
};
pub use filter::{
    compute_filtered_state, Filter, FilterKind, FilterMode, FilterSet, FilteredState,
};
pub use merchant::{aggregate, merchant_id, Merchant};
pub use models::{Bucket, MatchInfo, MonthRange, NewTransaction, RuleOrigin, Transaction};
pub use rules::{parse_rules_csv, Modifier, Rule, RuleMatch, RuleSet};
