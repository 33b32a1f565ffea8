//! Explanations for merchants and raw descriptions
//!
//! Merchant explanations rerun the classifier against the model's own config,
//! so what is explained is always what would be computed now. Three levels:
//!
//! - `Bucket`: where the merchant landed and its headline figures
//! - `Trace`: plus every classifier check with its inputs
//! - `Full`: plus thresholds, statistics and the rule that matched

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{monthly_value, SpendingModel};
use crate::classify::{classify, ClassificationStats, TraceStep};
use crate::config::Thresholds;
use crate::discover::{suggest_merchant_name, suggest_pattern};
use crate::error::Result;
use crate::merchant::Merchant;
use crate::models::{Bucket, NewTransaction, RuleOrigin};
use crate::rules::{RuleMatch, RuleSet};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Bucket,
    Trace,
    Full,
}

impl Verbosity {
    /// Map a `-v` count: none → bucket, one → trace, two or more → full
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Bucket,
            1 => Self::Trace,
            _ => Self::Full,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Trace => "trace",
            Self::Full => "full",
        }
    }
}

impl std::str::FromStr for Verbosity {
    type Err = String;

    /// Accepts a level name or its number (`0`, `1`, `2`)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bucket" => Ok(Self::Bucket),
            "trace" => Ok(Self::Trace),
            "full" => Ok(Self::Full),
            other => other
                .parse::<u8>()
                .map(Self::from_level)
                .map_err(|_| format!("Unknown verbosity: {}", s)),
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds, statistics and provenance behind a classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationDetails {
    pub stats: ClassificationStats,
    pub thresholds: Thresholds,
    pub pattern: String,
    pub origin: RuleOrigin,
    pub rule_index: usize,
    pub monthly_totals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantExplanation {
    pub id: String,
    pub merchant: String,
    pub bucket: Bucket,
    pub category_path: String,
    pub total: f64,
    pub count: usize,
    pub months_active: usize,
    pub months_in_range: usize,
    pub monthly_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ExplanationDetails>,
}

fn explain(model: &SpendingModel, merchant: &Merchant, verbosity: Verbosity) -> Result<MerchantExplanation> {
    let months = model.months_in_range();
    let classification = classify(merchant, months, &model.config)?;

    let details = (verbosity >= Verbosity::Full).then(|| ExplanationDetails {
        stats: classification.stats.clone(),
        thresholds: model.config.thresholds.clone(),
        pattern: merchant.match_info.pattern.clone(),
        origin: merchant.match_info.origin,
        rule_index: merchant.match_info.rule_index,
        monthly_totals: merchant.monthly_totals.clone(),
    });

    Ok(MerchantExplanation {
        id: merchant.id.clone(),
        merchant: merchant.name.clone(),
        bucket: classification.bucket,
        category_path: merchant.category_path.clone(),
        total: merchant.total,
        count: merchant.count,
        months_active: merchant.months_active(),
        months_in_range: months,
        monthly_value: monthly_value(classification.bucket, merchant, months),
        trace: (verbosity >= Verbosity::Trace).then_some(classification.trace),
        details,
    })
}

/// Explain one merchant, looked up by name. `None` if the model has no such merchant.
pub fn explain_merchant(
    model: &SpendingModel,
    query: &str,
    verbosity: Verbosity,
) -> Result<Option<MerchantExplanation>> {
    match model.find_merchant(query) {
        Some((_, merchant)) => explain(model, merchant, verbosity).map(Some),
        None => Ok(None),
    }
}

/// Explain every merchant, optionally only those in one bucket
pub fn explain_all(
    model: &SpendingModel,
    bucket: Option<Bucket>,
    verbosity: Verbosity,
) -> Result<Vec<MerchantExplanation>> {
    model
        .merchants()
        .filter(|(b, _)| bucket.is_none() || bucket == Some(*b))
        .map(|(_, m)| explain(model, m, verbosity))
        .collect()
}

/// A rule as shown in a description explanation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSummary {
    /// Pattern including modifiers
    pub pattern: String,
    pub merchant: String,
    pub category: String,
    pub subcategory: String,
    pub origin: RuleOrigin,
    pub rule_index: usize,
}

impl From<RuleMatch<'_>> for RuleSummary {
    fn from(m: RuleMatch<'_>) -> Self {
        Self {
            pattern: m.rule.spec(),
            merchant: m.rule.merchant.clone(),
            category: m.rule.category.clone(),
            subcategory: m.rule.subcategory.clone(),
            origin: m.rule.origin,
            rule_index: m.rule_index,
        }
    }
}

/// How a raw description would be resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionExplanation {
    pub description: String,
    pub matched: Option<RuleSummary>,
    /// Rules that also match but lose on priority (trace and above)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shadowed: Vec<RuleSummary>,
    /// Starter pattern when nothing matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_merchant: Option<String>,
}

/// Explain which rule a transaction resolves to and which rules it shadows
pub fn explain_description(
    rules: &RuleSet,
    txn: &NewTransaction,
    verbosity: Verbosity,
) -> DescriptionExplanation {
    let mut matches = rules.matching_rules(txn).into_iter().map(RuleSummary::from);
    let matched = matches.next();
    let shadowed = if verbosity >= Verbosity::Trace {
        matches.collect()
    } else {
        Vec::new()
    };

    let unmatched = matched.is_none();
    DescriptionExplanation {
        description: txn.description.clone(),
        matched,
        shadowed,
        suggested_pattern: unmatched.then(|| suggest_pattern(&txn.description)),
        suggested_merchant: unmatched.then(|| suggest_merchant_name(&txn.description)),
    }
}
