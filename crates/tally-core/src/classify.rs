//! Spend-pattern classification
//!
//! Buckets a merchant by how often and how evenly it charges:
//!
//! 1. Excluded category (transfers, cash, income) → `excluded`
//! 2. Recurrence ratio `months active / months in range` at or above the
//!    threshold → recurring, then the coefficient of variation of the monthly
//!    totals splits `monthly` (steady) from `variable`
//! 3. Otherwise, in order: travel category → `travel`; one charge per year
//!    spaced about a year apart, or an annual category → `annual`; spend in two
//!    or more months → `periodic`; anything else → `one_off`
//!
//! Every check that ran is recorded as a [`TraceStep`] so a decision can be
//! explained after the fact. Classification is a pure function of the merchant,
//! the month count and the config, and is cheap enough to recompute on demand.

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::merchant::Merchant;
use crate::models::Bucket;

/// A single decision point in the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    ExcludedCategory,
    RecurrenceRatio,
    Variability,
    TravelCategory,
    YearlyPattern,
    AnnualCategory,
    MultipleMonths,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExcludedCategory => "excluded_category",
            Self::RecurrenceRatio => "recurrence_ratio",
            Self::Variability => "variability",
            Self::TravelCategory => "travel_category",
            Self::YearlyPattern => "yearly_pattern",
            Self::AnnualCategory => "annual_category",
            Self::MultipleMonths => "multiple_months",
        }
    }

    /// The question the check answers
    pub fn question(&self) -> &'static str {
        match self {
            Self::ExcludedCategory => "Is the category excluded from spending?",
            Self::RecurrenceRatio => "Does it appear in enough months to be recurring?",
            Self::Variability => "Are the monthly totals steady?",
            Self::TravelCategory => "Is it a travel category?",
            Self::YearlyPattern => "Is it charged once a year, about a year apart?",
            Self::AnnualCategory => "Is the category billed annually?",
            Self::MultipleMonths => "Does it span more than one month?",
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperandValue {
    Number(f64),
    Count(usize),
    Text(String),
}

impl std::fmt::Display for OperandValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{:.2}", n),
            Self::Count(c) => write!(f, "{}", c),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A named value a check looked at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operand {
    pub name: &'static str,
    pub value: OperandValue,
}

impl Operand {
    fn number(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value: OperandValue::Number(value),
        }
    }

    fn count(name: &'static str, value: usize) -> Self {
        Self {
            name,
            value: OperandValue::Count(value),
        }
    }

    fn text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            value: OperandValue::Text(value.to_string()),
        }
    }
}

/// One evaluated check: what was asked, the answer, and the inputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub check: Check,
    pub outcome: bool,
    pub operands: Vec<Operand>,
}

impl TraceStep {
    fn new(check: Check, outcome: bool, operands: Vec<Operand>) -> Self {
        Self {
            check,
            outcome,
            operands,
        }
    }

    pub fn operand(&self, name: &str) -> Option<&OperandValue> {
        self.operands.iter().find(|o| o.name == name).map(|o| &o.value)
    }
}

/// Figures the classifier derived from the merchant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationStats {
    pub months_active: usize,
    pub months_in_range: usize,
    pub recurrence_ratio: f64,
    /// Coefficient of variation of the monthly totals
    pub cv: f64,
    pub count: usize,
    pub total: f64,
    pub max_payment: f64,
    pub years_active: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub bucket: Bucket,
    pub trace: Vec<TraceStep>,
    pub stats: ClassificationStats,
}

/// Population coefficient of variation (stddev / mean). Zero when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

/// One transaction per calendar year, at least two years, consecutive charges
/// within `tolerance_days` of 365 days apart
fn is_yearly_pattern(merchant: &Merchant, tolerance_days: i64) -> bool {
    let txns = &merchant.transactions;
    if txns.len() < 2 || merchant.years().len() != txns.len() {
        return false;
    }

    txns.windows(2)
        .all(|w| ((w[1].date - w[0].date).num_days() - 365).abs() <= tolerance_days)
}

/// Bucket a merchant and record every check that led there
pub fn classify(
    merchant: &Merchant,
    months_in_range: usize,
    config: &AnalysisConfig,
) -> Result<Classification> {
    if months_in_range == 0 {
        return Err(Error::InvalidMonthRange(format!(
            "cannot classify '{}' over zero months",
            merchant.name
        )));
    }

    let thresholds = &config.thresholds;
    let categories = &config.categories;

    let monthly: Vec<f64> = merchant.monthly_totals.values().copied().collect();
    let stats = ClassificationStats {
        months_active: merchant.months_active(),
        months_in_range,
        recurrence_ratio: merchant.months_active() as f64 / months_in_range as f64,
        cv: coefficient_of_variation(&monthly),
        count: merchant.count,
        total: merchant.total,
        max_payment: merchant.max_payment,
        years_active: merchant.years().len(),
    };

    let mut trace = Vec::new();
    let done = |bucket: Bucket, trace: Vec<TraceStep>, stats: ClassificationStats| {
        Ok(Classification {
            bucket,
            trace,
            stats,
        })
    };

    let excluded = categories.is_excluded(&merchant.category);
    trace.push(TraceStep::new(
        Check::ExcludedCategory,
        excluded,
        vec![Operand::text("category", &merchant.category)],
    ));
    if excluded {
        return done(Bucket::Excluded, trace, stats);
    }

    let recurring = stats.recurrence_ratio >= thresholds.recurrence;
    trace.push(TraceStep::new(
        Check::RecurrenceRatio,
        recurring,
        vec![
            Operand::count("months_active", stats.months_active),
            Operand::count("months_in_range", months_in_range),
            Operand::number("ratio", stats.recurrence_ratio),
            Operand::number("threshold", thresholds.recurrence),
        ],
    ));
    if recurring {
        let steady = stats.cv <= thresholds.variability;
        trace.push(TraceStep::new(
            Check::Variability,
            steady,
            vec![
                Operand::number("cv", stats.cv),
                Operand::number("threshold", thresholds.variability),
            ],
        ));
        let bucket = if steady { Bucket::Monthly } else { Bucket::Variable };
        return done(bucket, trace, stats);
    }

    let travel = categories.is_travel(&merchant.category);
    trace.push(TraceStep::new(
        Check::TravelCategory,
        travel,
        vec![Operand::text("category", &merchant.category)],
    ));
    if travel {
        return done(Bucket::Travel, trace, stats);
    }

    let yearly = is_yearly_pattern(merchant, thresholds.annual_tolerance_days);
    trace.push(TraceStep::new(
        Check::YearlyPattern,
        yearly,
        vec![
            Operand::count("count", stats.count),
            Operand::count("years_active", stats.years_active),
        ],
    ));
    if yearly {
        return done(Bucket::Annual, trace, stats);
    }

    let annual_category = categories.is_annual(&merchant.category, &merchant.subcategory);
    trace.push(TraceStep::new(
        Check::AnnualCategory,
        annual_category,
        vec![Operand::text("category_path", &merchant.category_path)],
    ));
    if annual_category {
        return done(Bucket::Annual, trace, stats);
    }

    let spread = stats.count > 1 && stats.months_active >= 2;
    trace.push(TraceStep::new(
        Check::MultipleMonths,
        spread,
        vec![
            Operand::count("count", stats.count),
            Operand::count("months_active", stats.months_active),
        ],
    ));
    let bucket = if spread { Bucket::Periodic } else { Bucket::OneOff };
    done(bucket, trace, stats)
}
