//! Domain models for Tally

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A normalized transaction handed over by an importer (before rule matching)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    /// Positive = expense, negative = refund/credit
    pub amount: f64,
    pub description: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub location: Option<String>,
}

impl NewTransaction {
    pub fn new(date: NaiveDate, amount: f64, description: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            description: description.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Month key (`YYYY-MM`) this transaction falls in
    pub fn month(&self) -> String {
        month_key(self.date)
    }
}

/// Treat blank CSV cells as a missing location
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Where a rule came from. User rules always outrank baseline rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOrigin {
    User,
    Baseline,
}

impl RuleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Baseline => "baseline",
        }
    }

    /// Priority rank (lower is tried first)
    pub fn rank(&self) -> u8 {
        match self {
            Self::User => 0,
            Self::Baseline => 1,
        }
    }
}

impl std::str::FromStr for RuleOrigin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "baseline" => Ok(Self::Baseline),
            _ => Err(format!("Unknown rule origin: {}", s)),
        }
    }
}

impl std::fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of a rule match: which rule won and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    /// Pattern text as written (modifiers stripped)
    pub pattern: String,
    pub origin: RuleOrigin,
    /// Position of the rule in priority order
    pub rule_index: usize,
}

/// A transaction resolved to a merchant and category by the rule matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    /// Positive = expense, negative = refund/credit
    pub amount: f64,
    pub description: String,
    pub location: Option<String>,
    /// Merchant display name from the winning rule
    pub merchant: String,
    pub category: String,
    pub subcategory: String,
    /// `YYYY-MM`
    pub month: String,
    pub match_info: MatchInfo,
}

impl Transaction {
    pub fn category_path(&self) -> String {
        category_path(&self.category, &self.subcategory)
    }
}

/// Spend-pattern bucket a merchant is classified into
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Monthly,
    Variable,
    Annual,
    Periodic,
    Travel,
    OneOff,
    Excluded,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Variable => "variable",
            Self::Annual => "annual",
            Self::Periodic => "periodic",
            Self::Travel => "travel",
            Self::OneOff => "one_off",
            Self::Excluded => "excluded",
        }
    }

    /// Human label used by report output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Monthly => "Every Month",
            Self::Variable => "Varies by Month",
            Self::Annual => "Once a Year",
            Self::Periodic => "A Few Times/Year",
            Self::Travel => "Travel",
            Self::OneOff => "Large One-Time",
            Self::Excluded => "Excluded",
        }
    }

    /// All buckets in report order
    pub fn all() -> &'static [Bucket] {
        &[
            Self::Monthly,
            Self::Variable,
            Self::Annual,
            Self::Periodic,
            Self::Travel,
            Self::OneOff,
            Self::Excluded,
        ]
    }

    /// Whether this bucket counts toward spending totals
    pub fn is_spending(&self) -> bool {
        !matches!(self, Self::Excluded)
    }
}

impl std::str::FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "variable" => Ok(Self::Variable),
            "annual" => Ok(Self::Annual),
            "periodic" => Ok(Self::Periodic),
            "travel" => Ok(Self::Travel),
            "one_off" | "one-off" | "oneoff" => Ok(Self::OneOff),
            "excluded" => Ok(Self::Excluded),
            _ => Err(format!("Unknown bucket: {}", s)),
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Month key (`YYYY-MM`) for a date. Keys sort chronologically as strings.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Dotted category path, e.g. `Food.Coffee` (just `Food` without a subcategory)
pub fn category_path(category: &str, subcategory: &str) -> String {
    if subcategory.is_empty() {
        category.to_string()
    } else {
        format!("{}.{}", category, subcategory)
    }
}

/// Case-insensitive equality using full Unicode lowercasing
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Parse a strict `YYYY-MM` key into (year, month)
pub fn parse_month_key(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Inclusive span of calendar months, `start..end` as `YYYY-MM` keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub start: String,
    pub end: String,
}

impl MonthRange {
    /// Build a range, rejecting malformed keys and inverted bounds
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> crate::Result<Self> {
        let range = Self {
            start: start.into(),
            end: end.into(),
        };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> crate::Result<()> {
        for key in [&self.start, &self.end] {
            if parse_month_key(key).is_none() {
                return Err(crate::Error::InvalidMonthRange(format!(
                    "'{}' is not a YYYY-MM month",
                    key
                )));
            }
        }
        if self.start > self.end {
            return Err(crate::Error::InvalidMonthRange(format!(
                "{} is after {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Every month key in the range, in order, rolling December into January.
    /// Empty if either bound is malformed or the range is inverted.
    pub fn months(&self) -> Vec<String> {
        let (Some(mut cur), Some(last)) = (parse_month_key(&self.start), parse_month_key(&self.end))
        else {
            return Vec::new();
        };

        let mut months = Vec::new();
        while cur <= last {
            months.push(format!("{:04}-{:02}", cur.0, cur.1));
            cur = if cur.1 == 12 { (cur.0 + 1, 1) } else { (cur.0, cur.1 + 1) };
        }
        months
    }

    pub fn len(&self) -> usize {
        self.months().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lexicographic containment; month keys sort chronologically
    pub fn contains(&self, month: &str) -> bool {
        self.start.as_str() <= month && month <= self.end.as_str()
    }
}

impl std::str::FromStr for MonthRange {
    type Err = crate::Error;

    /// Accepts `YYYY-MM..YYYY-MM` or a single `YYYY-MM`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once("..") {
            Some((start, end)) => Self::new(start.trim(), end.trim()),
            None => Self::new(s.trim(), s.trim()),
        }
    }
}

impl std::fmt::Display for MonthRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_key() {
        assert_eq!(parse_month_key("2025-01"), Some((2025, 1)));
        assert_eq!(parse_month_key("2025-13"), None);
        assert_eq!(parse_month_key("2025-1"), None);
        assert_eq!(parse_month_key("25-01"), None);
        assert_eq!(parse_month_key("January"), None);
    }

    #[test]
    fn test_month_range_expansion_rolls_over_year() {
        let range: MonthRange = "2024-11..2025-02".parse().unwrap();
        assert_eq!(range.months(), vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
        assert_eq!(range.len(), 4);
        assert!(range.contains("2024-12"));
        assert!(!range.contains("2025-03"));
    }

    #[test]
    fn test_month_range_rejects_bad_input() {
        assert!("2025-03..2025-01".parse::<MonthRange>().is_err());
        assert!("2025-00..2025-01".parse::<MonthRange>().is_err());
        assert!(MonthRange::new("soon", "later").unwrap_err().is_configuration());

        let single: MonthRange = "2025-06".parse().unwrap();
        assert_eq!(single.months(), vec!["2025-06"]);
    }

    #[test]
    fn test_month_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(month_key(date), "2025-03");
    }

    #[test]
    fn test_category_path() {
        assert_eq!(category_path("Food", "Coffee"), "Food.Coffee");
        assert_eq!(category_path("Food", ""), "Food");
    }

    #[test]
    fn test_eq_ignore_case_handles_non_ascii() {
        assert!(eq_ignore_case("MÜNCHEN", "münchen"));
        assert!(eq_ignore_case("Ärzte", "ÄRZTE"));
        assert!(!eq_ignore_case("München", "Munchen"));
        assert!(!eq_ignore_case("WA", "W"));
    }

    #[test]
    fn test_bucket_round_trips_through_str() {
        for bucket in Bucket::all() {
            assert_eq!(bucket.as_str().parse::<Bucket>().unwrap(), *bucket);
        }
        assert_eq!("one-off".parse::<Bucket>().unwrap(), Bucket::OneOff);
        assert!("weekly".parse::<Bucket>().is_err());
    }

    #[test]
    fn test_user_origin_outranks_baseline() {
        assert!(RuleOrigin::User.rank() < RuleOrigin::Baseline.rank());
        assert_eq!("USER".parse::<RuleOrigin>().unwrap(), RuleOrigin::User);
    }
}
