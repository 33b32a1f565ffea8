//! Rule matching engine for merchant categorization
//!
//! A rule is a case-insensitive, unanchored regex over the transaction
//! description, optionally narrowed by inline modifiers:
//!
//! ```text
//! COSTCO[amount>200]          amount comparator (>, <, >=, <=, =)
//! RESTAURANT[amount:100-500]  inclusive amount range
//! BESTBUY[date=2025-01-15]    exact date
//! AMAZON[month=12]            month of year, any year
//! ```
//!
//! Rules are tried in priority order: every user rule in file order, then every
//! baseline rule in file order. The first rule whose pattern and modifiers all
//! hold wins; nothing after it is evaluated. Patterns may use look-around
//! (`UBER (?!EATS)`), so they are compiled with `fancy_regex`.
//!
//! A [`RuleSet`] compiles every pattern up front. A bad pattern or modifier
//! fails the whole set, so a run never starts with a partial rule set.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use fancy_regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{MatchInfo, NewTransaction, RuleOrigin, Transaction};

/// Baseline rules shipped with the binary
pub const BASELINE_RULES: &str = include_str!("../../../config/baseline_rules.csv");

/// Tolerance for `[amount=...]` comparisons
const AMOUNT_EPSILON: f64 = 0.001;

/// Trailing `[name...]` group at the end of a rule pattern
static MODIFIER_SUFFIX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\[([A-Za-z_]+)([^\[\]]*)\]\s*$").expect("modifier suffix regex is valid")
});

/// Amount comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => (lhs - rhs).abs() < AMOUNT_EPSILON,
        }
    }

    /// Split a leading operator off `body`, longest operators first
    fn split_prefix(body: &str) -> Option<(Self, &str)> {
        [
            (">=", Self::Ge),
            ("<=", Self::Le),
            (">", Self::Gt),
            ("<", Self::Lt),
            ("=", Self::Eq),
        ]
        .into_iter()
        .find_map(|(op, cmp)| body.strip_prefix(op).map(|rest| (cmp, rest.trim())))
    }
}

/// A condition narrowing a rule to a subset of the transactions its pattern matches
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modifier {
    Amount { op: Comparator, value: f64 },
    /// Inclusive on both ends
    AmountRange { min: f64, max: f64 },
    Date { date: NaiveDate },
    /// Month of year (1-12), year ignored
    Month { month: u32 },
}

impl Modifier {
    pub fn holds(&self, txn: &NewTransaction) -> bool {
        match self {
            Self::Amount { op, value } => op.holds(txn.amount, *value),
            Self::AmountRange { min, max } => txn.amount >= *min && txn.amount <= *max,
            Self::Date { date } => txn.date == *date,
            Self::Month { month } => txn.date.month() == *month,
        }
    }
}

impl std::fmt::Display for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Amount { op, value } => write!(f, "[amount{}{}]", op.as_str(), value),
            Self::AmountRange { min, max } => write!(f, "[amount:{}-{}]", min, max),
            Self::Date { date } => write!(f, "[date={}]", date),
            Self::Month { month } => write!(f, "[month={}]", month),
        }
    }
}

/// A merchant rule as declared in a rules file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    /// Regex pattern without modifiers
    pub pattern: String,
    pub merchant: String,
    pub category: String,
    pub subcategory: String,
    pub modifiers: Vec<Modifier>,
    pub origin: RuleOrigin,
}

impl Rule {
    pub fn new(
        pattern: impl Into<String>,
        merchant: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        origin: RuleOrigin,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            merchant: merchant.into(),
            category: category.into(),
            subcategory: subcategory.into(),
            modifiers: Vec::new(),
            origin,
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Build a rule from pattern text that may carry inline modifiers
    pub fn parse(
        spec: &str,
        merchant: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        origin: RuleOrigin,
    ) -> Result<Self> {
        let merchant = merchant.into();
        let (pattern, modifiers) =
            parse_pattern_with_modifiers(spec).map_err(|message| Error::InvalidModifier {
                rule: merchant.clone(),
                message,
            })?;

        Ok(Self {
            pattern,
            merchant,
            category: category.into(),
            subcategory: subcategory.into(),
            modifiers,
            origin,
        })
    }

    /// Pattern text including modifiers, as it would appear in a rules file
    pub fn spec(&self) -> String {
        let mut spec = self.pattern.clone();
        for modifier in &self.modifiers {
            spec.push_str(&modifier.to_string());
        }
        spec
    }
}

/// Split trailing `[amount...]`, `[date...]` and `[month...]` groups off a pattern.
///
/// Bracket groups with any other name (regex character classes such as `[A-Z]`)
/// are left in the pattern.
pub fn parse_pattern_with_modifiers(spec: &str) -> std::result::Result<(String, Vec<Modifier>), String> {
    let mut rest = spec.trim();
    let mut modifiers = Vec::new();

    while let Some(caps) = MODIFIER_SUFFIX.captures(rest) {
        let name = caps[1].to_lowercase();
        if !matches!(name.as_str(), "amount" | "date" | "month") {
            break;
        }
        modifiers.push(parse_modifier(&name, caps[2].trim())?);

        let start = caps.get(0).map_or(rest.len(), |m| m.start());
        rest = rest[..start].trim_end();
    }

    if rest.is_empty() {
        return Err(format!("pattern is empty: '{}'", spec.trim()));
    }

    // Collected back to front
    modifiers.reverse();
    Ok((rest.to_string(), modifiers))
}

fn parse_modifier(name: &str, body: &str) -> std::result::Result<Modifier, String> {
    match name {
        "amount" => {
            if let Some(range) = body.strip_prefix(':') {
                return parse_amount_range(range.trim());
            }
            let (op, value) = Comparator::split_prefix(body)
                .ok_or_else(|| format!("missing comparator in [amount{}]", body))?;
            let value = parse_number(value)?;
            Ok(Modifier::Amount { op, value })
        }
        "date" => {
            let value = body
                .strip_prefix('=')
                .ok_or_else(|| format!("expected [date=YYYY-MM-DD], got [date{}]", body))?
                .trim();
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| format!("invalid date '{}' (use YYYY-MM-DD)", value))?;
            Ok(Modifier::Date { date })
        }
        "month" => {
            let value = body
                .strip_prefix('=')
                .ok_or_else(|| format!("expected [month=1-12], got [month{}]", body))?
                .trim();
            let month: u32 = value
                .parse()
                .map_err(|_| format!("invalid month '{}'", value))?;
            if !(1..=12).contains(&month) {
                return Err(format!("month must be between 1 and 12, got {}", month));
            }
            Ok(Modifier::Month { month })
        }
        other => Err(format!("unknown modifier '{}'", other)),
    }
}

fn parse_amount_range(range: &str) -> std::result::Result<Modifier, String> {
    // Skip the first char so a leading minus sign is not taken as the separator
    let split = range
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-')
        .map(|(i, _)| i)
        .ok_or_else(|| format!("expected [amount:MIN-MAX], got [amount:{}]", range))?;

    let min = parse_number(range[..split].trim())?;
    let max = parse_number(range[split + 1..].trim())?;
    if min > max {
        return Err(format!("amount range {}-{} is inverted", min, max));
    }
    Ok(Modifier::AmountRange { min, max })
}

fn parse_number(value: &str) -> std::result::Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid amount '{}'", value))
}

/// Parse a rules CSV (`Pattern,Merchant,Category,Subcategory`).
///
/// The header row is optional. `#` comment lines, blank lines and rows with a
/// blank pattern are skipped. A blank merchant falls back to the pattern text.
pub fn parse_rules_csv(content: &str, origin: RuleOrigin) -> Result<Vec<Rule>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rules = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);

        let spec = record.get(0).unwrap_or_default();
        if spec.is_empty() {
            continue;
        }
        if idx == 0 && spec.eq_ignore_ascii_case("pattern") {
            continue;
        }

        let (pattern, modifiers) = parse_pattern_with_modifiers(spec)
            .map_err(|message| Error::InvalidRuleLine { line, message })?;

        let merchant = record
            .get(1)
            .filter(|m| !m.is_empty())
            .unwrap_or(pattern.as_str())
            .to_string();

        rules.push(Rule {
            pattern,
            merchant,
            category: record.get(2).unwrap_or_default().to_string(),
            subcategory: record.get(3).unwrap_or_default().to_string(),
            modifiers,
            origin,
        });
    }

    debug!("Parsed {} {} rules", rules.len(), origin);
    Ok(rules)
}

/// The shipped baseline rules
pub fn baseline_rules() -> Result<Vec<Rule>> {
    parse_rules_csv(BASELINE_RULES, RuleOrigin::Baseline)
}

/// A rule paired with its compiled pattern
#[derive(Debug)]
struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

impl CompiledRule {
    fn pattern_matches(&self, description: &str) -> bool {
        match self.regex.is_match(description) {
            Ok(matched) => matched,
            Err(e) => {
                // Backtrack limit hit
                warn!(
                    "Pattern '{}' failed on '{}': {}",
                    self.rule.pattern, description, e
                );
                false
            }
        }
    }

    fn matches(&self, txn: &NewTransaction) -> bool {
        self.pattern_matches(&txn.description) && self.rule.modifiers.iter().all(|m| m.holds(txn))
    }
}

/// The rule that won for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleMatch<'a> {
    pub rule: &'a Rule,
    /// Position in priority order
    pub rule_index: usize,
}

impl RuleMatch<'_> {
    pub fn merchant(&self) -> &str {
        &self.rule.merchant
    }

    pub fn category(&self) -> &str {
        &self.rule.category
    }

    pub fn subcategory(&self) -> &str {
        &self.rule.subcategory
    }

    pub fn origin(&self) -> RuleOrigin {
        self.rule.origin
    }

    pub fn match_info(&self) -> MatchInfo {
        MatchInfo {
            pattern: self.rule.pattern.clone(),
            origin: self.rule.origin,
            rule_index: self.rule_index,
        }
    }

    /// Resolve `txn` into a categorized transaction using this rule
    pub fn apply(&self, txn: &NewTransaction) -> Transaction {
        Transaction {
            date: txn.date,
            amount: txn.amount,
            description: txn.description.clone(),
            location: txn.location.clone(),
            merchant: self.rule.merchant.clone(),
            category: self.rule.category.clone(),
            subcategory: self.rule.subcategory.clone(),
            month: txn.month(),
            match_info: self.match_info(),
        }
    }
}

/// An immutable, compiled, priority-ordered set of rules
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile `rules`, ordering user rules before baseline rules.
    /// Declaration order is kept within each origin.
    pub fn new(mut rules: Vec<Rule>) -> Result<Self> {
        rules.sort_by_key(|r| r.origin.rank());

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex =
                Regex::new(&format!("(?i){}", rule.pattern)).map_err(|e| Error::InvalidPattern {
                    rule: rule.merchant.clone(),
                    message: format!("/{}/: {}", rule.pattern, e),
                })?;
            compiled.push(CompiledRule { rule, regex });
        }

        debug!("Compiled rule set with {} rules", compiled.len());
        Ok(Self { rules: compiled })
    }

    /// Merge user overrides with baseline rules
    pub fn from_parts(user: Vec<Rule>, baseline: Vec<Rule>) -> Result<Self> {
        let rules = user
            .into_iter()
            .map(|r| Rule { origin: RuleOrigin::User, ..r })
            .chain(baseline.into_iter().map(|r| Rule {
                origin: RuleOrigin::Baseline,
                ..r
            }))
            .collect();
        Self::new(rules)
    }

    /// User rules layered over the shipped baseline
    pub fn with_baseline(user: Vec<Rule>) -> Result<Self> {
        Self::from_parts(user, baseline_rules()?)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in priority order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// First rule that fully matches `txn`, if any
    pub fn match_transaction(&self, txn: &NewTransaction) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, c)| c.matches(txn))
            .map(|(rule_index, c)| RuleMatch {
                rule: &c.rule,
                rule_index,
            })
    }

    /// Resolve `txn` to a categorized transaction, or `None` if no rule matches
    pub fn resolve(&self, txn: &NewTransaction) -> Option<Transaction> {
        self.match_transaction(txn).map(|m| m.apply(txn))
    }

    /// Every rule that would match `txn`, in priority order.
    ///
    /// The first entry is the winner; the rest are shadowed by it.
    pub fn matching_rules(&self, txn: &NewTransaction) -> Vec<RuleMatch<'_>> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matches(txn))
            .map(|(rule_index, c)| RuleMatch {
                rule: &c.rule,
                rule_index,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn txn(description: &str, amount: f64) -> NewTransaction {
        NewTransaction::new(date(2025, 1, 15), amount, description)
    }

    fn user(pattern: &str, merchant: &str, category: &str, sub: &str) -> Rule {
        Rule::parse(pattern, merchant, category, sub, RuleOrigin::User).unwrap()
    }

    fn baseline(pattern: &str, merchant: &str, category: &str, sub: &str) -> Rule {
        Rule::parse(pattern, merchant, category, sub, RuleOrigin::Baseline).unwrap()
    }

    #[test]
    fn test_pattern_matching_regex() {
        let rules = RuleSet::new(vec![user(r"NETFLIX.*", "Netflix", "Subscriptions", "Streaming")])
            .unwrap();

        assert!(rules.match_transaction(&txn("NETFLIX.COM/BILL", 15.49)).is_some());
        assert!(rules.match_transaction(&txn("HULU", 17.99)).is_none());
    }

    #[test]
    fn test_matching_is_case_insensitive_and_unanchored() {
        let rules = RuleSet::new(vec![user("COSTCO", "Costco", "Food", "Grocery")]).unwrap();

        let m = rules
            .match_transaction(&txn("purchase at costco wholesale #1234", 80.0))
            .unwrap();
        assert_eq!(m.merchant(), "Costco");
        assert_eq!(m.category(), "Food");
        assert_eq!(m.subcategory(), "Grocery");
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new(vec![
            user("COSTCO GAS", "Costco Gas", "Transport", "Gas"),
            user("COSTCO", "Costco", "Food", "Grocery"),
        ])
        .unwrap();

        let m = rules.match_transaction(&txn("COSTCO GAS STATION", 40.0)).unwrap();
        assert_eq!(m.merchant(), "Costco Gas");
        assert_eq!(m.rule_index, 0);
    }

    #[test]
    fn test_user_rules_outrank_baseline_regardless_of_order() {
        let rules = RuleSet::new(vec![
            baseline("STARBUCKS", "Starbucks", "Food", "Coffee"),
            user("STARBUCKS", "Work Coffee", "Business", "Meals"),
        ])
        .unwrap();

        let m = rules.match_transaction(&txn("STARBUCKS #55", 6.5)).unwrap();
        assert_eq!(m.merchant(), "Work Coffee");
        assert_eq!(m.origin(), RuleOrigin::User);
        assert_eq!(m.rule_index, 0);
    }

    #[test]
    fn test_uber_eats_resolves_to_food_not_transport() {
        let rules = RuleSet::new(vec![
            user("NETFLIX.*", "Netflix", "Subscriptions", "Streaming"),
            baseline(r"UBER (?!EATS)", "Uber", "Transport", "Rideshare"),
            baseline(r"UBER\s*EATS", "Uber Eats", "Food", "Delivery"),
        ])
        .unwrap();

        let m = rules.match_transaction(&txn("UBER EATS #4521", 32.0)).unwrap();
        assert_eq!(m.category(), "Food");
        assert_eq!(m.merchant(), "Uber Eats");
        assert_eq!(m.origin(), RuleOrigin::Baseline);

        let m = rules.match_transaction(&txn("UBER TRIP 12345", 18.0)).unwrap();
        assert_eq!(m.category(), "Transport");
    }

    #[test]
    fn test_matching_is_deterministic() {
        let rules = RuleSet::with_baseline(vec![user("AMZN|AMAZON", "Amazon", "Shopping", "Online")])
            .unwrap();
        let t = txn("AMZN Mktp US*AB123", 25.0);

        let first = rules.match_transaction(&t).map(|m| m.match_info());
        for _ in 0..10 {
            assert_eq!(rules.match_transaction(&t).map(|m| m.match_info()), first);
        }
    }

    #[test]
    fn test_amount_modifier_match() {
        let rules = RuleSet::new(vec![
            user("COSTCO[amount>200]", "Costco Bulk", "Shopping", "Bulk"),
            user("COSTCO", "Costco", "Food", "Grocery"),
        ])
        .unwrap();

        assert_eq!(
            rules.match_transaction(&txn("COSTCO WHOLESALE", 250.0)).unwrap().merchant(),
            "Costco Bulk"
        );
        assert_eq!(
            rules.match_transaction(&txn("COSTCO WHOLESALE", 50.0)).unwrap().merchant(),
            "Costco"
        );
    }

    #[test]
    fn test_amount_range_modifier_is_inclusive() {
        let rules = RuleSet::new(vec![
            user("RESTAURANT[amount:100-500]", "Fine Dining", "Food", "Restaurant"),
            user("RESTAURANT", "Casual Dining", "Food", "Restaurant"),
        ])
        .unwrap();

        for (amount, expected) in [
            (100.0, "Fine Dining"),
            (500.0, "Fine Dining"),
            (200.0, "Fine Dining"),
            (99.99, "Casual Dining"),
            (500.01, "Casual Dining"),
        ] {
            let m = rules.match_transaction(&txn("RESTAURANT XYZ", amount)).unwrap();
            assert_eq!(m.merchant(), expected, "amount {}", amount);
        }
    }

    #[test]
    fn test_date_and_month_modifiers() {
        let rules = RuleSet::new(vec![
            user("BESTBUY[date=2025-01-15]", "TV Purchase", "Shopping", "Electronics"),
            user("AMAZON[month=12]", "Holiday Shopping", "Shopping", "Gifts"),
            user("BESTBUY", "Best Buy", "Shopping", "Retail"),
            user("AMAZON", "Amazon", "Shopping", "Online"),
        ])
        .unwrap();

        let on = NewTransaction::new(date(2025, 1, 15), 499.0, "BESTBUY STORE");
        let off = NewTransaction::new(date(2025, 1, 16), 499.0, "BESTBUY STORE");
        assert_eq!(rules.match_transaction(&on).unwrap().merchant(), "TV Purchase");
        assert_eq!(rules.match_transaction(&off).unwrap().merchant(), "Best Buy");

        // Month modifier ignores the year
        let dec = NewTransaction::new(date(2023, 12, 3), 30.0, "AMAZON.COM");
        let jun = NewTransaction::new(date(2025, 6, 15), 30.0, "AMAZON.COM");
        assert_eq!(rules.match_transaction(&dec).unwrap().merchant(), "Holiday Shopping");
        assert_eq!(rules.match_transaction(&jun).unwrap().merchant(), "Amazon");
    }

    #[test]
    fn test_combined_modifiers_all_must_hold() {
        let rules = RuleSet::new(vec![
            user(
                "BESTBUY[amount=499.99][date=2025-01-15]",
                "That Specific Purchase",
                "Personal",
                "Gifts",
            ),
            user("BESTBUY", "Best Buy", "Shopping", "Electronics"),
        ])
        .unwrap();

        let both = NewTransaction::new(date(2025, 1, 15), 499.99, "BESTBUY");
        let wrong_amount = NewTransaction::new(date(2025, 1, 15), 100.0, "BESTBUY");
        let wrong_date = NewTransaction::new(date(2025, 1, 16), 499.99, "BESTBUY");

        assert_eq!(rules.match_transaction(&both).unwrap().merchant(), "That Specific Purchase");
        assert_eq!(rules.match_transaction(&wrong_amount).unwrap().merchant(), "Best Buy");
        assert_eq!(rules.match_transaction(&wrong_date).unwrap().merchant(), "Best Buy");
    }

    #[test]
    fn test_parse_pattern_with_modifiers() {
        let (pattern, modifiers) = parse_pattern_with_modifiers("COSTCO[amount>=200][month=3]").unwrap();
        assert_eq!(pattern, "COSTCO");
        assert_eq!(
            modifiers,
            vec![
                Modifier::Amount { op: Comparator::Ge, value: 200.0 },
                Modifier::Month { month: 3 },
            ]
        );

        // Character classes stay in the pattern
        let (pattern, modifiers) = parse_pattern_with_modifiers(r"STORE [A-Z]{2}").unwrap();
        assert_eq!(pattern, r"STORE [A-Z]{2}");
        assert!(modifiers.is_empty());

        let (pattern, modifiers) = parse_pattern_with_modifiers("SHOP[0-9][amount<10]").unwrap();
        assert_eq!(pattern, "SHOP[0-9]");
        assert_eq!(modifiers.len(), 1);
    }

    #[test]
    fn test_malformed_modifiers_are_rejected() {
        for spec in [
            "COSTCO[amount>abc]",
            "COSTCO[amount]",
            "COSTCO[amount:500-100]",
            "COSTCO[date=2025-13-01]",
            "COSTCO[month=13]",
            "COSTCO[month>3]",
            "[amount>5]",
        ] {
            assert!(parse_pattern_with_modifiers(spec).is_err(), "{} should fail", spec);
        }

        let err = Rule::parse("X[amount>abc]", "Bad Rule", "A", "B", RuleOrigin::User).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Bad Rule"));
    }

    #[test]
    fn test_invalid_pattern_fails_whole_rule_set() {
        let err = RuleSet::new(vec![
            user("COSTCO", "Costco", "Food", "Grocery"),
            user("(?P<", "Broken", "Food", "Grocery"),
        ])
        .unwrap_err();

        assert!(matches!(err, Error::InvalidPattern { ref rule, .. } if rule == "Broken"));
    }

    #[test]
    fn test_matching_rules_lists_shadowed_rules() {
        let rules = RuleSet::new(vec![
            user("COSTCO GAS", "Costco Gas", "Transport", "Gas"),
            user("COSTCO", "Costco", "Food", "Grocery"),
            user("SHELL", "Shell", "Transport", "Gas"),
        ])
        .unwrap();

        let matches = rules.matching_rules(&txn("COSTCO GAS #12", 45.0));
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].merchant(), "Costco Gas");
        assert_eq!(matches[1].merchant(), "Costco");

        assert!(rules.matching_rules(&txn("RANDOM", 1.0)).is_empty());
    }

    #[test]
    fn test_resolve_builds_categorized_transaction() {
        let rules = RuleSet::new(vec![user("STARBUCKS", "Starbucks", "Food", "Coffee")]).unwrap();
        let resolved = rules
            .resolve(&txn("STARBUCKS STORE 123", 5.75).with_location("WA"))
            .unwrap();

        assert_eq!(resolved.merchant, "Starbucks");
        assert_eq!(resolved.month, "2025-01");
        assert_eq!(resolved.category_path(), "Food.Coffee");
        assert_eq!(resolved.location.as_deref(), Some("WA"));
        assert_eq!(resolved.match_info.pattern, "STARBUCKS");
        assert_eq!(resolved.match_info.origin, RuleOrigin::User);
    }

    #[test]
    fn test_parse_rules_csv() {
        let content = "Pattern,Merchant,Category,Subcategory
# Groceries
COSTCO[amount>200],Costco Bulk,Shopping,Bulk

STARBUCKS,Starbucks,Food,Coffee
,Empty Pattern,Food,Other
\"UBER\\s(?!EATS)\",Uber,Transport,Rideshare
NETFLIX
";
        let rules = parse_rules_csv(content, RuleOrigin::User).unwrap();

        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].pattern, "COSTCO");
        assert_eq!(rules[0].merchant, "Costco Bulk");
        assert_eq!(rules[0].modifiers, vec![Modifier::Amount { op: Comparator::Gt, value: 200.0 }]);
        assert_eq!(rules[1].merchant, "Starbucks");
        assert_eq!(rules[2].pattern, r"UBER\s(?!EATS)");
        // Blank merchant falls back to the pattern
        assert_eq!(rules[3].merchant, "NETFLIX");
        assert_eq!(rules[3].category, "");
    }

    #[test]
    fn test_parse_rules_csv_reports_line_of_bad_modifier() {
        let content = "COSTCO,Costco,Food,Grocery\nBESTBUY[date=tomorrow],Best Buy,Shopping,Retail\n";
        let err = parse_rules_csv(content, RuleOrigin::User).unwrap_err();
        assert!(matches!(err, Error::InvalidRuleLine { line: 2, .. }));
    }

    #[test]
    fn test_baseline_rules_compile() {
        let rules = RuleSet::with_baseline(Vec::new()).unwrap();
        assert!(!rules.is_empty());
        assert!(rules.rules().all(|r| r.origin == RuleOrigin::Baseline));
    }

    #[test]
    fn test_rule_spec_round_trips_modifiers() {
        let rule = user("COSTCO[amount:100-500][month=12]", "Costco", "Food", "Grocery");
        assert_eq!(rule.spec(), "COSTCO[amount:100-500][month=12]");
    }
}
