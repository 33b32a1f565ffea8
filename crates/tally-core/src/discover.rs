//! Discovery of unmatched merchants
//!
//! Groups transactions no rule matched by their raw description, ranks them
//! by spend and suggests a starter rule for each: a pattern that survives the
//! noise banks append (store numbers, state codes, phone numbers) and a
//! readable merchant name.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::Result;
use crate::models::NewTransaction;

const MAX_EXAMPLES: usize = 3;

/// Payment processor prefixes (Apple Pay, Square, Toast, PayPal, ...)
static PROCESSOR_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:APLPAY|SQ|TST|SP|PP|GOOGLE|BT|IC|DD|CKO|EB|LS|PY|CLR|6CRIC|AT|SC|WP)(?:\s*\*\s*|\s+)",
    )
    .expect("processor prefix regex is valid")
});

static URL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:WWW\.|HTTPS?://)").expect("url prefix regex is valid"));

/// Trailing noise, applied in order
static SUFFIX_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\s+\d{4,}.*$",
        r"(?i)\s+[A-Z]{2}$",
        r"\s+\d{5}$",
        r"\s+#\d+",
        r"(?i)\s+DES:.*$",
        r"(?i)\s+ID:.*$",
        r"\s+\d{3}-\d{3}-\d{4}.*$",
        r"\s+\(\d{3}\).*$",
        r"(?i)\s+https?://.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("suffix noise regex is valid"))
    .collect()
});

/// Words that usually start a city name rather than continue a merchant name
const LOCATION_WORDS: &[&str] = &["NEW", "LOS", "SAN", "LAS", "NORTH", "SOUTH", "EAST", "WEST"];

/// Strip processor prefixes, URL prefixes and trailing IDs/locations
fn clean_description(description: &str) -> String {
    let mut desc = description.trim().to_string();

    loop {
        let stripped = PROCESSOR_PREFIX.replace(&desc, "").into_owned();
        if stripped == desc {
            break;
        }
        desc = stripped;
    }
    desc = URL_PREFIX.replace(&desc, "").into_owned();

    for re in SUFFIX_NOISE.iter() {
        desc = re.replace_all(&desc, "").into_owned();
    }
    desc.trim().to_string()
}

/// Suggest a rule pattern for a raw description.
///
/// Takes up to three leading words of the cleaned, uppercased description,
/// stopping early at a location word, joined by flexible whitespace.
pub fn suggest_pattern(description: &str) -> String {
    let cleaned = clean_description(&description.to_uppercase());
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.is_empty() {
        return regex::escape(cleaned.as_str());
    }

    let mut core = Vec::new();
    for word in words.iter().take(3) {
        if !core.is_empty() && LOCATION_WORDS.contains(word) {
            break;
        }
        core.push(regex::escape(word));
    }
    core.join(r"\s*")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Suggest a display name: the first three cleaned words in title case
pub fn suggest_merchant_name(description: &str) -> String {
    let cleaned = clean_description(description);
    let words: Vec<String> = cleaned.split_whitespace().take(3).map(title_case).collect();
    if words.is_empty() {
        "Unknown".to_string()
    } else {
        words.join(" ")
    }
}

/// Unmatched transactions sharing one raw description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownMerchant {
    pub description: String,
    pub count: usize,
    /// Sum of absolute amounts
    pub total: f64,
    /// Up to three sample transactions, in input order
    pub examples: Vec<NewTransaction>,
    pub suggested_pattern: String,
    pub suggested_merchant: String,
}

impl UnknownMerchant {
    /// Starter line for a rules CSV, with category left blank
    pub fn to_rule_line(&self) -> Result<String> {
        let mut wtr = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        wtr.write_record([
            self.suggested_pattern.as_str(),
            self.suggested_merchant.as_str(),
            "",
            "",
        ])?;
        let bytes = wtr
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
    }
}

/// Group unmatched transactions by raw description, largest spend first
pub fn discover_unknown(unmatched: &[NewTransaction], limit: Option<usize>) -> Vec<UnknownMerchant> {
    let mut groups: HashMap<&str, UnknownMerchant> = HashMap::new();

    for txn in unmatched {
        let entry = groups
            .entry(txn.description.as_str())
            .or_insert_with(|| UnknownMerchant {
                description: txn.description.clone(),
                count: 0,
                total: 0.0,
                examples: Vec::new(),
                suggested_pattern: suggest_pattern(&txn.description),
                suggested_merchant: suggest_merchant_name(&txn.description),
            });
        entry.count += 1;
        entry.total += txn.amount.abs();
        if entry.examples.len() < MAX_EXAMPLES {
            entry.examples.push(txn.clone());
        }
    }

    let mut found: Vec<UnknownMerchant> = groups.into_values().collect();
    found.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.description.cmp(&b.description))
    });
    if let Some(limit) = limit {
        found.truncate(limit);
    }
    found
}
