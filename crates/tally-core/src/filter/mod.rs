//! Include/exclude filters over a spending model
//!
//! A filter targets one of four kinds:
//!
//! | kind     | code | matches when                                         |
//! |----------|------|------------------------------------------------------|
//! | merchant | `m`  | `merchant_id(text)` equals the merchant id           |
//! | category | `c`  | text is a case-insensitive substring of the path     |
//! | location | `l`  | text equals the transaction location (any case)      |
//! | month    | `d`  | text equals the month, or `A..B` contains it         |
//!
//! A transaction is hidden by any matching exclude filter. Otherwise, for
//! every kind that has include filters, it must match at least one of them:
//! OR within a kind, AND across kinds.

mod codec;
mod state;

pub use codec::{decode, encode, parse_token, FilterParseError};
pub use state::{
    active_months, compute_filtered_state, expand_month_range, FilteredMerchant, FilteredSection,
    FilteredState,
};

use serde::{Deserialize, Serialize};

use crate::merchant::{merchant_id, Merchant};
use crate::models::{eq_ignore_case, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Merchant,
    Category,
    Location,
    Month,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant",
            Self::Category => "category",
            Self::Location => "location",
            Self::Month => "month",
        }
    }

    /// Single-letter code used in encoded filter tokens
    pub fn code(&self) -> char {
        match self {
            Self::Merchant => 'm',
            Self::Category => 'c',
            Self::Location => 'l',
            Self::Month => 'd',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(Self::Merchant),
            "c" => Some(Self::Category),
            "l" => Some(Self::Location),
            "d" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn all() -> &'static [FilterKind] {
        &[Self::Merchant, Self::Category, Self::Location, Self::Month]
    }
}

impl std::str::FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merchant" | "m" => Ok(Self::Merchant),
            "category" | "c" => Ok(Self::Category),
            "location" | "l" => Ok(Self::Location),
            "month" | "d" => Ok(Self::Month),
            _ => Err(format!("Unknown filter kind: {}", s)),
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Include,
    Exclude,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Self::Include => Self::Exclude,
            Self::Exclude => Self::Include,
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub text: String,
    pub kind: FilterKind,
    pub mode: FilterMode,
}

impl Filter {
    pub fn include(kind: FilterKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            mode: FilterMode::Include,
        }
    }

    pub fn exclude(kind: FilterKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            mode: FilterMode::Exclude,
        }
    }

    /// Whether the filter's target matches, regardless of mode
    pub fn matches(&self, merchant: &Merchant, txn: &Transaction) -> bool {
        match self.kind {
            FilterKind::Merchant => merchant_id(&self.text) == merchant.id,
            FilterKind::Category => merchant
                .category_path
                .to_lowercase()
                .contains(&self.text.to_lowercase()),
            FilterKind::Location => txn
                .location
                .as_deref()
                .is_some_and(|loc| eq_ignore_case(loc, &self.text)),
            FilterKind::Month => month_matches(&self.text, &txn.month),
        }
    }
}

/// `YYYY-MM` equality, or inclusive `A..B` by lexicographic comparison
pub fn month_matches(text: &str, month: &str) -> bool {
    match text.split_once("..") {
        Some((start, end)) => start.trim() <= month && month <= end.trim(),
        None => text.trim() == month,
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = match self.mode {
            FilterMode::Include => '+',
            FilterMode::Exclude => '-',
        };
        write!(f, "{}{}:{}", sign, self.kind, self.text)
    }
}

/// Ordered filters, unique by (kind, text). Adding a duplicate is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style add
    pub fn with(mut self, filter: Filter) -> Self {
        self.add(filter);
        self
    }

    fn position(&self, kind: FilterKind, text: &str) -> Option<usize> {
        self.filters
            .iter()
            .position(|f| f.kind == kind && f.text == text)
    }

    /// Add a filter; returns false when (kind, text) is already present
    pub fn add(&mut self, filter: Filter) -> bool {
        if self.position(filter.kind, &filter.text).is_some() {
            return false;
        }
        self.filters.push(filter);
        true
    }

    pub fn remove(&mut self, kind: FilterKind, text: &str) -> Option<Filter> {
        self.position(kind, text).map(|i| self.filters.remove(i))
    }

    /// Flip include/exclude in place; returns the new mode
    pub fn toggle(&mut self, kind: FilterKind, text: &str) -> Option<FilterMode> {
        let i = self.position(kind, text)?;
        let filter = &mut self.filters[i];
        filter.mode = filter.mode.flipped();
        Some(filter.mode)
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn of(&self, kind: FilterKind, mode: FilterMode) -> impl Iterator<Item = &Filter> {
        self.filters
            .iter()
            .filter(move |f| f.kind == kind && f.mode == mode)
    }

    /// Visibility of one transaction of `merchant` under this set
    pub fn is_visible(&self, merchant: &Merchant, txn: &Transaction) -> bool {
        let excluded = self
            .filters
            .iter()
            .filter(|f| f.mode == FilterMode::Exclude)
            .any(|f| f.matches(merchant, txn));
        if excluded {
            return false;
        }

        FilterKind::all().iter().all(|kind| {
            let mut includes = self.of(*kind, FilterMode::Include).peekable();
            includes.peek().is_none() || includes.any(|f| f.matches(merchant, txn))
        })
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        let mut set = Self::new();
        for filter in iter {
            set.add(filter);
        }
        set
    }
}
