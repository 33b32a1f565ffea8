//! Filter state as a compact, URL-safe string
//!
//! ```text
//! c:Food&-m:Netflix&d:2025-01..2025-03
//! ```
//!
//! Each token is `[+|-]<kind code>:<url-encoded text>`. Include filters are
//! written without a sign; decoding accepts an explicit `+`. Malformed tokens
//! are logged and dropped, and duplicates keep their first occurrence.

use thiserror::Error;
use tracing::warn;

use super::{Filter, FilterKind, FilterMode, FilterSet};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("missing ':' in filter token '{0}'")]
    MissingSeparator(String),

    #[error("unknown filter kind '{kind}' in token '{token}'")]
    UnknownKind { kind: String, token: String },

    #[error("empty filter text in token '{0}'")]
    EmptyText(String),

    #[error("invalid percent-encoding in token '{0}'")]
    InvalidEncoding(String),
}

/// Encode a filter set, preserving order
pub fn encode(filters: &FilterSet) -> String {
    filters
        .iter()
        .map(|f| {
            let sign = match f.mode {
                FilterMode::Include => "",
                FilterMode::Exclude => "-",
            };
            format!("{}{}:{}", sign, f.kind.code(), urlencoding::encode(&f.text))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a single token
pub fn parse_token(token: &str) -> Result<Filter, FilterParseError> {
    let (mode, body) = match token.strip_prefix('-') {
        Some(rest) => (FilterMode::Exclude, rest),
        None => (FilterMode::Include, token.strip_prefix('+').unwrap_or(token)),
    };

    let (code, text) = body
        .split_once(':')
        .ok_or_else(|| FilterParseError::MissingSeparator(token.to_string()))?;

    let kind = FilterKind::from_code(code).ok_or_else(|| FilterParseError::UnknownKind {
        kind: code.to_string(),
        token: token.to_string(),
    })?;

    let text = urlencoding::decode(text)
        .map_err(|_| FilterParseError::InvalidEncoding(token.to_string()))?;
    if text.trim().is_empty() {
        return Err(FilterParseError::EmptyText(token.to_string()));
    }

    Ok(Filter {
        text: text.into_owned(),
        kind,
        mode,
    })
}

/// Decode a filter string, skipping malformed tokens
pub fn decode(encoded: &str) -> FilterSet {
    let mut set = FilterSet::new();
    for token in encoded.split('&').filter(|t| !t.is_empty()) {
        match parse_token(token) {
            Ok(filter) => {
                set.add(filter);
            }
            Err(e) => warn!("Dropping filter token: {}", e),
        }
    }
    set
}
