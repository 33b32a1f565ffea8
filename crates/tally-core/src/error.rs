//! Error types for Tally
//!
//! Every variant except the I/O-flavoured ones is a configuration error: it is
//! raised while building a rule set or validating a config, before any
//! transaction is processed. "No match", "empty" and "excluded" are ordinary
//! values elsewhere in the crate and never show up here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid pattern in rule '{rule}': {message}")]
    InvalidPattern { rule: String, message: String },

    #[error("Invalid modifier in rule '{rule}': {message}")]
    InvalidModifier { rule: String, message: String },

    #[error("Invalid rule on line {line}: {message}")]
    InvalidRuleLine { line: usize, message: String },

    #[error("Invalid month range: {0}")]
    InvalidMonthRange(String),

    #[error("Invalid threshold '{name}': {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// True for errors caused by rules or run configuration rather than I/O
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. }
                | Self::InvalidModifier { .. }
                | Self::InvalidRuleLine { .. }
                | Self::InvalidMonthRange(_)
                | Self::InvalidThreshold { .. }
                | Self::Toml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
