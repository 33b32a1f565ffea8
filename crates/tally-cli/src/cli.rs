//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tally_core::{Bucket, Verbosity};

/// Tally - Explainable spending breakdowns
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Explainable spending breakdowns from bank transactions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where rules come from
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    /// User rules CSV (Pattern,Merchant,Category,Subcategory)
    ///
    /// User rules are always tried before the shipped baseline rules.
    /// Patterns may end in modifiers such as [amount>200] or [month=12].
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Skip the shipped baseline rules
    #[arg(long)]
    pub no_baseline: bool,
}

/// Run-scoped analysis settings
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Analysis config (TOML)
    ///
    /// Defaults to ~/.config/tally/analysis.toml when present, then the
    /// built-in defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Month range to analyse (e.g., 2025-01..2025-06), overriding the config
    #[arg(short, long)]
    pub period: Option<String>,
}

/// Inputs shared by every command that builds a spending model
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Normalized transactions CSV with columns date,amount,description[,location]
    #[arg(short, long)]
    pub transactions: PathBuf,

    #[command(flatten)]
    pub rules: RuleArgs,

    #[command(flatten)]
    pub settings: ConfigArgs,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(format!(
                "Unknown format: {}. Available: text, json, markdown",
                s
            )),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the spending breakdown
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Output format: text, json, markdown
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Explain why merchants landed in their bucket
    Explain {
        /// Merchant name (or part of it); omit to explain every merchant
        merchant: Option<String>,

        /// Explain how a raw transaction description resolves instead
        #[arg(long, conflicts_with = "merchant")]
        description: Option<String>,

        /// Amount to test --description with (for amount modifiers)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        amount: f64,

        /// Date to test --description with, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Only explain merchants in this bucket (monthly, variable, annual, ...)
        #[arg(short, long)]
        bucket: Option<Bucket>,

        /// Detail level: bucket, trace, full (or 0, 1, 2)
        #[arg(short, long, default_value = "bucket")]
        level: Verbosity,

        /// Normalized transactions CSV (required unless --description is used)
        #[arg(short, long)]
        transactions: Option<PathBuf>,

        #[command(flatten)]
        rules: RuleArgs,

        #[command(flatten)]
        settings: ConfigArgs,

        /// Output format: text, json, markdown
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List unmatched descriptions with suggested rules
    Discover {
        #[command(flatten)]
        input: InputArgs,

        /// Maximum number of descriptions to show
        #[arg(long)]
        limit: Option<usize>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Slice the breakdown by merchant, category, location or month
    Filter {
        #[command(flatten)]
        input: InputArgs,

        /// Include filter as kind:text (e.g., category:Food, month:2025-01..2025-03)
        #[arg(short, long)]
        include: Vec<String>,

        /// Exclude filter as kind:text (e.g., merchant:Netflix, location:WA)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Encoded filter state to start from (e.g., "c:Food&-m:Netflix")
        #[arg(short, long)]
        state: Option<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}
