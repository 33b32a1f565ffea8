//! Shared loading for all commands
//!
//! This module contains:
//! - `load_transactions` - Read a normalized transactions CSV
//! - `load_rules` - Merge user rules with the shipped baseline
//! - `load_config` - Resolve the analysis config and apply `--period`
//! - `load_model` - All of the above, run through the analyzer

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    parse_rules_csv, AnalysisConfig, Analyzer, MonthRange, NewTransaction, RuleOrigin, RuleSet,
    SpendingModel,
};
use tracing::debug;

use crate::cli::{ConfigArgs, InputArgs, RuleArgs};

/// Read transactions from a CSV with a `date,amount,description[,location]` header
pub fn load_transactions(path: &Path) -> Result<Vec<NewTransaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open transactions file {}", path.display()))?;

    let mut transactions = Vec::new();
    for (i, row) in reader.deserialize::<NewTransaction>().enumerate() {
        // Line 1 is the header
        let txn = row.with_context(|| format!("Invalid transaction on line {}", i + 2))?;
        transactions.push(txn);
    }

    debug!(
        "Loaded {} transactions from {}",
        transactions.len(),
        path.display()
    );
    Ok(transactions)
}

pub fn load_rules(args: &RuleArgs) -> Result<RuleSet> {
    let user = match &args.rules {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rules file {}", path.display()))?;
            parse_rules_csv(&content, RuleOrigin::User)
                .with_context(|| format!("Invalid rules file {}", path.display()))?
        }
        None => Vec::new(),
    };

    let rules = if args.no_baseline {
        RuleSet::new(user)?
    } else {
        RuleSet::with_baseline(user)?
    };
    debug!("Loaded {} rules", rules.len());
    Ok(rules)
}

pub fn load_config(args: &ConfigArgs) -> Result<AnalysisConfig> {
    let config =
        AnalysisConfig::load(args.config.as_deref()).context("Failed to load analysis config")?;

    match &args.period {
        Some(period) => {
            let range: MonthRange = period
                .parse()
                .with_context(|| format!("Invalid --period '{}'", period))?;
            Ok(config.with_period(range))
        }
        None => Ok(config),
    }
}

/// Everything a model-based command works from
pub struct Loaded {
    pub rules: RuleSet,
    pub transactions: Vec<NewTransaction>,
    pub model: SpendingModel,
}

pub fn load_model(transactions: &Path, rules: &RuleArgs, settings: &ConfigArgs) -> Result<Loaded> {
    let rules = load_rules(rules)?;
    let config = load_config(settings)?;
    let transactions = load_transactions(transactions)?;

    let model = Analyzer::new(&rules, config)
        .run(&transactions)
        .context("Failed to build spending model")?;

    Ok(Loaded {
        rules,
        transactions,
        model,
    })
}

pub fn load_input(input: &InputArgs) -> Result<Loaded> {
    load_model(&input.transactions, &input.rules, &input.settings)
}

/// Human-readable span of a model, e.g. `2025-01..2025-03 (3 months)`
pub fn period_label(model: &SpendingModel) -> String {
    match (model.months.first(), model.months.last()) {
        (Some(first), Some(last)) if first == last => format!("{} (1 month)", first),
        (Some(first), Some(last)) => {
            format!("{}..{} ({} months)", first, last, model.months.len())
        }
        _ => "no transactions".to_string(),
    }
}
