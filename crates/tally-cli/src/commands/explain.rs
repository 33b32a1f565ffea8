//! Explain command implementations

use std::fmt::{self, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tally_core::{
    explain_all, explain_description, explain_merchant, Bucket, DescriptionExplanation,
    MerchantExplanation, NewTransaction, RuleSummary, TraceStep, Verbosity,
};

use super::{load_model, load_rules, money};
use crate::cli::{ConfigArgs, OutputFormat, RuleArgs};

pub fn cmd_explain(
    transactions: Option<&Path>,
    rules: &RuleArgs,
    settings: &ConfigArgs,
    merchant: Option<&str>,
    bucket: Option<Bucket>,
    level: Verbosity,
    format: OutputFormat,
) -> Result<()> {
    let path = transactions.context("--transactions is required to explain merchants")?;
    let loaded = load_model(path, rules, settings)?;

    let explanations = match merchant {
        Some(query) => match explain_merchant(&loaded.model, query, level)? {
            Some(exp) => vec![exp],
            None => anyhow::bail!("No merchant matching '{}'", query),
        },
        None => explain_all(&loaded.model, bucket, level)?,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&explanations)
                .context("Failed to serialize explanations")?;
            println!("{}", json);
        }
        OutputFormat::Markdown => {
            for exp in &explanations {
                print!("{}", render_explanation_markdown(exp)?);
            }
        }
        OutputFormat::Text => {
            if explanations.is_empty() {
                println!("No merchants to explain.");
            }
            for exp in &explanations {
                print!("{}", render_explanation(exp)?);
            }
        }
    }

    Ok(())
}

pub fn cmd_explain_description(
    rules: &RuleArgs,
    description: &str,
    amount: f64,
    date: Option<&str>,
    level: Verbosity,
    format: OutputFormat,
) -> Result<()> {
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .context("Invalid --date format (use YYYY-MM-DD)")?,
        None => Utc::now().date_naive(),
    };
    let rules = load_rules(rules)?;
    let txn = NewTransaction::new(date, amount, description);
    let exp = explain_description(&rules, &txn, level);

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&exp).context("Failed to serialize explanation")?;
            println!("{}", json);
        }
        OutputFormat::Text | OutputFormat::Markdown => print!("{}", render_description(&exp)?),
    }

    Ok(())
}

/// One trace step as `✓ question (name=value, ...)`
pub fn trace_line(step: &TraceStep) -> String {
    let mark = if step.outcome { "✓ yes" } else { "✗ no " };
    let operands: Vec<String> = step
        .operands
        .iter()
        .map(|op| format!("{}={}", op.name, op.value))
        .collect();
    format!("{}  {} ({})", mark, step.check.question(), operands.join(", "))
}

pub fn render_explanation(exp: &MerchantExplanation) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out)?;
    writeln!(out, "🔍 {} → {} ({})", exp.merchant, exp.bucket.label(), exp.bucket)?;
    writeln!(out, "   Category: {}", exp.category_path)?;
    writeln!(
        out,
        "   Total: {} over {} transactions, active {} of {} months",
        money(exp.total),
        exp.count,
        exp.months_active,
        exp.months_in_range
    )?;
    writeln!(out, "   Per month: {}", money(exp.monthly_value))?;

    if let Some(trace) = &exp.trace {
        writeln!(out, "   Decision trace:")?;
        for (i, step) in trace.iter().enumerate() {
            writeln!(out, "     {}. {}", i + 1, trace_line(step))?;
        }
    }

    if let Some(details) = &exp.details {
        writeln!(
            out,
            "   Rule: {} ({} rule #{})",
            details.pattern, details.origin, details.rule_index
        )?;
        writeln!(
            out,
            "   Stats: cv={:.2}, recurrence={:.2}, max payment {}, years active {}",
            details.stats.cv,
            details.stats.recurrence_ratio,
            money(details.stats.max_payment),
            details.stats.years_active
        )?;
        writeln!(
            out,
            "   Thresholds: recurrence {:.2}, variability {:.2}, annual tolerance ±{} days",
            details.thresholds.recurrence,
            details.thresholds.variability,
            details.thresholds.annual_tolerance_days
        )?;
        let months: Vec<String> = details
            .monthly_totals
            .iter()
            .map(|(month, total)| format!("{} {}", month, money(*total)))
            .collect();
        writeln!(out, "   Monthly totals: {}", months.join(", "))?;
    }

    Ok(out)
}

pub fn render_explanation_markdown(exp: &MerchantExplanation) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out, "## {}", exp.merchant)?;
    writeln!(out)?;
    writeln!(out, "- **Bucket:** {}", exp.bucket.label())?;
    writeln!(out, "- **Category:** {}", exp.category_path)?;
    writeln!(out, "- **Total:** {} ({} transactions)", money(exp.total), exp.count)?;
    writeln!(
        out,
        "- **Active:** {} of {} months",
        exp.months_active, exp.months_in_range
    )?;
    writeln!(out, "- **Per month:** {}", money(exp.monthly_value))?;

    if let Some(trace) = &exp.trace {
        writeln!(out)?;
        writeln!(out, "| Check | Result | Inputs |")?;
        writeln!(out, "|---|---|---|")?;
        for step in trace {
            let inputs: Vec<String> = step
                .operands
                .iter()
                .map(|op| format!("`{}={}`", op.name, op.value))
                .collect();
            writeln!(
                out,
                "| {} | {} | {} |",
                step.check.question(),
                if step.outcome { "yes" } else { "no" },
                inputs.join(" ")
            )?;
        }
    }

    if let Some(details) = &exp.details {
        writeln!(out)?;
        writeln!(
            out,
            "Matched by `{}` ({} rule #{}).",
            details.pattern, details.origin, details.rule_index
        )?;
    }
    writeln!(out)?;

    Ok(out)
}

fn rule_line(rule: &RuleSummary) -> String {
    format!(
        "{} → {} [{}.{}] ({} rule #{})",
        rule.pattern, rule.merchant, rule.category, rule.subcategory, rule.origin, rule.rule_index
    )
}

pub fn render_description(exp: &DescriptionExplanation) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out, "🔍 \"{}\"", exp.description)?;
    match &exp.matched {
        Some(rule) => writeln!(out, "   ✅ Matched: {}", rule_line(rule))?,
        None => writeln!(out, "   ❓ No rule matches")?,
    }

    for rule in &exp.shadowed {
        writeln!(out, "   ↳ Shadowed: {}", rule_line(rule))?;
    }

    if let (Some(pattern), Some(merchant)) = (&exp.suggested_pattern, &exp.suggested_merchant) {
        writeln!(out, "   💡 Suggested rule: {},{},,", pattern, merchant)?;
    }

    Ok(out)
}
