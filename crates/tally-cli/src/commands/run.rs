//! Spending breakdown report

use std::fmt::{self, Write as _};

use anyhow::{Context, Result};
use tally_core::{monthly_value, Merchant, Section, SpendingModel};

use super::{load_input, money, period_label, truncate};
use crate::cli::{InputArgs, OutputFormat};

pub fn cmd_run(input: &InputArgs, format: OutputFormat) -> Result<()> {
    let loaded = load_input(input)?;
    let model = &loaded.model;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "summary": model.summary(),
                "model": model,
            });
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Markdown => print!("{}", render_markdown(model)?),
        OutputFormat::Text => print_text(model, loaded.transactions.len(), loaded.rules.len()),
    }

    Ok(())
}

/// Merchants of a section, largest total first
fn ranked(section: &Section) -> Vec<&Merchant> {
    let mut merchants: Vec<&Merchant> = section.merchants.values().collect();
    merchants.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.id.cmp(&b.id)));
    merchants
}

fn print_text(model: &SpendingModel, transaction_count: usize, rule_count: usize) {
    let summary = model.summary();
    let months = model.months_in_range();

    println!();
    println!("📊 Spending Breakdown");
    println!("   Period: {}", period_label(model));
    println!(
        "   Transactions: {} ({} rules)",
        transaction_count, rule_count
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if summary.sections.iter().all(|s| s.merchant_count == 0) {
        println!("   No spending found in this period.");
    } else {
        println!(
            "   Total: {}   Monthly: {}/mo",
            money(summary.total),
            money(summary.monthly)
        );
        if summary.credits > 0.0 {
            println!("   Credits applied: {} (netted into totals)", money(summary.credits));
        }
    }

    for section in model.sections.values().filter(|s| s.bucket.is_spending()) {
        if section.is_empty() {
            continue;
        }
        let section_monthly: f64 = section
            .merchants
            .values()
            .map(|m| monthly_value(section.bucket, m, months))
            .sum();

        println!();
        println!(
            "   {}: {} ({}/mo)",
            section.bucket.label(),
            money(section.total()),
            money(section_monthly)
        );
        println!(
            "   {:28} │ {:>10} │ {:>10} │ {:>5}",
            "Merchant", "Total", "Per Month", "Count"
        );
        println!("   ─────────────────────────────┼────────────┼────────────┼──────");
        for merchant in ranked(section) {
            println!(
                "   {:28} │ {:>10.2} │ {:>10.2} │ {:>5}",
                truncate(&merchant.name, 28),
                merchant.total,
                monthly_value(section.bucket, merchant, months),
                merchant.count
            );
        }
    }

    if summary.excluded_count > 0 {
        println!();
        println!(
            "   🚫 Excluded from spending: {} across {} transactions",
            money(summary.excluded_total),
            summary.excluded_count
        );
    }
    if model.out_of_period > 0 {
        println!(
            "   📅 {} transactions outside the period were skipped",
            model.out_of_period
        );
    }
    if summary.unmatched_count > 0 {
        println!();
        println!(
            "⚠️  {} unmatched transactions ({}). Run 'tally discover' to suggest rules.",
            summary.unmatched_count,
            money(summary.unmatched_total)
        );
    }
}

/// Markdown report: one table per non-empty spending section
pub fn render_markdown(model: &SpendingModel) -> Result<String, fmt::Error> {
    let summary = model.summary();
    let months = model.months_in_range();
    let mut out = String::new();

    writeln!(out, "# Spending Breakdown")?;
    writeln!(out)?;
    writeln!(out, "- **Period:** {}", period_label(model))?;
    writeln!(out, "- **Total:** {}", money(summary.total))?;
    writeln!(out, "- **Monthly:** {}", money(summary.monthly))?;
    if summary.credits > 0.0 {
        writeln!(out, "- **Credits applied:** {}", money(summary.credits))?;
    }
    if summary.excluded_count > 0 {
        writeln!(
            out,
            "- **Excluded:** {} ({} transactions)",
            money(summary.excluded_total),
            summary.excluded_count
        )?;
    }
    if summary.unmatched_count > 0 {
        writeln!(
            out,
            "- **Unmatched:** {} transactions",
            summary.unmatched_count
        )?;
    }

    for section in model.sections.values().filter(|s| s.bucket.is_spending()) {
        if section.is_empty() {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "## {} ({})", section.bucket.label(), money(section.total()))?;
        writeln!(out)?;
        writeln!(out, "| Merchant | Category | Total | Per Month | Count |")?;
        writeln!(out, "|---|---|---:|---:|---:|")?;
        for merchant in ranked(section) {
            writeln!(
                out,
                "| {} | {} | {:.2} | {:.2} | {} |",
                merchant.name.replace('|', "\\|"),
                merchant.category_path,
                merchant.total,
                monthly_value(section.bucket, merchant, months),
                merchant.count
            )?;
        }
    }

    Ok(out)
}
