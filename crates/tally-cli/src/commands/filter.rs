//! Filter command implementation

use anyhow::{Context, Result};
use tally_core::filter::{decode, encode};
use tally_core::{compute_filtered_state, Filter, FilterKind, FilterMode, FilterSet, FilteredState};

use super::{load_input, money, truncate};
use crate::cli::{InputArgs, OutputFormat};

/// Parse a `kind:text` argument (kind as name or code, e.g. `category:Food` or `c:Food`)
pub fn parse_filter_arg(arg: &str, mode: FilterMode) -> Result<Filter> {
    let (kind, text) = arg
        .split_once(':')
        .with_context(|| format!("Invalid filter '{}' (use kind:text, e.g. category:Food)", arg))?;
    let kind: FilterKind = kind.trim().parse().map_err(anyhow::Error::msg)?;
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Filter '{}' has no text", arg);
    }

    Ok(Filter {
        text: text.to_string(),
        kind,
        mode,
    })
}

/// Start from an encoded state (if any), then add `--include`/`--exclude` filters
pub fn build_filters(state: Option<&str>, include: &[String], exclude: &[String]) -> Result<FilterSet> {
    let mut filters = state.map(decode).unwrap_or_default();
    for arg in include {
        filters.add(parse_filter_arg(arg, FilterMode::Include)?);
    }
    for arg in exclude {
        filters.add(parse_filter_arg(arg, FilterMode::Exclude)?);
    }
    Ok(filters)
}

pub fn cmd_filter(
    input: &InputArgs,
    include: &[String],
    exclude: &[String],
    state: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let filters = build_filters(state, include, exclude)?;
    let loaded = load_input(input)?;
    let view = compute_filtered_state(&loaded.model, &filters);
    let encoded = encode(&filters);

    if format == OutputFormat::Json {
        let report = serde_json::json!({
            "state": encoded,
            "filters": filters,
            "view": view,
        });
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize view")?;
        println!("{}", json);
        return Ok(());
    }

    print_view(&filters, &encoded, &view);
    Ok(())
}

fn print_view(filters: &FilterSet, encoded: &str, view: &FilteredState) {
    println!();
    println!("🔎 Filtered Breakdown");
    if filters.is_empty() {
        println!("   Filters: none");
    } else {
        let labels: Vec<String> = filters.iter().map(ToString::to_string).collect();
        println!("   Filters: {}", labels.join("  "));
        println!("   🔗 State: {}", encoded);
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Total: {} over {} months",
        money(view.grand_total),
        view.active_months
    );
    if view.credits > 0.0 {
        println!(
            "   Credits: {}   Net: {}",
            money(view.credits),
            money(view.net())
        );
    }

    for section in view.sections.values() {
        if section.merchants.is_empty() || !section.bucket.is_spending() {
            continue;
        }
        println!();
        println!("   {}: {}", section.bucket.label(), money(section.total));
        for merchant in section.merchants.values() {
            println!(
                "     {:28} {:>10.2}  {:>9.2}/mo  {:>3} txns",
                truncate(&merchant.name, 28),
                merchant.total,
                merchant.monthly_rate,
                merchant.transaction_count
            );
        }
    }

    if !view.by_category.is_empty() {
        let mut categories: Vec<(&String, &f64)> = view.by_category.iter().collect();
        categories.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));

        println!();
        println!("   By category:");
        for (category, total) in categories {
            println!("     {:28} {:>10.2}", truncate(category, 28), total);
        }
    }

    if !view.by_month.is_empty() {
        println!();
        println!("   By month:");
        for (month, total) in &view.by_month {
            println!("     {:28} {:>10.2}", month, total);
        }
    }
}
