//! Discover command implementation

use anyhow::{Context, Result};
use tally_core::discover_unknown;

use super::{load_input, money, truncate};
use crate::cli::{InputArgs, OutputFormat};

pub fn cmd_discover(input: &InputArgs, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let loaded = load_input(input)?;
    let unknown = discover_unknown(&loaded.model.unmatched, limit);

    if format == OutputFormat::Json {
        let json =
            serde_json::to_string_pretty(&unknown).context("Failed to serialize discoveries")?;
        println!("{}", json);
        return Ok(());
    }

    if unknown.is_empty() {
        println!("✅ Every transaction matched a rule.");
        return Ok(());
    }

    println!();
    println!(
        "🔎 {} unmatched descriptions ({} transactions)",
        unknown.len(),
        unknown.iter().map(|u| u.count).sum::<usize>()
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:40} │ {:>5} │ {:>10}", "Description", "Count", "Total");
    println!("   ─────────────────────────────────────────┼───────┼───────────");

    let mut lines = Vec::with_capacity(unknown.len());
    for found in &unknown {
        println!(
            "   {:40} │ {:>5} │ {:>10}",
            truncate(&found.description, 40),
            found.count,
            money(found.total)
        );
        lines.push(found.to_rule_line()?);
    }

    println!();
    println!("💡 Suggested rules (fill in Category,Subcategory and add to your rules file):");
    for line in lines {
        println!("   {}", line);
    }

    Ok(())
}
