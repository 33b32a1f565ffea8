//! Tally CLI - Explainable spending breakdowns
//!
//! Usage:
//!   tally run -t transactions.csv                 Build the spending breakdown
//!   tally explain -t transactions.csv Netflix     Explain a merchant's bucket
//!   tally explain --description "UBER EATS 123"   Explain how a description resolves
//!   tally discover -t transactions.csv            Suggest rules for unmatched merchants
//!   tally filter -t transactions.csv -i c:Food    Re-slice the breakdown

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Run { input, format } => commands::cmd_run(&input, format),
        Commands::Explain {
            merchant,
            description,
            amount,
            date,
            bucket,
            level,
            transactions,
            rules,
            settings,
            format,
        } => match description {
            Some(description) => commands::cmd_explain_description(
                &rules,
                &description,
                amount,
                date.as_deref(),
                level,
                format,
            ),
            None => commands::cmd_explain(
                transactions.as_deref(),
                &rules,
                &settings,
                merchant.as_deref(),
                bucket,
                level,
                format,
            ),
        },
        Commands::Discover {
            input,
            limit,
            format,
        } => commands::cmd_discover(&input, limit, format),
        Commands::Filter {
            input,
            include,
            exclude,
            state,
            format,
        } => commands::cmd_filter(&input, &include, &exclude, state.as_deref(), format),
    }
}
