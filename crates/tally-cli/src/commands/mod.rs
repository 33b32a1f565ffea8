//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared loading of transactions, rules and config into a model
//! - `run` - Spending breakdown report (text, JSON, markdown)
//! - `explain` - Merchant and description explanations
//! - `discover` - Unmatched descriptions with suggested rules
//! - `filter` - Filtered views and filter state encoding

pub mod core;
pub mod discover;
pub mod explain;
pub mod filter;
pub mod run;

// Re-export command functions for main.rs
pub use core::*;
pub use discover::*;
pub use explain::*;
pub use filter::*;
pub use run::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount as dollars
pub fn money(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${:.2}", amount)
    }
}
