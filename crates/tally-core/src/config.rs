//! Run-scoped analysis configuration
//!
//! One config type feeds both the classifier and the filter engine, so the two
//! always agree on thresholds and category sets.
//!
//! ## Configuration Resolution
//!
//! 1. An explicit path (`tally --config FILE`)
//! 2. An override in the config dir (`~/.config/tally/analysis.toml` on Linux)
//! 3. Embedded defaults (compiled into the binary)
//!
//! Every key is optional; missing keys take the embedded defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{eq_ignore_case, MonthRange};

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/analysis.toml");

/// Numeric thresholds for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum share of months with spend for a merchant to count as recurring
    pub recurrence: f64,
    /// Maximum coefficient of variation for a recurring merchant to be `monthly`
    pub variability: f64,
    /// Allowed drift (days) from 365 between yearly charges
    pub annual_tolerance_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            recurrence: 0.5,
            variability: 0.3,
            annual_tolerance_days: 45,
        }
    }
}

/// Category names that steer classification. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySets {
    /// Not spending at all (transfers, cash withdrawals, income)
    pub excluded: Vec<String>,
    pub travel: Vec<String>,
    /// Categories or subcategories that are known once-a-year expenses
    pub annual: Vec<String>,
}

impl Default for CategorySets {
    fn default() -> Self {
        Self {
            excluded: vec!["Transfers".into(), "Cash".into(), "Income".into()],
            travel: vec!["Travel".into()],
            annual: Vec::new(),
        }
    }
}

fn contains_ci(set: &[String], value: &str) -> bool {
    !value.is_empty() && set.iter().any(|s| eq_ignore_case(s, value))
}

impl CategorySets {
    pub fn is_excluded(&self, category: &str) -> bool {
        contains_ci(&self.excluded, category)
    }

    pub fn is_travel(&self, category: &str) -> bool {
        contains_ci(&self.travel, category)
    }

    /// True when either the category or the subcategory is tagged annual
    pub fn is_annual(&self, category: &str, subcategory: &str) -> bool {
        contains_ci(&self.annual, category) || contains_ci(&self.annual, subcategory)
    }
}

/// Thresholds, category sets and optional analysis period for one run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub thresholds: Thresholds,
    pub categories: CategorySets,
    /// Restrict the analysis to these months; defaults to the span of the data
    pub period: Option<MonthRange>,
}

impl AnalysisConfig {
    /// Parse and validate TOML config text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The defaults compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolve config: explicit path, then user override, then embedded defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Using config {}", path.display());
            return Self::load_file(path);
        }

        if let Some(path) = default_config_path().filter(|p| p.exists()) {
            info!("Using config override {}", path.display());
            return Self::load_file(&path);
        }

        debug!("Using embedded analysis config");
        Self::embedded()
    }

    pub fn with_period(mut self, period: MonthRange) -> Self {
        self.period = Some(period);
        self
    }

    /// Reject thresholds and periods that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(t.recurrence > 0.0 && t.recurrence <= 1.0) {
            return Err(Error::InvalidThreshold {
                name: "recurrence",
                value: t.recurrence,
            });
        }
        if !(t.variability >= 0.0 && t.variability.is_finite()) {
            return Err(Error::InvalidThreshold {
                name: "variability",
                value: t.variability,
            });
        }
        if t.annual_tolerance_days < 0 {
            return Err(Error::InvalidThreshold {
                name: "annual_tolerance_days",
                value: t.annual_tolerance_days as f64,
            });
        }
        if let Some(period) = &self.period {
            period.validate()?;
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("analysis.toml"))
}
