//! Strategy specifications.
//!
//! A strategy is described by its fee terms, its target share of the vault's
//! deployable capital and the annualized return distribution it is assumed
//! to follow.

use crate::constants::{DEFAULT_MAX_DEBT_PER_HARVEST, MAXIMUM_STRATEGIES};
use crate::error::{Result, SimulationError};
use crate::value_objects::Percentage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A yield strategy the vault allocates capital to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    /// Unique name within a run.
    pub name: String,
    /// Strategist performance fee in bps.
    pub perf_fee_bps: u32,
    /// Target allocation weight in bps.
    pub debt_ratio_bps: u32,
    /// Expected annual return (0.06 = 6%).
    pub mean_annual_return: f64,
    /// Annual return standard deviation.
    pub std_annual_return: f64,
    /// Lower bound on debt taken per harvest.
    #[serde(default)]
    pub min_debt_per_harvest: u64,
    /// Upper bound on debt taken per harvest.
    #[serde(default = "default_max_debt_per_harvest")]
    pub max_debt_per_harvest: u64,
}

fn default_max_debt_per_harvest() -> u64 {
    DEFAULT_MAX_DEBT_PER_HARVEST
}

impl StrategySpec {
    /// Creates a strategy with default per-harvest debt bounds.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        perf_fee_bps: u32,
        debt_ratio_bps: u32,
        mean_annual_return: f64,
        std_annual_return: f64,
    ) -> Self {
        Self {
            name: name.into(),
            perf_fee_bps,
            debt_ratio_bps,
            mean_annual_return,
            std_annual_return,
            min_debt_per_harvest: 0,
            max_debt_per_harvest: DEFAULT_MAX_DEBT_PER_HARVEST,
        }
    }

    /// Allocation weight as a fraction.
    #[must_use]
    pub fn debt_ratio(&self) -> Percentage {
        Percentage::from_bps(self.debt_ratio_bps)
    }

    /// Strategist performance fee as a fraction.
    #[must_use]
    pub fn perf_fee(&self) -> Percentage {
        Percentage::from_bps(self.perf_fee_bps)
    }

    /// Expected share of vault APY contributed by this strategy
    /// (weight times mean return).
    #[must_use]
    pub fn apy_contribution(&self) -> f64 {
        self.debt_ratio().as_fraction() * self.mean_annual_return
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SimulationError::invalid_config("strategy name is empty"));
        }
        if !self.mean_annual_return.is_finite() {
            return Err(SimulationError::invalid_config(format!(
                "strategy {}: mean annual return is not finite",
                self.name
            )));
        }
        if !self.std_annual_return.is_finite() || self.std_annual_return < 0.0 {
            return Err(SimulationError::invalid_config(format!(
                "strategy {}: annual return std must be finite and non-negative",
                self.name
            )));
        }
        if self.min_debt_per_harvest > self.max_debt_per_harvest {
            return Err(SimulationError::invalid_config(format!(
                "strategy {}: min debt per harvest exceeds max",
                self.name
            )));
        }
        Ok(())
    }
}

/// Checks a strategy list before a run: non-empty, within the vault's
/// strategy limit, unique names and sane return parameters.
pub fn validate_strategies(strategies: &[StrategySpec]) -> Result<()> {
    if strategies.is_empty() {
        return Err(SimulationError::invalid_config(
            "at least one strategy is required",
        ));
    }
    if strategies.len() > MAXIMUM_STRATEGIES {
        return Err(SimulationError::invalid_config(format!(
            "{} strategies given, the vault holds at most {}",
            strategies.len(),
            MAXIMUM_STRATEGIES
        )));
    }

    let mut names = HashSet::with_capacity(strategies.len());
    for strategy in strategies {
        strategy.validate()?;
        if !names.insert(strategy.name.as_str()) {
            return Err(SimulationError::invalid_config(format!(
                "duplicate strategy name: {}",
                strategy.name
            )));
        }
    }
    Ok(())
}

/// Sum of the debt ratios in bps.
#[must_use]
pub fn total_debt_ratio_bps(strategies: &[StrategySpec]) -> u64 {
    strategies.iter().map(|s| u64::from(s.debt_ratio_bps)).sum()
}
