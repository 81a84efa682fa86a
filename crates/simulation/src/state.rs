//! Simulation state management.
//!
//! This module provides the configuration of a periodic run, the vault state
//! recorded at every period and the timeline and summary produced once a run
//! completes.

use serde::Serialize;
use vault_sim_domain::constants::{MANAGEMENT_FEE_BPS, PERFORMANCE_FEE_BPS, SECS_PER_YEAR};
use vault_sim_domain::error::{Result, SimulationError};
use vault_sim_domain::fees::FeeBreakdown;
use vault_sim_domain::metric::Metric;

/// Longest horizon a periodic run accepts, in periods.
pub const MAX_TOTAL_PERIODS: u64 = 1_000_000;

/// Configuration for a periodic compounding run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodicConfig {
    /// Vault assets at period 0.
    pub initial_vault_assets: f64,
    /// Share of assets held idle in the vault (0..=1).
    pub initial_idle_ratio: f64,
    /// Simulated horizon in years.
    pub years: u32,
    /// Number of periods per year.
    pub periods_per_year: u32,
    /// Vault performance fee in bps.
    pub vault_performance_fee_bps: u32,
    /// Vault management fee in bps per year.
    pub vault_management_fee_bps: u32,
    /// Seed of the simulator's random generator.
    pub seed: u64,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            initial_vault_assets: 10_000_000.0,
            initial_idle_ratio: 0.30,
            years: 20,
            periods_per_year: 12,
            vault_performance_fee_bps: PERFORMANCE_FEE_BPS,
            vault_management_fee_bps: MANAGEMENT_FEE_BPS,
            seed: 42,
        }
    }
}

impl PeriodicConfig {
    /// Sets the initial vault assets.
    #[must_use]
    pub fn with_initial_assets(mut self, assets: f64) -> Self {
        self.initial_vault_assets = assets;
        self
    }

    /// Sets the idle ratio.
    #[must_use]
    pub fn with_idle_ratio(mut self, ratio: f64) -> Self {
        self.initial_idle_ratio = ratio;
        self
    }

    /// Sets the horizon.
    #[must_use]
    pub fn with_horizon(mut self, years: u32, periods_per_year: u32) -> Self {
        self.years = years;
        self.periods_per_year = periods_per_year;
        self
    }

    /// Sets the vault performance and management fees.
    #[must_use]
    pub fn with_vault_fees(mut self, performance_fee_bps: u32, management_fee_bps: u32) -> Self {
        self.vault_performance_fee_bps = performance_fee_bps;
        self.vault_management_fee_bps = management_fee_bps;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Total number of simulated periods.
    #[must_use]
    pub fn total_periods(&self) -> u64 {
        u64::from(self.years) * u64::from(self.periods_per_year)
    }

    /// Length of one period as a fraction of a year.
    #[must_use]
    pub fn period_year_fraction(&self) -> f64 {
        1.0 / f64::from(self.periods_per_year)
    }

    /// Length of one period in whole seconds.
    #[must_use]
    pub fn period_seconds(&self) -> u64 {
        SECS_PER_YEAR / u64::from(self.periods_per_year)
    }

    /// Idle balance the vault keeps for the whole run.
    #[must_use]
    pub fn target_idle(&self) -> f64 {
        self.initial_vault_assets * self.initial_idle_ratio
    }

    /// Checks the configuration ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.initial_vault_assets.is_finite() || self.initial_vault_assets <= 0.0 {
            return Err(SimulationError::invalid_config(
                "initial vault assets must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.initial_idle_ratio) {
            return Err(SimulationError::invalid_config(
                "initial idle ratio must be within [0, 1]",
            ));
        }
        if self.years == 0 {
            return Err(SimulationError::invalid_config("years must be positive"));
        }
        if self.periods_per_year == 0 {
            return Err(SimulationError::invalid_config(
                "periods per year must be positive",
            ));
        }
        if self.total_periods() > MAX_TOTAL_PERIODS {
            return Err(SimulationError::invalid_config(format!(
                "horizon of {} periods exceeds the limit of {MAX_TOTAL_PERIODS}",
                self.total_periods()
            )));
        }
        Ok(())
    }
}

/// Vault-level balances at the end of a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VaultState {
    /// Idle plus deployed assets.
    pub total_assets: f64,
    /// Assets held by the vault itself.
    pub idle: f64,
    /// Assets held by strategies.
    pub deployed: f64,
    /// Profit not yet released to share price.
    pub locked_profit: f64,
}

/// One strategy's balance and flows for a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyPeriod {
    /// Balance at the end of the period.
    pub balance: f64,
    /// Gain before fees (negative on losses).
    pub gross_gain: f64,
    /// Fees charged on the gain.
    pub fees: FeeBreakdown,
    /// Gain after fees.
    pub net_gain: f64,
}

impl StrategyPeriod {
    /// A record with a balance and no flows.
    #[must_use]
    pub fn opening(balance: f64) -> Self {
        Self {
            balance,
            gross_gain: 0.0,
            fees: FeeBreakdown::zero(),
            net_gain: 0.0,
        }
    }

    /// Charged fee as a float.
    #[must_use]
    pub fn fee(&self) -> f64 {
        self.fees.total_fee as f64
    }
}

/// A single timeline row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    /// Period index, 0 is the opening state.
    pub period: u64,
    /// Elapsed time in years.
    pub year: f64,
    /// Vault balances.
    pub state: VaultState,
    /// Per-strategy records, in strategy order.
    pub strategies: Vec<StrategyPeriod>,
    /// Sum of strategy gross gains this period.
    pub total_gross_gain: f64,
    /// Sum of strategy fees this period.
    pub total_fees: f64,
    /// Gross gain minus fees this period.
    pub total_net_gain: f64,
    /// Gross gain since period 0.
    pub cumulative_gross_gain: f64,
    /// Fees since period 0.
    pub cumulative_fees: f64,
    /// Net gain since period 0.
    pub cumulative_net_gain: f64,
    /// Opening assets plus cumulative net gain. Measured against the
    /// opening total assets, not this row's `total_assets`.
    pub vault_value: f64,
}

/// Ordered per-period rows of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationTimeline {
    strategy_names: Vec<String>,
    rows: Vec<TimelineRow>,
}

impl SimulationTimeline {
    pub(crate) fn new(strategy_names: Vec<String>, capacity: usize) -> Self {
        Self {
            strategy_names,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, row: TimelineRow) {
        self.rows.push(row);
    }

    /// All rows in period order.
    #[must_use]
    pub fn rows(&self) -> &[TimelineRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The most recent row.
    #[must_use]
    pub fn last(&self) -> Option<&TimelineRow> {
        self.rows.last()
    }

    /// Strategy names in column order.
    #[must_use]
    pub fn strategy_names(&self) -> &[String] {
        &self.strategy_names
    }

    /// Column index of a strategy.
    #[must_use]
    pub fn strategy_index(&self, name: &str) -> Option<usize> {
        self.strategy_names.iter().position(|n| n == name)
    }

    /// Every period's record for one strategy.
    #[must_use]
    pub fn strategy_series(&self, name: &str) -> Option<Vec<StrategyPeriod>> {
        let idx = self.strategy_index(name)?;
        Some(self.rows.iter().map(|row| row.strategies[idx]).collect())
    }

    /// Total fees charged per strategy over the whole run.
    #[must_use]
    pub fn fees_by_strategy(&self) -> Vec<(String, f64)> {
        self.strategy_names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let total = self.rows.iter().map(|row| row.strategies[idx].fee()).sum();
                (name.clone(), total)
            })
            .collect()
    }
}

/// Aggregates of a completed periodic run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    /// Opening assets plus cumulative gross gain, on the same basis as
    /// `TimelineRow::vault_value`.
    pub final_value_gross: f64,
    /// Opening assets plus cumulative net gain.
    pub final_value_net: f64,
    /// Fees charged over the run.
    pub total_fees_paid: f64,
    /// Share of rows whose summed gross gain is negative.
    pub loss_probability: f64,
    /// Total fees over total gross gain.
    pub fee_efficiency: Metric,
    /// Mean of the non-zero per-period net gains.
    pub avg_period_return: f64,
    /// Population std of the non-zero per-period net gains.
    pub std_period_return: f64,
    /// Per-period Sharpe scaled by the square root of periods per year.
    pub sharpe_annual: Metric,
}

impl SimulationSummary {
    /// Share of gross gain lost to fees in percent, when defined.
    #[must_use]
    pub fn fee_drag_pct(&self) -> Metric {
        self.fee_efficiency.map(|v| v * 100.0)
    }
}
