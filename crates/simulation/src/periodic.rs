//! Period-by-period compounding simulation of a vault.
//!
//! Each period every strategy draws a normally distributed return, reports
//! the resulting gain to the vault and pays fees on it through the vault's
//! integer fee schedule. The run is strictly sequential: period `t + 1`
//! starts from the balances period `t` ended with.

use crate::state::{
    PeriodicConfig, SimulationSummary, SimulationTimeline, StrategyPeriod, TimelineRow,
    VaultState,
};
use crate::stats;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use vault_sim_domain::error::{Result, SimulationError};
use vault_sim_domain::fees::assess_fees;
use vault_sim_domain::metric::Metric;
use vault_sim_domain::strategy::{StrategySpec, total_debt_ratio_bps, validate_strategies};

/// Largest share of a strategy's balance one period can lose.
pub const MAX_PERIOD_LOSS: f64 = 0.99;

/// Share of a period's gross gain treated as locked profit.
pub const LOCKED_PROFIT_SHARE: f64 = 0.5;

/// Timeline and summary of a periodic run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodicSimulationResult {
    /// Per-period rows.
    pub timeline: SimulationTimeline,
    /// Aggregates over the timeline.
    pub summary: SimulationSummary,
}

/// Steps a vault through its periods.
///
/// The simulator owns its random generator, seeded from the config, so two
/// simulators built from the same inputs produce identical timelines.
#[derive(Debug)]
pub struct PeriodicSimulator<'a> {
    strategies: &'a [StrategySpec],
    config: PeriodicConfig,
    returns: Vec<Normal<f64>>,
    rng: StdRng,
    balances: Vec<f64>,
    timeline: SimulationTimeline,
    period: u64,
    total_periods: u64,
    opening_assets: f64,
}

impl<'a> PeriodicSimulator<'a> {
    /// Validates the inputs and records the opening state as row 0.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the config is out of range, the
    /// strategy list is unusable or the debt ratios sum to zero.
    pub fn new(strategies: &'a [StrategySpec], config: &PeriodicConfig) -> Result<Self> {
        config.validate()?;
        validate_strategies(strategies)?;

        let total_ratio = total_debt_ratio_bps(strategies);
        if total_ratio == 0 {
            return Err(SimulationError::invalid_config(
                "at least one strategy must have a non-zero debt ratio",
            ));
        }

        let dt = config.period_year_fraction();
        let returns = strategies
            .iter()
            .map(|s| {
                Normal::new(s.mean_annual_return * dt, s.std_annual_return * dt.sqrt()).map_err(
                    |e| {
                        SimulationError::invalid_config(format!(
                            "strategy {}: invalid return distribution: {e}",
                            s.name
                        ))
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let idle = config.target_idle();
        let deployed = config.initial_vault_assets - idle;
        let balances: Vec<f64> = strategies
            .iter()
            .map(|s| deployed * (f64::from(s.debt_ratio_bps) / total_ratio as f64))
            .collect();

        let total_periods = config.total_periods();
        let names = strategies.iter().map(|s| s.name.clone()).collect();
        let mut timeline = SimulationTimeline::new(names, total_periods as usize + 1);
        let opening_assets = idle + deployed;
        timeline.push(TimelineRow {
            period: 0,
            year: 0.0,
            state: VaultState {
                total_assets: opening_assets,
                idle,
                deployed,
                locked_profit: 0.0,
            },
            strategies: balances.iter().copied().map(StrategyPeriod::opening).collect(),
            total_gross_gain: 0.0,
            total_fees: 0.0,
            total_net_gain: 0.0,
            cumulative_gross_gain: 0.0,
            cumulative_fees: 0.0,
            cumulative_net_gain: 0.0,
            vault_value: opening_assets,
        });

        Ok(Self {
            strategies,
            config: config.clone(),
            returns,
            rng: StdRng::seed_from_u64(config.seed),
            balances,
            timeline,
            period: 0,
            total_periods,
            opening_assets,
        })
    }

    /// Number of periods simulated so far.
    #[must_use]
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Whether every configured period has been simulated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.period >= self.total_periods
    }

    /// Rows recorded so far.
    #[must_use]
    pub fn timeline(&self) -> &SimulationTimeline {
        &self.timeline
    }

    /// Simulates the next period and returns its row, or `None` once the
    /// horizon is reached.
    pub fn step(&mut self) -> Option<&TimelineRow> {
        if self.is_finished() {
            return None;
        }

        let period_seconds = self.config.period_seconds();
        let mut records = Vec::with_capacity(self.strategies.len());

        for (idx, strategy) in self.strategies.iter().enumerate() {
            let balance = self.balances[idx];
            let period_return = self.returns[idx].sample(&mut self.rng);
            let gross_gain = (balance * period_return).max(-MAX_PERIOD_LOSS * balance);

            // Fees only apply to the rounded positive part of the gain.
            let rounded = gross_gain.round();
            let gain = if rounded > 0.0 { rounded as u128 } else { 0 };
            let fees = assess_fees(
                gain,
                balance as u128,
                0,
                period_seconds,
                strategy.perf_fee_bps,
                self.config.vault_performance_fee_bps,
                self.config.vault_management_fee_bps,
            );

            let net_gain = gross_gain - fees.total_fee as f64;
            let new_balance = (balance + net_gain).max(0.0);
            self.balances[idx] = new_balance;

            records.push(StrategyPeriod {
                balance: new_balance,
                gross_gain,
                fees,
                net_gain,
            });
        }

        self.period += 1;

        let total_gross_gain: f64 = records.iter().map(|r| r.gross_gain).sum();
        let total_fees: f64 = records.iter().map(StrategyPeriod::fee).sum();
        let total_net_gain = total_gross_gain - total_fees;

        let idle = self.config.target_idle();
        let deployed: f64 = self.balances.iter().sum();
        let state = VaultState {
            total_assets: idle + deployed,
            idle,
            deployed,
            locked_profit: (LOCKED_PROFIT_SHARE * total_gross_gain).max(0.0),
        };

        let (cumulative_gross_gain, cumulative_fees) = self
            .timeline
            .last()
            .map(|prev| (prev.cumulative_gross_gain, prev.cumulative_fees))
            .unwrap_or((0.0, 0.0));
        let cumulative_gross_gain = cumulative_gross_gain + total_gross_gain;
        let cumulative_fees = cumulative_fees + total_fees;
        let cumulative_net_gain = cumulative_gross_gain - cumulative_fees;

        debug!(
            period = self.period,
            gross_gain = total_gross_gain,
            fees = total_fees,
            deployed,
            "Period simulated"
        );

        self.timeline.push(TimelineRow {
            period: self.period,
            year: self.period as f64 / f64::from(self.config.periods_per_year),
            state,
            strategies: records,
            total_gross_gain,
            total_fees,
            total_net_gain,
            cumulative_gross_gain,
            cumulative_fees,
            cumulative_net_gain,
            vault_value: self.opening_assets + cumulative_net_gain,
        });

        self.timeline.last()
    }

    /// Stops the run and summarizes the rows recorded so far.
    #[must_use]
    pub fn finish(self) -> PeriodicSimulationResult {
        let summary = summarize(&self.timeline, self.opening_assets, &self.config);
        PeriodicSimulationResult {
            timeline: self.timeline,
            summary,
        }
    }
}

fn summarize(
    timeline: &SimulationTimeline,
    opening_assets: f64,
    config: &PeriodicConfig,
) -> SimulationSummary {
    let rows = timeline.rows();
    let (cumulative_gross, total_fees_paid, final_value_net) = timeline
        .last()
        .map(|row| (row.cumulative_gross_gain, row.cumulative_fees, row.vault_value))
        .unwrap_or((0.0, 0.0, opening_assets));

    let loss_rows = rows.iter().filter(|row| row.total_gross_gain < 0.0).count();
    let loss_probability = if rows.is_empty() {
        0.0
    } else {
        loss_rows as f64 / rows.len() as f64
    };

    let period_returns: Vec<f64> = rows
        .iter()
        .map(|row| row.total_net_gain)
        .filter(|gain| *gain != 0.0)
        .collect();
    let avg_period_return = stats::mean(&period_returns);
    let std_period_return = stats::std_dev(&period_returns);
    let periods_per_year = f64::from(config.periods_per_year);
    let sharpe_annual = if period_returns.is_empty() {
        Metric::Undefined
    } else {
        Metric::ratio(avg_period_return, std_period_return).map(|s| s * periods_per_year.sqrt())
    };

    let fee_efficiency = Metric::ratio(total_fees_paid, cumulative_gross);

    if !sharpe_annual.is_defined() {
        warn!("Annualized Sharpe is undefined: per-period net gains have no dispersion");
    }
    if !fee_efficiency.is_defined() {
        warn!("Fee efficiency is undefined: total gross gain is zero");
    }

    SimulationSummary {
        final_value_gross: opening_assets + cumulative_gross,
        final_value_net,
        total_fees_paid,
        loss_probability,
        fee_efficiency,
        avg_period_return,
        std_period_return,
        sharpe_annual,
    }
}

/// Runs a periodic compounding simulation to the end of its horizon.
///
/// # Arguments
/// * `strategies` - Strategies the vault allocates to
/// * `config` - Horizon, vault fees and seed
///
/// # Returns
/// One timeline row per period (`years * periods_per_year + 1` rows) and the
/// run summary.
pub fn run_periodic_simulation(
    strategies: &[StrategySpec],
    config: &PeriodicConfig,
) -> Result<PeriodicSimulationResult> {
    let _span = info_span!(
        "periodic_simulation",
        seed = config.seed,
        periods = config.total_periods()
    )
    .entered();
    let mut simulator = PeriodicSimulator::new(strategies, config)?;

    info!(
        strategies = strategies.len(),
        periods = config.total_periods(),
        seed = config.seed,
        "Starting periodic simulation"
    );

    while simulator.step().is_some() {}

    let result = simulator.finish();
    info!(
        final_value_gross = result.summary.final_value_gross,
        final_value_net = result.summary.final_value_net,
        total_fees = result.summary.total_fees_paid,
        "Periodic simulation finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lending_strategies() -> Vec<StrategySpec> {
        vec![
            StrategySpec::new("Compound", 1_000, 4_000, 0.06, 0.10),
            StrategySpec::new("Aave", 1_000, 3_000, 0.08, 0.12),
            StrategySpec::new("Curve", 1_500, 2_000, 0.04, 0.06),
        ]
    }

    #[test]
    fn test_timeline_length() {
        let config = PeriodicConfig::default().with_horizon(3, 12);
        let result = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        assert_eq!(result.timeline.len(), 3 * 12 + 1);
        assert_eq!(result.timeline.rows()[0].period, 0);
        assert_eq!(result.timeline.last().unwrap().period, 36);
        assert_eq!(result.timeline.last().unwrap().year, 3.0);
    }

    #[test]
    fn test_zero_total_debt_ratio_rejected() {
        let strategies = vec![
            StrategySpec::new("A", 0, 0, 0.05, 0.1),
            StrategySpec::new("B", 0, 0, 0.05, 0.1),
        ];
        let err = run_periodic_simulation(&strategies, &PeriodicConfig::default()).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_non_normalized_ratios_split_deployed_capital() {
        let strategies = lending_strategies();
        let simulator = PeriodicSimulator::new(&strategies, &PeriodicConfig::default()).unwrap();
        let opening = &simulator.timeline().rows()[0];

        assert_eq!(opening.state.idle, 3_000_000.0);
        assert_eq!(opening.state.deployed, 7_000_000.0);
        let total: f64 = opening.strategies.iter().map(|s| s.balance).sum();
        assert!((total - opening.state.deployed).abs() < 1e-6);
        // 4000 / 9000 of 7M
        assert!((opening.strategies[0].balance - 7_000_000.0 * 4.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_balances_stay_non_negative() {
        let strategies = vec![
            StrategySpec::new("Degen", 2_000, 6_000, -0.5, 3.0),
            StrategySpec::new("Stable", 1_000, 4_000, 0.03, 0.01),
        ];
        let config = PeriodicConfig::default().with_horizon(10, 12).with_seed(3);
        let result = run_periodic_simulation(&strategies, &config).unwrap();

        for row in result.timeline.rows() {
            assert!(row.state.idle >= 0.0);
            assert!(row.state.deployed >= 0.0);
            assert!(row.state.total_assets >= 0.0);
            assert!(row.state.locked_profit >= 0.0);
            for record in &row.strategies {
                assert!(record.balance >= 0.0);
            }
        }
    }

    #[test]
    fn test_period_loss_is_floored() {
        let strategies = vec![StrategySpec::new("Crash", 0, 10_000, -5.0, 0.0)];
        let config = PeriodicConfig::default().with_horizon(1, 1).with_vault_fees(0, 0);
        let result = run_periodic_simulation(&strategies, &config).unwrap();

        let opening = result.timeline.rows()[0].strategies[0].balance;
        let closing = result.timeline.rows()[1].strategies[0];
        assert!((closing.gross_gain + MAX_PERIOD_LOSS * opening).abs() < 1e-6);
        assert!((closing.balance - opening * (1.0 - MAX_PERIOD_LOSS)).abs() < 1e-6);
        assert_eq!(result.summary.loss_probability, 0.5);
    }

    #[test]
    fn test_same_seed_same_timeline() {
        let config = PeriodicConfig::default().with_horizon(5, 12).with_seed(1234);
        let a = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        let b = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        assert_eq!(a, b);

        let c = run_periodic_simulation(&lending_strategies(), &config.clone().with_seed(99))
            .unwrap();
        assert_ne!(a.timeline, c.timeline);
    }

    #[test]
    fn test_flat_strategy_keeps_initial_value() {
        let strategies = vec![StrategySpec::new("Flat", 0, 10_000, 0.0, 0.0)];
        let config = PeriodicConfig::default()
            .with_initial_assets(10_000_000.0)
            .with_idle_ratio(0.30)
            .with_horizon(1, 12)
            .with_vault_fees(0, 0);
        let result = run_periodic_simulation(&strategies, &config).unwrap();

        assert_eq!(result.summary.final_value_net, 10_000_000.0);
        assert_eq!(result.summary.final_value_gross, 10_000_000.0);
        assert_eq!(result.summary.total_fees_paid, 0.0);
        assert_eq!(result.summary.loss_probability, 0.0);
        assert_eq!(result.summary.fee_efficiency, Metric::Undefined);
        assert_eq!(result.summary.sharpe_annual, Metric::Undefined);
        assert_eq!(result.summary.avg_period_return, 0.0);
    }

    #[test]
    fn test_idle_is_held_constant() {
        let config = PeriodicConfig::default().with_horizon(2, 12);
        let result = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        for row in result.timeline.rows() {
            assert_eq!(row.state.idle, 3_000_000.0);
            assert!((row.state.total_assets - row.state.idle - row.state.deployed).abs() < 1e-6);
            let sum: f64 = row.strategies.iter().map(|s| s.balance).sum();
            assert!((sum - row.state.deployed).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fees_never_exceed_positive_gain() {
        let config = PeriodicConfig::default().with_horizon(5, 12);
        let result = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        for row in result.timeline.rows().iter().skip(1) {
            for record in &row.strategies {
                if record.gross_gain <= 0.0 {
                    assert_eq!(record.fees.total_fee, 0);
                    assert_eq!(record.net_gain, record.gross_gain);
                } else {
                    assert!(record.fee() <= record.gross_gain.round());
                }
            }
        }
    }

    #[test]
    fn test_cumulative_columns_are_consistent() {
        let config = PeriodicConfig::default().with_horizon(2, 12);
        let result = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        let rows = result.timeline.rows();

        let gross: f64 = rows.iter().map(|r| r.total_gross_gain).sum();
        let fees: f64 = rows.iter().map(|r| r.total_fees).sum();
        let last = rows.last().unwrap();
        assert!((last.cumulative_gross_gain - gross).abs() < 1e-6);
        assert!((last.cumulative_fees - fees).abs() < 1e-6);
        assert!((last.vault_value - (10_000_000.0 + gross - fees)).abs() < 1e-6);
        assert_eq!(result.summary.total_fees_paid, last.cumulative_fees);
        assert!(result.summary.total_fees_paid > 0.0);
    }

    #[test]
    fn test_locked_profit_is_half_of_positive_gross_gain() {
        let config = PeriodicConfig::default().with_horizon(3, 12);
        let result = run_periodic_simulation(&lending_strategies(), &config).unwrap();
        for row in result.timeline.rows().iter().skip(1) {
            let expected = (0.5 * row.total_gross_gain).max(0.0);
            assert_eq!(row.state.locked_profit, expected);
        }
    }

    #[test]
    fn test_stepping_can_stop_early() {
        let strategies = lending_strategies();
        let config = PeriodicConfig::default().with_horizon(1, 12);
        let mut simulator = PeriodicSimulator::new(&strategies, &config).unwrap();

        for _ in 0..4 {
            assert!(simulator.step().is_some());
        }
        assert_eq!(simulator.period(), 4);
        assert!(!simulator.is_finished());

        let partial = simulator.finish();
        assert_eq!(partial.timeline.len(), 5);

        let full = run_periodic_simulation(&strategies, &config).unwrap();
        assert_eq!(&full.timeline.rows()[..5], partial.timeline.rows());
    }

    #[test]
    fn test_step_after_horizon_returns_none() {
        let strategies = lending_strategies();
        let config = PeriodicConfig::default().with_horizon(1, 2);
        let mut simulator = PeriodicSimulator::new(&strategies, &config).unwrap();
        assert!(simulator.step().is_some());
        assert!(simulator.step().is_some());
        assert!(simulator.is_finished());
        assert!(simulator.step().is_none());
        assert_eq!(simulator.timeline().len(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_timeline_shape_and_non_negative_balances(
            years in 1u32..4,
            periods_per_year in 1u32..13,
            idle_ratio in 0.0f64..=1.0,
            mean in -1.0f64..1.0,
            std in 0.0f64..2.0,
            seed in any::<u64>(),
        ) {
            let strategies = vec![
                StrategySpec::new("Volatile", 2_000, 7_000, mean, std),
                StrategySpec::new("Stable", 1_000, 3_000, 0.03, 0.01),
            ];
            let config = PeriodicConfig::default()
                .with_horizon(years, periods_per_year)
                .with_idle_ratio(idle_ratio)
                .with_seed(seed);
            let result = run_periodic_simulation(&strategies, &config).unwrap();

            prop_assert_eq!(
                result.timeline.len() as u64,
                u64::from(years) * u64::from(periods_per_year) + 1
            );
            for row in result.timeline.rows() {
                prop_assert!(row.state.idle >= 0.0);
                prop_assert!(row.state.deployed >= 0.0);
                prop_assert!(row.state.total_assets >= 0.0);
                prop_assert!(row.strategies.iter().all(|s| s.balance >= 0.0));
                prop_assert!(row.strategies.iter().all(|s| s.fees.total_fee as f64 <= s.gross_gain.max(0.0).round()));
            }
        }
    }
}
