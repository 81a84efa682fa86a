//! Monte Carlo simulation of a vault's portfolio APY.
//!
//! Every path compounds `step_count` daily portfolio returns drawn from a
//! [`CorrelatedReturnGenerator`]. Paths are independent and run on rayon's
//! thread pool, each with its own generator seeded from the path index, so
//! the outcome does not depend on how paths are scheduled. Metrics are
//! computed once, over all paths, after they are gathered.

use crate::correlation::{CorrelatedReturnGenerator, CorrelationMatrix};
use crate::stats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;
use vault_sim_domain::error::{Result, SimulationError};
use vault_sim_domain::strategy::{StrategySpec, validate_strategies};

/// Accepted deviation of the allocation total from 1.
pub const ALLOCATION_TOLERANCE: f64 = 0.001;

/// Default APY thresholds for exceedance probabilities.
pub const DEFAULT_THRESHOLDS: [f64; 3] = [0.08, 0.10, 0.12];

/// Configuration for a Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloConfig {
    /// Number of independent paths.
    pub path_count: usize,
    /// Steps (days) per path.
    pub step_count: usize,
    /// Steps in one year, used to de-annualize means and volatilities.
    pub steps_per_year: u32,
    /// Cross-strategy correlation; a default is chosen when absent.
    pub correlation_matrix: Option<CorrelationMatrix>,
    /// Share of the vault held idle, earning nothing.
    pub idle_ratio: f64,
    /// APY thresholds for exceedance probabilities.
    pub thresholds: Vec<f64>,
    /// Base seed; drawn from the thread RNG when absent.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            path_count: 50_000,
            step_count: 365,
            steps_per_year: 365,
            correlation_matrix: None,
            idle_ratio: 0.0,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    /// Sets the number of paths.
    #[must_use]
    pub fn with_paths(mut self, path_count: usize) -> Self {
        self.path_count = path_count;
        self
    }

    /// Sets the number of steps per path.
    #[must_use]
    pub fn with_steps(mut self, step_count: usize) -> Self {
        self.step_count = step_count;
        self
    }

    /// Sets the correlation matrix.
    #[must_use]
    pub fn with_correlation(mut self, correlation: CorrelationMatrix) -> Self {
        self.correlation_matrix = Some(correlation);
        self
    }

    /// Sets the idle share.
    #[must_use]
    pub fn with_idle_ratio(mut self, idle_ratio: f64) -> Self {
        self.idle_ratio = idle_ratio;
        self
    }

    /// Sets the exceedance thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Sets the base seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.path_count == 0 {
            return Err(SimulationError::invalid_config("path count must be positive"));
        }
        if self.step_count == 0 {
            return Err(SimulationError::invalid_config("step count must be positive"));
        }
        if self.steps_per_year == 0 {
            return Err(SimulationError::invalid_config(
                "steps per year must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.idle_ratio) {
            return Err(SimulationError::invalid_config(
                "idle ratio must be within [0, 1]",
            ));
        }
        if self.thresholds.iter().any(|t| !t.is_finite()) {
            return Err(SimulationError::invalid_config("thresholds must be finite"));
        }
        Ok(())
    }
}

/// Share of paths whose annual return exceeds a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdProbability {
    /// APY threshold (0.08 = 8%).
    pub threshold: f64,
    /// Fraction of paths strictly above the threshold.
    pub probability: f64,
}

/// Distribution metrics of per-path annual returns.
///
/// All returns are fractions (0.08 = 8%).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub mean_apy: f64,
    pub median_apy: f64,
    pub std_apy: f64,
    pub min_apy: f64,
    pub max_apy: f64,
    /// Mean over std, 0 when the std is 0.
    pub sharpe_ratio: f64,
    /// 5th percentile of annual returns.
    pub var_95: f64,
    /// Mean of annual returns at or below `var_95`.
    pub cvar_95: f64,
    /// Exceedance probabilities in threshold order.
    pub prob_above: Vec<ThresholdProbability>,
}

impl PortfolioMetrics {
    /// Computes metrics over a sample of annual returns.
    #[must_use]
    pub fn from_annual_returns(annual_returns: &[f64], thresholds: &[f64]) -> Self {
        let sorted = stats::sorted(annual_returns);
        let mean_apy = stats::mean(&sorted);
        let std_apy = stats::std_dev(&sorted);
        let var_95 = stats::percentile_sorted(&sorted, 5.0);
        let tail: Vec<f64> = sorted.iter().copied().filter(|r| *r <= var_95).collect();
        let n = sorted.len().max(1) as f64;

        let prob_above = thresholds
            .iter()
            .map(|&threshold| ThresholdProbability {
                threshold,
                probability: sorted.iter().filter(|r| **r > threshold).count() as f64 / n,
            })
            .collect();

        Self {
            mean_apy,
            median_apy: stats::median_sorted(&sorted),
            std_apy,
            min_apy: sorted.first().copied().unwrap_or(0.0),
            max_apy: sorted.last().copied().unwrap_or(0.0),
            sharpe_ratio: if std_apy > 0.0 { mean_apy / std_apy } else { 0.0 },
            var_95,
            cvar_95: stats::mean(&tail),
            prob_above,
        }
    }

    /// Exceedance probability for a configured threshold.
    #[must_use]
    pub fn prob_above(&self, threshold: f64) -> Option<f64> {
        self.prob_above
            .iter()
            .find(|p| p.threshold == threshold)
            .map(|p| p.probability)
    }
}

/// Per-strategy step returns of one simulated path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplePath {
    /// Strategy names, in column order.
    pub strategy_names: Vec<String>,
    /// One return series per strategy.
    pub returns: Vec<Vec<f64>>,
}

/// Outcome of a Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloResult {
    /// Metrics before fees.
    pub gross: PortfolioMetrics,
    /// Metrics after performance fees.
    pub net: PortfolioMetrics,
    /// Annual return of every path before fees, in path order.
    pub gross_annual_returns: Vec<f64>,
    /// Annual return of every path after fees, in path order.
    pub net_annual_returns: Vec<f64>,
    /// Strategy returns of the first path.
    pub sample_path: SamplePath,
    /// Base seed the paths were derived from.
    pub seed: u64,
}

impl MonteCarloResult {
    /// Mean APY lost to fees.
    #[must_use]
    pub fn mean_fee_drag(&self) -> f64 {
        self.gross.mean_apy - self.net.mean_apy
    }
}

/// Net metrics of one correlation scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityResult {
    /// Scenario name.
    pub scenario: String,
    /// Metrics after fees.
    pub net: PortfolioMetrics,
}

struct PathOutcome {
    gross_annual: f64,
    net_annual: f64,
    returns: Option<Vec<Vec<f64>>>,
}

/// Runs correlated Monte Carlo paths over a strategy set.
#[derive(Debug, Clone)]
pub struct MonteCarloRunner {
    strategy_names: Vec<String>,
    weights: Vec<f64>,
    fee_weight: f64,
    generator: CorrelatedReturnGenerator,
    config: MonteCarloConfig,
}

impl MonteCarloRunner {
    /// Validates the inputs and factorizes the covariance matrix.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` on unusable config or strategies,
    /// `AllocationMismatch` when debt ratios plus the idle share do not sum
    /// to 1, `DecompositionError` when the covariance is not positive
    /// semi-definite.
    pub fn new(strategies: &[StrategySpec], config: &MonteCarloConfig) -> Result<Self> {
        config.validate()?;
        validate_strategies(strategies)?;

        let weights: Vec<f64> = strategies
            .iter()
            .map(|s| s.debt_ratio().as_fraction())
            .collect();
        let allocated = weights.iter().sum::<f64>() + config.idle_ratio;
        if (allocated - 1.0).abs() > ALLOCATION_TOLERANCE {
            return Err(SimulationError::allocation_mismatch(
                1.0,
                allocated,
                ALLOCATION_TOLERANCE,
            ));
        }

        let correlation = config
            .correlation_matrix
            .clone()
            .unwrap_or_else(|| CorrelationMatrix::default_for(strategies.len()));
        let generator =
            CorrelatedReturnGenerator::from_strategies(strategies, &correlation, config.steps_per_year)?;

        // Each strategy's fee is charged on the whole portfolio return,
        // scaled by that strategy's weight.
        let fee_weight = strategies
            .iter()
            .zip(&weights)
            .map(|(s, w)| s.perf_fee().as_fraction() * w)
            .sum();

        Ok(Self {
            strategy_names: strategies.iter().map(|s| s.name.clone()).collect(),
            weights,
            fee_weight,
            generator,
            config: config.clone(),
        })
    }

    /// Simulates every path and computes gross and net metrics.
    #[must_use]
    pub fn run(&self) -> MonteCarloResult {
        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        self.run_with_seed(seed)
    }

    fn run_with_seed(&self, seed: u64) -> MonteCarloResult {
        info!(
            paths = self.config.path_count,
            steps = self.config.step_count,
            strategies = self.weights.len(),
            seed,
            "Starting Monte Carlo simulation"
        );

        let outcomes: Vec<PathOutcome> = (0..self.config.path_count)
            .into_par_iter()
            .map(|path| self.simulate_path(path, seed))
            .collect();

        let gross_annual_returns: Vec<f64> = outcomes.iter().map(|o| o.gross_annual).collect();
        let net_annual_returns: Vec<f64> = outcomes.iter().map(|o| o.net_annual).collect();
        let sample_returns = outcomes
            .into_iter()
            .next()
            .and_then(|o| o.returns)
            .unwrap_or_default();

        let gross =
            PortfolioMetrics::from_annual_returns(&gross_annual_returns, &self.config.thresholds);
        let net =
            PortfolioMetrics::from_annual_returns(&net_annual_returns, &self.config.thresholds);

        info!(
            gross_mean_apy = gross.mean_apy,
            net_mean_apy = net.mean_apy,
            net_var_95 = net.var_95,
            "Monte Carlo simulation finished"
        );

        MonteCarloResult {
            gross,
            net,
            gross_annual_returns,
            net_annual_returns,
            sample_path: SamplePath {
                strategy_names: self.strategy_names.clone(),
                returns: sample_returns,
            },
            seed,
        }
    }

    fn simulate_path(&self, path: usize, seed: u64) -> PathOutcome {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(path as u64 + 1));
        let n = self.weights.len();
        let mut step_returns = vec![0.0; n];
        let mut recorded =
            (path == 0).then(|| vec![Vec::with_capacity(self.config.step_count); n]);

        let mut gross_growth = 1.0;
        let mut net_growth = 1.0;
        for _ in 0..self.config.step_count {
            self.generator.fill_returns(&mut rng, &mut step_returns);

            let gross: f64 = self
                .weights
                .iter()
                .zip(&step_returns)
                .map(|(w, r)| w * r)
                .sum();
            let net = gross - gross.max(0.0) * self.fee_weight;

            gross_growth *= 1.0 + gross;
            net_growth *= 1.0 + net;

            if let Some(series) = recorded.as_mut() {
                for (column, r) in series.iter_mut().zip(&step_returns) {
                    column.push(*r);
                }
            }
        }

        PathOutcome {
            gross_annual: gross_growth - 1.0,
            net_annual: net_growth - 1.0,
            returns: recorded,
        }
    }
}

/// Runs a Monte Carlo simulation of the vault's APY.
///
/// # Arguments
/// * `strategies` - Non-idle strategies with fractional debt ratios in bps
/// * `config` - Path count, horizon, correlation, idle share and seed
pub fn run_monte_carlo_simulation(
    strategies: &[StrategySpec],
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult> {
    Ok(MonteCarloRunner::new(strategies, config)?.run())
}

/// Runs the simulation once per correlation scenario and reports net
/// metrics for each.
///
/// Every scenario reuses the same base seed so differences come from the
/// correlation alone.
pub fn run_correlation_sensitivity<S: AsRef<str>>(
    strategies: &[StrategySpec],
    config: &MonteCarloConfig,
    scenarios: &[(S, CorrelationMatrix)],
) -> Result<Vec<SensitivityResult>> {
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let runners = scenarios
        .iter()
        .map(|(name, correlation)| {
            let scenario_config = config.clone().with_correlation(correlation.clone());
            MonteCarloRunner::new(strategies, &scenario_config).map(|r| (name.as_ref(), r))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(runners
        .into_iter()
        .map(|(name, runner)| SensitivityResult {
            scenario: name.to_string(),
            net: runner.run_with_seed(seed).net,
        })
        .collect())
}

/// Expected APY contribution of each strategy (weight times mean return).
#[must_use]
pub fn apy_contributions(strategies: &[StrategySpec]) -> Vec<(String, f64)> {
    strategies
        .iter()
        .map(|s| (s.name.clone(), s.apy_contribution()))
        .collect()
}
