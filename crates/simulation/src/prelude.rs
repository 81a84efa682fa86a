//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use vault_sim_simulation::prelude::*;
//! ```

// Correlation
pub use crate::correlation::{CorrelatedReturnGenerator, CorrelationMatrix, cholesky};

// Monte Carlo
pub use crate::monte_carlo::{
    MonteCarloConfig, MonteCarloResult, MonteCarloRunner, PortfolioMetrics, SamplePath,
    SensitivityResult, ThresholdProbability, apy_contributions, run_correlation_sensitivity,
    run_monte_carlo_simulation,
};

// Periodic simulator
pub use crate::periodic::{PeriodicSimulationResult, PeriodicSimulator, run_periodic_simulation};

// State management
pub use crate::state::{
    PeriodicConfig, SimulationSummary, SimulationTimeline, StrategyPeriod, TimelineRow,
    VaultState,
};

// Domain
pub use vault_sim_domain::{
    FeeBreakdown, Metric, Result, SimulationError, StrategySpec, assess_fees,
};
