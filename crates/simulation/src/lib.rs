//! Simulation engine for multi-strategy yield vaults.
//!
//! This crate provides:
//! - A period-by-period compounding simulator with per-strategy integer fees
//! - Correlated return generation via Cholesky factorization
//! - A parallel Monte Carlo simulator with portfolio-level fee netting
//! - Descriptive statistics shared by both

/// Prelude module for convenient imports.
pub mod prelude;

/// Correlation matrices and correlated return generation.
pub mod correlation;
/// Monte Carlo portfolio simulation.
pub mod monte_carlo;
/// Period-by-period compounding simulation.
pub mod periodic;
/// Vault state, timeline and summary records.
pub mod state;
/// Descriptive statistics.
pub mod stats;
