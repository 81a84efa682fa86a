//! Domain types for the vault yield simulator.
//!
//! This crate holds everything both simulators agree on:
//! - Vault constants (bps scale, seconds per year, strategy limit)
//! - Strategy specifications
//! - Integer fee assessment mirroring the on-chain fee schedule
//! - Error kinds and the defined/undefined metric sentinel

/// Vault-wide constants.
pub mod constants;
/// Error types.
pub mod error;
/// Fee assessment.
pub mod fees;
/// Metric values that may be undefined.
pub mod metric;
/// Strategy specifications.
pub mod strategy;
/// Small value objects.
pub mod value_objects;

pub use error::{Result, SimulationError};
pub use fees::{FeeBreakdown, assess_fees};
pub use metric::Metric;
pub use strategy::StrategySpec;
