//! Error kinds raised by the simulation engine.
//!
//! All of them are deterministic validation failures reported before any
//! simulation state is mutated.

use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors raised by the simulators.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Configuration or strategy list is not usable.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// What is wrong.
        message: String,
    },

    /// Allocation weights do not add up to the required total.
    #[error("Allocation mismatch: weights sum to {actual}, expected {expected} (tolerance {tolerance})")]
    AllocationMismatch {
        /// Required total.
        expected: f64,
        /// Observed total.
        actual: f64,
        /// Accepted absolute deviation.
        tolerance: f64,
    },

    /// Covariance matrix could not be factorized.
    #[error("Decomposition error: {message}")]
    DecompositionError {
        /// Why factorization failed.
        message: String,
    },
}

impl SimulationError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates an allocation mismatch error.
    pub fn allocation_mismatch(expected: f64, actual: f64, tolerance: f64) -> Self {
        Self::AllocationMismatch {
            expected,
            actual,
            tolerance,
        }
    }

    /// Creates a decomposition error.
    pub fn decomposition(message: impl Into<String>) -> Self {
        Self::DecompositionError {
            message: message.into(),
        }
    }
}
