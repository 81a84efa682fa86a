use crate::constants::MAX_BPS;
use serde::{Deserialize, Serialize};

/// A fraction where 1.0 means 100%.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Percentage(pub f64);

impl Percentage {
    /// Converts basis points to a fraction.
    #[must_use]
    pub fn from_bps(bps: u32) -> Self {
        Self(f64::from(bps) / f64::from(MAX_BPS))
    }

    /// The fraction itself.
    #[must_use]
    pub fn as_fraction(&self) -> f64 {
        self.0
    }

    /// The value in percent (0.1 -> 10.0).
    #[must_use]
    pub fn as_percent(&self) -> f64 {
        self.0 * 100.0
    }
}
