//! Built-in vault configurations.

use clap::ValueEnum;
use vault_sim_domain::StrategySpec;

/// A named strategy set with the idle share it is meant to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Compound, Aave and Curve lending markets.
    Lending,
    /// Restaking and liquid restaking tokens with 5% idle.
    Restaking,
}

impl Preset {
    pub fn strategies(self) -> Vec<StrategySpec> {
        match self {
            Self::Lending => vec![
                StrategySpec::new("Compound", 1_000, 4_000, 0.06, 0.10),
                StrategySpec::new("Aave", 1_000, 3_000, 0.08, 0.12),
                StrategySpec::new("Curve", 1_500, 2_000, 0.04, 0.06),
            ],
            Self::Restaking => vec![
                StrategySpec::new("RestakeETH", 1_000, 5_000, 0.085, 0.03),
                StrategySpec::new("LRTBoost", 1_200, 3_000, 0.045, 0.02),
                StrategySpec::new("PendleYield", 1_500, 1_500, 0.035, 0.05),
            ],
        }
    }

    /// Share left idle so the debt ratios and idle sum to 1.
    pub fn idle_ratio(self) -> f64 {
        match self {
            Self::Lending => 0.10,
            Self::Restaking => 0.05,
        }
    }
}
