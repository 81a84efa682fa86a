//! Fee assessment following the vault's on-chain fee schedule.
//!
//! Every amount is an integer number of token units and every division is a
//! floor division, so results match what the contract would charge. The
//! intermediate products are computed in 256 bits like the contract does.

use crate::constants::{MAX_BPS, SECS_PER_YEAR};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Fees charged on a single strategy report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Time-based fee on the strategy's outstanding debt.
    pub management_fee: u128,
    /// Fee owed to the strategist.
    pub strategist_fee: u128,
    /// Vault performance fee.
    pub performance_fee: u128,
    /// Fee actually charged, capped at the reported gain.
    pub total_fee: u128,
}

impl FeeBreakdown {
    /// A breakdown with every component at zero.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Sum of the components before the gain cap is applied.
    #[must_use]
    pub fn uncapped_total(&self) -> u128 {
        self.management_fee
            .saturating_add(self.strategist_fee)
            .saturating_add(self.performance_fee)
    }

    /// Whether the gain cap reduced the charged fee.
    #[must_use]
    pub fn is_capped(&self) -> bool {
        self.uncapped_total() > self.total_fee
    }
}

fn saturating_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.low_u128()
    }
}

/// Management fee accrued on `strategy_debt - delegated_assets` over
/// `duration_seconds`.
///
/// `floor(max(debt - delegated, 0) * duration * fee_bps / (MAX_BPS * SECS_PER_YEAR))`
#[must_use]
pub fn management_fee(
    strategy_debt: u128,
    delegated_assets: u128,
    duration_seconds: u64,
    management_fee_bps: u32,
) -> u128 {
    let effective_debt = strategy_debt.saturating_sub(delegated_assets);
    let numerator = U256::from(effective_debt)
        * U256::from(duration_seconds)
        * U256::from(management_fee_bps);
    let denominator = U256::from(MAX_BPS) * U256::from(SECS_PER_YEAR);
    saturating_u128(numerator / denominator)
}

/// Share of `gain` taken at `fee_bps`, rounded down.
#[must_use]
pub fn performance_fee(gain: u128, fee_bps: u32) -> u128 {
    let fee = U256::from(gain) * U256::from(fee_bps) / U256::from(MAX_BPS);
    saturating_u128(fee)
}

/// Assesses every fee due on a strategy report of `gain`.
///
/// Losses and flat reports (`gain == 0`) are never charged. The charged total
/// never exceeds the gain it is levied on.
///
/// # Arguments
///
/// * `gain` - Reported gain in token units
/// * `strategy_debt` - Debt outstanding to the strategy
/// * `delegated_assets` - Debt exempt from the management fee
/// * `duration_seconds` - Time since the previous report
/// * `strategist_fee_bps` - Strategist performance fee
/// * `vault_perf_fee_bps` - Vault performance fee
/// * `vault_mgmt_fee_bps` - Vault management fee (annual)
#[must_use]
pub fn assess_fees(
    gain: u128,
    strategy_debt: u128,
    delegated_assets: u128,
    duration_seconds: u64,
    strategist_fee_bps: u32,
    vault_perf_fee_bps: u32,
    vault_mgmt_fee_bps: u32,
) -> FeeBreakdown {
    if gain == 0 {
        return FeeBreakdown::zero();
    }

    let management_fee = management_fee(
        strategy_debt,
        delegated_assets,
        duration_seconds,
        vault_mgmt_fee_bps,
    );
    let strategist_fee = performance_fee(gain, strategist_fee_bps);
    let performance_fee = performance_fee(gain, vault_perf_fee_bps);

    let total_fee = management_fee
        .saturating_add(strategist_fee)
        .saturating_add(performance_fee)
        .min(gain);

    FeeBreakdown {
        management_fee,
        strategist_fee,
        performance_fee,
        total_fee,
    }
}
