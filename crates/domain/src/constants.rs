/// Basis-point scale: 10_000 bps == 100%.
pub const MAX_BPS: u32 = 10_000;

/// Seconds in an average Gregorian year, as used by the vault contract.
pub const SECS_PER_YEAR: u64 = 31_556_952;

/// Maximum number of strategies a vault can hold.
pub const MAXIMUM_STRATEGIES: usize = 20;

/// Default vault performance fee (10%).
pub const PERFORMANCE_FEE_BPS: u32 = 1_000;

/// Default vault management fee (2% per year).
pub const MANAGEMENT_FEE_BPS: u32 = 200;

/// Default upper bound on debt a strategy may take per harvest.
pub const DEFAULT_MAX_DEBT_PER_HARVEST: u64 = 10_000_000;
