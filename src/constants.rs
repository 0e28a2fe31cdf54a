//! Protocol Constants
//!
//! All magic numbers and configuration values for the Strata tranche engine.
//! Values mirror the reference deployment parameters.

/// Settlement asset metadata
pub mod usd {
    /// Settlement asset display name
    pub const NAME: &str = "USD";
    /// Decimal places of the settlement asset
    pub const DECIMALS: u8 = 6;
    /// One unit with decimals (1 USD = 1_000_000 base units)
    pub const ONE: u64 = 1_000_000;
}

/// Precision constants
pub mod precision {
    /// Rebase index fixed point (1e18). An index of `INDEX_ONE` means
    /// one share is worth exactly one settlement base unit.
    pub const INDEX_ONE: u128 = 1_000_000_000_000_000_000;

    /// LP price fixed point (1e18). A price of `PRICE_ONE` means one LP
    /// base unit redeems for one settlement base unit.
    pub const PRICE_ONE: u128 = 1_000_000_000_000_000_000;

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;
}

/// Spillover / backstop configuration (basis points)
pub mod spillover {
    /// Senior target yield per valuation period (2%)
    pub const TARGET_YIELD_BPS: u64 = 200;

    /// Share of excess profit spilled to Junior (80%)
    pub const SPILLOVER_SHARE_BPS: u64 = 8_000;

    /// Largest accepted |profit_bps| per valuation update (50%)
    pub const MAX_PROFIT_BPS: i64 = 5_000;
}

/// Valuation update configuration
pub mod valuation {
    /// Minimum seconds between valuation updates (~1 month)
    pub const UPDATE_COOLDOWN_SECS: u64 = 30 * 24 * 60 * 60;
}

/// Withdrawal liquidity configuration
pub mod liquidity {
    /// Maximum LP liquidation attempts per withdrawal
    pub const MAX_LIQUIDATION_ATTEMPTS: u8 = 3;

    /// Minimum acceptable hook output, relative to the quoted proceeds (95%)
    pub const MIN_OUTPUT_BPS: u64 = 9_500;
}

/// Fee configuration (basis points)
pub mod fees {
    /// Withdrawal fee retained by the tranche (0.1%)
    pub const WITHDRAW_FEE_BPS: u64 = 10;
}

/// Operational limits
pub mod limits {
    use super::usd::ONE;

    /// Minimum deposit into any tranche (1 USD)
    pub const MIN_DEPOSIT: u64 = ONE;

    /// Maximum accounts per batch migration call
    pub const MAX_BATCH_MIGRATION: usize = 100;
}
