//! Error Types for the Strata Engine
//!
//! Typed errors with diagnostic payloads. Expected shortfalls (partial
//! backstop fills, single liquidation attempt failures) are reported through
//! return values, never through this enum; everything here aborts the
//! operation with no partial state change.

use crate::types::Address;

/// Result type alias for Strata operations
pub type StrataResult<T> = Result<T, StrataError>;

/// Main error enum for all Strata engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrataError {
    // ============ Amount Errors ============
    /// Invalid amount provided
    InvalidAmount { amount: u64, reason: AmountErrorReason },

    /// Zero amount not allowed
    ZeroAmount,

    /// Insufficient balance for operation
    InsufficientBalance { available: u64, requested: u64 },

    /// Insufficient shares for operation
    InsufficientShares { available: u128, requested: u128 },

    // ============ Liquidity Errors ============
    /// Withdrawal could not be serviced after bounded liquidation attempts
    InsufficientLiquidity {
        needed: u64,
        available: u64,
        attempts: u8,
    },

    /// External hook output fell below the enforced floor
    SlippageExceeded { min_out: u64, received: u64 },

    /// External hook call failed
    HookCallFailed { reason: &'static str },

    // ============ Authorization Errors ============
    /// Caller is not authorized for this operation
    Unauthorized { caller: Address },

    /// Only the admin can perform this action
    AdminOnly,

    /// Mutating entry point re-entered while still executing
    ReentrantCall,

    // ============ Valuation Errors ============
    /// Valuation update called inside the cooldown window
    CooldownActive { elapsed: u64, required: u64 },

    /// Profit/loss signal outside the accepted band
    InvalidProfitBps { profit_bps: i64, max_abs: i64 },

    /// Proposed timestamp precedes the last recorded update
    TimestampNotMonotonic { last: u64, proposed: u64 },

    // ============ Migration Errors ============
    /// Rebase index was already frozen for this tranche
    IndexAlreadyFrozen,

    /// Operation requires the rebase index to be frozen first
    IndexNotFrozen,

    /// Account has already been migrated to a direct balance
    AlreadyMigrated { account: Address },

    /// No account state exists for this address
    AccountNotFound { account: Address },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Input Validation Errors ============
    /// Invalid input parameter
    InvalidInput { param: &'static str, reason: &'static str },

    /// Invalid address (e.g., zero address)
    InvalidAddress { reason: &'static str },

    /// Tranche object graph wired incorrectly at construction
    InvalidTrancheWiring { reason: &'static str },
}

/// Reasons for amount-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountErrorReason {
    /// Amount is zero when non-zero required
    Zero,
    /// Amount exceeds maximum
    TooLarge,
    /// Amount below minimum
    TooSmall,
    /// Amount doesn't match expected
    Mismatch,
}

impl StrataError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "E010_INVALID_AMOUNT",
            Self::ZeroAmount => "E011_ZERO_AMOUNT",
            Self::InsufficientBalance { .. } => "E012_INSUFFICIENT_BALANCE",
            Self::InsufficientShares { .. } => "E013_INSUFFICIENT_SHARES",
            Self::InsufficientLiquidity { .. } => "E020_INSUFFICIENT_LIQUIDITY",
            Self::SlippageExceeded { .. } => "E022_SLIPPAGE_EXCEEDED",
            Self::HookCallFailed { .. } => "E023_HOOK_CALL_FAILED",
            Self::Unauthorized { .. } => "E030_UNAUTHORIZED",
            Self::AdminOnly => "E031_ADMIN_ONLY",
            Self::ReentrantCall => "E032_REENTRANT_CALL",
            Self::CooldownActive { .. } => "E040_COOLDOWN_ACTIVE",
            Self::InvalidProfitBps { .. } => "E041_INVALID_PROFIT_BPS",
            Self::TimestampNotMonotonic { .. } => "E042_TIMESTAMP_NOT_MONOTONIC",
            Self::IndexAlreadyFrozen => "E050_INDEX_ALREADY_FROZEN",
            Self::IndexNotFrozen => "E051_INDEX_NOT_FROZEN",
            Self::AlreadyMigrated { .. } => "E052_ALREADY_MIGRATED",
            Self::AccountNotFound { .. } => "E053_ACCOUNT_NOT_FOUND",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::InvalidInput { .. } => "E090_INVALID_INPUT",
            Self::InvalidAddress { .. } => "E091_INVALID_ADDRESS",
            Self::InvalidTrancheWiring { .. } => "E092_INVALID_WIRING",
        }
    }

    /// Returns true if this error is recoverable (caller can fix it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InsufficientBalance { .. } => true, // deposit more
            Self::InsufficientLiquidity { .. } => true, // retry after reserve action
            Self::CooldownActive { .. } => true,      // wait for the window
            Self::InvalidAmount { .. } => true,       // adjust the amount
            _ => false,
        }
    }
}
