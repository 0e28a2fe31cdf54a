//! Validation Helpers for the Strata Engine
//!
//! Centralized input validation shared by every mutating entry point.
//! Validation runs before any state is touched, so a failed check never
//! leaves partial state behind.

use crate::constants::{limits, spillover};
use crate::errors::{AmountErrorReason, StrataError, StrataResult};
use crate::types::Address;

// ============ Validation Macro ============

/// Check a condition and return an error if it fails.
///
/// # Examples
///
/// ```rust,ignore
/// use strata_core::check;
///
/// check!(amount > 0, StrataError::ZeroAmount);
/// ```
#[macro_export]
macro_rules! check {
    ($condition:expr, $error:expr) => {
        if !($condition) {
            return Err($error);
        }
    };
}

// ============ Validators ============

/// Reject zero amounts
pub fn require_nonzero(amount: u64) -> StrataResult<()> {
    check!(amount > 0, StrataError::ZeroAmount);
    Ok(())
}

/// Enforce the minimum deposit size
pub fn validate_deposit_amount(amount: u64) -> StrataResult<()> {
    check!(
        amount >= limits::MIN_DEPOSIT,
        StrataError::InvalidAmount {
            amount,
            reason: AmountErrorReason::TooSmall,
        }
    );
    Ok(())
}

/// Bound the valuation signal to the accepted band
pub fn validate_profit_bps(profit_bps: i64) -> StrataResult<()> {
    check!(
        profit_bps.unsigned_abs() <= spillover::MAX_PROFIT_BPS as u64,
        StrataError::InvalidProfitBps {
            profit_bps,
            max_abs: spillover::MAX_PROFIT_BPS,
        }
    );
    Ok(())
}

/// Reject the zero address
pub fn validate_address(address: &Address) -> StrataResult<()> {
    check!(
        address.iter().any(|b| *b != 0),
        StrataError::InvalidAddress {
            reason: "zero address",
        }
    );
    Ok(())
}

/// Reject a zero LP price; price correctness beyond that is the
/// operator's responsibility
pub fn validate_lp_price(lp_price: u128) -> StrataResult<()> {
    check!(
        lp_price > 0,
        StrataError::InvalidInput {
            param: "lp_price",
            reason: "must be non-zero",
        }
    );
    Ok(())
}
