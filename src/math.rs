//! Mathematical Utilities for the Strata Engine
//!
//! Safe arithmetic and the fixed-point conversions shared by the rebase,
//! spillover, and liquidity modules. All intermediate products widen to
//! u128 and are checked.

use crate::constants::precision;
use crate::errors::{StrataError, StrataResult};

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> StrataResult<u64> {
    a.checked_add(b).ok_or(StrataError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> StrataResult<u64> {
    a.checked_sub(b).ok_or(StrataError::Underflow)
}

/// a * b / denominator with full u128 intermediate precision
pub fn mul_div(a: u128, b: u128, denominator: u128) -> StrataResult<u128> {
    if denominator == 0 {
        return Err(StrataError::DivisionByZero);
    }
    a.checked_mul(b)
        .ok_or(StrataError::Overflow)
        .map(|product| product / denominator)
}

/// Basis-point share of an amount: `amount * bps / 10_000`
pub fn bps_of(amount: u64, bps: u64) -> StrataResult<u64> {
    let result = mul_div(
        amount as u128,
        bps as u128,
        precision::BPS_DENOMINATOR as u128,
    )?;
    narrow(result)
}

/// Balance represented by `shares` at the given 18-decimal index
pub fn balance_from_shares(shares: u128, index: u128) -> StrataResult<u64> {
    narrow(mul_div(shares, index, precision::INDEX_ONE)?)
}

/// Shares required to represent `balance` at the given index.
///
/// Debits round up so an account can never move more value than
/// `balance_of` reports; credits round down.
pub fn shares_from_balance(balance: u64, index: u128, round_up: bool) -> StrataResult<u128> {
    if index == 0 {
        return Err(StrataError::DivisionByZero);
    }
    let scaled = (balance as u128)
        .checked_mul(precision::INDEX_ONE)
        .ok_or(StrataError::Overflow)?;
    let mut shares = scaled / index;
    if round_up && scaled % index != 0 {
        shares = shares.checked_add(1).ok_or(StrataError::Overflow)?;
    }
    Ok(shares)
}

/// Settlement value of `lp_units` at an 18-decimal LP price
pub fn lp_to_usd(lp_units: u64, lp_price: u128) -> StrataResult<u64> {
    narrow(mul_div(lp_units as u128, lp_price, precision::PRICE_ONE)?)
}

/// LP units whose settlement value covers `amount_usd` at the given price.
///
/// Rounds up: the converted LP must be worth at least the requested amount.
pub fn lp_for_usd(amount_usd: u64, lp_price: u128) -> StrataResult<u64> {
    if lp_price == 0 {
        return Err(StrataError::DivisionByZero);
    }
    let scaled = (amount_usd as u128)
        .checked_mul(precision::PRICE_ONE)
        .ok_or(StrataError::Overflow)?;
    let mut units = scaled / lp_price;
    if scaled % lp_price != 0 {
        units = units.checked_add(1).ok_or(StrataError::Overflow)?;
    }
    narrow(units)
}

/// Signed profit/loss amount for a value at `profit_bps`.
///
/// Returns the unsigned magnitude; the caller keeps the sign.
pub fn pnl_magnitude(value: u64, profit_bps: i64) -> StrataResult<u64> {
    bps_of(value, profit_bps.unsigned_abs())
}

fn narrow(value: u128) -> StrataResult<u64> {
    if value > u64::MAX as u128 {
        return Err(StrataError::Overflow);
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{precision::INDEX_ONE, usd::ONE};

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(1_000_000 * ONE, 500).unwrap(), 50_000 * ONE);
        assert_eq!(bps_of(1_000_000 * ONE, 200).unwrap(), 20_000 * ONE);
        assert_eq!(bps_of(0, 500).unwrap(), 0);
    }

    #[test]
    fn test_balance_from_shares() {
        // 1000 shares at index 1.15 = 1150
        let index = INDEX_ONE + INDEX_ONE * 15 / 100;
        let balance = balance_from_shares(1000 * ONE as u128, index).unwrap();
        assert_eq!(balance, 1150 * ONE);

        // Index of exactly one is the identity
        assert_eq!(
            balance_from_shares(42 * ONE as u128, INDEX_ONE).unwrap(),
            42 * ONE
        );
    }

    #[test]
    fn test_shares_round_trip_never_gains_value() {
        let index = INDEX_ONE + 123_456_789;
        let balance = 777 * ONE;
        let shares = shares_from_balance(balance, index, true).unwrap();
        let back = balance_from_shares(shares, index).unwrap();
        // Rounding up on the debit side covers at least the requested balance
        assert!(back >= balance);
        assert!(back <= balance + 1);
    }

    #[test]
    fn test_lp_conversions() {
        // LP trades at 2.0 USD
        let price = 2 * crate::constants::precision::PRICE_ONE;
        assert_eq!(lp_to_usd(500, price).unwrap(), 1000);
        assert_eq!(lp_for_usd(1000, price).unwrap(), 500);
        // Rounds up on uneven division
        assert_eq!(lp_for_usd(1001, price).unwrap(), 501);
    }

    #[test]
    fn test_pnl_magnitude() {
        assert_eq!(pnl_magnitude(1_000_000 * ONE, 500).unwrap(), 50_000 * ONE);
        assert_eq!(pnl_magnitude(1_000_000 * ONE, -300).unwrap(), 30_000 * ONE);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(mul_div(1, 1, 0), Err(StrataError::DivisionByZero));
        assert_eq!(lp_for_usd(1, 0), Err(StrataError::DivisionByZero));
        assert_eq!(
            shares_from_balance(1, 0, false),
            Err(StrataError::DivisionByZero)
        );
    }

    #[test]
    fn test_overflow_detection() {
        assert_eq!(safe_add(u64::MAX, 1), Err(StrataError::Overflow));
        assert_eq!(safe_sub(0, 1), Err(StrataError::Underflow));
        assert_eq!(
            mul_div(u128::MAX, 2, 1),
            Err(StrataError::Overflow)
        );
    }
}
