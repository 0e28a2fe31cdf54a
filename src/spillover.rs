//! Profit Spillover & Loss Backstop Waterfall
//!
//! The periodic valuation update applied to the Senior tranche and
//! redistributed across the group.
//!
//! ## Key Features
//!
//! - **Profit leg**: Senior keeps its target yield plus a minority share
//!   of the excess; the majority of the excess spills to Junior
//! - **Loss leg**: Reserve is drawn first, Junior second, and only the
//!   residual lands on Senior holders
//! - **Rate limiting**: one update per cooldown window, with the signal
//!   bounded to a hard basis-point band
//! - **Compute then apply**: the split is derived from the pre-update
//!   value before any ledger moves

use crate::constants::{spillover, valuation};
use crate::errors::{StrataError, StrataResult};
use crate::events::StrataEvent;
use crate::math::{bps_of, pnl_magnitude, safe_sub};
use crate::tranche::{BackstopDraw, VaultGroup};
use crate::types::Address;
use crate::validation::{validate_lp_price, validate_profit_bps};

// ============================================================================
// Profit Split
// ============================================================================

/// How a profit signal divides between Senior and Junior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfitSplit {
    /// Gain retained by Senior
    pub senior_gain: u64,
    /// Excess spilled to Junior
    pub spilled: u64,
}

/// Split `pnl` (a profit) against the target yield on `old_value`.
///
/// Profit up to the target stays with Senior in full. Of the excess above
/// the target, [`spillover::SPILLOVER_SHARE_BPS`] goes to Junior and the
/// rest stays with Senior.
pub fn split_profit(old_value: u64, pnl: u64) -> StrataResult<ProfitSplit> {
    let target = bps_of(old_value, spillover::TARGET_YIELD_BPS)?;
    if pnl <= target {
        return Ok(ProfitSplit {
            senior_gain: pnl,
            spilled: 0,
        });
    }
    let excess = safe_sub(pnl, target)?;
    let spilled = bps_of(excess, spillover::SPILLOVER_SHARE_BPS)?;
    Ok(ProfitSplit {
        senior_gain: safe_sub(pnl, spilled)?,
        spilled,
    })
}

// ============================================================================
// Valuation Update
// ============================================================================

/// Full account of one valuation update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueUpdateOutcome {
    /// Senior value before the update
    pub old_value: u64,
    /// Senior value after all waterfall legs
    pub new_value: u64,
    /// Signal that produced this update
    pub profit_bps: i64,
    /// Profit spilled to Junior (profit leg only)
    pub spilled: u64,
    /// Reserve backstop draw (loss leg only)
    pub reserve_draw: BackstopDraw,
    /// Junior backstop draw (loss leg only)
    pub junior_draw: BackstopDraw,
    /// Loss left on Senior holders after both draws
    pub residual_loss: u64,
}

impl VaultGroup {
    /// Apply the periodic profit/loss signal to Senior and run the
    /// spillover/backstop waterfall.
    ///
    /// Operator-only, rate-limited to one call per
    /// [`valuation::UPDATE_COOLDOWN_SECS`], with `profit_bps` bounded to
    /// the accepted band. `lp_price` sizes the LP leg of backstop asset
    /// transfers. On the loss leg the draws are best effort: a provider
    /// delivers at most its own value and a thin provider is a partial
    /// fill, never an error.
    pub fn update_vault_value(
        &mut self,
        caller: Address,
        profit_bps: i64,
        lp_price: u128,
        now: u64,
    ) -> StrataResult<ValueUpdateOutcome> {
        self.operators.require_operator(caller)?;
        validate_profit_bps(profit_bps)?;
        validate_lp_price(lp_price)?;
        self.guard.enter()?;

        // The waterfall mutates several tranches in sequence; if any leg
        // fails, restore every piece it may have touched.
        let snapshot = (
            self.senior.clone(),
            self.junior.clone(),
            self.reserve.clone(),
            self.spillover,
            self.events.clone(),
        );
        let result = self.apply_value_update(profit_bps, lp_price, now);
        if result.is_err() {
            self.senior = snapshot.0;
            self.junior = snapshot.1;
            self.reserve = snapshot.2;
            self.spillover = snapshot.3;
            self.events = snapshot.4;
        }
        self.guard.exit();
        result
    }

    fn apply_value_update(
        &mut self,
        profit_bps: i64,
        lp_price: u128,
        now: u64,
    ) -> StrataResult<ValueUpdateOutcome> {
        let last = self.senior.ledger().last_update_time();
        if now < last {
            return Err(StrataError::TimestampNotMonotonic {
                last,
                proposed: now,
            });
        }
        let elapsed = now - last;
        if elapsed < valuation::UPDATE_COOLDOWN_SECS {
            return Err(StrataError::CooldownActive {
                elapsed,
                required: valuation::UPDATE_COOLDOWN_SECS,
            });
        }

        let old_value = self.senior.value();
        let pnl = pnl_magnitude(old_value, profit_bps)?;

        let mut outcome = ValueUpdateOutcome {
            old_value,
            profit_bps,
            ..ValueUpdateOutcome::default()
        };

        if profit_bps > 0 {
            let split = split_profit(old_value, pnl)?;
            self.senior.absorb_gain(split.senior_gain)?;
            self.junior.receive_spillover(split.spilled)?;
            if split.spilled > 0 {
                self.spillover.record_spillover(split.spilled);
                self.events.emit(StrataEvent::SpilloverReceived {
                    amount: split.spilled,
                    total_spillover_received: self.spillover.total_spillover_received,
                    timestamp: now,
                });
            }
            outcome.spilled = split.spilled;
        } else if profit_bps < 0 {
            // Loss waterfall: the full loss hits Senior, then Reserve and
            // Junior recapitalize it in order.
            self.senior.absorb_loss(pnl)?;

            let reserve_draw = self.reserve.provide_backstop(pnl, lp_price)?;
            self.senior.absorb_backstop(&reserve_draw)?;
            self.record_draw(&reserve_draw, now);

            let remaining = safe_sub(pnl, reserve_draw.provided)?;
            let junior_draw = self.junior.provide_backstop(remaining, lp_price)?;
            self.senior.absorb_backstop(&junior_draw)?;
            self.record_draw(&junior_draw, now);

            outcome.reserve_draw = reserve_draw;
            outcome.junior_draw = junior_draw;
            outcome.residual_loss = safe_sub(remaining, junior_draw.provided)?;
        }

        self.senior.ledger_mut().touch(now)?;
        outcome.new_value = self.senior.value();
        self.events.emit(StrataEvent::VaultValueUpdated {
            old_value,
            new_value: outcome.new_value,
            profit_bps,
            timestamp: now,
        });
        Ok(outcome)
    }

    fn record_draw(&mut self, draw: &BackstopDraw, now: u64) {
        if draw.provided == 0 {
            return;
        }
        self.spillover.record_backstop(draw.provider, draw.provided);
        self.events.emit(StrataEvent::BackstopProvided {
            provider: draw.provider,
            requested: draw.requested,
            provided: draw.provided,
            settlement_moved: draw.settlement_moved,
            lp_moved: draw.lp_moved,
            timestamp: now,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::precision::PRICE_ONE;
    use crate::constants::usd::ONE;
    use crate::events::EventType;
    use crate::types::TrancheId;

    const T0: u64 = 1_700_000_000;
    const LATER: u64 = T0 + valuation::UPDATE_COOLDOWN_SECS;

    fn admin() -> Address {
        [0xAAu8; 32]
    }

    fn alice() -> Address {
        [1u8; 32]
    }

    fn seeded_group(senior: u64, junior: u64, reserve: u64) -> VaultGroup {
        let mut group = VaultGroup::new(admin(), T0).unwrap();
        if senior > 0 {
            group.deposit(TrancheId::Senior, alice(), senior, T0).unwrap();
        }
        if junior > 0 {
            group.deposit(TrancheId::Junior, alice(), junior, T0).unwrap();
        }
        if reserve > 0 {
            group.deposit(TrancheId::Reserve, alice(), reserve, T0).unwrap();
        }
        group
    }

    #[test]
    fn test_split_profit_above_target() {
        // 5% on 1M: 50k pnl, 20k target, 30k excess, 24k spills
        let split = split_profit(1_000_000 * ONE, 50_000 * ONE).unwrap();
        assert_eq!(split.spilled, 24_000 * ONE);
        assert_eq!(split.senior_gain, 26_000 * ONE);
    }

    #[test]
    fn test_split_profit_at_or_below_target() {
        let split = split_profit(1_000_000 * ONE, 20_000 * ONE).unwrap();
        assert_eq!(split.spilled, 0);
        assert_eq!(split.senior_gain, 20_000 * ONE);
    }

    #[test]
    fn test_profit_update_spills_to_junior() {
        let mut group = seeded_group(1_000_000 * ONE, 100_000 * ONE, 0);

        let outcome = group
            .update_vault_value(admin(), 500, PRICE_ONE, LATER)
            .unwrap();

        assert_eq!(outcome.old_value, 1_000_000 * ONE);
        assert_eq!(outcome.new_value, 1_026_000 * ONE);
        assert_eq!(outcome.spilled, 24_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Senior).value(), 1_026_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Junior).value(), 124_000 * ONE);
        assert_eq!(group.spillover_ledger().total_spillover_received, 24_000 * ONE);
        assert_eq!(
            group.events().filter_by_type(EventType::SpilloverReceived).len(),
            1
        );
        assert_eq!(
            group.events().filter_by_type(EventType::VaultValueUpdated).len(),
            1
        );
    }

    #[test]
    fn test_modest_profit_stays_with_senior() {
        let mut group = seeded_group(1_000_000 * ONE, 100_000 * ONE, 0);

        // 1.5% is under the 2% target
        let outcome = group
            .update_vault_value(admin(), 150, PRICE_ONE, LATER)
            .unwrap();

        assert_eq!(outcome.spilled, 0);
        assert_eq!(group.tranche(TrancheId::Senior).value(), 1_015_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Junior).value(), 100_000 * ONE);
        assert!(group.events().filter_by_type(EventType::SpilloverReceived).is_empty());
    }

    #[test]
    fn test_loss_covered_entirely_by_reserve() {
        let mut group = seeded_group(1_000_000 * ONE, 100_000 * ONE, 50_000 * ONE);

        // 3% loss = 30k, Reserve holds 50k
        let outcome = group
            .update_vault_value(admin(), -300, PRICE_ONE, LATER)
            .unwrap();

        assert_eq!(outcome.reserve_draw.provided, 30_000 * ONE);
        assert_eq!(outcome.junior_draw.provided, 0);
        assert_eq!(outcome.residual_loss, 0);
        // Senior made whole
        assert_eq!(group.tranche(TrancheId::Senior).value(), 1_000_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Reserve).value(), 20_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Junior).value(), 100_000 * ONE);
        assert_eq!(
            group.spillover_ledger().backstop_provided_by(TrancheId::Reserve),
            30_000 * ONE
        );
    }

    #[test]
    fn test_loss_cascades_reserve_then_junior() {
        let mut group = seeded_group(1_000_000 * ONE, 100_000 * ONE, 10_000 * ONE);

        // 3% loss = 30k: Reserve covers 10k, Junior covers 20k
        let outcome = group
            .update_vault_value(admin(), -300, PRICE_ONE, LATER)
            .unwrap();

        assert_eq!(outcome.reserve_draw.provided, 10_000 * ONE);
        assert_eq!(outcome.junior_draw.provided, 20_000 * ONE);
        assert_eq!(outcome.residual_loss, 0);
        assert_eq!(group.tranche(TrancheId::Senior).value(), 1_000_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Reserve).value(), 0);
        assert_eq!(group.tranche(TrancheId::Junior).value(), 80_000 * ONE);
        assert_eq!(
            group.events().filter_by_type(EventType::BackstopProvided).len(),
            2
        );
    }

    #[test]
    fn test_residual_loss_lands_on_senior() {
        let mut group = seeded_group(1_000_000 * ONE, 5_000 * ONE, 5_000 * ONE);

        // 3% loss = 30k, backstops only cover 10k
        let outcome = group
            .update_vault_value(admin(), -300, PRICE_ONE, LATER)
            .unwrap();

        assert_eq!(outcome.residual_loss, 20_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Senior).value(), 980_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Reserve).value(), 0);
        assert_eq!(group.tranche(TrancheId::Junior).value(), 0);
        // Senior holders absorbed the residual
        assert_eq!(
            group.tranche(TrancheId::Senior).balance_of(&alice()),
            980_000 * ONE
        );
    }

    #[test]
    fn test_loss_waterfall_conserves_total_value() {
        let mut group = seeded_group(1_000_000 * ONE, 40_000 * ONE, 10_000 * ONE);
        let total_before: u64 = TrancheId::all()
            .iter()
            .map(|id| group.tranche(*id).value())
            .sum();

        group
            .update_vault_value(admin(), -400, PRICE_ONE, LATER)
            .unwrap();

        let total_after: u64 = TrancheId::all()
            .iter()
            .map(|id| group.tranche(*id).value())
            .sum();
        // System as a whole lost exactly the signal, 4% of 1M
        assert_eq!(total_before - total_after, 40_000 * ONE);
    }

    #[test]
    fn test_cooldown_enforced() {
        let mut group = seeded_group(1_000_000 * ONE, 0, 0);

        let err = group
            .update_vault_value(admin(), 100, PRICE_ONE, LATER - 1)
            .unwrap_err();
        assert!(matches!(err, StrataError::CooldownActive { .. }));

        group.update_vault_value(admin(), 100, PRICE_ONE, LATER).unwrap();
        // The window restarts from the accepted update
        assert!(matches!(
            group.update_vault_value(admin(), 100, PRICE_ONE, LATER + 1),
            Err(StrataError::CooldownActive { .. })
        ));
    }

    #[test]
    fn test_signal_band_enforced() {
        let mut group = seeded_group(1_000_000 * ONE, 0, 0);
        assert!(matches!(
            group.update_vault_value(admin(), 5_001, PRICE_ONE, LATER),
            Err(StrataError::InvalidProfitBps { .. })
        ));
        assert!(matches!(
            group.update_vault_value(admin(), -5_001, PRICE_ONE, LATER),
            Err(StrataError::InvalidProfitBps { .. })
        ));
    }

    #[test]
    fn test_operator_required() {
        let mut group = seeded_group(1_000_000 * ONE, 0, 0);
        assert!(matches!(
            group.update_vault_value(alice(), 100, PRICE_ONE, LATER),
            Err(StrataError::Unauthorized { .. })
        ));

        // Granted operators may update
        group.operators_mut().grant_operator(admin(), alice()).unwrap();
        assert!(group.update_vault_value(alice(), 100, PRICE_ONE, LATER).is_ok());
    }

    #[test]
    fn test_failed_update_restores_all_tranches() {
        let mut group = seeded_group(1_000_000 * ONE, 0, 0);
        // A Junior book so large that crediting the spillover overflows,
        // after the Senior gain has already been applied
        group
            .deposit(TrancheId::Junior, alice(), u64::MAX - ONE, T0)
            .unwrap();
        let events_before = group.events().len();

        let err = group
            .update_vault_value(admin(), 500, PRICE_ONE, LATER)
            .unwrap_err();
        assert_eq!(err, StrataError::Overflow);

        // The half-applied profit leg was rolled back in full
        assert_eq!(group.tranche(TrancheId::Senior).value(), 1_000_000 * ONE);
        assert_eq!(group.tranche(TrancheId::Junior).value(), u64::MAX - ONE);
        assert_eq!(group.spillover_ledger().total_spillover_received, 0);
        assert_eq!(group.events().len(), events_before);
        // The cooldown window was not consumed and the lock was released
        assert_eq!(
            group.tranche(TrancheId::Senior).ledger().last_update_time(),
            T0
        );
        assert!(!group.guard.is_entered());
    }

    #[test]
    fn test_zero_signal_resets_cooldown_only() {
        let mut group = seeded_group(1_000_000 * ONE, 100_000 * ONE, 0);
        let outcome = group
            .update_vault_value(admin(), 0, PRICE_ONE, LATER)
            .unwrap();
        assert_eq!(outcome.old_value, outcome.new_value);
        assert_eq!(
            group.tranche(TrancheId::Senior).ledger().last_update_time(),
            LATER
        );
    }
}
