//! Withdrawal Liquidity Module
//!
//! Guarantees a tranche holds enough settlement asset to satisfy a pending
//! withdrawal by draining its staking venue and then the liquidity hook,
//! with bounded retries and full rollback on failure.
//!
//! ## Key Features
//!
//! - **Bounded retries**: at most three liquidation attempts per call
//! - **Minimal liquidation**: the deficit is recomputed before every
//!   attempt, so the hook is never asked for more than is missing
//! - **LP only**: only LP positions are drained; raw non-LP holdings must
//!   be converted through the reserve-action path first
//! - **All-or-nothing**: a failed ensure restores the entry state of the
//!   tranche funds, hook, and staking venue

use crate::constants::liquidity;
use crate::errors::{StrataError, StrataResult};
use crate::events::{EventLog, StrataEvent};
use crate::types::{Address, TrancheFunds, TrancheId};

// ============================================================================
// Collaborator Contracts
// ============================================================================

/// Failures surfaced by the external hook. Inside the ensure loop these are
/// swallowed per attempt; everywhere else they abort the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookError {
    /// Hook holds no LP to liquidate
    InsufficientLp,
    /// Realized output fell below the hook's enforced floor
    SlippageViolation { expected: u64, received: u64 },
    /// Aggregator or pool call failed
    SwapFailed { reason: &'static str },
}

impl From<HookError> for StrataError {
    fn from(err: HookError) -> Self {
        StrataError::HookCallFailed {
            reason: match err {
                HookError::InsufficientLp => "insufficient lp",
                HookError::SlippageViolation { .. } => "slippage violation",
                HookError::SwapFailed { reason } => reason,
            },
        }
    }
}

/// External collaborator owning the shared LP position.
///
/// The hook performs burns and swaps; this engine never inspects pool
/// mechanics. `liquidate_lp_for_amount` burns the LP quantity whose
/// settlement-leg proceeds are expected to cover the request, transfers
/// only the settlement leg, and enforces a floor of
/// [`liquidity::MIN_OUTPUT_BPS`] on realized versus quoted proceeds; the
/// non-settlement leg stays in the hook pending an operator-triggered
/// conversion. A partial fill from running out of LP is not a slippage
/// violation.
///
/// The reference environment rolls collaborator state back when an
/// operation reverts; call sites model that by cloning the hook at entry
/// and restoring the clone on failure, hence the `Clone` bounds.
pub trait LiquidityHook {
    /// Settlement/deposit asset identity
    fn stablecoin(&self) -> Address;

    /// LP units currently held by the hook
    fn lp_available(&self) -> u64;

    /// Burn LP to produce `amount` of settlement asset; returns the
    /// settlement actually received
    fn liquidate_lp_for_amount(&mut self, amount: u64) -> Result<u64, HookError>;

    /// Accept LP units released from an external staking venue
    fn receive_lp(&mut self, lp_units: u64);

    /// Move an idle token into the LP position; returns LP units minted
    fn invest(&mut self, token: Address, amount: u64) -> Result<u64, HookError>;

    /// Swap through an external aggregator; payloads are opaque
    fn swap_via_aggregator(
        &mut self,
        token_in: Address,
        token_out: Address,
        amount_in: u64,
        swap_data: &[u8],
        aggregator: Address,
    ) -> Result<u64, HookError>;

    /// Swap a non-settlement token held by the hook into the settlement
    /// asset and return it to the vault
    fn admin_swap_and_return_to_vault(
        &mut self,
        token: Address,
        amount: u64,
        swap_data: &[u8],
        aggregator: Address,
    ) -> Result<u64, HookError>;

    /// Burn LP (`lp_amount == 0` burns the entire position) and swap both
    /// legs into `token_out`; the aux payload routes the second leg
    #[allow(clippy::too_many_arguments)]
    fn admin_liquidate_position(
        &mut self,
        lp_amount: u64,
        token_out: Address,
        swap_data: &[u8],
        aggregator: Address,
        aux_data: &[u8],
        aux_aggregator: Address,
    ) -> Result<u64, HookError>;

    /// Move a token held by the hook back to the vault verbatim
    fn admin_rescue_tokens(&mut self, token: Address) -> Result<u64, HookError>;
}

/// External reward/staking venue holding a tranche's parked LP.
pub trait StakingVenue {
    /// LP units currently staked
    fn staked_lp(&self) -> u64;

    /// Release the LP quantity whose settlement value covers `amount_usd`
    /// (best effort); returns LP units released
    fn unstake_for_amount(&mut self, amount_usd: u64) -> Result<u64, HookError>;
}

// ============================================================================
// Ensure Loop
// ============================================================================

/// Outcome of a successful liquidity-ensure pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityOutcome {
    /// Settlement amount that had to be available
    pub amount_needed: u64,
    /// Settlement balance at entry
    pub starting_balance: u64,
    /// Settlement balance on return
    pub final_balance: u64,
    /// Liquidation attempts performed (0 = balance was already sufficient)
    pub attempts: u8,
    /// LP units released from the staking venue
    pub unstaked_lp: u64,
    /// Settlement received from hook liquidations
    pub liquidated_settlement: u64,
}

/// Ensure the tranche's settlement balance covers `amount_needed`.
///
/// Returns immediately with no side effects when the balance already
/// suffices. Otherwise performs up to
/// [`liquidity::MAX_LIQUIDATION_ATTEMPTS`] passes of staking drain plus
/// hook liquidation, swallowing per-attempt hook failures. If the balance
/// is still short after the loop, the entry state of funds, hook, and
/// venue is restored and `InsufficientLiquidity` is returned - the caller
/// never observes a partially liquidated state.
pub fn ensure_liquidity_available<H, S>(
    tranche: TrancheId,
    funds: &mut TrancheFunds,
    hook: &mut H,
    mut staking: Option<&mut S>,
    amount_needed: u64,
    events: &mut EventLog,
    now: u64,
) -> StrataResult<LiquidityOutcome>
where
    H: LiquidityHook + Clone,
    S: StakingVenue + Clone,
{
    let starting_balance = funds.settlement_balance;
    if starting_balance >= amount_needed {
        return Ok(LiquidityOutcome {
            amount_needed,
            starting_balance,
            final_balance: starting_balance,
            attempts: 0,
            unstaked_lp: 0,
            liquidated_settlement: 0,
        });
    }

    let funds_snapshot = funds.clone();
    let hook_snapshot = hook.clone();
    let staking_snapshot = staking.as_ref().map(|venue| (**venue).clone());

    let mut attempts: u8 = 0;
    let mut unstaked_lp: u64 = 0;
    let mut liquidated_settlement: u64 = 0;

    for _ in 0..liquidity::MAX_LIQUIDATION_ATTEMPTS {
        if funds.settlement_balance >= amount_needed {
            break;
        }
        attempts += 1;
        let deficit = amount_needed - funds.settlement_balance;

        // Drain the staking venue first; unstaking failures are swallowed
        // and the flow continues to the hook.
        if let Some(venue) = staking.as_deref_mut() {
            if venue.staked_lp() > 0 {
                if let Ok(released) = venue.unstake_for_amount(deficit) {
                    hook.receive_lp(released);
                    unstaked_lp = unstaked_lp.saturating_add(released);
                }
            }
        }

        // A failed attempt (including slippage) is abandoned for this
        // iteration; the loop re-evaluates the balance.
        if let Ok(received) = hook.liquidate_lp_for_amount(deficit) {
            funds.settlement_balance = funds.settlement_balance.saturating_add(received);
            liquidated_settlement = liquidated_settlement.saturating_add(received);
        }
    }

    if funds.settlement_balance >= amount_needed {
        let outcome = LiquidityOutcome {
            amount_needed,
            starting_balance,
            final_balance: funds.settlement_balance,
            attempts,
            unstaked_lp,
            liquidated_settlement,
        };
        events.emit(StrataEvent::LiquidityEnsured {
            tranche,
            amount_needed,
            starting_balance,
            final_balance: funds.settlement_balance,
            attempts,
            timestamp: now,
        });
        Ok(outcome)
    } else {
        *funds = funds_snapshot;
        *hook = hook_snapshot;
        if let (Some(slot), Some(snapshot)) = (staking.as_deref_mut(), staking_snapshot) {
            *slot = snapshot;
        }
        Err(StrataError::InsufficientLiquidity {
            needed: amount_needed,
            available: starting_balance,
            attempts,
        })
    }
}

// ============================================================================
// Test Doubles
// ============================================================================

#[cfg(test)]
pub(crate) mod testkit {
    use super::*;
    use crate::constants::liquidity::MIN_OUTPUT_BPS;
    use crate::constants::precision::BPS_DENOMINATOR;
    use crate::math::{lp_for_usd, lp_to_usd};
    use crate::BTreeMap;

    /// In-memory hook with a single LP position priced at `lp_price`
    /// (18-decimal settlement per LP unit) and a configurable slippage.
    #[derive(Debug, Clone)]
    pub struct MockHook {
        pub stable: Address,
        pub lp_units: u64,
        pub lp_price: u128,
        pub slippage_bps: u64,
        pub fail_swaps: bool,
        pub held_tokens: BTreeMap<Address, u64>,
    }

    impl MockHook {
        pub fn new(lp_units: u64, lp_price: u128) -> Self {
            Self {
                stable: [0xEEu8; 32],
                lp_units,
                lp_price,
                slippage_bps: 0,
                fail_swaps: false,
                held_tokens: BTreeMap::new(),
            }
        }

        fn after_slippage(&self, quoted: u64) -> u64 {
            (quoted as u128 * (BPS_DENOMINATOR - self.slippage_bps) as u128
                / BPS_DENOMINATOR as u128) as u64
        }
    }

    impl LiquidityHook for MockHook {
        fn stablecoin(&self) -> Address {
            self.stable
        }

        fn lp_available(&self) -> u64 {
            self.lp_units
        }

        fn liquidate_lp_for_amount(&mut self, amount: u64) -> Result<u64, HookError> {
            if self.lp_units == 0 {
                return Err(HookError::InsufficientLp);
            }
            let lp_needed = lp_for_usd(amount, self.lp_price)
                .map_err(|_| HookError::SwapFailed { reason: "lp sizing" })?;
            let burned = lp_needed.min(self.lp_units);
            let quoted = lp_to_usd(burned, self.lp_price)
                .map_err(|_| HookError::SwapFailed { reason: "lp quote" })?;
            let received = self.after_slippage(quoted);
            let floor = (quoted as u128 * MIN_OUTPUT_BPS as u128 / BPS_DENOMINATOR as u128) as u64;
            if received < floor {
                return Err(HookError::SlippageViolation {
                    expected: floor,
                    received,
                });
            }
            self.lp_units -= burned;
            Ok(received)
        }

        fn receive_lp(&mut self, lp_units: u64) {
            self.lp_units = self.lp_units.saturating_add(lp_units);
        }

        fn invest(&mut self, _token: Address, amount: u64) -> Result<u64, HookError> {
            if self.fail_swaps {
                return Err(HookError::SwapFailed { reason: "pool unavailable" });
            }
            let minted = lp_for_usd(amount, self.lp_price)
                .map_err(|_| HookError::SwapFailed { reason: "lp sizing" })?;
            self.lp_units = self.lp_units.saturating_add(minted);
            Ok(minted)
        }

        fn swap_via_aggregator(
            &mut self,
            _token_in: Address,
            _token_out: Address,
            amount_in: u64,
            _swap_data: &[u8],
            _aggregator: Address,
        ) -> Result<u64, HookError> {
            if self.fail_swaps {
                return Err(HookError::SwapFailed { reason: "aggregator revert" });
            }
            Ok(self.after_slippage(amount_in))
        }

        fn admin_swap_and_return_to_vault(
            &mut self,
            token: Address,
            amount: u64,
            _swap_data: &[u8],
            _aggregator: Address,
        ) -> Result<u64, HookError> {
            if self.fail_swaps {
                return Err(HookError::SwapFailed { reason: "aggregator revert" });
            }
            let held = self.held_tokens.get(&token).copied().unwrap_or(0);
            if held < amount {
                return Err(HookError::SwapFailed { reason: "token not held" });
            }
            self.held_tokens.insert(token, held - amount);
            Ok(self.after_slippage(amount))
        }

        fn admin_liquidate_position(
            &mut self,
            lp_amount: u64,
            _token_out: Address,
            _swap_data: &[u8],
            _aggregator: Address,
            _aux_data: &[u8],
            _aux_aggregator: Address,
        ) -> Result<u64, HookError> {
            if self.fail_swaps {
                return Err(HookError::SwapFailed { reason: "aggregator revert" });
            }
            let burned = if lp_amount == 0 {
                self.lp_units
            } else {
                lp_amount.min(self.lp_units)
            };
            if burned == 0 {
                return Err(HookError::InsufficientLp);
            }
            let quoted = lp_to_usd(burned, self.lp_price)
                .map_err(|_| HookError::SwapFailed { reason: "lp quote" })?;
            self.lp_units -= burned;
            Ok(self.after_slippage(quoted))
        }

        fn admin_rescue_tokens(&mut self, token: Address) -> Result<u64, HookError> {
            let held = self.held_tokens.remove(&token).unwrap_or(0);
            Ok(held)
        }
    }

    /// Staking venue releasing LP sized by the same price as the hook.
    #[derive(Debug, Clone)]
    pub struct MockStaking {
        pub staked: u64,
        pub lp_price: u128,
        pub fail_unstake: bool,
    }

    impl StakingVenue for MockStaking {
        fn staked_lp(&self) -> u64 {
            self.staked
        }

        fn unstake_for_amount(&mut self, amount_usd: u64) -> Result<u64, HookError> {
            if self.fail_unstake {
                return Err(HookError::SwapFailed { reason: "venue paused" });
            }
            let lp_needed = lp_for_usd(amount_usd, self.lp_price)
                .map_err(|_| HookError::SwapFailed { reason: "lp sizing" })?;
            let released = lp_needed.min(self.staked);
            self.staked -= released;
            Ok(released)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::testkit::{MockHook, MockStaking};
    use super::*;
    use crate::constants::precision::PRICE_ONE;
    use crate::constants::usd::ONE;
    use crate::events::EventType;

    const NOW: u64 = 1_700_000_000;

    fn funds_with(settlement: u64) -> TrancheFunds {
        TrancheFunds {
            settlement_balance: settlement,
            ..TrancheFunds::new()
        }
    }

    #[test]
    fn test_sufficient_balance_returns_immediately() {
        let mut funds = funds_with(1000 * ONE);
        let mut hook = MockHook::new(500 * ONE, PRICE_ONE);
        let mut events = EventLog::new();

        let outcome = ensure_liquidity_available::<_, MockStaking>(
            TrancheId::Senior,
            &mut funds,
            &mut hook,
            None,
            800 * ONE,
            &mut events,
            NOW,
        )
        .unwrap();

        assert_eq!(outcome.attempts, 0);
        assert_eq!(funds.settlement_balance, 1000 * ONE);
        assert_eq!(hook.lp_units, 500 * ONE);
        // No side effects means no event
        assert!(events.is_empty());
    }

    #[test]
    fn test_single_liquidation_covers_deficit() {
        let mut funds = funds_with(200 * ONE);
        let mut hook = MockHook::new(10_000 * ONE, PRICE_ONE);
        let mut events = EventLog::new();

        let outcome = ensure_liquidity_available::<_, MockStaking>(
            TrancheId::Junior,
            &mut funds,
            &mut hook,
            None,
            1000 * ONE,
            &mut events,
            NOW,
        )
        .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.liquidated_settlement, 800 * ONE);
        assert_eq!(funds.settlement_balance, 1000 * ONE);
        // Only the deficit was liquidated
        assert_eq!(hook.lp_units, 9_200 * ONE);
        assert_eq!(events.filter_by_type(EventType::LiquidityEnsured).len(), 1);
    }

    #[test]
    fn test_bounded_attempts_and_rollback() {
        // Needs 1000, holds 200, hook redeems only 500 in one call, then runs dry.
        let mut funds = funds_with(200 * ONE);
        let mut hook = MockHook::new(500 * ONE, PRICE_ONE);
        let mut events = EventLog::new();

        let err = ensure_liquidity_available::<_, MockStaking>(
            TrancheId::Senior,
            &mut funds,
            &mut hook,
            None,
            1000 * ONE,
            &mut events,
            NOW,
        )
        .unwrap_err();

        assert_eq!(
            err,
            StrataError::InsufficientLiquidity {
                needed: 1000 * ONE,
                available: 200 * ONE,
                attempts: 3,
            }
        );
        // Full rollback: the 500 gained mid-loop is not observable
        assert_eq!(funds.settlement_balance, 200 * ONE);
        assert_eq!(hook.lp_units, 500 * ONE);
        assert!(events.is_empty());
    }

    #[test]
    fn test_staking_drained_before_hook() {
        // Hook starts empty; everything must come through the venue.
        let mut funds = funds_with(0);
        let mut hook = MockHook::new(0, PRICE_ONE);
        let mut staking = MockStaking {
            staked: 2_000 * ONE,
            lp_price: PRICE_ONE,
            fail_unstake: false,
        };
        let mut events = EventLog::new();

        let outcome = ensure_liquidity_available(
            TrancheId::Reserve,
            &mut funds,
            &mut hook,
            Some(&mut staking),
            600 * ONE,
            &mut events,
            NOW,
        )
        .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.unstaked_lp, 600 * ONE);
        assert_eq!(funds.settlement_balance, 600 * ONE);
        assert_eq!(staking.staked, 1_400 * ONE);
    }

    #[test]
    fn test_unstake_failure_is_swallowed() {
        let mut funds = funds_with(100 * ONE);
        let mut hook = MockHook::new(5_000 * ONE, PRICE_ONE);
        let mut staking = MockStaking {
            staked: 1_000 * ONE,
            lp_price: PRICE_ONE,
            fail_unstake: true,
        };
        let mut events = EventLog::new();

        // The venue fails but the hook still covers the deficit.
        let outcome = ensure_liquidity_available(
            TrancheId::Senior,
            &mut funds,
            &mut hook,
            Some(&mut staking),
            500 * ONE,
            &mut events,
            NOW,
        )
        .unwrap();

        assert_eq!(outcome.unstaked_lp, 0);
        assert_eq!(funds.settlement_balance, 500 * ONE);
        assert_eq!(staking.staked, 1_000 * ONE);
    }

    #[test]
    fn test_rollback_restores_staking_venue() {
        let mut funds = funds_with(0);
        let mut hook = MockHook::new(0, PRICE_ONE);
        let mut staking = MockStaking {
            staked: 100 * ONE,
            lp_price: PRICE_ONE,
            fail_unstake: false,
        };
        let mut events = EventLog::new();

        let err = ensure_liquidity_available(
            TrancheId::Senior,
            &mut funds,
            &mut hook,
            Some(&mut staking),
            1000 * ONE,
            &mut events,
            NOW,
        )
        .unwrap_err();

        assert!(matches!(err, StrataError::InsufficientLiquidity { .. }));
        // Venue state restored along with funds and hook
        assert_eq!(staking.staked, 100 * ONE);
        assert_eq!(hook.lp_units, 0);
        assert_eq!(funds.settlement_balance, 0);
    }

    #[test]
    fn test_slippage_failure_is_caught_per_attempt() {
        let mut funds = funds_with(200 * ONE);
        let mut hook = MockHook::new(10_000 * ONE, PRICE_ONE);
        hook.slippage_bps = 600; // worse than the 5% floor
        let mut events = EventLog::new();

        let err = ensure_liquidity_available::<_, MockStaking>(
            TrancheId::Senior,
            &mut funds,
            &mut hook,
            None,
            1000 * ONE,
            &mut events,
            NOW,
        )
        .unwrap_err();

        // Every attempt failed on slippage; nothing was burned
        assert!(matches!(
            err,
            StrataError::InsufficientLiquidity { attempts: 3, .. }
        ));
        assert_eq!(hook.lp_units, 10_000 * ONE);
        assert_eq!(funds.settlement_balance, 200 * ONE);
    }
}
