//! Reserve Action Dispatcher
//!
//! Operator-triggered treasury management for a tranche's directly held
//! funds: deploying idle assets into the LP position, converting stray
//! tokens back to the settlement asset, and unwinding positions.
//!
//! ## Key Features
//!
//! - **Tagged actions**: five action kinds with opaque routing payloads
//!   that are passed through to the hook untouched
//! - **Universal output floor**: every action checks its realized output
//!   against the caller-supplied `min_out`
//! - **All-or-nothing**: hook failures and floor violations restore the
//!   tranche funds and hook to their entry state
//! - **Receipts**: each executed action yields a digest-derived receipt id

use crate::errors::{StrataError, StrataResult};
use crate::events::StrataEvent;
use crate::liquidity::LiquidityHook;
use crate::tranche::VaultGroup;
use crate::types::{Address, ReceiptId, TrancheFunds, TrancheId};
use crate::validation::require_nonzero;
use crate::Vec;
use sha2::{Digest, Sha256};

// ============================================================================
// Actions
// ============================================================================

/// One treasury action against a tranche's funds.
///
/// `swap_data` / `aux_data` are opaque calldata for the hook's aggregator
/// calls; the engine never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveAction {
    /// Deploy a held token into the LP position
    InvestLp { token: Address, amount: u64 },

    /// Swap one held token for another through an aggregator
    SwapViaAggregator {
        token_in: Address,
        token_out: Address,
        amount_in: u64,
        swap_data: Vec<u8>,
        aggregator: Address,
    },

    /// Swap a token held by the hook into the settlement asset and
    /// return it to the tranche
    ReturnToVault {
        token: Address,
        amount: u64,
        swap_data: Vec<u8>,
        aggregator: Address,
    },

    /// Unwind LP (`lp_amount == 0` unwinds the tranche's whole claim)
    /// into `token_out`
    LiquidatePosition {
        lp_amount: u64,
        token_out: Address,
        swap_data: Vec<u8>,
        aggregator: Address,
        aux_data: Vec<u8>,
        aux_aggregator: Address,
    },

    /// Pull a stray token out of the hook verbatim
    RescueTokens { token: Address },
}

impl ReserveAction {
    /// Stable wire tag for events and receipts
    pub fn tag(&self) -> u8 {
        match self {
            Self::InvestLp { .. } => 0,
            Self::SwapViaAggregator { .. } => 1,
            Self::ReturnToVault { .. } => 2,
            Self::LiquidatePosition { .. } => 3,
            Self::RescueTokens { .. } => 4,
        }
    }
}

/// Proof of one executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveActionReceipt {
    /// Digest-derived identifier, unique per execution
    pub receipt_id: ReceiptId,
    /// Tranche the action ran against
    pub tranche: TrancheId,
    /// Action tag
    pub action: u8,
    /// Realized output (LP units for `InvestLp`, token units otherwise)
    pub received: u64,
    /// Floor the output was checked against
    pub min_out: u64,
}

// ============================================================================
// Dispatch
// ============================================================================

impl VaultGroup {
    /// Execute one treasury action against a tranche.
    ///
    /// Operator-only and guarded against reentrancy from the hook's
    /// external calls. The tranche funds and the hook are snapshotted at
    /// entry; any hook failure or a realized output below `min_out`
    /// restores both and surfaces the error.
    pub fn dispatch_reserve_action<H>(
        &mut self,
        caller: Address,
        tranche: TrancheId,
        action: ReserveAction,
        min_out: u64,
        hook: &mut H,
        now: u64,
    ) -> StrataResult<ReserveActionReceipt>
    where
        H: LiquidityHook + Clone,
    {
        self.operators.require_operator(caller)?;
        self.guard.enter()?;

        let funds_snapshot = self.tranche(tranche).funds().clone();
        let hook_snapshot = hook.clone();

        let result = execute_action(self.tranche_mut(tranche).funds_mut(), hook, &action)
            .and_then(|received| {
                if received < min_out {
                    return Err(StrataError::SlippageExceeded { min_out, received });
                }
                Ok(received)
            });

        let received = match result {
            Ok(received) => received,
            Err(err) => {
                *self.tranche_mut(tranche).funds_mut() = funds_snapshot;
                *hook = hook_snapshot;
                self.guard.exit();
                return Err(err);
            }
        };

        let nonce = self.action_nonce;
        self.action_nonce = self.action_nonce.wrapping_add(1);
        let receipt_id = receipt_digest(tranche, &action, received, now, nonce);
        self.events.emit(StrataEvent::ReserveActionExecuted {
            tranche,
            receipt_id,
            action: action.tag(),
            received,
            min_out,
            timestamp: now,
        });
        self.guard.exit();

        Ok(ReserveActionReceipt {
            receipt_id,
            tranche,
            action: action.tag(),
            received,
            min_out,
        })
    }
}

/// Run the action against the funds and hook, returning the realized output
fn execute_action<H: LiquidityHook>(
    funds: &mut TrancheFunds,
    hook: &mut H,
    action: &ReserveAction,
) -> StrataResult<u64> {
    match action {
        ReserveAction::InvestLp { token, amount } => {
            require_nonzero(*amount)?;
            debit_held(funds, hook, token, *amount)?;
            let minted = hook.invest(*token, *amount)?;
            funds.lp_units = funds
                .lp_units
                .checked_add(minted)
                .ok_or(StrataError::Overflow)?;
            Ok(minted)
        }

        ReserveAction::SwapViaAggregator {
            token_in,
            token_out,
            amount_in,
            swap_data,
            aggregator,
        } => {
            require_nonzero(*amount_in)?;
            debit_held(funds, hook, token_in, *amount_in)?;
            let out =
                hook.swap_via_aggregator(*token_in, *token_out, *amount_in, swap_data, *aggregator)?;
            credit_held(funds, hook, token_out, out)?;
            Ok(out)
        }

        ReserveAction::ReturnToVault {
            token,
            amount,
            swap_data,
            aggregator,
        } => {
            require_nonzero(*amount)?;
            let out = hook.admin_swap_and_return_to_vault(*token, *amount, swap_data, *aggregator)?;
            funds.settlement_balance = funds
                .settlement_balance
                .checked_add(out)
                .ok_or(StrataError::Overflow)?;
            Ok(out)
        }

        ReserveAction::LiquidatePosition {
            lp_amount,
            token_out,
            swap_data,
            aggregator,
            aux_data,
            aux_aggregator,
        } => {
            // Zero means the whole claim, resolved against this tranche
            // rather than the hook's shared position. Withdrawal
            // liquidations burn hook LP without touching per-tranche
            // claims, so the hook may hold less than the claim; the burn
            // is capped at both and only the realized LP leaves the claim.
            let claim = if *lp_amount == 0 {
                funds.lp_units
            } else {
                (*lp_amount).min(funds.lp_units)
            };
            let burn = claim.min(hook.lp_available());
            if burn == 0 {
                return Err(StrataError::InsufficientBalance {
                    available: funds.lp_units.min(hook.lp_available()),
                    requested: *lp_amount,
                });
            }
            let out = hook.admin_liquidate_position(
                burn,
                *token_out,
                swap_data,
                *aggregator,
                aux_data,
                *aux_aggregator,
            )?;
            funds.lp_units -= burn;
            credit_held(funds, hook, token_out, out)?;
            Ok(out)
        }

        ReserveAction::RescueTokens { token } => {
            let out = hook.admin_rescue_tokens(*token)?;
            credit_held(funds, hook, token, out)?;
            Ok(out)
        }
    }
}

fn debit_held<H: LiquidityHook>(
    funds: &mut TrancheFunds,
    hook: &H,
    token: &Address,
    amount: u64,
) -> StrataResult<()> {
    if *token == hook.stablecoin() {
        if funds.settlement_balance < amount {
            return Err(StrataError::InsufficientBalance {
                available: funds.settlement_balance,
                requested: amount,
            });
        }
        funds.settlement_balance -= amount;
        Ok(())
    } else {
        funds.debit_idle(token, amount)
    }
}

fn credit_held<H: LiquidityHook>(
    funds: &mut TrancheFunds,
    hook: &H,
    token: &Address,
    amount: u64,
) -> StrataResult<()> {
    if *token == hook.stablecoin() {
        funds.settlement_balance = funds
            .settlement_balance
            .checked_add(amount)
            .ok_or(StrataError::Overflow)?;
    } else {
        funds.credit_idle(*token, amount);
    }
    Ok(())
}

fn receipt_digest(
    tranche: TrancheId,
    action: &ReserveAction,
    received: u64,
    now: u64,
    nonce: u64,
) -> ReceiptId {
    let mut hasher = Sha256::new();
    hasher.update([tranche as u8, action.tag()]);
    hasher.update(received.to_le_bytes());
    hasher.update(now.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}

// ============================================================================
// Tests
// ============================================================================
