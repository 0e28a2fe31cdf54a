//! Core Types for the Strata Engine
//!
//! Fundamental data structures shared across the tranche modules.

use crate::BTreeMap;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for reserve-action receipt identifiers
pub type ReceiptId = [u8; 32];

// ============ Tranche Identity ============

/// One of the three pools sharing the common collateral base.
///
/// Senior is the authoritative source of the valuation signal; Junior and
/// Reserve are dependents wired to it at construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum TrancheId {
    /// First-priority pool, emits the valuation signal
    Senior = 0,
    /// Receives profit spillover, second backstop provider
    Junior = 1,
    /// First backstop provider
    Reserve = 2,
}

impl TrancheId {
    /// All tranches in waterfall-independent declaration order
    pub fn all() -> [TrancheId; 3] {
        [TrancheId::Senior, TrancheId::Junior, TrancheId::Reserve]
    }

    /// Short label for diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            TrancheId::Senior => "senior",
            TrancheId::Junior => "junior",
            TrancheId::Reserve => "reserve",
        }
    }
}

// ============ Tranche Holdings ============

/// Assets a tranche holds directly, outside the rebase share accounting.
///
/// `lp_units` is the tranche's claim on the shared hook-owned LP position;
/// the hook is the source of truth for what that claim currently redeems
/// for. Idle non-settlement tokens only move through the reserve-action
/// path, never through withdrawals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TrancheFunds {
    /// Settlement asset directly held (base units)
    pub settlement_balance: u64,
    /// LP units attributed to this tranche in the shared hook position
    pub lp_units: u64,
    /// Idle non-settlement token balances held by the tranche
    pub idle: BTreeMap<Address, u64>,
}

impl TrancheFunds {
    /// Create empty holdings
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an idle non-settlement token
    pub fn idle_balance(&self, token: &Address) -> u64 {
        self.idle.get(token).copied().unwrap_or(0)
    }

    /// Credit an idle token balance
    pub fn credit_idle(&mut self, token: Address, amount: u64) {
        if amount == 0 {
            return;
        }
        let entry = self.idle.entry(token).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Debit an idle token balance, failing on shortfall
    pub fn debit_idle(&mut self, token: &Address, amount: u64) -> crate::StrataResult<()> {
        let available = self.idle_balance(token);
        if available < amount {
            return Err(crate::StrataError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if available == amount {
            self.idle.remove(token);
        } else if let Some(entry) = self.idle.get_mut(token) {
            *entry = available - amount;
        }
        Ok(())
    }
}

// ============ Spillover Audit Ledger ============

/// Cumulative spillover/backstop counters.
///
/// Reporting and auditing only; these totals never gate behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct SpilloverLedger {
    /// Total profit spilled from Senior to Junior
    pub total_spillover_received: u64,
    /// Total backstop value Junior has provided to Senior
    pub junior_backstop_provided: u64,
    /// Total backstop value Reserve has provided to Senior
    pub reserve_backstop_provided: u64,
}

impl SpilloverLedger {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spillover credit to Junior
    pub fn record_spillover(&mut self, amount: u64) {
        self.total_spillover_received = self.total_spillover_received.saturating_add(amount);
    }

    /// Record a backstop draw from the given provider
    pub fn record_backstop(&mut self, provider: TrancheId, amount: u64) {
        match provider {
            TrancheId::Junior => {
                self.junior_backstop_provided = self.junior_backstop_provided.saturating_add(amount);
            }
            TrancheId::Reserve => {
                self.reserve_backstop_provided =
                    self.reserve_backstop_provided.saturating_add(amount);
            }
            TrancheId::Senior => {}
        }
    }

    /// Total backstop provided by a tranche
    pub fn backstop_provided_by(&self, provider: TrancheId) -> u64 {
        match provider {
            TrancheId::Junior => self.junior_backstop_provided,
            TrancheId::Reserve => self.reserve_backstop_provided,
            TrancheId::Senior => 0,
        }
    }
}

// ============ Reentrancy Guard ============

/// Exclusive, non-reentrant lock held for the duration of every mutating
/// entry point. Any external call (hook liquidation, aggregator swap) must
/// be assumed able to call back into the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    /// Create an unlocked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, failing if already held
    pub fn enter(&mut self) -> crate::StrataResult<()> {
        if self.entered {
            return Err(crate::StrataError::ReentrantCall);
        }
        self.entered = true;
        Ok(())
    }

    /// Release the lock
    pub fn exit(&mut self) {
        self.entered = false;
    }

    /// Whether the lock is currently held
    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrataError;

    #[test]
    fn test_idle_token_accounting() {
        let mut funds = TrancheFunds::new();
        let token = [7u8; 32];

        funds.credit_idle(token, 500);
        assert_eq!(funds.idle_balance(&token), 500);

        funds.debit_idle(&token, 200).unwrap();
        assert_eq!(funds.idle_balance(&token), 300);

        let err = funds.debit_idle(&token, 400).unwrap_err();
        assert!(matches!(err, StrataError::InsufficientBalance { .. }));

        // Exact debit removes the entry
        funds.debit_idle(&token, 300).unwrap();
        assert_eq!(funds.idle_balance(&token), 0);
        assert!(funds.idle.is_empty());
    }

    #[test]
    fn test_spillover_ledger_counters() {
        let mut ledger = SpilloverLedger::new();
        ledger.record_spillover(100);
        ledger.record_spillover(50);
        ledger.record_backstop(TrancheId::Reserve, 30);
        ledger.record_backstop(TrancheId::Junior, 20);
        // Senior never provides backstop to itself
        ledger.record_backstop(TrancheId::Senior, 999);

        assert_eq!(ledger.total_spillover_received, 150);
        assert_eq!(ledger.backstop_provided_by(TrancheId::Reserve), 30);
        assert_eq!(ledger.backstop_provided_by(TrancheId::Junior), 20);
        assert_eq!(ledger.backstop_provided_by(TrancheId::Senior), 0);
    }

    #[test]
    fn test_reentrancy_guard() {
        let mut guard = ReentrancyGuard::new();
        guard.enter().unwrap();
        assert!(guard.is_entered());
        assert_eq!(guard.enter(), Err(StrataError::ReentrantCall));
        guard.exit();
        guard.enter().unwrap();
    }

    #[test]
    fn test_tranche_id_serialization() {
        let bytes = borsh::to_vec(&TrancheId::Junior).unwrap();
        let restored: TrancheId = borsh::from_slice(&bytes).unwrap();
        assert_eq!(restored, TrancheId::Junior);
        assert_eq!(TrancheId::all().len(), 3);
    }
}
