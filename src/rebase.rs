//! Rebase Accounting & Migration Module
//!
//! Per-tranche balance representation with a one-way migration from
//! multiplier-based (rebasing) accounting to direct stored balances.
//!
//! ## Key Features
//!
//! - **Lazy/Direct sum type**: every account is either `Lazy { shares }`
//!   (balance derived through the index) or `Direct { balance }`; the
//!   representation is dispatched in `balance_of`, never via scattered
//!   flag checks
//! - **Index freeze**: the tranche-global index is captured exactly once;
//!   after the freeze it never moves again
//! - **Value-preserving migration**: `migrate_user` converts shares to a
//!   direct balance at the frozen index and is observationally a no-op
//! - **Post-freeze cutover**: debits/credits on a migrated account mutate
//!   the direct balance; on an unmigrated account they convert through the
//!   frozen index with ceiling rounding on debits
//!
//! Post-freeze value distribution is expressed through explicit per-account
//! balance adjustments, never index drift.

use crate::constants::{limits, precision};
use crate::errors::{AmountErrorReason, StrataError, StrataResult};
use crate::math::{balance_from_shares, mul_div, shares_from_balance};
use crate::types::{Address, TrancheId};
use crate::{BTreeMap, Vec};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// Balance representation of a single account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum AccountBalance {
    /// Owned share units; balance is derived through the tranche index
    Lazy { shares: u128 },
    /// Directly stored balance, valid after migration
    Direct { balance: u64 },
}

impl AccountBalance {
    /// Whether this account has migrated to a direct balance
    pub fn is_direct(&self) -> bool {
        matches!(self, AccountBalance::Direct { .. })
    }
}

/// Result of a batch migration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Accounts converted in this call
    pub migrated: u64,
    /// Accounts skipped (already migrated or unknown)
    pub skipped: u64,
}

/// Per-tranche rebase accounting state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RebaseState {
    tranche: TrancheId,
    /// Live index, grows with pre-freeze profit (1e18 fixed point)
    current_index: u128,
    /// Set exactly once; immutable thereafter
    frozen_index: Option<u128>,
    /// Sum of shares across `Lazy` accounts
    total_shares: u128,
    /// Sum of balances across `Direct` accounts
    total_direct: u64,
    /// Number of `Direct` accounts
    direct_accounts: u64,
    accounts: BTreeMap<Address, AccountBalance>,
}

// ============================================================================
// Core Rebase State
// ============================================================================

impl RebaseState {
    /// Create a fresh rebasing tranche with index 1.0
    pub fn new(tranche: TrancheId) -> Self {
        Self {
            tranche,
            current_index: precision::INDEX_ONE,
            frozen_index: None,
            total_shares: 0,
            total_direct: 0,
            direct_accounts: 0,
            accounts: BTreeMap::new(),
        }
    }

    /// The tranche this state belongs to
    pub fn tranche(&self) -> TrancheId {
        self.tranche
    }

    /// The index used for every share-to-balance conversion: the frozen
    /// index once set, the live index before that
    pub fn effective_index(&self) -> u128 {
        self.frozen_index.unwrap_or(self.current_index)
    }

    /// The frozen index, if the migration event has happened
    pub fn frozen_index(&self) -> Option<u128> {
        self.frozen_index
    }

    /// Whether the migration event has happened
    pub fn is_frozen(&self) -> bool {
        self.frozen_index.is_some()
    }

    /// Balance of an account, dispatched on its representation
    pub fn balance_of(&self, account: &Address) -> u64 {
        match self.accounts.get(account) {
            None => 0,
            Some(AccountBalance::Direct { balance }) => *balance,
            Some(AccountBalance::Lazy { shares }) => {
                balance_from_shares(*shares, self.effective_index()).unwrap_or(u64::MAX)
            }
        }
    }

    /// Raw shares of a lazy account (0 for direct/unknown accounts)
    pub fn shares_of(&self, account: &Address) -> u128 {
        match self.accounts.get(account) {
            Some(AccountBalance::Lazy { shares }) => *shares,
            _ => 0,
        }
    }

    /// Whether the account holds a direct balance
    pub fn is_migrated(&self, account: &Address) -> bool {
        self.accounts
            .get(account)
            .map(AccountBalance::is_direct)
            .unwrap_or(false)
    }

    /// Total balance across all accounts
    pub fn total_supply(&self) -> u64 {
        let lazy = balance_from_shares(self.total_shares, self.effective_index())
            .unwrap_or(u64::MAX);
        lazy.saturating_add(self.total_direct)
    }

    /// Sum of shares held by lazy accounts
    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Number of accounts that have ever held a balance
    pub fn account_count(&self) -> u64 {
        self.accounts.len() as u64
    }

    /// Number of accounts holding direct balances
    pub fn direct_account_count(&self) -> u64 {
        self.direct_accounts
    }

    // ========================================================================
    // Credits / Debits
    // ========================================================================

    /// Credit `amount` to an account.
    ///
    /// Pre-freeze this mints shares at the live index. Post-freeze, lazy
    /// accounts convert at the frozen index (floor rounding on credits)
    /// and everything else is a direct-balance add; new accounts created
    /// after the freeze are born direct.
    pub fn credit(&mut self, account: Address, amount: u64) -> StrataResult<u64> {
        if amount == 0 {
            return Ok(self.balance_of(&account));
        }
        match (self.is_frozen(), self.accounts.get(&account).copied()) {
            (false, existing) => {
                let minted = shares_from_balance(amount, self.current_index, false)?;
                let shares = match existing {
                    Some(AccountBalance::Lazy { shares }) => shares
                        .checked_add(minted)
                        .ok_or(StrataError::Overflow)?,
                    None => minted,
                    Some(AccountBalance::Direct { .. }) => {
                        // Unreachable: direct accounts only exist after the freeze
                        return Err(StrataError::InvalidInput {
                            param: "account",
                            reason: "direct account before freeze",
                        });
                    }
                };
                self.total_shares = self
                    .total_shares
                    .checked_add(minted)
                    .ok_or(StrataError::Overflow)?;
                self.accounts.insert(account, AccountBalance::Lazy { shares });
            }
            (true, Some(AccountBalance::Lazy { shares })) => {
                let frozen = self.effective_index();
                let minted = shares_from_balance(amount, frozen, false)?;
                let shares = shares.checked_add(minted).ok_or(StrataError::Overflow)?;
                self.total_shares = self
                    .total_shares
                    .checked_add(minted)
                    .ok_or(StrataError::Overflow)?;
                self.accounts.insert(account, AccountBalance::Lazy { shares });
            }
            (true, existing) => {
                let balance = match existing {
                    Some(AccountBalance::Direct { balance }) => balance
                        .checked_add(amount)
                        .ok_or(StrataError::Overflow)?,
                    _ => {
                        self.direct_accounts += 1;
                        amount
                    }
                };
                self.total_direct = self
                    .total_direct
                    .checked_add(amount)
                    .ok_or(StrataError::Overflow)?;
                self.accounts
                    .insert(account, AccountBalance::Direct { balance });
            }
        }
        Ok(self.balance_of(&account))
    }

    /// Debit `amount` from an account.
    ///
    /// Lazy accounts convert through the effective index with ceiling
    /// rounding, capped at their share holdings so a full-balance debit
    /// always clears the account. Accounts survive zero-balance states.
    pub fn debit(&mut self, account: Address, amount: u64) -> StrataResult<u64> {
        let available = self.balance_of(&account);
        if available < amount {
            return Err(StrataError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if amount == 0 {
            return Ok(available);
        }
        match self.accounts.get(&account).copied() {
            None => Err(StrataError::AccountNotFound { account }),
            Some(AccountBalance::Direct { balance }) => {
                let balance = balance
                    .checked_sub(amount)
                    .ok_or(StrataError::Underflow)?;
                self.total_direct = self
                    .total_direct
                    .checked_sub(amount)
                    .ok_or(StrataError::Underflow)?;
                self.accounts
                    .insert(account, AccountBalance::Direct { balance });
                Ok(balance)
            }
            Some(AccountBalance::Lazy { shares }) => {
                let index = self.effective_index();
                let burned = shares_from_balance(amount, index, true)?.min(shares);
                let shares = shares
                    .checked_sub(burned)
                    .ok_or(StrataError::InsufficientShares {
                        available: shares,
                        requested: burned,
                    })?;
                self.total_shares = self
                    .total_shares
                    .checked_sub(burned)
                    .ok_or(StrataError::Underflow)?;
                self.accounts.insert(account, AccountBalance::Lazy { shares });
                Ok(self.balance_of(&account))
            }
        }
    }

    /// Move `amount` between two accounts, preserving total supply
    pub fn transfer(&mut self, from: Address, to: Address, amount: u64) -> StrataResult<()> {
        if from == to {
            return Err(StrataError::InvalidInput {
                param: "to",
                reason: "self transfer",
            });
        }
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        Ok(())
    }

    // ========================================================================
    // Pro-rata Value Reflection
    // ========================================================================

    /// Reflect a tranche-wide value gain in balances.
    ///
    /// Pre-freeze this grows the index; post-freeze it distributes explicit
    /// per-account balance adjustments (floor rounding, so up to one base
    /// unit per account may remain unapplied). Returns the amount actually
    /// applied; a tranche with zero supply applies nothing.
    pub fn credit_pro_rata(&mut self, amount: u64) -> StrataResult<u64> {
        let supply = self.total_supply();
        if amount == 0 || supply == 0 {
            return Ok(0);
        }
        if !self.is_frozen() {
            self.current_index = mul_div(
                self.current_index,
                supply as u128 + amount as u128,
                supply as u128,
            )?;
            return Ok(amount);
        }
        self.adjust_post_freeze(amount, supply, true)
    }

    /// Reflect a tranche-wide value loss in balances.
    ///
    /// Mirror of [`credit_pro_rata`]; the loss may not exceed supply.
    pub fn debit_pro_rata(&mut self, amount: u64) -> StrataResult<u64> {
        let supply = self.total_supply();
        if amount == 0 || supply == 0 {
            return Ok(0);
        }
        if amount > supply {
            return Err(StrataError::InsufficientBalance {
                available: supply,
                requested: amount,
            });
        }
        if !self.is_frozen() {
            self.current_index = mul_div(
                self.current_index,
                (supply - amount) as u128,
                supply as u128,
            )?;
            return Ok(amount);
        }
        self.adjust_post_freeze(amount, supply, false)
    }

    fn adjust_post_freeze(
        &mut self,
        amount: u64,
        supply: u64,
        is_credit: bool,
    ) -> StrataResult<u64> {
        let frozen = self.effective_index();
        let holders: Vec<Address> = self.accounts.keys().copied().collect();
        let mut applied: u64 = 0;
        for holder in holders {
            let balance = self.balance_of(&holder);
            if balance == 0 {
                continue;
            }
            let delta = mul_div(amount as u128, balance as u128, supply as u128)? as u64;
            if delta == 0 {
                continue;
            }
            match self.accounts.get(&holder).copied() {
                Some(AccountBalance::Direct { balance }) => {
                    let balance = if is_credit {
                        balance.checked_add(delta).ok_or(StrataError::Overflow)?
                    } else {
                        balance.checked_sub(delta.min(balance)).unwrap_or(0)
                    };
                    self.total_direct = if is_credit {
                        self.total_direct
                            .checked_add(delta)
                            .ok_or(StrataError::Overflow)?
                    } else {
                        self.total_direct.saturating_sub(delta)
                    };
                    self.accounts
                        .insert(holder, AccountBalance::Direct { balance });
                }
                Some(AccountBalance::Lazy { shares }) => {
                    let share_delta = shares_from_balance(delta, frozen, false)?;
                    let shares = if is_credit {
                        shares
                            .checked_add(share_delta)
                            .ok_or(StrataError::Overflow)?
                    } else {
                        shares.saturating_sub(share_delta.min(shares))
                    };
                    self.total_shares = if is_credit {
                        self.total_shares
                            .checked_add(share_delta)
                            .ok_or(StrataError::Overflow)?
                    } else {
                        self.total_shares.saturating_sub(share_delta)
                    };
                    self.accounts.insert(holder, AccountBalance::Lazy { shares });
                }
                None => {}
            }
            applied = applied.saturating_add(delta);
        }
        Ok(applied)
    }

    // ========================================================================
    // Migration
    // ========================================================================

    /// Capture the frozen index. One-way, callable exactly once.
    pub fn freeze_index(&mut self) -> StrataResult<u128> {
        if self.is_frozen() {
            return Err(StrataError::IndexAlreadyFrozen);
        }
        self.frozen_index = Some(self.current_index);
        Ok(self.current_index)
    }

    /// Convert one account from shares to a direct balance.
    ///
    /// Sets `direct_balance := shares * frozen_index / INDEX_ONE`, the same
    /// expression `balance_of` evaluates, so the observable balance is
    /// unchanged at the instant of migration.
    pub fn migrate_user(&mut self, account: Address) -> StrataResult<u64> {
        let frozen = self.frozen_index.ok_or(StrataError::IndexNotFrozen)?;
        match self.accounts.get(&account).copied() {
            None => Err(StrataError::AccountNotFound { account }),
            Some(AccountBalance::Direct { .. }) => {
                Err(StrataError::AlreadyMigrated { account })
            }
            Some(AccountBalance::Lazy { shares }) => {
                let balance = balance_from_shares(shares, frozen)?;
                self.total_shares = self
                    .total_shares
                    .checked_sub(shares)
                    .ok_or(StrataError::Underflow)?;
                self.total_direct = self
                    .total_direct
                    .checked_add(balance)
                    .ok_or(StrataError::Overflow)?;
                self.direct_accounts += 1;
                self.accounts
                    .insert(account, AccountBalance::Direct { balance });
                Ok(balance)
            }
        }
    }

    /// Migrate a list of accounts. Already-migrated and unknown accounts
    /// are skipped, making the batch individually idempotent.
    pub fn migrate_batch(&mut self, accounts: &[Address]) -> StrataResult<MigrationReport> {
        if accounts.len() > limits::MAX_BATCH_MIGRATION {
            return Err(StrataError::InvalidAmount {
                amount: accounts.len() as u64,
                reason: AmountErrorReason::TooLarge,
            });
        }
        if !self.is_frozen() {
            return Err(StrataError::IndexNotFrozen);
        }
        let mut report = MigrationReport::default();
        for account in accounts {
            match self.migrate_user(*account) {
                Ok(_) => report.migrated += 1,
                Err(StrataError::AlreadyMigrated { .. })
                | Err(StrataError::AccountNotFound { .. }) => report.skipped += 1,
                Err(other) => return Err(other),
            }
        }
        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================
