//! Tranche Aggregate & Vault Group
//!
//! A `Tranche` bundles the three per-pool concerns: the authoritative
//! value ledger, the rebase/migration balance state, and the directly
//! held funds. `VaultGroup` wires the three tranches together with the
//! operator set, the spillover audit ledger, the reentrancy guard, and
//! the event log, and exposes the user-facing entry points.
//!
//! ## Key Features
//!
//! - **Deposits/withdrawals**: withdrawal charges a flat bps fee and runs
//!   the bounded liquidity-ensure loop before any balance is burned
//! - **Backstop draws**: value moves exactly, asset movement is best
//!   effort (settlement first, then LP at the supplied price)
//! - **Validated wiring**: a group can only be assembled from three
//!   tranches carrying the three distinct expected identities

use crate::access_control::OperatorSet;
use crate::constants::fees;
use crate::errors::{StrataError, StrataResult};
use crate::events::{EventLog, StrataEvent};
use crate::ledger::ValueLedger;
use crate::liquidity::{ensure_liquidity_available, LiquidityHook, LiquidityOutcome, StakingVenue};
use crate::math::{bps_of, lp_for_usd, safe_add, safe_sub};
use crate::rebase::{MigrationReport, RebaseState};
use crate::types::{
    Address, ReentrancyGuard, SpilloverLedger, TrancheFunds, TrancheId,
};
use crate::validation::{require_nonzero, validate_address, validate_deposit_amount};

// ============================================================================
// Types
// ============================================================================

/// Settled withdrawal breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawOutcome {
    /// Balance burned from the account
    pub amount: u64,
    /// Fee retained by the tranche
    pub fee: u64,
    /// Settlement paid out to the account
    pub net_paid: u64,
    /// What the liquidity-ensure pass did
    pub liquidity: LiquidityOutcome,
}

/// What a backstop provider actually delivered.
///
/// `provided` is the value moved on the ledgers; `settlement_moved` and
/// `lp_moved` are the asset legs, which may cover less than `provided`
/// when the provider's holdings are thin. A partial fill is an expected
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackstopDraw {
    /// Provider tranche
    pub provider: TrancheId,
    /// Value the receiver asked for
    pub requested: u64,
    /// Value actually moved (capped at provider value)
    pub provided: u64,
    /// Settlement asset transferred alongside the value
    pub settlement_moved: u64,
    /// LP units transferred alongside the value
    pub lp_moved: u64,
}

impl Default for BackstopDraw {
    fn default() -> Self {
        Self {
            provider: TrancheId::Reserve,
            requested: 0,
            provided: 0,
            settlement_moved: 0,
            lp_moved: 0,
        }
    }
}

// ============================================================================
// Tranche
// ============================================================================

/// One pool: ledger, rebase accounting, and directly held funds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tranche {
    ledger: ValueLedger,
    rebase: RebaseState,
    funds: TrancheFunds,
    fees_accrued: u64,
}

impl Tranche {
    /// Create an empty tranche
    pub fn new(tranche: TrancheId, now: u64) -> Self {
        Self {
            ledger: ValueLedger::new(tranche, now),
            rebase: RebaseState::new(tranche),
            funds: TrancheFunds::new(),
            fees_accrued: 0,
        }
    }

    /// Tranche identity
    pub fn id(&self) -> TrancheId {
        self.ledger.tranche()
    }

    /// Authoritative USD value
    pub fn value(&self) -> u64 {
        self.ledger.value()
    }

    /// Account balance through the rebase state
    pub fn balance_of(&self, account: &Address) -> u64 {
        self.rebase.balance_of(account)
    }

    /// Directly held funds
    pub fn funds(&self) -> &TrancheFunds {
        &self.funds
    }

    /// Rebase/migration state
    pub fn rebase(&self) -> &RebaseState {
        &self.rebase
    }

    /// Value ledger
    pub fn ledger(&self) -> &ValueLedger {
        &self.ledger
    }

    /// Withdrawal fees accrued and not yet swept
    pub fn fees_accrued(&self) -> u64 {
        self.fees_accrued
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut ValueLedger {
        &mut self.ledger
    }

    pub(crate) fn funds_mut(&mut self) -> &mut TrancheFunds {
        &mut self.funds
    }

    // ========================================================================
    // User Flows
    // ========================================================================

    /// Deposit settlement asset for `account`
    pub fn deposit(
        &mut self,
        account: Address,
        amount: u64,
        events: &mut EventLog,
        now: u64,
    ) -> StrataResult<u64> {
        validate_address(&account)?;
        validate_deposit_amount(amount)?;

        let new_balance = self.rebase.credit(account, amount)?;
        self.ledger.credit(amount)?;
        self.funds.settlement_balance = safe_add(self.funds.settlement_balance, amount)?;

        events.emit(StrataEvent::Deposit {
            tranche: self.id(),
            account,
            amount,
            new_balance,
            timestamp: now,
        });
        Ok(new_balance)
    }

    /// Withdraw `amount` of balance for `account`, paying out net of fee.
    ///
    /// The liquidity-ensure loop runs first and is itself all-or-nothing;
    /// every precondition is checked before it, so once liquidity is
    /// secured the burn and payout cannot fail. The fee stays in the
    /// tranche's settlement funds, earmarked until [`Tranche::collect_fees`].
    pub fn withdraw<H, S>(
        &mut self,
        account: Address,
        amount: u64,
        hook: &mut H,
        staking: Option<&mut S>,
        events: &mut EventLog,
        now: u64,
    ) -> StrataResult<WithdrawOutcome>
    where
        H: LiquidityHook + Clone,
        S: StakingVenue + Clone,
    {
        require_nonzero(amount)?;
        let balance = self.rebase.balance_of(&account);
        if balance < amount {
            return Err(StrataError::InsufficientBalance {
                available: balance,
                requested: amount,
            });
        }
        if self.ledger.value() < amount {
            return Err(StrataError::InsufficientBalance {
                available: self.ledger.value(),
                requested: amount,
            });
        }

        let fee = bps_of(amount, fees::WITHDRAW_FEE_BPS)?;
        let net_paid = safe_sub(amount, fee)?;

        // Secure the full amount so the retained fee stays asset-backed
        let liquidity = ensure_liquidity_available(
            self.id(),
            &mut self.funds,
            hook,
            staking,
            amount,
            events,
            now,
        )?;

        self.rebase.debit(account, amount)?;
        self.ledger.debit(amount)?;
        self.funds.settlement_balance = safe_sub(self.funds.settlement_balance, net_paid)?;
        self.fees_accrued = safe_add(self.fees_accrued, fee)?;

        events.emit(StrataEvent::Withdraw {
            tranche: self.id(),
            account,
            amount,
            fee,
            timestamp: now,
        });
        Ok(WithdrawOutcome {
            amount,
            fee,
            net_paid,
            liquidity,
        })
    }

    /// Sweep accrued withdrawal fees out of the tranche funds
    pub fn collect_fees(&mut self, events: &mut EventLog, now: u64) -> StrataResult<u64> {
        let amount = self.fees_accrued;
        if amount == 0 {
            return Ok(0);
        }
        self.funds.settlement_balance = safe_sub(self.funds.settlement_balance, amount)?;
        self.fees_accrued = 0;
        events.emit(StrataEvent::FeesCollected {
            tranche: self.id(),
            amount,
            timestamp: now,
        });
        Ok(amount)
    }

    // ========================================================================
    // Waterfall Legs
    // ========================================================================

    /// Credit spilled profit: ledger value plus pro-rata holder balances
    pub fn receive_spillover(&mut self, amount: u64) -> StrataResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger.credit(amount)?;
        self.rebase.credit_pro_rata(amount)?;
        Ok(())
    }

    /// Provide backstop value to a sibling, capped at this tranche's value.
    ///
    /// The ledger and holder balances always move by the full `provided`
    /// amount; settlement is transferred first and the remainder is covered
    /// with LP sized at `lp_price`, as far as holdings allow.
    pub fn provide_backstop(&mut self, requested: u64, lp_price: u128) -> StrataResult<BackstopDraw> {
        let provided = requested.min(self.ledger.value());
        if provided == 0 {
            return Ok(BackstopDraw {
                provider: self.id(),
                requested,
                ..BackstopDraw::default()
            });
        }
        self.ledger.debit(provided)?;
        self.rebase.debit_pro_rata(provided.min(self.rebase.total_supply()))?;

        let settlement_moved = provided.min(self.funds.settlement_balance);
        self.funds.settlement_balance = safe_sub(self.funds.settlement_balance, settlement_moved)?;

        let uncovered = provided - settlement_moved;
        let lp_moved = if uncovered > 0 && self.funds.lp_units > 0 {
            lp_for_usd(uncovered, lp_price)?.min(self.funds.lp_units)
        } else {
            0
        };
        self.funds.lp_units = safe_sub(self.funds.lp_units, lp_moved)?;

        Ok(BackstopDraw {
            provider: self.id(),
            requested,
            provided,
            settlement_moved,
            lp_moved,
        })
    }

    /// Absorb a backstop draw on the receiving side
    pub fn absorb_backstop(&mut self, draw: &BackstopDraw) -> StrataResult<()> {
        if draw.provided == 0 {
            return Ok(());
        }
        self.ledger.credit(draw.provided)?;
        self.rebase.credit_pro_rata(draw.provided)?;
        self.funds.settlement_balance =
            safe_add(self.funds.settlement_balance, draw.settlement_moved)?;
        self.funds.lp_units = safe_add(self.funds.lp_units, draw.lp_moved)?;
        Ok(())
    }

    /// Absorb a loss directly: ledger value and holder balances shrink
    /// together, capped at current value
    pub fn absorb_loss(&mut self, amount: u64) -> StrataResult<u64> {
        let absorbed = amount.min(self.ledger.value());
        if absorbed == 0 {
            return Ok(0);
        }
        self.ledger.debit(absorbed)?;
        self.rebase.debit_pro_rata(absorbed.min(self.rebase.total_supply()))?;
        Ok(absorbed)
    }

    /// Credit profit directly: ledger value and holder balances grow together
    pub fn absorb_gain(&mut self, amount: u64) -> StrataResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger.credit(amount)?;
        self.rebase.credit_pro_rata(amount)?;
        Ok(())
    }

    // ========================================================================
    // Migration
    // ========================================================================

    /// Freeze the rebase index, once
    pub fn freeze_rebase_index(&mut self, events: &mut EventLog, now: u64) -> StrataResult<u128> {
        let frozen = self.rebase.freeze_index()?;
        events.emit(StrataEvent::RebaseIndexFrozen {
            tranche: self.id(),
            frozen_index: frozen,
            timestamp: now,
        });
        Ok(frozen)
    }

    /// Migrate one account to a direct balance
    pub fn migrate_user(
        &mut self,
        account: Address,
        events: &mut EventLog,
        now: u64,
    ) -> StrataResult<u64> {
        let shares = self.rebase.shares_of(&account);
        let direct_balance = self.rebase.migrate_user(account)?;
        events.emit(StrataEvent::UserMigrated {
            tranche: self.id(),
            account,
            shares,
            direct_balance,
            timestamp: now,
        });
        Ok(direct_balance)
    }

    /// Migrate a batch of accounts, skipping already-migrated and unknown ones
    pub fn migrate_batch(
        &mut self,
        accounts: &[Address],
        events: &mut EventLog,
        now: u64,
    ) -> StrataResult<MigrationReport> {
        if accounts.len() > crate::constants::limits::MAX_BATCH_MIGRATION {
            return Err(StrataError::InvalidAmount {
                amount: accounts.len() as u64,
                reason: crate::errors::AmountErrorReason::TooLarge,
            });
        }
        let mut report = MigrationReport::default();
        for account in accounts {
            match self.migrate_user(*account, events, now) {
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
// Vault Group
// ============================================================================

/// The three wired tranches plus cross-cutting state
#[derive(Debug, Clone)]
pub struct VaultGroup {
    pub(crate) senior: Tranche,
    pub(crate) junior: Tranche,
    pub(crate) reserve: Tranche,
    pub(crate) operators: OperatorSet,
    pub(crate) spillover: SpilloverLedger,
    pub(crate) guard: ReentrancyGuard,
    pub(crate) events: EventLog,
    /// Monotonic counter feeding reserve-action receipt ids; never reset,
    /// even when the event log is drained
    pub(crate) action_nonce: u64,
}

impl VaultGroup {
    /// Create a fresh group with empty tranches
    pub fn new(admin: Address, now: u64) -> StrataResult<Self> {
        Ok(Self {
            senior: Tranche::new(TrancheId::Senior, now),
            junior: Tranche::new(TrancheId::Junior, now),
            reserve: Tranche::new(TrancheId::Reserve, now),
            operators: OperatorSet::new(admin)?,
            spillover: SpilloverLedger::new(),
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
            action_nonce: 0,
        })
    }

    /// Assemble a group from existing tranches, validating the wiring
    pub fn from_parts(
        senior: Tranche,
        junior: Tranche,
        reserve: Tranche,
        operators: OperatorSet,
    ) -> StrataResult<Self> {
        if senior.id() != TrancheId::Senior {
            return Err(StrataError::InvalidTrancheWiring {
                reason: "senior slot holds wrong tranche",
            });
        }
        if junior.id() != TrancheId::Junior {
            return Err(StrataError::InvalidTrancheWiring {
                reason: "junior slot holds wrong tranche",
            });
        }
        if reserve.id() != TrancheId::Reserve {
            return Err(StrataError::InvalidTrancheWiring {
                reason: "reserve slot holds wrong tranche",
            });
        }
        Ok(Self {
            senior,
            junior,
            reserve,
            operators,
            spillover: SpilloverLedger::new(),
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
            action_nonce: 0,
        })
    }

    /// Read access to a tranche
    pub fn tranche(&self, id: TrancheId) -> &Tranche {
        match id {
            TrancheId::Senior => &self.senior,
            TrancheId::Junior => &self.junior,
            TrancheId::Reserve => &self.reserve,
        }
    }

    pub(crate) fn tranche_mut(&mut self, id: TrancheId) -> &mut Tranche {
        match id {
            TrancheId::Senior => &mut self.senior,
            TrancheId::Junior => &mut self.junior,
            TrancheId::Reserve => &mut self.reserve,
        }
    }

    /// Operator set
    pub fn operators(&self) -> &OperatorSet {
        &self.operators
    }

    /// Mutable operator set for grant/revoke
    pub fn operators_mut(&mut self) -> &mut OperatorSet {
        &mut self.operators
    }

    /// Cumulative spillover/backstop counters
    pub fn spillover_ledger(&self) -> &SpilloverLedger {
        &self.spillover
    }

    /// Events emitted so far
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Drain the event log, returning the collected events
    pub fn take_events(&mut self) -> EventLog {
        core::mem::take(&mut self.events)
    }

    // ========================================================================
    // Entry Points
    // ========================================================================

    /// Deposit into a tranche
    pub fn deposit(
        &mut self,
        tranche: TrancheId,
        account: Address,
        amount: u64,
        now: u64,
    ) -> StrataResult<u64> {
        self.guard.enter()?;
        let result = {
            let events = &mut self.events;
            match tranche {
                TrancheId::Senior => self.senior.deposit(account, amount, events, now),
                TrancheId::Junior => self.junior.deposit(account, amount, events, now),
                TrancheId::Reserve => self.reserve.deposit(account, amount, events, now),
            }
        };
        self.guard.exit();
        result
    }

    /// Withdraw from a tranche, running the liquidity-ensure loop under
    /// the reentrancy guard
    pub fn withdraw<H, S>(
        &mut self,
        tranche: TrancheId,
        account: Address,
        amount: u64,
        hook: &mut H,
        staking: Option<&mut S>,
        now: u64,
    ) -> StrataResult<WithdrawOutcome>
    where
        H: LiquidityHook + Clone,
        S: StakingVenue + Clone,
    {
        self.guard.enter()?;
        let result = {
            let events = &mut self.events;
            match tranche {
                TrancheId::Senior => self
                    .senior
                    .withdraw(account, amount, hook, staking, events, now),
                TrancheId::Junior => self
                    .junior
                    .withdraw(account, amount, hook, staking, events, now),
                TrancheId::Reserve => self
                    .reserve
                    .withdraw(account, amount, hook, staking, events, now),
            }
        };
        self.guard.exit();
        result
    }

    /// Sweep a tranche's accrued withdrawal fees, admin-only
    pub fn collect_fees(
        &mut self,
        caller: Address,
        tranche: TrancheId,
        now: u64,
    ) -> StrataResult<u64> {
        self.operators.require_admin(caller)?;
        let events = &mut self.events;
        match tranche {
            TrancheId::Senior => self.senior.collect_fees(events, now),
            TrancheId::Junior => self.junior.collect_fees(events, now),
            TrancheId::Reserve => self.reserve.collect_fees(events, now),
        }
    }

    /// Freeze a tranche's rebase index, operator-only
    pub fn freeze_rebase_index(
        &mut self,
        caller: Address,
        tranche: TrancheId,
        now: u64,
    ) -> StrataResult<u128> {
        self.operators.require_operator(caller)?;
        let events = &mut self.events;
        match tranche {
            TrancheId::Senior => self.senior.freeze_rebase_index(events, now),
            TrancheId::Junior => self.junior.freeze_rebase_index(events, now),
            TrancheId::Reserve => self.reserve.freeze_rebase_index(events, now),
        }
    }

    /// Migrate one account, callable by the account itself or an operator
    pub fn migrate_user(
        &mut self,
        caller: Address,
        tranche: TrancheId,
        account: Address,
        now: u64,
    ) -> StrataResult<u64> {
        if caller != account {
            self.operators.require_operator(caller)?;
        }
        let events = &mut self.events;
        match tranche {
            TrancheId::Senior => self.senior.migrate_user(account, events, now),
            TrancheId::Junior => self.junior.migrate_user(account, events, now),
            TrancheId::Reserve => self.reserve.migrate_user(account, events, now),
        }
    }

    /// Migrate a batch of accounts, operator-only
    pub fn migrate_batch(
        &mut self,
        caller: Address,
        tranche: TrancheId,
        accounts: &[Address],
        now: u64,
    ) -> StrataResult<MigrationReport> {
        self.operators.require_operator(caller)?;
        let events = &mut self.events;
        match tranche {
            TrancheId::Senior => self.senior.migrate_batch(accounts, events, now),
            TrancheId::Junior => self.junior.migrate_batch(accounts, events, now),
            TrancheId::Reserve => self.reserve.migrate_batch(accounts, events, now),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
