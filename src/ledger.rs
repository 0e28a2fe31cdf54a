//! Value Ledger Module
//!
//! Per-tranche authoritative USD valuation. The ledger is a plain
//! accumulator: it moves only through explicit credits and debits driven
//! by deposits, withdrawals, and the valuation waterfall, and its
//! timestamp only moves forward.

use crate::errors::{StrataError, StrataResult};
use crate::math::{safe_add, safe_sub};
use crate::types::TrancheId;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Authoritative USD valuation of a single tranche
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ValueLedger {
    tranche: TrancheId,
    value_usd: u64,
    last_update_time: u64,
}

impl ValueLedger {
    /// Create a ledger with zero value
    pub fn new(tranche: TrancheId, now: u64) -> Self {
        Self {
            tranche,
            value_usd: 0,
            last_update_time: now,
        }
    }

    /// The tranche this ledger values
    pub fn tranche(&self) -> TrancheId {
        self.tranche
    }

    /// Current USD value
    pub fn value(&self) -> u64 {
        self.value_usd
    }

    /// Timestamp of the last valuation-relevant update
    pub fn last_update_time(&self) -> u64 {
        self.last_update_time
    }

    /// Increase the tranche value
    pub fn credit(&mut self, amount: u64) -> StrataResult<()> {
        self.value_usd = safe_add(self.value_usd, amount)?;
        Ok(())
    }

    /// Decrease the tranche value, failing on shortfall
    pub fn debit(&mut self, amount: u64) -> StrataResult<()> {
        if self.value_usd < amount {
            return Err(StrataError::InsufficientBalance {
                available: self.value_usd,
                requested: amount,
            });
        }
        self.value_usd = safe_sub(self.value_usd, amount)?;
        Ok(())
    }

    /// Advance the update timestamp, rejecting non-monotonic proposals
    pub fn touch(&mut self, now: u64) -> StrataResult<()> {
        if now < self.last_update_time {
            return Err(StrataError::TimestampNotMonotonic {
                last: self.last_update_time,
                proposed: now,
            });
        }
        self.last_update_time = now;
        Ok(())
    }
}
