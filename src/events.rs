//! Protocol Events for the Strata Engine
//!
//! Events are collected during each state transition and can be indexed
//! by the embedding service for auditing, analytics, and notifications.
//! They are observable side effects, never errors.

use crate::types::{Address, ReceiptId, TrancheId};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Valuation Events (0x01 - 0x0F)
    VaultValueUpdated = 0x01,
    SpilloverReceived = 0x02,
    BackstopProvided = 0x03,

    // User Flow Events (0x10 - 0x1F)
    Deposit = 0x10,
    Withdraw = 0x11,
    FeesCollected = 0x12,

    // Migration Events (0x20 - 0x2F)
    RebaseIndexFrozen = 0x20,
    UserMigrated = 0x21,

    // Liquidity Events (0x30 - 0x3F)
    LiquidityEnsured = 0x30,

    // Operator Events (0x40 - 0x4F)
    ReserveActionExecuted = 0x40,
}

/// Main event enum containing all observable engine events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum StrataEvent {
    // ============ Valuation Events ============

    /// Emitted when the periodic profit/loss signal is applied to Senior
    VaultValueUpdated {
        old_value: u64,
        new_value: u64,
        profit_bps: i64,
        timestamp: u64,
    },

    /// Emitted when excess profit spills from Senior to Junior
    SpilloverReceived {
        amount: u64,
        total_spillover_received: u64,
        timestamp: u64,
    },

    /// Emitted for each backstop provider drawn during a loss event
    BackstopProvided {
        provider: TrancheId,
        requested: u64,
        provided: u64,
        settlement_moved: u64,
        lp_moved: u64,
        timestamp: u64,
    },

    // ============ User Flow Events ============

    /// Emitted on a user deposit into a tranche
    Deposit {
        tranche: TrancheId,
        account: Address,
        amount: u64,
        new_balance: u64,
        timestamp: u64,
    },

    /// Emitted on a fully settled user withdrawal
    Withdraw {
        tranche: TrancheId,
        account: Address,
        amount: u64,
        fee: u64,
        timestamp: u64,
    },

    /// Emitted when accrued withdrawal fees are swept
    FeesCollected {
        tranche: TrancheId,
        amount: u64,
        timestamp: u64,
    },

    // ============ Migration Events ============

    /// Emitted once per tranche when the rebase index freezes
    RebaseIndexFrozen {
        tranche: TrancheId,
        frozen_index: u128,
        timestamp: u64,
    },

    /// Emitted when an account migrates to a direct balance
    UserMigrated {
        tranche: TrancheId,
        account: Address,
        shares: u128,
        direct_balance: u64,
        timestamp: u64,
    },

    // ============ Liquidity Events ============

    /// Emitted after a successful liquidity-ensure pass that had side effects
    LiquidityEnsured {
        tranche: TrancheId,
        amount_needed: u64,
        starting_balance: u64,
        final_balance: u64,
        attempts: u8,
        timestamp: u64,
    },

    // ============ Operator Events ============

    /// Emitted for each executed reserve action
    ReserveActionExecuted {
        tranche: TrancheId,
        receipt_id: ReceiptId,
        action: u8,
        received: u64,
        min_out: u64,
        timestamp: u64,
    },
}

impl StrataEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::VaultValueUpdated { .. } => EventType::VaultValueUpdated,
            Self::SpilloverReceived { .. } => EventType::SpilloverReceived,
            Self::BackstopProvided { .. } => EventType::BackstopProvided,
            Self::Deposit { .. } => EventType::Deposit,
            Self::Withdraw { .. } => EventType::Withdraw,
            Self::FeesCollected { .. } => EventType::FeesCollected,
            Self::RebaseIndexFrozen { .. } => EventType::RebaseIndexFrozen,
            Self::UserMigrated { .. } => EventType::UserMigrated,
            Self::LiquidityEnsured { .. } => EventType::LiquidityEnsured,
            Self::ReserveActionExecuted { .. } => EventType::ReserveActionExecuted,
        }
    }

    /// Get the timestamp when the event occurred
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::VaultValueUpdated { timestamp, .. } => *timestamp,
            Self::SpilloverReceived { timestamp, .. } => *timestamp,
            Self::BackstopProvided { timestamp, .. } => *timestamp,
            Self::Deposit { timestamp, .. } => *timestamp,
            Self::Withdraw { timestamp, .. } => *timestamp,
            Self::FeesCollected { timestamp, .. } => *timestamp,
            Self::RebaseIndexFrozen { timestamp, .. } => *timestamp,
            Self::UserMigrated { timestamp, .. } => *timestamp,
            Self::LiquidityEnsured { timestamp, .. } => *timestamp,
            Self::ReserveActionExecuted { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log collecting the events of one or more state transitions
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<StrataEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: StrataEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[StrataEvent] {
        &self.events
    }

    /// Take ownership of all events
    pub fn into_events(self) -> Vec<StrataEvent> {
        self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&StrataEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
