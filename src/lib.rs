//! Strata Core Library
//!
//! State-transition engine for a tranched yield vault: three pools
//! (Senior, Junior, Reserve) over a shared collateral base, with a
//! profit-spillover / loss-backstop waterfall between them.
//!
//! The crate is a pure library: it owns the accounting and the
//! transition rules, while asset custody, swaps, and LP mechanics live
//! behind the [`liquidity::LiquidityHook`] trait supplied by the
//! embedding service.
//!
//! ## Key Features
//!
//! - **Tranche waterfall**: Senior keeps its target yield, excess profit
//!   spills to Junior, and losses are backstopped Reserve-first then
//!   Junior before touching Senior holders
//! - **Rebase migration**: one-way transition from multiplier-based
//!   balances to direct stored balances, value-preserving per account
//! - **Bounded liquidation**: withdrawals secure settlement through at
//!   most three LP liquidation attempts, with full rollback on failure
//! - **Reserve actions**: tagged, operator-only treasury operations with
//!   a universal minimum-output floor and digest-derived receipts
//!
//! This crate is `no_std` compatible when built without the default
//! `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export the collections submodules use, based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{collections::BTreeMap, vec::Vec};
#[cfg(feature = "std")]
pub use std::{collections::BTreeMap, vec::Vec};

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod validation;
pub mod events;
pub mod access_control;
pub mod ledger;
pub mod rebase;
pub mod liquidity;
pub mod tranche;
pub mod spillover;
pub mod reserve;


// Re-exports for convenience
pub use access_control::*;
pub use errors::*;
pub use events::*;
pub use ledger::*;
pub use liquidity::{
    ensure_liquidity_available, HookError, LiquidityHook, LiquidityOutcome, StakingVenue,
};
pub use math::*;
pub use rebase::*;
pub use reserve::*;
pub use spillover::*;
pub use tranche::*;
pub use types::*;
pub use validation::*;
