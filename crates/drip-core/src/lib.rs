//! # hashdrip Core
//!
//! Core data structures for the hashdrip mining reward bot.
//!
//! This crate provides the building blocks shared by every other crate:
//! - `Account` - the per-user ledger record and its guarded mutations
//! - `RewardAmount` / `FiatAmount` - fixed-point amounts in smallest units
//! - `ExchangeRate` - reward coin to payout currency conversion
//! - `Clock` - injectable time source
//! - `DripError` - the error taxonomy surfaced to users and operators
//!
//! ## Account lifecycle
//!
//! ```text
//!   first command ──► get-or-create ──► Idle ◄──────────────┐
//!                                        │                   │
//!                                 /mine (+BASE)      now >= session_end
//!                                        │                   │
//!                                        ▼                   │
//!                                      Mining ── /ad (+AD) ──┘
//! ```

pub mod account;
pub mod clock;
pub mod error;
pub mod types;

pub use account::*;
pub use clock::*;
pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::{Account, AccountPatch, FieldChange, MiningState};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{DripError, Result};
    pub use crate::types::*;
}
