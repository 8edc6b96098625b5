//! # tlock-escrow — Time-Locked Payment Escrow
//!
//! Holds funds on behalf of a recipient until an unlock time:
//!
//! - **Entry** ([`entry`]): The per-payment state machine. Recipient claims at
//!   or after unlock; owner cancels or reschedules before it.
//!
//! - **Asset** ([`asset`]): The non-duplicable [`Coin`] and the [`Treasury`]
//!   collaborator that credits parties.
//!
//! - **Event** ([`event`]): Hash-chained notification records and the sinks
//!   that receive them.
//!
//! - **Ledger** ([`ledger`]): Keyed, per-entry synchronized store exposing
//!   every operation by [`EntryId`](tlock_core::EntryId).
//!
//! - **Config** ([`config`]): Ledger tunables from defaults, environment or
//!   YAML.

pub mod asset;
pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod ledger;

// Re-export primary types.
pub use asset::{Coin, InMemoryTreasury, Treasury};
pub use config::{ConfigError, LedgerConfig};
pub use entry::{EscrowEntry, EscrowStatus, PaymentInfo};
pub use error::{DepositRejected, EscrowError};
pub use event::{
    verify_chain, EscrowEvent, EventChain, EventRecord, EventSink, MemorySink, TracingSink,
};
pub use ledger::EscrowLedger;
