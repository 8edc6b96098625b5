//! # Escrow Error Types
//!
//! Structured error hierarchy for the escrow subsystem. Every variant carries
//! the context an operator needs without reading logs: the entry, the caller,
//! the status or the times that made the precondition fail.
//!
//! Errors abort the operation. Checks precede all writes, so a returned error
//! always means the entry is unchanged and nothing was emitted.

use thiserror::Error;
use tlock_core::{Address, CanonicalizationError, EntryId, EpochMillis};

use crate::asset::Coin;
use crate::entry::EscrowStatus;

/// Errors arising from escrow operations.
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Requested unlock time is not strictly after the current time.
    #[error("unlock time {unlock_time} must be after current time {now}")]
    InvalidSchedule {
        /// The rejected unlock time.
        unlock_time: EpochMillis,
        /// The clock reading at the time of the call.
        now: EpochMillis,
    },

    /// Caller is not the owner of the entry.
    #[error("{caller} is not the owner of {entry_id}")]
    NotOwner {
        /// The entry identifier.
        entry_id: EntryId,
        /// The rejected caller.
        caller: Address,
    },

    /// Caller is not the recipient of the entry.
    #[error("{caller} is not the recipient of {entry_id}")]
    NotRecipient {
        /// The entry identifier.
        entry_id: EntryId,
        /// The rejected caller.
        caller: Address,
    },

    /// Entry is Completed or Cancelled and accepts no further mutation.
    #[error("{entry_id} is already finalized with status {status}")]
    AlreadyFinalized {
        /// The entry identifier.
        entry_id: EntryId,
        /// The terminal status.
        status: EscrowStatus,
    },

    /// Claim attempted before the unlock time.
    #[error("{entry_id} unlocks at {unlock_time}; current time is {now}")]
    NotYetUnlocked {
        /// The entry identifier.
        entry_id: EntryId,
        /// The scheduled unlock time.
        unlock_time: EpochMillis,
        /// The clock reading at the time of the call.
        now: EpochMillis,
    },

    /// Cancellation attempted at or after the unlock time.
    #[error("{entry_id} unlocked at {unlock_time}; cancellation closed (current time {now})")]
    AlreadyUnlocked {
        /// The entry identifier.
        entry_id: EntryId,
        /// The scheduled unlock time.
        unlock_time: EpochMillis,
        /// The clock reading at the time of the call.
        now: EpochMillis,
    },

    /// No entry is stored under the identifier.
    #[error("escrow entry {0} not found")]
    EntryNotFound(EntryId),

    /// A freshly generated id is already taken.
    #[error("escrow entry {0} already exists")]
    DuplicateEntry(EntryId),

    /// Adding funds would overflow the unsigned balance.
    #[error("adding {added} to balance {current} overflows u64")]
    AmountOverflow {
        /// The balance before the addition.
        current: u64,
        /// The amount being added.
        added: u64,
    },

    /// A split asked for more than the coin holds.
    #[error("requested {requested} but only {available} is available")]
    InsufficientFunds {
        /// The requested amount.
        requested: u64,
        /// The available amount.
        available: u64,
    },

    /// Description exceeds the configured limit.
    #[error("description of {len} bytes exceeds limit of {max} bytes")]
    DescriptionTooLong {
        /// The description length in bytes.
        len: usize,
        /// The configured maximum.
        max: usize,
    },

    /// A notification record does not link to its predecessor.
    #[error("event chain for {entry_id} broken at sequence {sequence}: {reason}")]
    BrokenEventChain {
        /// The entry whose chain failed verification.
        entry_id: EntryId,
        /// The first record that failed.
        sequence: u64,
        /// What did not match.
        reason: String,
    },

    /// Canonicalization error during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// JSON serialization of an entry snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EscrowError {
    /// The unlock time and clock reading behind a time-based rejection.
    pub fn timing(&self) -> Option<(EpochMillis, EpochMillis)> {
        match self {
            Self::InvalidSchedule { unlock_time, now }
            | Self::NotYetUnlocked {
                unlock_time, now, ..
            }
            | Self::AlreadyUnlocked {
                unlock_time, now, ..
            } => Some((*unlock_time, *now)),
            _ => None,
        }
    }
}

/// A deposit-consuming operation was rejected.
///
/// The deposit is handed back untouched so the caller keeps custody of the
/// funds.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct DepositRejected {
    /// Why the operation was rejected.
    #[source]
    pub error: EscrowError,
    /// The caller's deposit, returned in full.
    pub deposit: Coin,
}

impl DepositRejected {
    /// Pair an error with the deposit being returned.
    pub fn new(error: EscrowError, deposit: Coin) -> Self {
        Self { error, deposit }
    }

    /// Split into the error and the returned deposit.
    pub fn into_parts(self) -> (EscrowError, Coin) {
        (self.error, self.deposit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn invalid_schedule_display() {
        let err = EscrowError::InvalidSchedule {
            unlock_time: EpochMillis::new(1000),
            now: EpochMillis::new(1000),
        };
        let msg = format!("{err}");
        assert!(msg.contains("1000ms"));
        assert!(msg.contains("must be after"));
    }

    #[test]
    fn not_owner_display() {
        let id = EntryId::new();
        let err = EscrowError::NotOwner {
            entry_id: id,
            caller: addr("mallory"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("mallory"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn already_finalized_display() {
        let err = EscrowError::AlreadyFinalized {
            entry_id: EntryId::new(),
            status: EscrowStatus::Cancelled,
        };
        assert!(format!("{err}").contains("CANCELLED"));
    }

    #[test]
    fn not_yet_unlocked_display() {
        let err = EscrowError::NotYetUnlocked {
            entry_id: EntryId::new(),
            unlock_time: EpochMillis::new(1000),
            now: EpochMillis::new(999),
        };
        let msg = format!("{err}");
        assert!(msg.contains("1000ms"));
        assert!(msg.contains("999ms"));
    }

    #[test]
    fn amount_overflow_display() {
        let err = EscrowError::AmountOverflow {
            current: u64::MAX,
            added: 1,
        };
        assert!(format!("{err}").contains("overflows"));
    }

    #[test]
    fn deposit_rejected_displays_inner_error_and_returns_coin() {
        let rejected = DepositRejected::new(
            EscrowError::EntryNotFound(EntryId::new()),
            Coin::mint(250),
        );
        assert!(format!("{rejected}").contains("not found"));
        assert!(std::error::Error::source(&rejected).is_some());
        let (err, coin) = rejected.into_parts();
        assert!(matches!(err, EscrowError::EntryNotFound(_)));
        assert_eq!(coin.value(), 250);
    }

    #[test]
    fn timing_only_on_time_based_rejections() {
        let id = EntryId::new();
        let late = EscrowError::AlreadyUnlocked {
            entry_id: id,
            unlock_time: EpochMillis::new(1000),
            now: EpochMillis::new(1500),
        };
        assert_eq!(
            late.timing(),
            Some((EpochMillis::new(1000), EpochMillis::new(1500)))
        );
        let early = EscrowError::NotYetUnlocked {
            entry_id: id,
            unlock_time: EpochMillis::new(1000),
            now: EpochMillis::new(999),
        };
        assert_eq!(early.timing().map(|(_, now)| now), Some(EpochMillis::new(999)));
        assert!(EscrowError::DuplicateEntry(id).timing().is_none());
    }
}
