//! # Escrow Entry State Machine
//!
//! A single time-locked payment: funds held for a recipient, claimable once
//! the unlock time is reached, cancellable by the owner before it.
//!
//! ## Status machine
//!
//! ```text
//! Active ──claim (recipient, now >= unlock)──▶ Completed
//!    │
//!    └────cancel (owner, now < unlock)───────▶ Cancelled
//! ```
//!
//! Both terminal statuses reject every further mutation. While Active, any
//! party may add funds and the owner may move the unlock time forward or
//! back, as long as the new time is still in the future.
//!
//! ## Check Order
//!
//! Preconditions are checked identity first, then status, then time, and
//! only the first violated one is reported. All checks run before any write,
//! so a rejected call leaves the entry untouched.
//!
//! Each mutating operation is split into a `plan_*` step that validates and
//! returns the event describing the change, and a crate-private `commit_*`
//! step that applies it. The public operations run both; the ledger seals
//! the planned event between the two so a sealing failure cannot leave a
//! half-applied change.

use serde::{Deserialize, Serialize};
use tlock_core::{Address, EntryId, EpochMillis};

use crate::asset::Coin;
use crate::error::{DepositRejected, EscrowError};
use crate::event::EscrowEvent;

/// Lifecycle status of an escrow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// Funds held; claim or cancel still possible.
    Active,
    /// Recipient claimed the balance. Terminal.
    Completed,
    /// Owner cancelled and was refunded. Terminal.
    Cancelled,
}

impl EscrowStatus {
    /// Whether no further mutation is allowed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot returned by `get_payment_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    /// Creator of the entry.
    pub owner: Address,
    /// Party entitled to claim.
    pub recipient: Address,
    /// Funds currently held.
    pub balance: u64,
    /// Earliest time a claim succeeds.
    pub unlock_time: EpochMillis,
    /// Lifecycle status.
    pub status: EscrowStatus,
}

/// A time-locked payment held in custody.
///
/// Fields are private: `id`, `owner`, `recipient`, `description` and
/// `created_at` never change after [`create`](Self::create), and the balance,
/// unlock time and status change only through the operations below.
#[derive(Debug, Serialize)]
pub struct EscrowEntry {
    id: EntryId,
    #[serde(rename = "custodied_amount")]
    custodied: Coin,
    owner: Address,
    recipient: Address,
    unlock_time: EpochMillis,
    description: String,
    status: EscrowStatus,
    created_at: EpochMillis,
}

impl EscrowEntry {
    /// Lock `deposit` for `recipient` until `unlock_time`, owned by `caller`.
    ///
    /// A zero deposit is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidSchedule`] inside [`DepositRejected`] if
    /// `unlock_time <= now`; the deposit is handed back.
    pub fn create(
        deposit: Coin,
        recipient: Address,
        unlock_time: EpochMillis,
        description: String,
        caller: Address,
        now: EpochMillis,
    ) -> Result<(Self, EscrowEvent), DepositRejected> {
        if unlock_time <= now {
            return Err(DepositRejected::new(
                EscrowError::InvalidSchedule { unlock_time, now },
                deposit,
            ));
        }
        let entry = Self {
            id: EntryId::new(),
            custodied: deposit,
            owner: caller,
            recipient,
            unlock_time,
            description,
            status: EscrowStatus::Active,
            created_at: now,
        };
        let event = EscrowEvent::Created {
            id: entry.id,
            owner: entry.owner.clone(),
            recipient: entry.recipient.clone(),
            amount: entry.custodied.value(),
            unlock_time,
        };
        Ok((entry, event))
    }

    /// Add `deposit` to the held balance. Any caller may fund an active entry.
    ///
    /// # Errors
    ///
    /// [`EscrowError::AlreadyFinalized`] if the entry is terminal,
    /// [`EscrowError::AmountOverflow`] if the sum exceeds `u64`. The deposit
    /// is handed back in both cases.
    pub fn add_funds(
        &mut self,
        deposit: Coin,
        caller: &Address,
    ) -> Result<EscrowEvent, DepositRejected> {
        match self.plan_funding(deposit.value(), caller) {
            Ok(event) => {
                self.commit_funding(deposit);
                Ok(event)
            }
            Err(error) => Err(DepositRejected::new(error, deposit)),
        }
    }

    /// Move the unlock time.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotOwner`], [`EscrowError::AlreadyFinalized`] or
    /// [`EscrowError::InvalidSchedule`], checked in that order.
    pub fn update_schedule(
        &mut self,
        new_unlock_time: EpochMillis,
        caller: &Address,
        now: EpochMillis,
    ) -> Result<EscrowEvent, EscrowError> {
        let event = self.plan_reschedule(new_unlock_time, caller, now)?;
        self.commit_reschedule(new_unlock_time);
        Ok(event)
    }

    /// Pay the whole balance to the recipient and complete the entry.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotRecipient`], [`EscrowError::AlreadyFinalized`] or
    /// [`EscrowError::NotYetUnlocked`], checked in that order.
    pub fn claim(
        &mut self,
        caller: &Address,
        now: EpochMillis,
    ) -> Result<(Coin, EscrowEvent), EscrowError> {
        let event = self.plan_claim(caller, now)?;
        let payout = self.commit_disbursal(EscrowStatus::Completed);
        Ok((payout, event))
    }

    /// Refund the whole balance to the owner and cancel the entry.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotOwner`], [`EscrowError::AlreadyFinalized`] or
    /// [`EscrowError::AlreadyUnlocked`], checked in that order.
    pub fn cancel(
        &mut self,
        caller: &Address,
        now: EpochMillis,
    ) -> Result<(Coin, EscrowEvent), EscrowError> {
        let event = self.plan_cancel(caller, now)?;
        let refund = self.commit_disbursal(EscrowStatus::Cancelled);
        Ok((refund, event))
    }

    /// Validate an `add_funds` of `amount` and describe its effect.
    pub fn plan_funding(&self, amount: u64, caller: &Address) -> Result<EscrowEvent, EscrowError> {
        self.ensure_active()?;
        let current = self.custodied.value();
        let new_total = current
            .checked_add(amount)
            .ok_or(EscrowError::AmountOverflow {
                current,
                added: amount,
            })?;
        Ok(EscrowEvent::Funded {
            id: self.id,
            funder: caller.clone(),
            amount,
            new_total,
        })
    }

    /// Validate an `update_schedule` and describe its effect.
    pub fn plan_reschedule(
        &self,
        new_unlock_time: EpochMillis,
        caller: &Address,
        now: EpochMillis,
    ) -> Result<EscrowEvent, EscrowError> {
        self.ensure_owner(caller)?;
        self.ensure_active()?;
        if new_unlock_time <= now {
            return Err(EscrowError::InvalidSchedule {
                unlock_time: new_unlock_time,
                now,
            });
        }
        Ok(EscrowEvent::ScheduleUpdated {
            id: self.id,
            old_time: self.unlock_time,
            new_time: new_unlock_time,
        })
    }

    /// Validate a claim and describe its effect.
    pub fn plan_claim(&self, caller: &Address, now: EpochMillis) -> Result<EscrowEvent, EscrowError> {
        if *caller != self.recipient {
            return Err(EscrowError::NotRecipient {
                entry_id: self.id,
                caller: caller.clone(),
            });
        }
        self.ensure_active()?;
        if now < self.unlock_time {
            return Err(EscrowError::NotYetUnlocked {
                entry_id: self.id,
                unlock_time: self.unlock_time,
                now,
            });
        }
        Ok(EscrowEvent::Disbursed {
            id: self.id,
            recipient: self.recipient.clone(),
            amount: self.custodied.value(),
        })
    }

    /// Validate a cancellation and describe its effect.
    pub fn plan_cancel(&self, caller: &Address, now: EpochMillis) -> Result<EscrowEvent, EscrowError> {
        self.ensure_owner(caller)?;
        self.ensure_active()?;
        if now >= self.unlock_time {
            return Err(EscrowError::AlreadyUnlocked {
                entry_id: self.id,
                unlock_time: self.unlock_time,
                now,
            });
        }
        Ok(EscrowEvent::Cancelled {
            id: self.id,
            owner: self.owner.clone(),
            amount: self.custodied.value(),
        })
    }

    pub(crate) fn commit_funding(&mut self, deposit: Coin) {
        self.custodied.absorb(deposit);
    }

    pub(crate) fn commit_reschedule(&mut self, new_unlock_time: EpochMillis) {
        self.unlock_time = new_unlock_time;
    }

    pub(crate) fn commit_disbursal(&mut self, status: EscrowStatus) -> Coin {
        self.status = status;
        self.custodied.take_all()
    }

    /// Give the deposit of a never-published entry back to its creator.
    pub(crate) fn dissolve(self) -> Coin {
        self.custodied
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), EscrowError> {
        if *caller != self.owner {
            return Err(EscrowError::NotOwner {
                entry_id: self.id,
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), EscrowError> {
        if self.status.is_terminal() {
            return Err(EscrowError::AlreadyFinalized {
                entry_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Read-only snapshot.
    pub fn payment_info(&self) -> PaymentInfo {
        PaymentInfo {
            owner: self.owner.clone(),
            recipient: self.recipient.clone(),
            balance: self.custodied.value(),
            unlock_time: self.unlock_time,
            status: self.status,
        }
    }

    /// Whether a claim by the recipient would succeed at `now`.
    pub fn is_claimable(&self, now: EpochMillis) -> bool {
        self.status == EscrowStatus::Active && now >= self.unlock_time
    }

    /// Entry identifier.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Funds currently held.
    pub fn balance(&self) -> u64 {
        self.custodied.value()
    }

    /// Creator of the entry.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Party entitled to claim.
    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    /// Earliest time a claim succeeds.
    pub fn unlock_time(&self) -> EpochMillis {
        self.unlock_time
    }

    /// Free-form memo.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lifecycle status.
    pub fn status(&self) -> EscrowStatus {
        self.status
    }

    /// Clock reading at creation.
    pub fn created_at(&self) -> EpochMillis {
        self.created_at
    }
}
