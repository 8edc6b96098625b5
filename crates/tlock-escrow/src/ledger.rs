//! # Escrow Ledger
//!
//! Keyed store of escrow entries, addressed by [`EntryId`].
//!
//! Each entry lives in its own `DashMap` slot together with its event chain.
//! Every mutating operation takes the slot's write guard, reads the clock,
//! checks preconditions, seals the notification, applies the change and
//! emits the record before releasing the guard. Two callers racing on one
//! entry are therefore serialized: exactly one of a concurrent claim and
//! cancel succeeds, and records reach the sink in sequence order.
//!
//! Sinks run under the slot guard and must not call back into the ledger.

use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tlock_core::{Address, Clock, EntryId, EpochMillis};

use crate::asset::Coin;
use crate::config::LedgerConfig;
use crate::entry::{EscrowEntry, EscrowStatus, PaymentInfo};
use crate::error::{DepositRejected, EscrowError};
use crate::event::{EventChain, EventRecord, EventSink, TracingSink};

#[derive(Debug)]
struct EntrySlot {
    entry: EscrowEntry,
    chain: EventChain,
    /// Ledger-wide insertion order; breaks ties between equal `created_at`.
    ordinal: u64,
}

/// In-process store of time-locked payments.
pub struct EscrowLedger<C, S> {
    entries: DashMap<EntryId, EntrySlot>,
    next_ordinal: AtomicU64,
    clock: C,
    sink: S,
    config: LedgerConfig,
}

impl<C: std::fmt::Debug, S: std::fmt::Debug> std::fmt::Debug for EscrowLedger<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowLedger")
            .field("entries", &self.entries.len())
            .field("clock", &self.clock)
            .field("sink", &self.sink)
            .field("config", &self.config)
            .finish()
    }
}

impl<C: Clock, S: EventSink> EscrowLedger<C, S> {
    /// Create an empty ledger with the default configuration.
    pub fn new(clock: C, sink: S) -> Self {
        Self::with_config(clock, sink, LedgerConfig::default())
    }

    /// Create an empty ledger with an explicit configuration.
    pub fn with_config(clock: C, sink: S, config: LedgerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            next_ordinal: AtomicU64::new(0),
            clock,
            sink,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Lock `deposit` for `recipient` until `unlock_time` and publish the
    /// entry under a fresh id.
    ///
    /// # Errors
    ///
    /// [`EscrowError::DescriptionTooLong`] when a limit is configured and
    /// exceeded, then [`EscrowError::InvalidSchedule`] when `unlock_time` is
    /// not in the future. The deposit is returned inside [`DepositRejected`].
    pub fn create_payment(
        &self,
        deposit: Coin,
        recipient: Address,
        unlock_time: EpochMillis,
        description: String,
        caller: Address,
    ) -> Result<EntryId, DepositRejected> {
        if let Some(max) = self.config.max_description_bytes {
            if description.len() > max {
                let error = EscrowError::DescriptionTooLong {
                    len: description.len(),
                    max,
                };
                tracing::debug!(caller = %caller, error = %error, "create_payment rejected");
                return Err(DepositRejected::new(error, deposit));
            }
        }

        let now = self.clock.now();
        let (entry, event) =
            EscrowEntry::create(deposit, recipient, unlock_time, description, caller, now)
                .map_err(|rejected| {
                    let (unlock_time, now) = rejection_times(&rejected.error);
                    tracing::debug!(
                        unlock_time = unlock_time.as_deref(),
                        now = now.as_deref(),
                        error = %rejected.error,
                        "create_payment rejected"
                    );
                    rejected
                })?;

        let chain = EventChain::new();
        let record = match chain.seal(event) {
            Ok(record) => record,
            Err(e) => return Err(DepositRejected::new(e.into(), entry.dissolve())),
        };

        let id = entry.id();
        match self.entries.entry(id) {
            Entry::Vacant(vacant) => {
                let ordinal = self.next_ordinal.fetch_add(1, Ordering::Relaxed);
                let mut slot = vacant.insert(EntrySlot {
                    entry,
                    chain,
                    ordinal,
                });
                self.publish(&mut slot.chain, record);
                Ok(id)
            }
            Entry::Occupied(_) => Err(DepositRejected::new(
                EscrowError::DuplicateEntry(id),
                entry.dissolve(),
            )),
        }
    }

    /// Add `deposit` to an active entry. Any caller may fund.
    ///
    /// # Errors
    ///
    /// [`EscrowError::EntryNotFound`], [`EscrowError::AlreadyFinalized`] or
    /// [`EscrowError::AmountOverflow`]; the deposit is returned.
    pub fn add_funds(
        &self,
        id: EntryId,
        deposit: Coin,
        caller: &Address,
    ) -> Result<(), DepositRejected> {
        let Some(mut guard) = self.entries.get_mut(&id) else {
            let error = EscrowError::EntryNotFound(id);
            log_rejection("add_funds", id, caller, &error);
            return Err(DepositRejected::new(error, deposit));
        };
        let slot: &mut EntrySlot = &mut guard;

        let sealed = slot
            .entry
            .plan_funding(deposit.value(), caller)
            .and_then(|event| Ok(slot.chain.seal(event)?));
        match sealed {
            Ok(record) => {
                slot.entry.commit_funding(deposit);
                self.publish(&mut slot.chain, record);
                Ok(())
            }
            Err(error) => {
                log_rejection("add_funds", id, caller, &error);
                Err(DepositRejected::new(error, deposit))
            }
        }
    }

    /// Move the unlock time of an active entry. Owner only.
    ///
    /// # Errors
    ///
    /// [`EscrowError::EntryNotFound`], then [`EscrowError::NotOwner`],
    /// [`EscrowError::AlreadyFinalized`] or [`EscrowError::InvalidSchedule`].
    pub fn update_schedule(
        &self,
        id: EntryId,
        new_unlock_time: EpochMillis,
        caller: &Address,
    ) -> Result<(), EscrowError> {
        self.mutate("update_schedule", id, caller, |slot, now| {
            let event = slot.entry.plan_reschedule(new_unlock_time, caller, now)?;
            let record = slot.chain.seal(event)?;
            slot.entry.commit_reschedule(new_unlock_time);
            Ok(((), record))
        })
    }

    /// Pay the whole balance to the recipient.
    ///
    /// # Errors
    ///
    /// [`EscrowError::EntryNotFound`], then [`EscrowError::NotRecipient`],
    /// [`EscrowError::AlreadyFinalized`] or [`EscrowError::NotYetUnlocked`].
    pub fn claim_payment(&self, id: EntryId, caller: &Address) -> Result<Coin, EscrowError> {
        self.mutate("claim_payment", id, caller, |slot, now| {
            let event = slot.entry.plan_claim(caller, now)?;
            let record = slot.chain.seal(event)?;
            Ok((slot.entry.commit_disbursal(EscrowStatus::Completed), record))
        })
    }

    /// Refund the whole balance to the owner.
    ///
    /// # Errors
    ///
    /// [`EscrowError::EntryNotFound`], then [`EscrowError::NotOwner`],
    /// [`EscrowError::AlreadyFinalized`] or [`EscrowError::AlreadyUnlocked`].
    pub fn cancel_payment(&self, id: EntryId, caller: &Address) -> Result<Coin, EscrowError> {
        self.mutate("cancel_payment", id, caller, |slot, now| {
            let event = slot.entry.plan_cancel(caller, now)?;
            let record = slot.chain.seal(event)?;
            Ok((slot.entry.commit_disbursal(EscrowStatus::Cancelled), record))
        })
    }

    /// Read-only snapshot of an entry.
    pub fn get_payment_info(&self, id: EntryId) -> Result<PaymentInfo, EscrowError> {
        self.read(id, |entry| entry.payment_info())
    }

    /// Whether a claim by the recipient would succeed now.
    pub fn is_payment_claimable(&self, id: EntryId) -> Result<bool, EscrowError> {
        let slot = self
            .entries
            .get(&id)
            .ok_or(EscrowError::EntryNotFound(id))?;
        Ok(slot.entry.is_claimable(self.clock.now()))
    }

    /// The entry's memo.
    pub fn description(&self, id: EntryId) -> Result<String, EscrowError> {
        self.read(id, |entry| entry.description().to_string())
    }

    /// Ids of entries created by `owner`, oldest first.
    pub fn entries_owned_by(&self, owner: &Address) -> Vec<EntryId> {
        self.select(|entry| entry.owner() == owner)
    }

    /// Ids of entries payable to `recipient`, oldest first.
    pub fn entries_payable_to(&self, recipient: &Address) -> Vec<EntryId> {
        self.select(|entry| entry.recipient() == recipient)
    }

    /// Sum of all balances held by the ledger.
    pub fn total_custodied(&self) -> u128 {
        self.entries
            .iter()
            .map(|slot| u128::from(slot.entry.balance()))
            .sum()
    }

    /// Number of entries, terminal ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON snapshot of an entry for durable storage by the host.
    ///
    /// # Errors
    ///
    /// [`EscrowError::EntryNotFound`] or [`EscrowError::Serialization`].
    pub fn export_entry(&self, id: EntryId) -> Result<serde_json::Value, EscrowError> {
        let slot = self
            .entries
            .get(&id)
            .ok_or(EscrowError::EntryNotFound(id))?;
        Ok(serde_json::to_value(&slot.entry)?)
    }

    fn read<R>(&self, id: EntryId, f: impl FnOnce(&EscrowEntry) -> R) -> Result<R, EscrowError> {
        self.entries
            .get(&id)
            .map(|slot| f(&slot.entry))
            .ok_or(EscrowError::EntryNotFound(id))
    }

    fn select(&self, predicate: impl Fn(&EscrowEntry) -> bool) -> Vec<EntryId> {
        let mut found: Vec<(EpochMillis, u64, EntryId)> = self
            .entries
            .iter()
            .filter(|slot| predicate(&slot.entry))
            .map(|slot| (slot.entry.created_at(), slot.ordinal, slot.entry.id()))
            .collect();
        found.sort_unstable();
        found.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Run `op` under the entry's write guard and publish its record.
    ///
    /// `op` must not write to the entry before its last fallible step.
    fn mutate<R>(
        &self,
        operation: &'static str,
        id: EntryId,
        caller: &Address,
        op: impl FnOnce(&mut EntrySlot, EpochMillis) -> Result<(R, EventRecord), EscrowError>,
    ) -> Result<R, EscrowError> {
        let result = match self.entries.get_mut(&id) {
            Some(mut guard) => {
                let slot: &mut EntrySlot = &mut guard;
                let now = self.clock.now();
                op(&mut *slot, now).map(|(value, record)| {
                    self.publish(&mut slot.chain, record);
                    value
                })
            }
            None => Err(EscrowError::EntryNotFound(id)),
        };
        if let Err(error) = &result {
            log_rejection(operation, id, caller, error);
        }
        result
    }

    fn publish(&self, chain: &mut EventChain, record: EventRecord) {
        chain.advance(&record);
        if self.config.trace_events {
            TracingSink.emit(&record);
        }
        self.sink.emit(&record);
    }
}

/// ISO-8601 renderings of the unlock time and clock reading, when the
/// rejection was time-based.
fn rejection_times(error: &EscrowError) -> (Option<String>, Option<String>) {
    match error.timing() {
        Some((unlock_time, now)) => (Some(unlock_time.to_iso8601()), Some(now.to_iso8601())),
        None => (None, None),
    }
}

fn log_rejection(operation: &'static str, id: EntryId, caller: &Address, error: &EscrowError) {
    let (unlock_time, now) = rejection_times(error);
    tracing::debug!(
        operation,
        entry_id = %id,
        caller = %caller,
        unlock_time = unlock_time.as_deref(),
        now = now.as_deref(),
        error = %error,
        "escrow operation rejected"
    );
}
