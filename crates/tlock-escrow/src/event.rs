//! # Escrow Notifications
//!
//! Every successful state change produces exactly one [`EscrowEvent`]. The
//! ledger seals it into an [`EventRecord`] carrying a per-entry sequence
//! number and a SHA-256 digest that links to the previous record of the same
//! entry, then hands it to an [`EventSink`].
//!
//! Sinks are fire-and-forget: the core never reads notifications back.
//! Ordering is guaranteed per entry because records are emitted while the
//! entry's slot is locked.
//!
//! ## Chain Rule
//!
//! ```text
//! digest(n) = sha256(JCS({entry_id, sequence: n, event, prev_digest: digest(n-1)}))
//! ```
//!
//! The `Created` record has sequence 0 and no `prev_digest`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tlock_core::{
    sha256_digest, Address, CanonicalBytes, CanonicalizationError, ContentDigest, EntryId,
    EpochMillis,
};

use crate::error::EscrowError;

/// A state change of one escrow entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscrowEvent {
    /// Entry created and initial deposit taken into custody.
    Created {
        /// Entry identifier.
        id: EntryId,
        /// Creator of the entry.
        owner: Address,
        /// Party entitled to claim.
        recipient: Address,
        /// Initial deposit.
        amount: u64,
        /// Scheduled unlock time.
        unlock_time: EpochMillis,
    },
    /// Funds added to an active entry.
    Funded {
        /// Entry identifier.
        id: EntryId,
        /// Party that supplied the funds.
        funder: Address,
        /// Amount added.
        amount: u64,
        /// Balance after the addition.
        new_total: u64,
    },
    /// Owner moved the unlock time.
    ScheduleUpdated {
        /// Entry identifier.
        id: EntryId,
        /// Unlock time before the update.
        old_time: EpochMillis,
        /// Unlock time after the update.
        new_time: EpochMillis,
    },
    /// Recipient claimed the full balance.
    Disbursed {
        /// Entry identifier.
        id: EntryId,
        /// Party that received the funds.
        recipient: Address,
        /// Amount paid out.
        amount: u64,
    },
    /// Owner cancelled and took the full balance back.
    Cancelled {
        /// Entry identifier.
        id: EntryId,
        /// Party that received the refund.
        owner: Address,
        /// Amount returned.
        amount: u64,
    },
}

impl EscrowEvent {
    /// The entry this event belongs to.
    pub fn entry_id(&self) -> EntryId {
        match self {
            Self::Created { id, .. }
            | Self::Funded { id, .. }
            | Self::ScheduleUpdated { id, .. }
            | Self::Disbursed { id, .. }
            | Self::Cancelled { id, .. } => *id,
        }
    }

    /// The serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Funded { .. } => "funded",
            Self::ScheduleUpdated { .. } => "schedule_updated",
            Self::Disbursed { .. } => "disbursed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// The unlock time in force after this event, for events that set one.
    pub fn scheduled_unlock(&self) -> Option<EpochMillis> {
        match self {
            Self::Created { unlock_time, .. } => Some(*unlock_time),
            Self::ScheduleUpdated { new_time, .. } => Some(*new_time),
            Self::Funded { .. } | Self::Disbursed { .. } | Self::Cancelled { .. } => None,
        }
    }
}

/// A sealed notification, as delivered to sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Entry the event belongs to.
    pub entry_id: EntryId,
    /// Position in the entry's notification stream, starting at 0.
    pub sequence: u64,
    /// The state change.
    pub event: EscrowEvent,
    /// Digest of the preceding record for the same entry.
    pub prev_digest: Option<ContentDigest>,
    /// Digest of this record.
    pub digest: ContentDigest,
}

#[derive(Serialize)]
struct RecordBody<'a> {
    entry_id: &'a EntryId,
    sequence: u64,
    event: &'a EscrowEvent,
    prev_digest: Option<&'a ContentDigest>,
}

fn record_digest(
    entry_id: &EntryId,
    sequence: u64,
    event: &EscrowEvent,
    prev_digest: Option<&ContentDigest>,
) -> Result<ContentDigest, CanonicalizationError> {
    let body = RecordBody {
        entry_id,
        sequence,
        event,
        prev_digest,
    };
    Ok(sha256_digest(&CanonicalBytes::new(&body)?))
}

impl EventRecord {
    /// Recompute this record's digest from its contents.
    ///
    /// # Errors
    ///
    /// Returns a canonicalization error if the record cannot be serialized.
    pub fn recompute_digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        record_digest(
            &self.entry_id,
            self.sequence,
            &self.event,
            self.prev_digest.as_ref(),
        )
    }
}

/// Per-entry position in the notification stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventChain {
    next_sequence: u64,
    head: Option<ContentDigest>,
}

impl EventChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next record will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Digest of the last sealed record.
    pub fn head(&self) -> Option<&ContentDigest> {
        self.head.as_ref()
    }

    /// Seal `event` as the next record without advancing the chain.
    ///
    /// # Errors
    ///
    /// Returns a canonicalization error if the event cannot be serialized.
    pub fn seal(&self, event: EscrowEvent) -> Result<EventRecord, CanonicalizationError> {
        let entry_id = event.entry_id();
        let digest = record_digest(&entry_id, self.next_sequence, &event, self.head.as_ref())?;
        Ok(EventRecord {
            entry_id,
            sequence: self.next_sequence,
            event,
            prev_digest: self.head,
            digest,
        })
    }

    /// Advance past a record produced by [`seal`](Self::seal).
    pub fn advance(&mut self, record: &EventRecord) {
        self.next_sequence = record.sequence + 1;
        self.head = Some(record.digest);
    }
}

/// Verify that `records` form one entry's complete chain from sequence 0.
///
/// # Errors
///
/// Returns [`EscrowError::BrokenEventChain`] at the first record whose
/// entry, sequence, predecessor link or digest does not match.
pub fn verify_chain(records: &[EventRecord]) -> Result<(), EscrowError> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let entry_id = first.entry_id;
    let mut prev: Option<ContentDigest> = None;
    for (expected_sequence, record) in (0u64..).zip(records) {
        let broken = |reason: &str| EscrowError::BrokenEventChain {
            entry_id,
            sequence: record.sequence,
            reason: reason.to_string(),
        };
        if record.entry_id != entry_id || record.event.entry_id() != entry_id {
            return Err(broken("record belongs to a different entry"));
        }
        if record.sequence != expected_sequence {
            return Err(broken("sequence gap"));
        }
        if record.prev_digest != prev {
            return Err(broken("predecessor digest mismatch"));
        }
        if record.recompute_digest()? != record.digest {
            return Err(broken("digest does not match contents"));
        }
        prev = Some(record.digest);
    }
    Ok(())
}

/// Consumer of sealed notifications.
///
/// Called while the emitting entry is locked; implementations must not call
/// back into the ledger.
pub trait EventSink: Send + Sync {
    /// Deliver one record.
    fn emit(&self, record: &EventRecord);
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, record: &EventRecord) {
        (**self).emit(record)
    }
}

/// Logs every record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, record: &EventRecord) {
        let unlock_time = record.event.scheduled_unlock().map(|t| t.to_iso8601());
        tracing::info!(
            entry_id = %record.entry_id,
            sequence = record.sequence,
            kind = record.event.kind(),
            unlock_time = unlock_time.as_deref(),
            digest = %record.digest,
            "escrow event"
        );
    }
}

/// Keeps every record in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in emission order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Records of one entry, in emission order.
    pub fn records_for(&self, entry_id: EntryId) -> Vec<EventRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.entry_id == entry_id)
            .cloned()
            .collect()
    }

    /// Number of records received.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no record has been received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&self, record: &EventRecord) {
        self.records.lock().push(record.clone());
    }
}
