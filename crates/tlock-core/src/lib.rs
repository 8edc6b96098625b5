//! # tlock-core — Foundational Types for the Time-Locked Escrow Stack
//!
//! Every other crate in the workspace depends on `tlock-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** [`Address`] and [`EntryId`]
//!    are distinct types. No bare strings for identities.
//!
//! 2. **Injected time.** Escrow logic reads time only through [`Clock`].
//!    [`EpochMillis`] is an unsigned millisecond count compared as an integer.
//!
//! 3. **`sha256_digest()` accepts only `&CanonicalBytes`.** All notification
//!    digests flow through JCS canonicalization.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tlock-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{Address, EntryId, MAX_ADDRESS_LEN};
pub use temporal::{Clock, EpochMillis, ManualClock, SystemClock};
