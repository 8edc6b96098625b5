//! # Error Types — Structured Error Hierarchy
//!
//! Error types shared by every crate in the escrow stack. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Validation errors carry the rejected input and the reason.
//! - Canonicalization errors carry the offending value.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts and times are unsigned integers.
    #[error("float values are not permitted in canonical representations; use integers for amounts and times: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Address is empty, too long, or contains whitespace.
    #[error("invalid address \"{value}\": {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A millisecond timestamp cannot be represented as a calendar time.
    #[error("timestamp {0}ms is outside the representable calendar range")]
    TimestampOutOfRange(u64),

    /// A digest string is not 64 lowercase hex characters.
    #[error("invalid digest \"{0}\" (expected 64 lowercase hex characters)")]
    InvalidDigest(String),
}
