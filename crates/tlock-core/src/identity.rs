//! # Identity Newtypes
//!
//! Newtype wrappers for the two identifier namespaces of the escrow stack.
//! You cannot pass an [`Address`] where an [`EntryId`] is expected.
//!
//! ## Security Invariant
//!
//! Authorization in the escrow state machine is a plain equality test between
//! the authenticated caller and the owner or recipient recorded on an entry.
//! [`Address`] is validated at construction so that two renderings of the
//! same party (e.g. with and without trailing whitespace) cannot compare
//! unequal and no empty identity can ever own funds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum accepted length of an [`Address`], in bytes.
pub const MAX_ADDRESS_LEN: usize = 128;

/// An authenticated party identity, supplied by the host per call.
///
/// The escrow core never interprets the contents; it only compares
/// addresses for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate and wrap an address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] if the input is empty,
    /// longer than [`MAX_ADDRESS_LEN`] bytes, or contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let reason = if value.is_empty() {
            Some("must be non-empty".to_string())
        } else if value.len() > MAX_ADDRESS_LEN {
            Some(format!("exceeds {MAX_ADDRESS_LEN} bytes"))
        } else if value.chars().any(char::is_whitespace) {
            Some("contains whitespace".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ValidationError::InvalidAddress { value, reason }),
            None => Ok(Self(value)),
        }
    }

    /// Access the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of an escrow entry, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a new random entry identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "escrow:{}", self.0)
    }
}
