//! # Asset Custody
//!
//! [`Coin`] is the single-asset value that moves between parties and escrow
//! entries. It is deliberately neither `Clone` nor `Copy` and cannot be
//! deserialized: the only ways to obtain one are [`Coin::mint`] (the host's
//! issuance entry point), splitting an existing coin, or receiving one from
//! an escrow operation. Funds therefore cannot be duplicated by the core.
//!
//! [`Treasury`] is the `transfer_to` collaborator that credits a party.
//! [`InMemoryTreasury`] keeps per-address holdings in a `DashMap`.

use dashmap::DashMap;
use serde::Serialize;
use tlock_core::Address;

use crate::error::{DepositRejected, EscrowError};

/// An owned amount of the asset, in its smallest unit.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
#[must_use = "dropping a Coin destroys the funds it carries"]
pub struct Coin {
    value: u64,
}

impl Coin {
    /// Issue a new coin. Reserved for the host's asset layer.
    pub fn mint(value: u64) -> Self {
        Self { value }
    }

    /// A coin carrying nothing.
    pub fn zero() -> Self {
        Self { value: 0 }
    }

    /// The amount carried.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Split `amount` off into a new coin.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InsufficientFunds`] if `amount` exceeds the
    /// coin's value. The coin is unchanged on error.
    pub fn split(&mut self, amount: u64) -> Result<Coin, EscrowError> {
        if amount > self.value {
            return Err(EscrowError::InsufficientFunds {
                requested: amount,
                available: self.value,
            });
        }
        self.value -= amount;
        Ok(Coin { value: amount })
    }

    /// Merge `other` into this coin.
    ///
    /// # Errors
    ///
    /// Returns [`DepositRejected`] carrying `other` back if the sum would
    /// overflow `u64`.
    pub fn join(&mut self, other: Coin) -> Result<(), DepositRejected> {
        match self.value.checked_add(other.value) {
            Some(sum) => {
                self.value = sum;
                Ok(())
            }
            None => Err(DepositRejected::new(
                EscrowError::AmountOverflow {
                    current: self.value,
                    added: other.value,
                },
                other,
            )),
        }
    }

    /// Move the whole value out, leaving this coin at zero.
    pub fn take_all(&mut self) -> Coin {
        Coin {
            value: std::mem::take(&mut self.value),
        }
    }

    /// Merge a coin whose sum with this one has already been checked.
    pub(crate) fn absorb(&mut self, other: Coin) {
        self.value = self.value.saturating_add(other.value);
    }
}

/// Destination for funds leaving escrow.
pub trait Treasury: Send + Sync {
    /// Credit `coin` to `to`.
    ///
    /// # Errors
    ///
    /// Returns the coin in [`DepositRejected`] if the credit cannot be
    /// applied.
    fn transfer_to(&self, to: &Address, coin: Coin) -> Result<(), DepositRejected>;
}

/// Per-address holdings kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryTreasury {
    holdings: DashMap<Address, Coin>,
}

impl InMemoryTreasury {
    /// Create an empty treasury.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holdings of `who`.
    pub fn balance_of(&self, who: &Address) -> u64 {
        self.holdings.get(who).map(|entry| entry.value().value()).unwrap_or(0)
    }

    /// Take `amount` out of `who`'s holdings.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InsufficientFunds`] if `who` holds less than
    /// `amount`.
    pub fn withdraw(&self, who: &Address, amount: u64) -> Result<Coin, EscrowError> {
        match self.holdings.get_mut(who) {
            Some(mut coin) => coin.split(amount),
            None if amount == 0 => Ok(Coin::zero()),
            None => Err(EscrowError::InsufficientFunds {
                requested: amount,
                available: 0,
            }),
        }
    }

    /// Sum of all holdings.
    pub fn total(&self) -> u128 {
        self.holdings
            .iter()
            .map(|entry| u128::from(entry.value().value()))
            .sum()
    }
}

impl Treasury for InMemoryTreasury {
    fn transfer_to(&self, to: &Address, coin: Coin) -> Result<(), DepositRejected> {
        self.holdings
            .entry(to.clone())
            .or_insert_with(Coin::zero)
            .join(coin)
    }
}
