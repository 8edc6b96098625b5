//! # Temporal Types
//!
//! Millisecond-precision time for the escrow stack. Unlock times and clock
//! readings are unsigned milliseconds since the Unix epoch, compared as plain
//! integers. Calendar rendering via `chrono` is a presentation concern only.
//!
//! ## Clock Injection
//!
//! The escrow core never reads the wall clock directly. Every operation
//! receives the current time from a [`Clock`] supplied by the host, which is
//! trusted and monotonic from the core's perspective. [`SystemClock`] reads
//! UTC wall time; [`ManualClock`] is set explicitly and is what tests and
//! deterministic hosts use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EpochMillis(u64);

impl EpochMillis {
    /// Wrap a raw millisecond count.
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// The raw millisecond count.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert to a `chrono::DateTime<Utc>`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TimestampOutOfRange`] if the value is past
    /// the calendar range chrono can represent.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, ValidationError> {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or(ValidationError::TimestampOutOfRange(self.0))
    }

    /// Render as ISO 8601 with millisecond precision and a `Z` suffix, or the
    /// raw millisecond count if the value has no calendar representation.
    pub fn to_iso8601(&self) -> String {
        match self.to_datetime() {
            Ok(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            Err(_) => format!("{}ms", self.0),
        }
    }
}

impl From<u64> for EpochMillis {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl std::fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current time as seen by the host.
    fn now(&self) -> EpochMillis;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> EpochMillis {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> EpochMillis {
        (**self).now()
    }
}

/// Wall-clock UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochMillis {
        // Clamp a pre-epoch system clock to zero rather than wrapping.
        EpochMillis(u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0))
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: impl Into<EpochMillis>) -> Self {
        Self {
            millis: AtomicU64::new(start.into().0),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: impl Into<EpochMillis>) {
        self.millis.store(to.into().0, Ordering::SeqCst);
    }

    /// Move forward by `millis`, saturating. Returns the new reading.
    pub fn advance(&self, millis: u64) -> EpochMillis {
        let mut current = self.millis.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(millis);
            match self.millis.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return EpochMillis(next),
                Err(observed) => current = observed,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochMillis {
        EpochMillis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso8601_rendering() {
        let ms = EpochMillis::new(1_768_478_400_000);
        assert_eq!(ms.to_iso8601(), "2026-01-15T12:00:00.000Z");
        assert_eq!(EpochMillis::new(0).to_iso8601(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn datetime_keeps_millis() {
        let dt = EpochMillis::new(1_768_478_400_123).to_datetime().unwrap();
        assert_eq!(dt.timestamp_millis(), 1_768_478_400_123);
        assert_eq!(
            EpochMillis::new(1_768_478_400_123).to_iso8601(),
            "2026-01-15T12:00:00.123Z"
        );
    }

    #[test]
    fn out_of_range_renders_raw() {
        let ms = EpochMillis::new(u64::MAX);
        assert!(ms.to_datetime().is_err());
        assert_eq!(ms.to_iso8601(), format!("{}ms", u64::MAX));
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(EpochMillis::new(999) < EpochMillis::new(1000));
        assert_eq!(EpochMillis::new(0), EpochMillis::default());
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&EpochMillis::new(1000)).unwrap();
        assert_eq!(json, "1000");
        let back: EpochMillis = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_millis(), 1000);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(500u64);
        assert_eq!(clock.now(), EpochMillis::new(500));
        clock.set(999u64);
        assert_eq!(clock.now().as_millis(), 999);
        assert_eq!(clock.advance(1), EpochMillis::new(1000));
        assert_eq!(clock.now().as_millis(), 1000);
    }

    #[test]
    fn manual_clock_advance_saturates() {
        let clock = ManualClock::new(u64::MAX - 1);
        assert_eq!(clock.advance(10).as_millis(), u64::MAX);
    }

    #[test]
    fn shared_clock_observes_updates() {
        let clock = Arc::new(ManualClock::new(0u64));
        let handle: Arc<dyn Clock> = clock.clone();
        clock.set(42u64);
        assert_eq!(handle.now().as_millis(), 42);
    }

    #[test]
    fn system_clock_is_after_2020() {
        let now = SystemClock.now();
        // 2020-01-01T00:00:00Z
        assert!(now > EpochMillis::new(1_577_836_800_000));
    }
}
