//! Time abstraction for testability.
//!
//! This module provides a [`Clock`] trait for timestamps and a [`Sleeper`]
//! trait for waits, so tests can inject controlled time instead of relying
//! on the system clock or real delays.

use std::time::{Duration, SystemTime};

/// Abstraction over system time for testability.
///
/// Implementations provide the current time, allowing tests to inject
/// controlled time values instead of relying on actual system time.
///
/// # Example
///
/// ```
/// use fax_relay::time::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now >= std::time::SystemTime::UNIX_EPOCH);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Production clock using actual system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Abstraction over waiting, used between carrier status polls.
pub trait Sleeper: Send + Sync {
    /// Suspends the caller for `duration`.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production sleeper backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Converts a [`SystemTime`] to whole seconds since the Unix epoch.
///
/// Pre-epoch times map to negative values.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Current time in whole seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    unix_seconds(SystemClock.now())
}
