//! Injected time.
//!
//! Every decision in the engine takes `now` as a parameter. Only the daemon's
//! poll loop calls [`Timestamp::now`]; tests drive the engine with fixed values.

use std::fmt;
use std::ops::Add;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A point in time, stored as milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Read the wall clock.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(since_epoch.as_millis() as u64)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// The timestamp `dur` after this one.
    pub fn add(self, dur: Duration) -> Self {
        Self(self.0.saturating_add(dur.as_millis() as u64))
    }

    /// Duration from `earlier` to `self`, zero if `earlier` is later.
    pub fn sub(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    pub fn before(self, other: Timestamp) -> bool {
        self.0 < other.0
    }

    pub fn before_or_equal(self, other: Timestamp) -> bool {
        self.0 <= other.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp::add(self, rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_are_inverse() {
        let t0 = Timestamp::from_secs(1_000);
        let t1 = t0.add(Duration::from_secs(34));
        assert_eq!(t1.sub(t0), Duration::from_secs(34));
        assert_eq!(t0 + Duration::from_secs(34), t1);
    }

    #[test]
    fn sub_saturates() {
        let t0 = Timestamp::from_secs(10);
        let t1 = Timestamp::from_secs(20);
        assert_eq!(t0.sub(t1), Duration::ZERO);
    }

    #[test]
    fn ordering_helpers() {
        let t0 = Timestamp::from_secs(10);
        let t1 = Timestamp::from_secs(11);
        assert!(t0.before(t1));
        assert!(!t1.before(t0));
        assert!(!t0.before(t0));
        assert!(t0.before_or_equal(t0));
        assert!(t0.before_or_equal(t1));
    }

    #[test]
    fn display_shows_seconds() {
        assert_eq!(Timestamp::from_millis(12_345).to_string(), "12.345s");
    }
}
