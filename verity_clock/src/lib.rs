//! Time as seen by token lifetimes and webhook replay windows
//!
//! Everything in the `verity` family measures time in whole seconds since the
//! Unix epoch. Operations that depend on "now" take a [`Clock`] so that tests
//! can pin time with a [`TestClock`] instead of sleeping.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{fmt, ops, str::FromStr, time::Duration, time::SystemTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unix time
///
/// The number of whole seconds elapsed since 1970-01-01T00:00:00Z.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// The Unix epoch
    pub const EPOCH: Self = Self(0);

    /// Signed number of seconds from `earlier` to `self`
    ///
    /// Negative when `earlier` is actually later than `self`.
    #[inline]
    #[must_use]
    pub fn seconds_since(self, earlier: UnixTime) -> i64 {
        let diff = i128::from(self.0) - i128::from(earlier.0);
        diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Absolute distance between two instants
    #[inline]
    #[must_use]
    pub fn abs_diff(self, other: UnixTime) -> DurationSecs {
        DurationSecs(self.0.abs_diff(other.0))
    }
}

impl From<SystemTime> for UnixTime {
    /// Instants before the epoch are clamped to the epoch
    #[inline]
    fn from(t: SystemTime) -> Self {
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        UnixTime(secs)
    }
}

impl fmt::Display for UnixTime {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UnixTime {
    type Err = std::num::ParseIntError;

    /// Parses a decimal count of seconds, surrounding whitespace allowed
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl ops::Add<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_add(rhs.0))
    }
}

impl ops::AddAssign<DurationSecs> for UnixTime {
    #[inline]
    fn add_assign(&mut self, rhs: DurationSecs) {
        *self = *self + rhs;
    }
}

impl ops::Sub<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_sub(rhs.0))
    }
}

impl ops::SubAssign<DurationSecs> for UnixTime {
    #[inline]
    fn sub_assign(&mut self, rhs: DurationSecs) {
        *self = *self - rhs;
    }
}

impl ops::Sub for UnixTime {
    type Output = DurationSecs;

    /// Saturates to zero when `rhs` is later than `self`
    #[inline]
    fn sub(self, rhs: UnixTime) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

/// A span of whole seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(transparent)]
pub struct DurationSecs(pub u64);

impl DurationSecs {
    /// No time at all
    pub const ZERO: Self = Self(0);

    /// The span as a signed count, saturating at `i64::MAX`
    #[inline]
    #[must_use]
    pub fn as_signed(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl From<Duration> for DurationSecs {
    /// Sub-second precision is truncated
    #[inline]
    fn from(d: Duration) -> Self {
        Self(d.as_secs())
    }
}

impl From<DurationSecs> for Duration {
    #[inline]
    fn from(d: DurationSecs) -> Self {
        Duration::from_secs(d.0)
    }
}

impl fmt::Display for DurationSecs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl ops::Add for DurationSecs {
    type Output = DurationSecs;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        DurationSecs(self.0.saturating_add(rhs.0))
    }
}

/// A source of the current time
pub trait Clock {
    /// The current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<C: Clock + ?Sized> Clock for &'_ C {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// The wall clock, as reported by [`SystemTime`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A clock that only moves when told to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestClock(UnixTime);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        self.0
    }
}

impl TestClock {
    /// Creates a test clock frozen at `time`
    #[inline]
    pub const fn new(time: UnixTime) -> Self {
        Self(time)
    }

    /// Moves the clock to `val`
    pub fn set(&mut self, val: UnixTime) {
        self.0 = val;
    }

    /// Moves the clock forward
    pub fn advance(&mut self, by: DurationSecs) {
        self.0 += by;
    }

    /// Moves the clock backward, stopping at the epoch
    pub fn rewind(&mut self, by: DurationSecs) {
        self.0 -= by;
    }
}
