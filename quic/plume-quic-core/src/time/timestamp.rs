// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
    time::Duration,
};

/// An absolute point in time, in nanoseconds since the clock epoch.
///
/// The absolute value of `Timestamp`s should be treated as opaque. It is
/// not necessarily related to any calendar time. `Timestamp`s should only
/// be compared if they are sourced from the same clock.
///
/// The size of `Timestamp` is guaranteed to be consistent across
/// platforms.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a `Timestamp` from nanoseconds since the clock epoch
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the nanoseconds since the clock epoch
    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Tries to add the provided `Duration`, returning `None` on overflow
    #[inline]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        // 2^64 nanoseconds is ~580 years, so durations in that range cast
        // losslessly
        let nanos = u64::try_from(duration.as_nanos()).ok()?;
        self.0.checked_add(nanos).map(Self)
    }

    /// Tries to subtract the provided `Duration`, returning `None` if the
    /// result would precede the epoch
    #[inline]
    pub fn checked_sub(self, duration: Duration) -> Option<Self> {
        let nanos = u64::try_from(duration.as_nanos()).ok()?;
        self.0.checked_sub(nanos).map(Self)
    }

    /// Returns the `Duration` which elapsed since an earlier `Timestamp`.
    /// If `earlier` is more recent, a `Duration` of 0 is returned.
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.checked_add(rhs)
            .expect("timestamp arithmetic overflow")
    }
}

impl AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        self.checked_sub(rhs)
            .expect("timestamp arithmetic underflow")
    }
}

impl SubAssign<Duration> for Timestamp {
    #[inline]
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Self::Output {
        Duration::from_nanos(
            self.0
                .checked_sub(rhs.0)
                .expect("timestamps are not ordered"),
        )
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({self})")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let duration = Duration::from_nanos(self.0);
        let micros = duration.subsec_micros();
        let secs = duration.as_secs() % 60;
        let mins = duration.as_secs() / 60 % 60;
        let hours = duration.as_secs() / 60 / 60;
        if micros != 0 {
            write!(f, "{hours}:{mins:02}:{secs:02}.{micros:06}")
        } else {
            write!(f, "{hours}:{mins:02}:{secs:02}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let base = Timestamp::from_nanos(1_000);
        let later = base + Duration::from_nanos(500);
        assert_eq!(later.as_nanos(), 1_500);
        assert_eq!(later - base, Duration::from_nanos(500));
        assert_eq!(base.saturating_duration_since(later), Duration::ZERO);
        assert_eq!(later.checked_sub(Duration::from_micros(2)), None);
    }

    #[test]
    fn fmt_test() {
        let ts = Timestamp::from_nanos(0) + Duration::from_secs(61);
        assert_eq!(format!("{ts}"), "0:01:01");
        let ts = ts + Duration::from_micros(42);
        assert_eq!(format!("{ts:?}"), "Timestamp(0:01:01.000042)");
    }
}
