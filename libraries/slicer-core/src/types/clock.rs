/// Stream time
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Stream-time offset in nanoseconds since the start of the stream
///
/// Serialized as a bare `u64`, which is the wire shape of `end_time` in
/// loudness reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockTime(u64);

impl ClockTime {
    /// Start of the stream
    pub const ZERO: Self = Self(0);

    /// Create from raw nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Create from a duration, saturating at `u64::MAX` nanoseconds
    pub fn from_duration(duration: Duration) -> Self {
        Self(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Stream time reached after `frames` frames at `sample_rate`
    pub fn from_frames(frames: u64, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            return Self::ZERO;
        }
        let nanos = u128::from(frames) * u128::from(NANOS_PER_SEC) / u128::from(sample_rate);
        Self(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Raw nanoseconds
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Convert to a `Duration`
    pub fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Elapsed time since `earlier`, zero if `earlier` is later than `self`
    pub fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl From<Duration> for ClockTime {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl fmt::Display for ClockTime {
    /// Formats as `h:mm:ss.nnnnnnnnn`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / NANOS_PER_SEC;
        write!(
            f,
            "{}:{:02}:{:02}.{:09}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.0 % NANOS_PER_SEC
        )
    }
}
