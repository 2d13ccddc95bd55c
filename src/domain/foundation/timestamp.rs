//! Wall-clock timestamps for reports and rate limit reset times.
//!
//! Elapsed-time arithmetic uses monotonic `Instant`s from a `Clock`; this
//! type is only for values shown to clients or written to Redis.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_unix_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    /// Unix seconds, clamped at zero for pre-epoch times.
    pub fn as_unix_secs(&self) -> u64 {
        u64::try_from(self.0.timestamp()).unwrap_or(0)
    }

    pub fn as_unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Signed distance from `other` to this timestamp.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Offsets by a std duration, saturating for absurdly large offsets.
    pub fn plus(&self, offset: std::time::Duration) -> Self {
        match Duration::from_std(offset) {
            Ok(delta) => Self(self.0.checked_add_signed(delta).unwrap_or(self.0)),
            Err(_) => *self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_enough_for_reports() {
        let first = Timestamp::now();
        let second = Timestamp::now();
        assert!(first <= second);
    }

    #[test]
    fn serializes_as_rfc3339() {
        // 2024-01-15T00:00:00Z
        let ts = Timestamp::from_unix_secs(1_705_276_800);
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15T00:00:00"));
    }

    #[test]
    fn unix_conversions_agree() {
        let ts = Timestamp::from_unix_secs(1_705_276_800);
        assert_eq!(ts.as_unix_secs(), 1_705_276_800);
        assert_eq!(ts.as_unix_millis(), 1_705_276_800_000);
    }

    #[test]
    fn out_of_range_seconds_fall_back_to_epoch() {
        assert_eq!(Timestamp::from_unix_secs(u64::MAX).as_unix_secs(), 0);
    }

    #[test]
    fn plus_adds_std_duration() {
        let ts = Timestamp::from_unix_secs(1_000);
        let later = ts.plus(std::time::Duration::from_millis(1_500));
        assert_eq!(later.as_unix_millis(), 1_001_500);
    }

    #[test]
    fn duration_since_is_signed() {
        let early = Timestamp::from_unix_secs(100);
        let late = Timestamp::from_unix_secs(160);
        assert_eq!(late.duration_since(&early).num_seconds(), 60);
        assert_eq!(early.duration_since(&late).num_seconds(), -60);
    }
}
