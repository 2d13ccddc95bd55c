//! Clock adapters.
//!
//! - `SystemClock` - real time
//! - `TokioClock` - tokio's clock, which follows `tokio::time::pause`
//! - `ManualClock` - advanced by hand in tests

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::foundation::Timestamp;
use crate::ports::Clock;

/// Real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_time(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Time as seen by the tokio runtime.
///
/// Under a paused runtime (`#[tokio::test(start_paused = true)]`) this
/// clock only moves when tokio auto-advances or `tokio::time::advance`
/// is called, which keeps breakers in step with retry sleeps.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    wall_origin: Timestamp,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            wall_origin: Timestamp::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn wall_time(&self) -> Timestamp {
        self.wall_origin
            .plus(tokio::time::Instant::now().saturating_duration_since(self.origin))
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    wall_base: Timestamp,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Timestamp::now())
    }

    /// Creates a clock whose wall time starts at `wall_base`.
    pub fn starting_at(wall_base: Timestamp) -> Self {
        Self {
            base: Instant::now(),
            wall_base,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wall_time(&self) -> Timestamp {
        self.wall_base.plus(self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::starting_at(Timestamp::from_unix_secs(1_000));
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
        assert_eq!(clock.wall_time().as_unix_secs(), 1_005);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now();
        let wall_start = clock.wall_time();

        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(30));
        assert_eq!(
            clock.wall_time().duration_since(&wall_start).num_seconds(),
            30
        );
    }
}
