//! Periodic playback-position observer.

use std::{num::NonZeroU32, time::Duration};

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use log::trace;

/// Forwards at most one position per interval while playing.
///
/// Suspension is explicit: it is engaged for the length of a seek gesture so
/// that engine positions never overwrite the value the user is dragging.
pub struct TimeObserver {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    suspended: bool,
}

impl TimeObserver {
    pub fn new(interval: Duration) -> Self {
        let quota = Quota::with_period(interval.max(Duration::from_millis(1)))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(quota),
            suspended: false,
        }
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Returns the position to publish, if this tick should be delivered.
    pub fn observe(&mut self, seconds: f64, playing: bool) -> Option<Duration> {
        if self.suspended || !playing {
            return None;
        }
        if !seconds.is_finite() {
            trace!("TimeObserver: dropping non-finite position {}", seconds);
            return None;
        }
        let Ok(position) = Duration::try_from_secs_f64(seconds.max(0.0)) else {
            trace!("TimeObserver: dropping out-of-range position {}", seconds);
            return None;
        };
        if self.limiter.check().is_err() {
            return None;
        }
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_second_tick_within_interval_is_dropped() {
        let mut observer = TimeObserver::new(Duration::from_millis(500));
        assert_eq!(observer.observe(1.0, true), Some(Duration::from_secs(1)));
        assert_eq!(observer.observe(1.1, true), None);
    }

    #[test]
    fn test_tick_after_interval_is_delivered() {
        let mut observer = TimeObserver::new(Duration::from_millis(30));
        assert!(observer.observe(1.0, true).is_some());
        thread::sleep(Duration::from_millis(60));
        assert!(observer.observe(1.5, true).is_some());
    }

    #[test]
    fn test_suspended_or_paused_observer_delivers_nothing() {
        let mut observer = TimeObserver::new(Duration::from_millis(500));
        observer.suspend();
        assert_eq!(observer.observe(2.0, true), None);
        assert_eq!(observer.observe(2.0, false), None);

        observer.resume();
        assert_eq!(observer.observe(2.0, false), None);
        // Dropped ticks must not have used up the quota.
        assert_eq!(observer.observe(2.0, true), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_non_finite_and_negative_positions() {
        let mut observer = TimeObserver::new(Duration::from_millis(500));
        assert_eq!(observer.observe(f64::NAN, true), None);
        assert_eq!(observer.observe(-3.0, true), Some(Duration::ZERO));
    }

    #[test]
    fn test_out_of_range_position_is_dropped_without_using_quota() {
        let mut observer = TimeObserver::new(Duration::from_millis(500));
        assert_eq!(observer.observe(1e300, true), None);
        assert_eq!(observer.observe(f64::MAX, true), None);
        assert_eq!(observer.observe(4.0, true), Some(Duration::from_secs(4)));
    }
}
