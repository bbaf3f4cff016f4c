//! Item duration observer.

use std::time::Duration;

use log::trace;

/// Publishes only finite, well-defined durations, once per distinct value.
#[derive(Debug, Default)]
pub struct DurationObserver {
    last: Option<Duration>,
}

impl DurationObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, seconds: f64) -> Option<Duration> {
        if !seconds.is_finite() || seconds < 0.0 {
            trace!("DurationObserver: suppressing undefined duration {}", seconds);
            return None;
        }
        let Ok(duration) = Duration::try_from_secs_f64(seconds) else {
            trace!("DurationObserver: suppressing out-of-range duration {}", seconds);
            return None;
        };
        if self.last == Some(duration) {
            return None;
        }
        self.last = Some(duration);
        Some(duration)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
