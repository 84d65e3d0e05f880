//! Minimum-gap pacing for network calls.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Serializes network calls and keeps them at least `interval` apart.
///
/// The gap is measured from the end of one call to the start of the next,
/// so consecutive start times are never closer than `interval` either.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Creates a pacer. A zero interval only serializes calls.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Returns the configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits out the remaining gap, then runs `call`.
    pub fn pace<R>(&self, call: impl FnOnce() -> R) -> R {
        let mut last = self.last.lock();
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                std::thread::sleep(ready_at - now);
            }
        }
        let result = call();
        *last = Some(Instant::now());
        result
    }
}
