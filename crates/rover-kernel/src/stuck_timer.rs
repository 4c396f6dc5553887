//! [`StuckTimer`] – detects a rover that is commanded to move but does not.
//!
//! The timer is armed on the first low-velocity observation and disarmed by
//! any observation at or above the stuck velocity.  It fires once the rover
//! has stayed slow for at least the timeout.  Time is passed in by the
//! caller so that tests can drive it deterministically.

use std::time::{Duration, Instant};

use tracing::warn;

/// Monotonic low-velocity timer.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use rover_kernel::stuck_timer::StuckTimer;
///
/// let mut timer = StuckTimer::new();
/// let t0 = Instant::now();
/// let timeout = Duration::from_secs(2);
///
/// assert!(!timer.observe(0.0, t0, timeout, 0.1));
/// assert!(timer.is_armed());
/// assert!(timer.observe(0.0, t0 + timeout, timeout, 0.1));
///
/// // Moving again disarms it.
/// assert!(!timer.observe(0.5, t0 + timeout, timeout, 0.1));
/// assert!(!timer.is_armed());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StuckTimer {
    started: Option<Instant>,
}

impl StuckTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one velocity sample taken at `now`.
    ///
    /// Returns `true` when velocity has been below `stuck_velocity` for at
    /// least `timeout` (inclusive boundary).
    pub fn observe(&mut self, velocity: f32, now: Instant, timeout: Duration, stuck_velocity: f32) -> bool {
        if velocity >= stuck_velocity {
            self.started = None;
            return false;
        }

        let started = *self.started.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        let stuck = elapsed >= timeout;
        if stuck {
            warn!(elapsed_s = elapsed.as_secs_f32(), velocity, "rover stuck");
        }
        stuck
    }

    /// Forget the current low-velocity episode.
    pub fn disarm(&mut self) {
        self.started = None;
    }

    pub fn is_armed(&self) -> bool {
        self.started.is_some()
    }

    /// When the current low-velocity episode began.
    pub fn started(&self) -> Option<Instant> {
        self.started
    }
}
