//! Fixed-cadence rotation scheduler.
//!
//! Fires once per interval on Tokio time. If the owning task falls behind
//! (a slow store, a stalled runtime), missed rotations are skipped rather
//! than fired back to back: a burst of tokens that each live five seconds
//! is worthless to a presenter who can only show one.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Shortest interval the scheduler accepts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Returned by [`RotationScheduler::wait_for_rotation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationTick {
    /// Monotonically increasing rotation number (starts at 1).
    pub rotation: u64,
    /// How many whole intervals were skipped because this tick fired late.
    pub skipped: u64,
}

/// Drives one presenter's rotation loop.
#[derive(Debug)]
pub struct RotationScheduler {
    interval: Duration,
    next: Instant,
    rotations: u64,
    total_skipped: u64,
}

impl RotationScheduler {
    /// Creates a scheduler whose first tick fires one interval from now.
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(interval: Duration) -> Self {
        Self::with_jitter(interval, Duration::ZERO)
    }

    /// Like [`new`](Self::new), but delays the first tick by a random
    /// `0..max_jitter` so presenters started together drift apart.
    pub fn with_jitter(interval: Duration, max_jitter: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            warn!(?interval, min = ?MIN_INTERVAL, "rotation interval too short, clamping");
            MIN_INTERVAL
        } else {
            interval
        };
        let max_us = max_jitter.as_micros() as u64;
        let jitter = if max_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..max_us))
        } else {
            Duration::ZERO
        };
        debug!(?interval, ?jitter, "rotation scheduler created");
        Self {
            interval,
            next: Instant::now() + interval + jitter,
            rotations: 0,
            total_skipped: 0,
        }
    }

    /// Waits until the next rotation is due.
    pub async fn wait_for_rotation(&mut self) -> RotationTick {
        time::sleep_until(self.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next);
        let skipped = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
        if skipped > 0 {
            warn!(
                rotation = self.rotations + 1,
                skipped,
                late_ms = late_by.as_millis() as u64,
                "rotation overrun, skipping ahead"
            );
        }

        self.rotations += 1;
        self.total_skipped += skipped;
        // Always schedule from now, not from the missed deadline.
        self.next = now + self.interval;

        trace!(rotation = self.rotations, "rotation due");
        RotationTick {
            rotation: self.rotations,
            skipped,
        }
    }

    pub fn rotation_count(&self) -> u64 {
        self.rotations
    }

    pub fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
