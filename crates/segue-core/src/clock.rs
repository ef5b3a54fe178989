//! Shared audio timeline clock
//!
//! The clock counts rendered frames and exposes the current position in
//! seconds. The render thread advances it once per processed buffer; every
//! other thread only reads. Cheap to clone (shared handle).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Seconds;

struct ClockInner {
    sample_rate: u32,
    frames: AtomicU64,
}

/// Monotonic clock driven by the render thread
#[derive(Clone)]
pub struct AudioClock {
    inner: Arc<ClockInner>,
}

impl AudioClock {
    /// Create a clock at frame zero
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                sample_rate,
                frames: AtomicU64::new(0),
            }),
        }
    }

    /// Current position on the audio timeline, in seconds
    pub fn now(&self) -> Seconds {
        self.frames() as Seconds / self.inner.sample_rate as Seconds
    }

    /// Total frames rendered so far
    pub fn frames(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    /// Advance the clock by `frames` rendered frames (render thread only)
    pub fn advance(&self, frames: u64) {
        self.inner.frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Sample rate the clock counts against
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_in_seconds() {
        let clock = AudioClock::new(48_000);
        assert_eq!(clock.now(), 0.0);
        clock.advance(24_000);
        assert!((clock.now() - 0.5).abs() < 1e-9);

        let shared = clock.clone();
        shared.advance(24_000);
        assert!((clock.now() - 1.0).abs() < 1e-9);
    }
}
