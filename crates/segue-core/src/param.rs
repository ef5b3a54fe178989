//! Scheduled parameter automation
//!
//! A `Param` is a scalar graph parameter (gain, delay time) whose changes
//! are scheduled on the audio timeline rather than applied instantly.
//! Callers push ramps and return immediately; the render thread evaluates
//! the timeline as it plays. This keeps gain motion click-free: everything
//! moves through ramps, the only discontinuous write is the one-time value
//! initialization when a node is created.
//!
//! Control side writes lock the timeline briefly. The render side samples
//! through `try_lock` and falls back to the last evaluated value when the
//! lock is contended, so the audio callback never blocks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::Seconds;

/// Gain floor used where an exponential ramp needs a "near zero" target.
/// Exponential ramps cannot reach zero; fades land here and a final linear
/// ramp takes the last step.
pub const NEAR_SILENCE: f32 = 0.01;

/// Smallest value an exponential ramp may start from or target
const EXPONENTIAL_FLOOR: f32 = 1.0e-4;

/// One scheduled change on a parameter's timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationEvent {
    /// Discontinuous set at a point in time
    SetValue { value: f32, at: Seconds },
    /// Linear ramp from the previous value, finishing at `end`
    LinearRamp { target: f32, end: Seconds },
    /// Exponential ramp from the previous value, finishing at `end`
    ExponentialRamp { target: f32, end: Seconds },
    /// Smoothed exponential approach toward `target`, starting at `start`
    SetTarget {
        target: f32,
        start: Seconds,
        time_constant: Seconds,
    },
}

impl AutomationEvent {
    fn time(&self) -> Seconds {
        match *self {
            AutomationEvent::SetValue { at, .. } => at,
            AutomationEvent::LinearRamp { end, .. } => end,
            AutomationEvent::ExponentialRamp { end, .. } => end,
            AutomationEvent::SetTarget { start, .. } => start,
        }
    }
}

struct ParamInner {
    timeline: Mutex<Vec<AutomationEvent>>,
    /// f32 bits of the last evaluated value, readable without the lock
    cached: AtomicU32,
    initial: f32,
}

/// A shared, automatable scalar parameter
#[derive(Clone)]
pub struct Param {
    inner: Arc<ParamInner>,
}

impl Param {
    /// Create a parameter holding `initial` with an empty timeline
    pub fn new(initial: f32) -> Self {
        Self {
            inner: Arc::new(ParamInner {
                timeline: Mutex::new(Vec::new()),
                cached: AtomicU32::new(initial.to_bits()),
                initial,
            }),
        }
    }

    /// Last evaluated value (lock-free read)
    pub fn value(&self) -> f32 {
        f32::from_bits(self.inner.cached.load(Ordering::Relaxed))
    }

    /// Schedule a discontinuous set at time `at`
    pub fn set_value_at(&self, value: f32, at: Seconds) {
        self.push(AutomationEvent::SetValue { value, at });
    }

    /// Schedule a linear ramp finishing at `end`
    pub fn linear_ramp_to(&self, target: f32, end: Seconds) {
        self.push(AutomationEvent::LinearRamp { target, end });
    }

    /// Schedule an exponential ramp finishing at `end`
    ///
    /// Exponential ramps cannot target zero; a zero or negative target is
    /// clamped to a small positive floor.
    pub fn exponential_ramp_to(&self, target: f32, end: Seconds) {
        let target = if target < EXPONENTIAL_FLOOR {
            log::warn!(
                "exponential ramp target {} below floor, clamping to {}",
                target,
                EXPONENTIAL_FLOOR
            );
            EXPONENTIAL_FLOOR
        } else {
            target
        };
        self.push(AutomationEvent::ExponentialRamp { target, end });
    }

    /// Schedule a smoothed approach toward `target` starting at `start`
    pub fn set_target_at(&self, target: f32, start: Seconds, time_constant: Seconds) {
        self.push(AutomationEvent::SetTarget {
            target,
            start,
            time_constant,
        });
    }

    /// Drop every event scheduled at or after `after`
    pub fn cancel_scheduled(&self, after: Seconds) {
        let mut timeline = self.inner.timeline.lock().unwrap();
        timeline.retain(|ev| ev.time() < after);
    }

    /// Evaluate the timeline at time `t` (control side, blocking lock)
    pub fn value_at(&self, t: Seconds) -> f32 {
        let timeline = self.inner.timeline.lock().unwrap();
        evaluate(&timeline, self.inner.initial, t)
    }

    /// Evaluate at time `t` from the render thread
    ///
    /// Non-blocking: if the timeline is being written to, returns the last
    /// evaluated value instead of waiting.
    pub fn sample(&self, t: Seconds) -> f32 {
        match self.inner.timeline.try_lock() {
            Ok(timeline) => {
                let v = evaluate(&timeline, self.inner.initial, t);
                self.inner.cached.store(v.to_bits(), Ordering::Relaxed);
                v
            }
            Err(_) => self.value(),
        }
    }

    fn push(&self, ev: AutomationEvent) {
        let mut timeline = self.inner.timeline.lock().unwrap();
        // Keep the timeline sorted by event time; equal times preserve
        // insertion order so "pin current value, then ramp" sequences work.
        let at = ev.time();
        let idx = timeline.partition_point(|e| e.time() <= at);
        timeline.insert(idx, ev);
    }
}

/// Walk the timeline and compute the value at `t`
fn evaluate(timeline: &[AutomationEvent], initial: f32, t: Seconds) -> f32 {
    let mut value = initial;

    for (i, ev) in timeline.iter().enumerate() {
        match *ev {
            AutomationEvent::SetValue { value: v, at } => {
                if at > t {
                    return value;
                }
                value = v;
            }
            AutomationEvent::LinearRamp { target, end } => {
                let anchor = segment_start(timeline, i);
                if end <= t || end <= anchor {
                    value = target;
                } else if anchor > t {
                    return value;
                } else {
                    let frac = ((t - anchor) / (end - anchor)) as f32;
                    return value + (target - value) * frac;
                }
            }
            AutomationEvent::ExponentialRamp { target, end } => {
                let anchor = segment_start(timeline, i);
                if end <= t || end <= anchor {
                    value = target;
                } else if anchor > t {
                    return value;
                } else {
                    // Exponential interpolation is undefined from zero;
                    // lift the start onto the floor first.
                    let from = value.max(EXPONENTIAL_FLOOR);
                    let frac = ((t - anchor) / (end - anchor)) as f32;
                    return from * (target / from).powf(frac);
                }
            }
            AutomationEvent::SetTarget {
                target,
                start,
                time_constant,
            } => {
                if start > t {
                    return value;
                }
                // Decay toward the target until the next event (or `t`,
                // whichever comes first).
                let until = timeline
                    .get(i + 1)
                    .map(|next| next.time().min(t))
                    .unwrap_or(t);
                let elapsed = (until - start).max(0.0);
                let decay = (-elapsed / time_constant.max(1.0e-6)).exp() as f32;
                value = target + (value - target) * decay;
                if until >= t {
                    return value;
                }
            }
        }
    }

    value
}

/// Time the segment ending with event `i` begins: the previous event's
/// time, or zero when the ramp is the first event.
fn segment_start(timeline: &[AutomationEvent], i: usize) -> Seconds {
    if i == 0 {
        0.0
    } else {
        timeline[i - 1].time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_value() {
        let p = Param::new(0.5);
        assert_eq!(p.value(), 0.5);
        assert_eq!(p.value_at(10.0), 0.5);
    }

    #[test]
    fn test_set_value_takes_effect_at_time() {
        let p = Param::new(0.0);
        p.set_value_at(1.0, 2.0);
        assert_eq!(p.value_at(1.9), 0.0);
        assert_eq!(p.value_at(2.0), 1.0);
    }

    #[test]
    fn test_linear_ramp_interpolates() {
        let p = Param::new(0.0);
        p.set_value_at(1.0, 0.0);
        p.linear_ramp_to(0.0, 2.0);
        assert!((p.value_at(1.0) - 0.5).abs() < 1e-6);
        assert_eq!(p.value_at(2.0), 0.0);
        assert_eq!(p.value_at(5.0), 0.0);
    }

    #[test]
    fn test_exponential_ramp_decays() {
        let p = Param::new(1.0);
        p.set_value_at(1.0, 0.0);
        p.exponential_ramp_to(NEAR_SILENCE, 4.0);
        // Geometric midpoint at half time
        let mid = p.value_at(2.0);
        assert!((mid - (1.0 * NEAR_SILENCE).sqrt()).abs() < 1e-4);
        assert!((p.value_at(4.0) - NEAR_SILENCE).abs() < 1e-6);
        // Monotonically decreasing
        assert!(p.value_at(1.0) > p.value_at(3.0));
    }

    #[test]
    fn test_exponential_target_clamped_above_zero() {
        let p = Param::new(1.0);
        p.exponential_ramp_to(0.0, 1.0);
        assert!(p.value_at(1.0) > 0.0);
    }

    #[test]
    fn test_pin_then_ramp_sequence() {
        // The crossfade engine pins the current value with a zero-length
        // linear ramp, then schedules the exponential decay.
        let p = Param::new(0.8);
        p.linear_ramp_to(0.8, 1.0);
        p.exponential_ramp_to(NEAR_SILENCE, 3.0);
        assert!((p.value_at(1.0) - 0.8).abs() < 1e-6);
        assert!((p.value_at(3.0) - NEAR_SILENCE).abs() < 1e-6);
    }

    #[test]
    fn test_set_target_approaches() {
        let p = Param::new(0.0);
        p.set_target_at(1.0, 0.0, 0.1);
        let early = p.value_at(0.05);
        let late = p.value_at(1.0);
        assert!(early > 0.0 && early < 1.0);
        // After ten time constants the value is effectively at the target
        assert!((late - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_cancel_scheduled_drops_future_events() {
        let p = Param::new(1.0);
        p.linear_ramp_to(0.0, 5.0);
        p.cancel_scheduled(1.0);
        assert_eq!(p.value_at(5.0), 1.0);
    }

    #[test]
    fn test_sample_updates_cached_value() {
        let p = Param::new(0.0);
        p.set_value_at(0.25, 0.0);
        assert_eq!(p.sample(0.0), 0.25);
        assert_eq!(p.value(), 0.25);
    }
}
