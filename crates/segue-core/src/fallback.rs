//! Element-volume fade for platforms without an output graph
//!
//! When no output context exists there are no gain nodes to ramp, so a
//! track handoff falls back to stepping the element's own volume down and
//! pausing it at the bottom. Audible but click-free, and playback itself
//! never breaks.

use std::sync::Arc;
use std::time::Duration;

use crate::element::MediaElementHandle;
use crate::scheduler::FadeScheduler;

/// Volume removed per step (element scale, 0..1)
pub const FADE_STEP: f32 = 0.01;

/// Interval between steps
pub const STEP_INTERVAL: Duration = Duration::from_millis(20);

/// Step the element's volume to zero, then pause it
///
/// Each element gets its own timer name, so concurrent fades on different
/// elements don't interfere; re-invoking on the same element restarts its
/// fade from the current volume.
pub fn fade_to_pause(element: Arc<MediaElementHandle>, scheduler: &Arc<FadeScheduler>) {
    schedule_step(element, Arc::clone(scheduler));
}

fn schedule_step(element: Arc<MediaElementHandle>, scheduler: Arc<FadeScheduler>) {
    let name = format!("element-fade#{}", element.id());
    let sched = Arc::clone(&scheduler);
    scheduler.schedule_in(name, STEP_INTERVAL, move || {
        let volume = (element.volume() - FADE_STEP).max(0.0);
        element.set_volume(volume);
        if volume <= 0.0 {
            element.pause();
        } else {
            schedule_step(element, sched);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::GainMetadata;
    use crate::graph::node::SilenceSource;

    #[test]
    fn test_fade_reaches_zero_and_pauses() {
        let scheduler = Arc::new(FadeScheduler::new());
        let element = MediaElementHandle::new(48_000);
        element.set_source(
            "track://fallback",
            Box::new(SilenceSource),
            Some(10.0),
            GainMetadata::default(),
        );
        element.play();
        element.set_volume(0.05);

        fade_to_pause(Arc::clone(&element), &scheduler);

        // 5 steps at 20 ms each; leave generous headroom
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(element.volume(), 0.0);
        assert!(element.is_paused());
    }
}
