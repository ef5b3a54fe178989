//! Crossfade state machine
//!
//! Drives one logical transition at a time: retire the current element,
//! schedule the fade-out curve on its gain node, release the driver's
//! visual resources after the sustain window, then tear the node and
//! element down once the fade has run out.
//!
//! Stages are sequenced by named timers on the fade scheduler. Each
//! transition uses its own sequence number in the timer names, so a new
//! transition never cancels a prior one's cleanup: overlap is bounded by
//! the busy flag (drivers consult `time_running_out`) and the two-slot
//! node bus, not by mutual exclusion.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{normalization_gain_linear, SettingsProvider};
use crate::crossfade::config::CrossfadeConfig;
use crate::element::{ElementRegistry, MediaElementHandle, PlaybackProgress};
use crate::fallback;
use crate::graph::{AudioGraphManager, TrackGainNode};
use crate::param::NEAR_SILENCE;
use crate::scheduler::FadeScheduler;
use crate::types::Seconds;

/// Fade-in ramp length for an incoming track
pub const FADE_IN_SECONDS: Seconds = 0.1;

/// The unbind callback fires this much before the sustain window closes,
/// so the driver swaps visuals before the new track becomes audible
const UNBIND_LEAD: Duration = Duration::from_millis(15);

/// Final linear ramp taking the faded-out node to true zero
const FINAL_RAMP_SECONDS: Seconds = 1.0;

/// Delay between the final ramp and node/element disposal
const DISPOSE_DELAY: Duration = Duration::from_millis(1010);

/// Phase of the transition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    /// Fade curve scheduled, sustain window open
    FadingOut,
    /// Fade elapsed; nodes popped, disposal pending
    Cleanup,
}

struct EngineShared {
    graph: Arc<AudioGraphManager>,
    registry: Arc<ElementRegistry>,
    state: Mutex<TransitionState>,
    busy: AtomicBool,
    controls_locked: AtomicBool,
}

impl EngineShared {
    fn set_state(&self, state: TransitionState) {
        *self.state.lock().unwrap() = state;
    }
}

/// The crossfade engine
pub struct CrossfadeEngine {
    shared: Arc<EngineShared>,
    scheduler: Arc<FadeScheduler>,
    settings: Arc<dyn SettingsProvider>,
    seq: AtomicU64,
}

impl CrossfadeEngine {
    pub fn new(
        graph: Arc<AudioGraphManager>,
        registry: Arc<ElementRegistry>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                graph,
                registry,
                state: Mutex::new(TransitionState::Idle),
                busy: AtomicBool::new(false),
                controls_locked: AtomicBool::new(false),
            }),
            scheduler: Arc::new(FadeScheduler::new()),
            settings,
            seq: AtomicU64::new(0),
        }
    }

    /// Current phase of the transition state machine
    pub fn state(&self) -> TransitionState {
        *self.shared.state.lock().unwrap()
    }

    /// Whether a transition is in flight
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Relaxed)
    }

    /// Whether transport controls are locked for an active transition
    ///
    /// The playback driver must not act on prev/next/play-pause input
    /// while this is set.
    pub fn controls_locked(&self) -> bool {
        self.shared.controls_locked.load(Ordering::Relaxed)
    }

    /// Wire an incoming track into the graph: gain node at zero, then a
    /// fade-in ramp toward its normalization target
    pub fn bind_incoming(
        &self,
        element: &Arc<MediaElementHandle>,
        delay_seconds: Option<f64>,
    ) -> Option<Arc<TrackGainNode>> {
        let node = self
            .shared
            .graph
            .create_track_gain_node(element, delay_seconds)?;

        let target =
            normalization_gain_linear(self.settings.normalization_mode(), element.gain_metadata());
        let now = self.shared.graph.current_time();
        node.gain.exponential_ramp_to(target, now + FADE_IN_SECONDS);
        Some(node)
    }

    /// Whether the playing track is inside its fade-out window
    ///
    /// The driver calls this every progress tick; a `true` answer is its
    /// cue to trigger the next-track transition. Always `false` while a
    /// transition is in flight, when fading is disabled, or when there is
    /// no output graph to fade on.
    pub fn time_running_out(&self, player: &dyn PlaybackProgress) -> bool {
        let config = CrossfadeConfig::from_duration(self.settings.crossfade_duration_seconds());
        if !self.shared.graph.output_available() || !config.enabled || self.is_busy() {
            return false;
        }

        let position = player.position();
        // Ignore the start of a track: a fresh track inside the window
        // would re-trigger immediately
        if position < config.fade_out {
            return false;
        }
        match player.duration() {
            Some(duration) => duration - position <= config.fade_out,
            None => false,
        }
    }

    /// Run the transition for the currently playing element
    pub fn begin_transition(&self) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let shared = &self.shared;

        shared.busy.store(true, Ordering::Relaxed);
        shared.set_state(TransitionState::FadingOut);

        let mut config =
            CrossfadeConfig::from_duration(self.settings.crossfade_duration_seconds());
        let current = shared.registry.current();

        // Fading silence is pointless: degrade to an instant cut when the
        // outgoing element isn't audibly playing
        if let Some(element) = &current {
            if element.is_paused() || !element.has_source() {
                config = CrossfadeConfig::instant_cut();
            }
        }

        let Some(element) = current else {
            log::debug!("transition with no current element, nothing to fade");
            shared.busy.store(false, Ordering::Relaxed);
            shared.set_state(TransitionState::Idle);
            return;
        };

        if !shared.graph.output_available() {
            // No graph to ramp: plain handoff, playback survives without
            // the crossfade
            log::warn!("no output context, falling back to element-volume fade");
            fallback::fade_to_pause(element, &self.scheduler);
            shared.busy.store(false, Ordering::Relaxed);
            shared.set_state(TransitionState::Idle);
            return;
        }

        shared.controls_locked.store(true, Ordering::Relaxed);

        let Some(retired) = shared.registry.retire_current() else {
            shared.controls_locked.store(false, Ordering::Relaxed);
            shared.busy.store(false, Ordering::Relaxed);
            shared.set_state(TransitionState::Idle);
            return;
        };
        let outgoing_id = retired.id();

        if config.enabled && !config.disable_fade {
            if let Some(node) = shared.graph.newest_gain_node() {
                let now = shared.graph.current_time();
                // Pin the present value, then decay toward the floor;
                // exponential ramps can't land on zero
                node.gain.linear_ramp_to(node.gain.value_at(now), now);
                node.gain
                    .exponential_ramp_to(NEAR_SILENCE, now + config.fade_out);
            }
        }

        // Sustain: release the driver's visual resources and unlock
        // transport slightly before the new track takes over
        let sustain = Duration::from_secs_f64(config.sustain)
            .saturating_sub(UNBIND_LEAD);
        let sustain_shared = Arc::clone(shared);
        self.scheduler
            .schedule_in(format!("sustain#{seq}"), sustain, move || {
                sustain_shared.graph.fire_unbind();
                sustain_shared
                    .controls_locked
                    .store(false, Ordering::Relaxed);
            });

        // Fade-out elapsed: pop the oldest nodes and take them to zero
        let fade_shared = Arc::clone(shared);
        let fade_scheduler = Arc::clone(&self.scheduler);
        self.scheduler.schedule_in(
            format!("fadeout#{seq}"),
            Duration::from_secs_f64(config.fade_out),
            move || {
                fade_shared.set_state(TransitionState::Cleanup);

                let (gain, delay) = fade_shared.graph.pop_oldest_nodes();
                match &gain {
                    Some(node) => {
                        let now = fade_shared.graph.current_time();
                        node.gain.linear_ramp_to(0.0, now + FINAL_RAMP_SECONDS);
                    }
                    None => log::debug!("no gain node left at cleanup, skipping ramp"),
                }
                if delay.is_none() {
                    log::debug!("no delay node to tear down for this transition");
                }

                let dispose_shared = Arc::clone(&fade_shared);
                fade_scheduler.schedule_in(
                    format!("dispose#{seq}"),
                    DISPOSE_DELAY,
                    move || {
                        if let Some(node) = &gain {
                            dispose_shared.graph.disconnect_node(node);
                        }
                        dispose_shared.registry.remove_outgoing(outgoing_id);
                        dispose_shared.busy.store(false, Ordering::Relaxed);
                        dispose_shared.set_state(TransitionState::Idle);
                    },
                );
            },
        );
    }
}
