//! Master audio graph manager
//!
//! Single source of truth for the shared output path: the lazily created
//! output context, the mixer gain, and the volume/mute math. All track
//! nodes connect downstream into the mixer; nothing else reaches hardware.
//!
//! Error policy: `initialize` reports failure explicitly; every operation
//! after that degrades to a logged no-op when the context is missing, so
//! playback keeps working (without fades or visualization) on platforms
//! with no usable output device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::element::MediaElementHandle;
use crate::error::{GraphError, GraphResult};
use crate::graph::bus::NodeBus;
use crate::graph::context::{ContextHandle, OutputBackend, OutputContext};
use crate::graph::node::{DelayHandle, SilenceSource, TrackGainNode};
use crate::graph::render::{GraphCommand, TapId};
use crate::param::Param;
use crate::types::{NodeId, Seconds, DEFAULT_SAMPLE_RATE};

/// Fixed makeup boost compensating for perceptual loudness loss in the mix
pub const MAKEUP_GAIN_DB: f32 = 2.0;

/// Mute/unmute ramp length
const MUTE_RAMP_SECONDS: Seconds = 1.5;

/// Offset and time constant of the smoothed volume ramp
const VOLUME_RAMP_DELAY: Seconds = 0.2;
const VOLUME_RAMP_TIME_CONSTANT: Seconds = 0.1;

/// Callback invoked mid-fade to tell the playback driver the outgoing
/// element's visual resources can be released
pub type UnbindCallback = Box<dyn Fn() + Send + Sync>;

/// Reduce a 0-100 volume by `reduction_db`, staying on the 0-100 scale
fn apply_db_reduction(volume: f32, reduction_db: f32) -> f32 {
    let linear = volume / 100.0;
    linear * 10.0_f32.powf(-reduction_db / 20.0) * 100.0
}

struct GraphState {
    context: Option<OutputContext>,
    gain_bus: NodeBus<Arc<TrackGainNode>>,
    delay_bus: NodeBus<DelayHandle>,
}

/// Owner of the shared output graph
pub struct AudioGraphManager {
    state: Mutex<GraphState>,
    /// User-scale volume (0-100, floored at 1 so exponential ramps never
    /// target zero)
    volume: Mutex<f32>,
    muted: AtomicBool,
    makeup_gain: f32,
    unbind: Mutex<Option<UnbindCallback>>,
}

impl AudioGraphManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GraphState {
                context: None,
                gain_bus: NodeBus::new(),
                delay_bus: NodeBus::new(),
            }),
            // Headroom for the makeup boost: 100% user volume maps below
            // unity so the boosted signal lands back at unity
            volume: Mutex::new(apply_db_reduction(100.0, MAKEUP_GAIN_DB)),
            muted: AtomicBool::new(false),
            makeup_gain: 10.0_f32.powf(MAKEUP_GAIN_DB / 20.0),
            unbind: Mutex::new(None),
        }
    }

    /// Create the output context and mixer if absent
    ///
    /// Idempotent: a second call only refreshes the unbind callback and
    /// returns `Ok(None)`. The first successful call returns the handle
    /// that keeps output alive (live) or pumps it (offline).
    pub fn initialize(&self, unbind: UnbindCallback) -> GraphResult<Option<ContextHandle>> {
        self.initialize_with(OutputBackend::Live, unbind)
    }

    /// `initialize` with an explicit backend choice
    pub fn initialize_with(
        &self,
        backend: OutputBackend,
        unbind: UnbindCallback,
    ) -> GraphResult<Option<ContextHandle>> {
        *self.unbind.lock().unwrap() = Some(unbind);

        let mut state = self.state.lock().unwrap();
        if state.context.is_some() {
            log::debug!("output graph already initialized");
            return Ok(None);
        }

        let (context, handle) = match backend {
            OutputBackend::Live => {
                let (context, output) = OutputContext::live()?;
                (context, ContextHandle::Live(output))
            }
            OutputBackend::Offline => {
                let (context, renderer) = OutputContext::offline(DEFAULT_SAMPLE_RATE);
                (context, ContextHandle::Offline(renderer))
            }
        };

        // Ease the mixer in rather than snapping to the initial volume
        let target = self.mixer_target();
        let now = context.current_time();
        context.mixer_gain().exponential_ramp_to(target, now + VOLUME_RAMP_DELAY);

        state.context = Some(context);
        Ok(Some(handle))
    }

    /// Whether the shared output path exists
    pub fn output_available(&self) -> bool {
        self.state.lock().unwrap().context.is_some()
    }

    /// Current position on the audio timeline (zero when uninitialized)
    pub fn current_time(&self) -> Seconds {
        self.state
            .lock()
            .unwrap()
            .context
            .as_ref()
            .map(|ctx| ctx.current_time())
            .unwrap_or(0.0)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .context
            .as_ref()
            .map(|ctx| ctx.sample_rate())
    }

    /// Mixer gain parameter, for inspection
    pub fn mixer_gain(&self) -> Option<Param> {
        self.state
            .lock()
            .unwrap()
            .context
            .as_ref()
            .map(|ctx| ctx.mixer_gain())
    }

    /// Mixer gain value the current volume maps to
    fn mixer_target(&self) -> f32 {
        (*self.volume.lock().unwrap() / 100.0) * self.makeup_gain
    }

    /// Set volume on the 0-100 user scale with a smoothed ramp
    pub fn set_volume(&self, percent: f32) {
        let percent = percent.clamp(0.0, 100.0);
        let state = self.state.lock().unwrap();
        let Some(context) = state.context.as_ref() else {
            log::debug!("set_volume ignored: no output context");
            return;
        };

        let gain_value = (percent / 100.0) * self.makeup_gain;
        let now = context.current_time();
        context
            .mixer_gain()
            .set_target_at(gain_value, now + VOLUME_RAMP_DELAY, VOLUME_RAMP_TIME_CONSTANT);

        *self.volume.lock().unwrap() = percent.max(1.0);
        self.muted.store(false, Ordering::Relaxed);
    }

    /// Volume on the 0-100 user scale
    pub fn volume(&self) -> u32 {
        (self.volume.lock().unwrap().round() as u32).min(100)
    }

    /// Nudge volume up one step
    pub fn volume_up(&self) {
        self.set_volume(self.volume() as f32 + 5.0);
    }

    /// Nudge volume down one step
    pub fn volume_down(&self) {
        self.set_volume(self.volume() as f32 - 5.0);
    }

    /// Ramp the mixer toward near-zero (mute) or back to the current
    /// volume (unmute)
    ///
    /// The mute floor is 0.01, not zero: exponential ramps cannot target
    /// zero and a true zero invites denormal/click artifacts on resume.
    pub fn set_mute(&self, mute: bool) {
        let state = self.state.lock().unwrap();
        let Some(context) = state.context.as_ref() else {
            log::debug!("set_mute ignored: no output context");
            return;
        };

        let mixer = context.mixer_gain();
        let now = context.current_time();
        let target = self.mixer_target();
        mixer.cancel_scheduled(now);
        if mute {
            mixer.linear_ramp_to(target, now);
            mixer.exponential_ramp_to(crate::param::NEAR_SILENCE, now + MUTE_RAMP_SECONDS);
        } else {
            mixer.linear_ramp_to(crate::param::NEAR_SILENCE, now);
            mixer.exponential_ramp_to(target, now + MUTE_RAMP_SECONDS);
        }
        self.muted.store(mute, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Build a track's gain stage: source → gain(0) → [delay] → mixer
    ///
    /// The zero initialization is the one allowed discontinuous gain set;
    /// every later change arrives as a scheduled ramp. Returns `None`
    /// (logged) when the context is missing.
    pub fn create_track_gain_node(
        &self,
        element: &Arc<MediaElementHandle>,
        delay_seconds: Option<f64>,
    ) -> Option<Arc<TrackGainNode>> {
        let mut state = self.state.lock().unwrap();
        let Some(context) = state.context.as_ref() else {
            log::error!(
                "cannot create gain node for {}: graph not initialized",
                element.id()
            );
            return None;
        };

        let now = context.current_time();
        let gain = Param::new(0.0);
        gain.set_value_at(0.0, now);

        let delay = delay_seconds.map(|d| Param::new(d as f32));

        let source = element.take_samples().unwrap_or_else(|| {
            log::warn!("element {} has no sample feed, wiring silence", element.id());
            Box::new(SilenceSource)
        });

        let id = NodeId::next();
        context.send(GraphCommand::AddNode {
            id,
            source,
            gain: gain.clone(),
            delay: delay.clone(),
            cursor: element.cursor(),
            playing: element.playing_flag(),
        });

        let node = Arc::new(TrackGainNode::new(id, element.id(), gain));
        state.gain_bus.push_front(Arc::clone(&node));
        if let Some(delay) = delay {
            state.delay_bus.push_front(DelayHandle { node: id, delay });
        }
        Some(node)
    }

    /// Gain node of the most recently bound track
    pub fn newest_gain_node(&self) -> Option<Arc<TrackGainNode>> {
        self.state.lock().unwrap().gain_bus.newest().cloned()
    }

    /// Pop the oldest gain node (and its delay handle, if it has one) off
    /// the buses for cleanup
    pub fn pop_oldest_nodes(&self) -> (Option<Arc<TrackGainNode>>, Option<DelayHandle>) {
        let mut state = self.state.lock().unwrap();
        let gain = state.gain_bus.pop_oldest();
        let delay = match (&gain, state.delay_bus.oldest()) {
            (Some(node), Some(handle)) if handle.node == node.id() => {
                state.delay_bus.pop_oldest()
            }
            _ => None,
        };
        (gain, delay)
    }

    /// Detach a node from the render graph
    pub fn disconnect_node(&self, node: &TrackGainNode) {
        let state = self.state.lock().unwrap();
        match state.context.as_ref() {
            Some(context) => {
                context.send(GraphCommand::RemoveNode { id: node.id() });
                node.mark_disconnected();
            }
            None => log::debug!("disconnect skipped: no output context"),
        }
    }

    /// Number of in-flight gain nodes
    pub fn gain_bus_len(&self) -> usize {
        self.state.lock().unwrap().gain_bus.len()
    }

    /// Attach an analysis tap to the mixer output
    pub fn connect_tap(&self, producer: rtrb::Producer<f32>) -> GraphResult<TapId> {
        let state = self.state.lock().unwrap();
        let context = state.context.as_ref().ok_or(GraphError::NotInitialized)?;
        let id = TapId::next();
        context.send(GraphCommand::AddTap { id, producer });
        Ok(id)
    }

    /// Remove an analysis tap
    pub fn disconnect_tap(&self, id: TapId) {
        let state = self.state.lock().unwrap();
        match state.context.as_ref() {
            Some(context) => context.send(GraphCommand::RemoveTap { id }),
            None => log::debug!("tap disconnect skipped: no output context"),
        }
    }

    /// Invoke the stored unbind callback (crossfade engine, mid-fade)
    pub fn fire_unbind(&self) {
        if let Some(callback) = self.unbind.lock().unwrap().as_ref() {
            callback();
        }
    }
}

impl Default for AudioGraphManager {
    fn default() -> Self {
        Self::new()
    }
}
