//! Render-thread half of the output graph
//!
//! The control side never touches render state directly: node and tap
//! changes arrive over a lock-free command queue and are applied at the
//! start of each processed buffer. Parameters are shared `Param` handles,
//! evaluated once per buffer (block-rate automation).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::AudioClock;
use crate::graph::node::SampleSource;
use crate::param::Param;
use crate::types::{NodeId, StereoSample};

/// Longest supported per-track delay
pub const MAX_DELAY_SECONDS: f64 = 1.0;

/// Capacity of the control → render command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Identifier for an analysis tap on the mixer output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapId(u64);

impl TapId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TapId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Control → render thread graph mutations
pub(crate) enum GraphCommand {
    AddNode {
        id: NodeId,
        source: Box<dyn SampleSource>,
        gain: Param,
        delay: Option<Param>,
        /// Frames consumed, mirrored back to the owning media element
        cursor: Arc<AtomicU64>,
        /// Transport state of the owning media element
        playing: Arc<AtomicBool>,
    },
    RemoveNode {
        id: NodeId,
    },
    AddTap {
        id: TapId,
        producer: rtrb::Producer<f32>,
    },
    RemoveTap {
        id: TapId,
    },
}

/// Simple ring-buffer delay line
struct DelayLine {
    buf: Vec<StereoSample>,
    write: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![StereoSample::ZERO; capacity.max(1)],
            write: 0,
        }
    }

    fn process(&mut self, input: StereoSample, delay_frames: usize) -> StereoSample {
        self.buf[self.write] = input;
        let delay = delay_frames.min(self.buf.len() - 1);
        let read = (self.write + self.buf.len() - delay) % self.buf.len();
        self.write = (self.write + 1) % self.buf.len();
        self.buf[read]
    }
}

struct RenderNode {
    id: NodeId,
    source: Box<dyn SampleSource>,
    gain: Param,
    delay: Option<(Param, DelayLine)>,
    cursor: Arc<AtomicU64>,
    playing: Arc<AtomicBool>,
    /// Gain evaluated at the start of the current buffer
    block_gain: f32,
    block_delay_frames: usize,
    block_playing: bool,
}

struct TapSlot {
    id: TapId,
    producer: rtrb::Producer<f32>,
}

/// The render-thread graph: pulls sources, applies per-track gain and
/// delay, sums into the mixer, and feeds analysis taps.
pub struct RenderGraph {
    clock: AudioClock,
    mixer_gain: Param,
    commands: rtrb::Consumer<GraphCommand>,
    nodes: Vec<RenderNode>,
    taps: Vec<TapSlot>,
}

impl RenderGraph {
    pub(crate) fn new(
        clock: AudioClock,
        mixer_gain: Param,
        commands: rtrb::Consumer<GraphCommand>,
    ) -> Self {
        Self {
            clock,
            mixer_gain,
            commands,
            nodes: Vec::with_capacity(4),
            taps: Vec::with_capacity(2),
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                GraphCommand::AddNode {
                    id,
                    source,
                    gain,
                    delay,
                    cursor,
                    playing,
                } => {
                    let sample_rate = self.clock.sample_rate() as f64;
                    let delay = delay.map(|param| {
                        let capacity = (MAX_DELAY_SECONDS * sample_rate) as usize;
                        (param, DelayLine::new(capacity))
                    });
                    self.nodes.push(RenderNode {
                        id,
                        source,
                        gain,
                        delay,
                        cursor,
                        playing,
                        block_gain: 0.0,
                        block_delay_frames: 0,
                        block_playing: false,
                    });
                }
                GraphCommand::RemoveNode { id } => {
                    self.nodes.retain(|n| n.id != id);
                }
                GraphCommand::AddTap { id, producer } => {
                    self.taps.push(TapSlot { id, producer });
                }
                GraphCommand::RemoveTap { id } => {
                    self.taps.retain(|t| t.id != id);
                }
            }
        }
    }

    /// Process one buffer of output
    pub fn process(&mut self, out: &mut [StereoSample]) {
        self.drain_commands();

        let t = self.clock.now();
        let mixer = self.mixer_gain.sample(t);
        let sample_rate = self.clock.sample_rate() as f64;

        for node in &mut self.nodes {
            node.block_gain = node.gain.sample(t);
            node.block_playing = node.playing.load(Ordering::Relaxed);
            node.block_delay_frames = node
                .delay
                .as_ref()
                .map(|(param, _)| (param.sample(t) as f64 * sample_rate) as usize)
                .unwrap_or(0);
        }

        for frame in out.iter_mut() {
            let mut sum = StereoSample::ZERO;
            for node in &mut self.nodes {
                if !node.block_playing {
                    continue;
                }
                let mut s = node.source.next_sample() * node.block_gain;
                if let Some((_, line)) = node.delay.as_mut() {
                    s = line.process(s, node.block_delay_frames);
                }
                node.cursor.fetch_add(1, Ordering::Relaxed);
                sum += s;
            }
            let mixed = sum * mixer;
            *frame = mixed;

            for tap in &mut self.taps {
                // Taps are best-effort: a full ring just drops the frame
                let _ = tap.producer.push(mixed.mono());
            }
        }

        self.clock.advance(out.len() as u64);
    }

    #[cfg(test)]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::SineSource;

    fn make_graph(sample_rate: u32) -> (RenderGraph, rtrb::Producer<GraphCommand>, AudioClock) {
        let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let clock = AudioClock::new(sample_rate);
        let mixer = Param::new(1.0);
        (
            RenderGraph::new(clock.clone(), mixer, consumer),
            producer,
            clock,
        )
    }

    #[test]
    fn test_silence_with_no_nodes() {
        let (mut graph, _producer, _clock) = make_graph(48_000);
        let mut out = vec![StereoSample::new(9.9, 9.9); 64];
        graph.process(&mut out);
        assert!(out.iter().all(|s| *s == StereoSample::ZERO));
    }

    #[test]
    fn test_node_add_remove_and_cursor() {
        let (mut graph, mut producer, clock) = make_graph(48_000);
        let gain = Param::new(1.0);
        gain.set_value_at(1.0, 0.0);
        let cursor = Arc::new(AtomicU64::new(0));
        let playing = Arc::new(AtomicBool::new(true));
        let id = NodeId::next();
        producer
            .push(GraphCommand::AddNode {
                id,
                source: Box::new(SineSource::new(440.0, 48_000)),
                gain,
                delay: None,
                cursor: Arc::clone(&cursor),
                playing,
            })
            .ok()
            .unwrap();

        let mut out = vec![StereoSample::ZERO; 128];
        graph.process(&mut out);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(cursor.load(Ordering::Relaxed), 128);
        assert_eq!(clock.frames(), 128);
        assert!(out.iter().any(|s| s.left.abs() > 0.01));

        producer.push(GraphCommand::RemoveNode { id }).ok().unwrap();
        graph.process(&mut out);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_paused_node_outputs_silence_and_holds_cursor() {
        let (mut graph, mut producer, _clock) = make_graph(48_000);
        let gain = Param::new(1.0);
        let cursor = Arc::new(AtomicU64::new(0));
        let playing = Arc::new(AtomicBool::new(false));
        producer
            .push(GraphCommand::AddNode {
                id: NodeId::next(),
                source: Box::new(SineSource::new(440.0, 48_000)),
                gain,
                delay: None,
                cursor: Arc::clone(&cursor),
                playing,
            })
            .ok()
            .unwrap();

        let mut out = vec![StereoSample::ZERO; 64];
        graph.process(&mut out);
        assert!(out.iter().all(|s| *s == StereoSample::ZERO));
        assert_eq!(cursor.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_tap_receives_mono_mixdown() {
        let (mut graph, mut producer, _clock) = make_graph(48_000);
        let gain = Param::new(1.0);
        producer
            .push(GraphCommand::AddNode {
                id: NodeId::next(),
                source: Box::new(SineSource::new(440.0, 48_000)),
                gain,
                delay: None,
                cursor: Arc::new(AtomicU64::new(0)),
                playing: Arc::new(AtomicBool::new(true)),
            })
            .ok()
            .unwrap();

        let (tap_producer, mut tap_consumer) = rtrb::RingBuffer::new(256);
        let tap_id = TapId::next();
        producer
            .push(GraphCommand::AddTap {
                id: tap_id,
                producer: tap_producer,
            })
            .ok()
            .unwrap();

        let mut out = vec![StereoSample::ZERO; 128];
        graph.process(&mut out);

        let mut received = 0;
        while tap_consumer.pop().is_ok() {
            received += 1;
        }
        assert_eq!(received, 128);
    }

    #[test]
    fn test_delay_line_shifts_signal() {
        let mut line = DelayLine::new(8);
        // Impulse delayed by 3 frames
        let first = line.process(StereoSample::new(1.0, 1.0), 3);
        assert_eq!(first, StereoSample::ZERO);
        let mut outputs = Vec::new();
        for _ in 0..4 {
            outputs.push(line.process(StereoSample::ZERO, 3));
        }
        assert_eq!(outputs[2], StereoSample::new(1.0, 1.0));
    }
}
