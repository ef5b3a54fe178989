//! Output context: the shared path to hardware output
//!
//! At most one context exists per `AudioGraphManager`. A live context owns
//! a CPAL output stream whose callback drives the `RenderGraph`; an offline
//! context hands the render graph back to the caller, who pumps it manually
//! (used by tests and non-realtime rendering).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::clock::AudioClock;
use crate::error::{GraphError, GraphResult};
use crate::graph::render::{GraphCommand, RenderGraph, COMMAND_QUEUE_CAPACITY};
use crate::param::Param;
use crate::types::{Seconds, StereoSample};

use std::sync::Mutex;

/// Maximum buffer size to pre-allocate for real-time safety
///
/// Covers all common backend configurations (64..4096 frames); the render
/// callback never allocates.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// How the output context reaches (or doesn't reach) hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBackend {
    /// CPAL stream to the default output device
    Live,
    /// No device: caller pumps the render graph manually
    Offline,
}

/// Control-side handle to the single shared output path
pub struct OutputContext {
    clock: AudioClock,
    mixer_gain: Param,
    commands: Mutex<rtrb::Producer<GraphCommand>>,
}

impl OutputContext {
    /// Build an offline context; the caller drives the returned renderer
    pub(crate) fn offline(sample_rate: u32) -> (Self, OfflineRenderer) {
        let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let clock = AudioClock::new(sample_rate);
        let mixer_gain = Param::new(0.0);
        let graph = RenderGraph::new(clock.clone(), mixer_gain.clone(), consumer);
        let context = Self {
            clock,
            mixer_gain,
            commands: Mutex::new(producer),
        };
        (context, OfflineRenderer::new(graph))
    }

    /// Build a live context on the default output device
    pub(crate) fn live() -> GraphResult<(Self, OutputHandle)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(GraphError::NoDevices)?;
        let supported = device
            .default_output_config()
            .map_err(|e| GraphError::ConfigError(e.to_string()))?;

        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(GraphError::UnsupportedFormat(format!(
                "{:?}",
                supported.sample_format()
            )));
        }

        let config: cpal::StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let clock = AudioClock::new(sample_rate);
        let mixer_gain = Param::new(0.0);
        let mut graph = RenderGraph::new(clock.clone(), mixer_gain.clone(), consumer);
        let mut scratch = vec![StereoSample::ZERO; MAX_BUFFER_SIZE];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let frames = (data.len() / channels).min(MAX_BUFFER_SIZE);
                    graph.process(&mut scratch[..frames]);
                    for (frame, sample) in data.chunks_mut(channels).zip(&scratch) {
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        // Fill additional channels with silence
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    }
                },
                move |err| {
                    log::error!("output stream error: {}", err);
                },
                None, // No timeout (blocking)
            )
            .map_err(|e| GraphError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| GraphError::StreamPlayError(e.to_string()))?;

        log::info!(
            "output context opened: {} Hz, {} channels",
            sample_rate,
            channels
        );

        let context = Self {
            clock,
            mixer_gain,
            commands: Mutex::new(producer),
        };
        Ok((context, OutputHandle { _stream: stream }))
    }

    /// Current position on the audio timeline
    pub fn current_time(&self) -> Seconds {
        self.clock.now()
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// Mixer gain parameter (the single shared output gain)
    pub fn mixer_gain(&self) -> Param {
        self.mixer_gain.clone()
    }

    /// Queue a graph mutation for the render thread
    pub(crate) fn send(&self, cmd: GraphCommand) {
        let mut producer = self.commands.lock().unwrap();
        if producer.push(cmd).is_err() {
            log::error!("graph command queue full, dropping command");
        }
    }
}

/// Keeps the live audio stream alive; drop to stop output
pub struct OutputHandle {
    _stream: cpal::Stream,
}

/// Pump for an offline context
pub struct OfflineRenderer {
    graph: RenderGraph,
    scratch: Vec<StereoSample>,
}

impl OfflineRenderer {
    fn new(graph: RenderGraph) -> Self {
        Self {
            graph,
            scratch: vec![StereoSample::ZERO; MAX_BUFFER_SIZE],
        }
    }

    /// Render `frames` frames, returning the last rendered block
    pub fn render_frames(&mut self, mut frames: usize) -> &[StereoSample] {
        let mut last = 0;
        while frames > 0 {
            let block = frames.min(MAX_BUFFER_SIZE);
            self.graph.process(&mut self.scratch[..block]);
            last = block;
            frames -= block;
        }
        &self.scratch[..last]
    }

    /// Render into the caller's buffer
    pub fn render_into(&mut self, out: &mut [StereoSample]) {
        self.graph.process(out);
    }
}

/// Handle returned by graph initialization
///
/// The caller keeps it alive for live output, or pumps it for offline
/// rendering.
pub enum ContextHandle {
    Live(OutputHandle),
    Offline(OfflineRenderer),
}

impl ContextHandle {
    /// Offline renderer, if this context is offline
    pub fn offline(self) -> Option<OfflineRenderer> {
        match self {
            ContextHandle::Offline(renderer) => Some(renderer),
            ContextHandle::Live(_) => None,
        }
    }
}
