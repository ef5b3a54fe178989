//! Frequency analysis tap on the mixer output
//!
//! An `AnalyserTap` sits beside the audio path, never in it: the render
//! thread feeds it a mono mixdown over a lock-free ring, and the analyser
//! turns the most recent window into byte-scaled frequency magnitudes on
//! demand. Magnitudes are smoothed over time (the tap's own smoothing,
//! separate from whatever the view layer does) and mapped through a
//! decibel floor/ceiling window.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::GraphResult;
use crate::graph::{AudioGraphManager, TapId};

/// Analyser parameters
#[derive(Debug, Clone, Copy)]
pub struct AnalyserOptions {
    /// FFT window size; larger sizes trade latency for finer bins.
    /// Must be a power of two (rounded up otherwise, with a warning).
    pub fft_size: usize,
    /// Temporal smoothing of magnitudes across frames, 0 (none) to 1
    pub smoothing_time_constant: f32,
    /// Decibel mapped to byte 0
    pub min_decibels: f32,
    /// Decibel mapped to byte 255
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: 16_384,
            smoothing_time_constant: 0.2,
            min_decibels: -90.0,
            max_decibels: -10.0,
        }
    }
}

/// FFT tap over the shared mixer
pub struct AnalyserTap {
    options: AnalyserOptions,
    sample_rate: u32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Coherent gain of the window, for amplitude normalization
    window_sum: f32,
    /// Most recent time-domain samples, oldest first
    ring: Vec<f32>,
    write: usize,
    /// Smoothed linear magnitudes per bin
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    consumer: Option<rtrb::Consumer<f32>>,
    tap_id: Option<TapId>,
}

impl AnalyserTap {
    pub fn new(options: AnalyserOptions, sample_rate: u32) -> Self {
        let mut options = options;
        if !options.fft_size.is_power_of_two() {
            let rounded = options.fft_size.next_power_of_two();
            log::warn!(
                "fft size {} is not a power of two, rounding up to {}",
                options.fft_size,
                rounded
            );
            options.fft_size = rounded;
        }

        let n = options.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);

        // Hann window
        let window: Vec<f32> = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.5 - 0.5 * (std::f32::consts::TAU * x).cos()
            })
            .collect();
        let window_sum: f32 = window.iter().sum();

        Self {
            options,
            sample_rate,
            fft,
            window,
            window_sum,
            ring: vec![0.0; n],
            write: 0,
            smoothed: vec![0.0; n / 2],
            scratch: vec![Complex::new(0.0, 0.0); n],
            consumer: None,
            tap_id: None,
        }
    }

    /// Attach to the mixer output
    pub fn connect(&mut self, graph: &AudioGraphManager) -> GraphResult<()> {
        if self.tap_id.is_some() {
            return Ok(());
        }
        let (producer, consumer) = rtrb::RingBuffer::new(self.options.fft_size * 2);
        let id = graph.connect_tap(producer)?;
        self.consumer = Some(consumer);
        self.tap_id = Some(id);
        Ok(())
    }

    /// Detach from the mixer; leaking the tap is a defect
    pub fn disconnect(&mut self, graph: &AudioGraphManager) {
        if let Some(id) = self.tap_id.take() {
            graph.disconnect_tap(id);
        }
        self.consumer = None;
    }

    pub fn is_connected(&self) -> bool {
        self.tap_id.is_some()
    }

    /// Number of frequency bins reported
    pub fn frequency_bin_count(&self) -> usize {
        self.options.fft_size / 2
    }

    /// Center frequency of bin `k`
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.options.fft_size as f32
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn min_decibels(&self) -> f32 {
        self.options.min_decibels
    }

    pub fn max_decibels(&self) -> f32 {
        self.options.max_decibels
    }

    /// Feed time-domain samples directly (offline analysis and tests)
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.ring[self.write] = s;
            self.write = (self.write + 1) % self.ring.len();
        }
    }

    /// Drain whatever the render thread has produced since the last call
    fn drain_tap(&mut self) {
        let Some(consumer) = self.consumer.as_mut() else {
            return;
        };
        while let Ok(s) = consumer.pop() {
            self.ring[self.write] = s;
            self.write = (self.write + 1) % self.ring.len();
        }
    }

    /// Current frequency magnitudes scaled to 0-255 over the decibel
    /// window; `out` is truncated to the bin count
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.drain_tap();

        let n = self.options.fft_size;
        // Unroll the ring into time order and window it
        for i in 0..n {
            let idx = (self.write + i) % n;
            self.scratch[i] = Complex::new(self.ring[idx] * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.options.smoothing_time_constant.clamp(0.0, 1.0);
        let range = self.options.max_decibels - self.options.min_decibels;
        let bins = self.frequency_bin_count().min(out.len());

        for k in 0..self.frequency_bin_count() {
            // Amplitude of a sine at this bin, compensating the window
            let magnitude = self.scratch[k].norm() * 2.0 / self.window_sum;
            self.smoothed[k] = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            if k < bins {
                let db = 20.0 * self.smoothed[k].max(1.0e-10).log10();
                let normalized = ((db - self.options.min_decibels) / range).clamp(0.0, 1.0);
                out[k] = (normalized * 255.0) as u8;
            }
        }
    }
}
