//! Spectrum view state: viewport, bar layout, and color mapping
//!
//! The layout gives low frequencies more horizontal space than a linear
//! mapping would: bar center frequencies follow an exponential curve from
//! 50 Hz to Nyquist, and x-positions place those frequencies on a log
//! scale, approximating perceptual pitch spacing. Bar heights are blended
//! with the previous frame to avoid visual jitter, and each bar's color
//! runs a green-to-red hue sweep keyed to how close its magnitude is to
//! the clipping threshold.

use iced::Color;

use segue_core::analyzer::AnalyserTap;

/// Gap between bars in logical pixels
pub const BAR_GAP: f32 = 3.0;

/// Narrowest bar the layout will produce
pub const MIN_BAR_WIDTH: f32 = 8.0;

pub const MIN_BARS: usize = 16;
pub const MAX_BARS: usize = 128;

/// Lowest rendered frequency
pub const MIN_FREQUENCY: f32 = 50.0;

/// Skew of the exponential frequency distribution across bars
pub const FREQUENCY_SKEW: f32 = 4.0;

/// Magnitudes at or above this are drawn clipping-red
pub const CLIPPING_DECIBELS: f32 = -20.0;

/// Magnitudes below this stay green; the hue sweep starts here
pub const NEAR_CLIPPING_DECIBELS: f32 = -65.0;

/// Weight of the new target height when blending with the previous frame
pub const BAR_SMOOTHING: f32 = 0.3;

/// Amplitude gridline positions
pub const AMPLITUDE_GRID_DECIBELS: [f32; 8] = [-85.0, -80.0, -75.0, -70.0, -60.0, -50.0, -40.0, -30.0];

/// Frequency gridline positions
pub const FREQUENCY_GRID_HZ: [f32; 8] = [
    100.0, 200.0, 500.0, 1_000.0, 2_000.0, 5_000.0, 10_000.0, 15_000.0,
];

/// Canvas surface metrics
///
/// Tracks the logical size and device scale factor together so the
/// physical backing-store size is always derived, never cached: a resize
/// replaces all three at once and the next frame starts from a fresh
/// transform, which is what keeps the stale-transform-after-resize bug
/// class out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    logical_width: f32,
    logical_height: f32,
    scale_factor: f32,
}

impl Viewport {
    pub fn new(logical_width: f32, logical_height: f32) -> Self {
        Self::with_scale_factor(logical_width, logical_height, 1.0)
    }

    pub fn with_scale_factor(logical_width: f32, logical_height: f32, scale_factor: f32) -> Self {
        Self {
            logical_width: logical_width.max(1.0),
            logical_height: logical_height.max(1.0),
            scale_factor: scale_factor.max(0.1),
        }
    }

    /// Replace size and scale after a window/monitor change
    pub fn resize(&mut self, logical_width: f32, logical_height: f32, scale_factor: f32) {
        *self = Self::with_scale_factor(logical_width, logical_height, scale_factor);
    }

    pub fn logical_width(&self) -> f32 {
        self.logical_width
    }

    pub fn logical_height(&self) -> f32 {
        self.logical_height
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// Backing-store width in physical pixels
    pub fn physical_width(&self) -> u32 {
        (self.logical_width * self.scale_factor).round() as u32
    }

    /// Backing-store height in physical pixels
    pub fn physical_height(&self) -> u32 {
        (self.logical_height * self.scale_factor).round() as u32
    }
}

/// One bar ready to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedBar {
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub color: Color,
}

/// Number of bars that fit the given logical width
pub fn bar_count(width: f32) -> usize {
    let available = width - BAR_GAP * (MAX_BARS as f32 - 1.0);
    let fitting = (available / (MIN_BAR_WIDTH + BAR_GAP)).floor() as isize;
    (fitting.max(MIN_BARS as isize) as usize).min(MAX_BARS)
}

/// Bar boundary frequencies: `count + 1` values from `MIN_FREQUENCY` to
/// Nyquist, exponentially distributed
pub fn bar_frequency_bounds(count: usize, nyquist: f32) -> Vec<f32> {
    let denom = FREQUENCY_SKEW.exp() - 1.0;
    (0..=count)
        .map(|i| {
            let norm = i as f32 / count as f32;
            let scaled = ((FREQUENCY_SKEW * norm).exp() - 1.0) / denom;
            MIN_FREQUENCY + scaled * (nyquist - MIN_FREQUENCY)
        })
        .collect()
}

/// Horizontal position of `frequency` on the log-frequency axis
pub fn frequency_to_x(frequency: f32, nyquist: f32, width: f32) -> f32 {
    let log_min = MIN_FREQUENCY.ln();
    let log_max = nyquist.ln();
    let f = frequency.max(MIN_FREQUENCY);
    (f.ln() - log_min) / (log_max - log_min) * width
}

/// Vertical position of `decibels` on the amplitude axis
pub fn decibels_to_y(decibels: f32, min_db: f32, max_db: f32, height: f32) -> f32 {
    let normalized = ((decibels - min_db) / (max_db - min_db)).clamp(0.0, 1.0);
    height - normalized * height
}

/// Byte value (0-255 scale) a decibel level maps to in analyser output
fn decibels_to_byte(decibels: f32, min_db: f32, max_db: f32) -> f32 {
    (decibels - min_db) / (max_db - min_db) * 255.0
}

/// Convert an HSL color (h in degrees, s/l in 0-1) to an iced Color
pub fn hsl(h: f32, s: f32, l: f32) -> Color {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Color::from_rgb(r + m, g + m, b + m)
}

/// Color for a bar magnitude: green when safe, sweeping to red at the
/// clipping threshold
fn bar_color(value: u8, near_clipping_byte: f32, clipping_byte: f32) -> Color {
    let normalized = value as f32 / 255.0;
    if (value as f32) < near_clipping_byte {
        // Safe zone: green, brightness tracking amplitude
        let lightness = 0.3 + normalized * 0.3;
        hsl(120.0, 1.0, lightness)
    } else if value as f32 >= clipping_byte {
        hsl(0.0, 1.0, 0.5)
    } else {
        let ratio = (value as f32 - near_clipping_byte) / (clipping_byte - near_clipping_byte);
        hsl(120.0 - 120.0 * ratio, 1.0, 0.5)
    }
}

/// Spectrum view state, updated once per drawn frame
pub struct SpectrumState {
    viewport: Viewport,
    previous_heights: Vec<f32>,
    data: Vec<u8>,
    bars: Vec<RenderedBar>,
    /// Analyser window copied at update time, for axis rendering
    min_decibels: f32,
    max_decibels: f32,
    nyquist: f32,
}

impl SpectrumState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            previous_heights: Vec::new(),
            data: Vec::new(),
            bars: Vec::new(),
            min_decibels: -90.0,
            max_decibels: -10.0,
            nyquist: 24_000.0,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Apply a window/monitor change; bar smoothing restarts because the
    /// bar count may have changed
    pub fn resize(&mut self, logical_width: f32, logical_height: f32, scale_factor: f32) {
        self.viewport.resize(logical_width, logical_height, scale_factor);
    }

    pub fn bars(&self) -> &[RenderedBar] {
        &self.bars
    }

    pub fn min_decibels(&self) -> f32 {
        self.min_decibels
    }

    pub fn max_decibels(&self) -> f32 {
        self.max_decibels
    }

    pub fn nyquist(&self) -> f32 {
        self.nyquist
    }

    /// Pull the current frequency snapshot and rebuild the bar list
    pub fn update(&mut self, analyser: &mut AnalyserTap) {
        let width = self.viewport.logical_width();
        let height = self.viewport.logical_height();

        self.min_decibels = analyser.min_decibels();
        self.max_decibels = analyser.max_decibels();
        self.nyquist = analyser.sample_rate() as f32 / 2.0;

        let count = bar_count(width);
        if self.previous_heights.len() != count {
            self.previous_heights = vec![0.0; count];
        }
        self.data.resize(analyser.frequency_bin_count(), 0);
        analyser.byte_frequency_data(&mut self.data);

        let clipping_byte =
            decibels_to_byte(CLIPPING_DECIBELS, self.min_decibels, self.max_decibels);
        let near_clipping_byte =
            decibels_to_byte(NEAR_CLIPPING_DECIBELS, self.min_decibels, self.max_decibels);

        let bounds = bar_frequency_bounds(count, self.nyquist);
        self.bars.clear();

        for i in 0..count {
            let x_left = frequency_to_x(bounds[i], self.nyquist, width);
            let x_right = frequency_to_x(bounds[i + 1], self.nyquist, width);
            let bar_width = (x_right - x_left - BAR_GAP).max(0.0);

            let bin = ((bounds[i] / self.nyquist) * self.data.len() as f32).floor() as usize;
            let value = self.data[bin.min(self.data.len().saturating_sub(1))];

            let target = value as f32 / 255.0 * height;
            let current = self.previous_heights[i];
            let bar_height = current + (target - current) * BAR_SMOOTHING;
            self.previous_heights[i] = bar_height;

            self.bars.push(RenderedBar {
                x: x_left + BAR_GAP / 2.0,
                width: bar_width,
                height: bar_height,
                color: bar_color(value, near_clipping_byte, clipping_byte),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segue_core::analyzer::AnalyserOptions;

    fn analyser() -> AnalyserTap {
        AnalyserTap::new(
            AnalyserOptions {
                fft_size: 2048,
                smoothing_time_constant: 0.0,
                ..AnalyserOptions::default()
            },
            48_000,
        )
    }

    fn feed_sine(tap: &mut AnalyserTap, frequency: f32, amplitude: f32) {
        let frames: Vec<f32> = (0..2048)
            .map(|i| (std::f32::consts::TAU * frequency * i as f32 / 48_000.0).sin() * amplitude)
            .collect();
        tap.push_samples(&frames);
    }

    #[test]
    fn test_bar_count_bounds() {
        assert_eq!(bar_count(10.0), MIN_BARS);
        assert_eq!(bar_count(100_000.0), MAX_BARS);
        let mid = bar_count(1_280.0);
        assert!(mid >= MIN_BARS && mid <= MAX_BARS);
    }

    #[test]
    fn test_frequency_bounds_are_monotonic() {
        let bounds = bar_frequency_bounds(32, 24_000.0);
        assert_eq!(bounds.len(), 33);
        assert!((bounds[0] - MIN_FREQUENCY).abs() < 1e-3);
        assert!((bounds[32] - 24_000.0).abs() < 1.0);
        for pair in bounds.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        // Exponential skew: the first half of the bars covers far less
        // than half the frequency range
        assert!(bounds[16] < 24_000.0 * 0.2);
    }

    #[test]
    fn test_log_axis_positions() {
        let width = 1_000.0;
        let nyquist = 24_000.0;
        assert_eq!(frequency_to_x(MIN_FREQUENCY, nyquist, width), 0.0);
        assert!((frequency_to_x(nyquist, nyquist, width) - width).abs() < 1e-3);
        let x1k = frequency_to_x(1_000.0, nyquist, width);
        let x10k = frequency_to_x(10_000.0, nyquist, width);
        assert!(x1k > 0.0 && x10k > x1k && x10k < width);
    }

    #[test]
    fn test_spike_lands_in_matching_bar_and_clips_red() {
        let mut tap = analyser();
        // Aim the spike at an exact bin inside a mid bar's range, clear of
        // the bar boundaries, so leakage can't tip a neighboring bar
        let count = bar_count(1_280.0);
        let bounds = bar_frequency_bounds(count, 24_000.0);
        let bar = count / 2;
        let left_bin = (bounds[bar] / 24_000.0 * tap.frequency_bin_count() as f32).floor() as usize;
        let frequency = tap.bin_frequency(left_bin + 1);
        assert!(bounds[bar] <= frequency && frequency < bounds[bar + 1]);
        feed_sine(&mut tap, frequency, 1.0);

        let mut state = SpectrumState::new(Viewport::new(1_280.0, 720.0));
        state.update(&mut tap);

        let bars = state.bars();
        assert!(!bars.is_empty());

        let loudest = bars
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.height.partial_cmp(&b.height).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        // The loudest bar's frequency range must contain the spike
        let bounds = bar_frequency_bounds(bars.len(), state.nyquist());
        assert!(
            bounds[loudest] <= frequency && frequency <= bounds[loudest + 1],
            "spike at {frequency} Hz landed in [{}, {}]",
            bounds[loudest],
            bounds[loudest + 1]
        );

        // Full scale is far above the clipping threshold: pure red
        let color = bars[loudest].color;
        assert!(color.r > 0.9 && color.g < 0.1);
    }

    #[test]
    fn test_quiet_bars_stay_green() {
        let mut tap = analyser();
        feed_sine(&mut tap, 2_000.0, 0.001);

        let mut state = SpectrumState::new(Viewport::new(1_280.0, 720.0));
        state.update(&mut tap);

        let loudest = state
            .bars()
            .iter()
            .max_by(|a, b| a.height.partial_cmp(&b.height).unwrap())
            .unwrap();
        assert!(loudest.color.g > loudest.color.r);
    }

    #[test]
    fn test_temporal_smoothing_blends_heights() {
        let mut tap = analyser();
        feed_sine(&mut tap, 2_000.0, 1.0);

        let mut state = SpectrumState::new(Viewport::new(1_280.0, 720.0));
        state.update(&mut tap);
        let first: Vec<f32> = state.bars().iter().map(|b| b.height).collect();
        state.update(&mut tap);
        let second: Vec<f32> = state.bars().iter().map(|b| b.height).collect();

        // Heights climb toward the (unchanged) target rather than jumping
        let i = first
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!(second[i] > first[i]);
        assert!(second[i] < 720.0);
    }

    #[test]
    fn test_viewport_physical_size_tracks_scale_factor() {
        let mut viewport = Viewport::with_scale_factor(1_280.0, 720.0, 2.0);
        assert_eq!(viewport.physical_width(), 2_560);
        assert_eq!(viewport.physical_height(), 1_440);

        viewport.resize(640.0, 480.0, 1.5);
        assert_eq!(viewport.physical_width(), 960);
        assert_eq!(viewport.physical_height(), 720);
    }

    #[test]
    fn test_hsl_primaries() {
        let green = hsl(120.0, 1.0, 0.5);
        assert!(green.g > 0.9 && green.r < 0.1);
        let red = hsl(0.0, 1.0, 0.5);
        assert!(red.r > 0.9 && red.g < 0.1);
    }
}
