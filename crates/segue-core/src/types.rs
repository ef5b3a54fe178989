//! Shared types for the Segue audio pipeline

use std::ops::{Add, AddAssign, Mul};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sample rate used when no output device dictates one (offline contexts)
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Time on the audio timeline, in seconds
pub type Seconds = f64;

/// A single stereo frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: f32,
    pub right: f32,
}

impl StereoSample {
    pub const ZERO: StereoSample = StereoSample { left: 0.0, right: 0.0 };

    /// Create a new stereo sample
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Mono mixdown (average of both channels)
    pub fn mono(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

impl Add for StereoSample {
    type Output = StereoSample;

    fn add(self, rhs: StereoSample) -> StereoSample {
        StereoSample::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for StereoSample {
    fn add_assign(&mut self, rhs: StereoSample) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoSample {
    type Output = StereoSample;

    fn mul(self, gain: f32) -> StereoSample {
        StereoSample::new(self.left * gain, self.right * gain)
    }
}

/// Convert decibels to a linear gain multiplier
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear gain multiplier to decibels
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Identifier for a media element registered with the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Allocate the next process-unique element id
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ElementId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "elem-{}", self.0)
    }
}

/// Identifier for a node in the output graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate the next process-unique node id
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        NodeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}
