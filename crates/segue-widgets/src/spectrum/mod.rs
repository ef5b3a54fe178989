//! Bar-spectrum visualization of the mixer output

pub mod canvas;
pub mod session;
pub mod state;
pub mod view;

pub use canvas::SpectrumCanvas;
pub use session::SpectrumSession;
pub use state::{
    RenderedBar, SpectrumState, Viewport, BAR_GAP, BAR_SMOOTHING, CLIPPING_DECIBELS,
    FREQUENCY_SKEW, MAX_BARS, MIN_BARS, MIN_FREQUENCY, NEAR_CLIPPING_DECIBELS,
};
pub use view::spectrum_view;
