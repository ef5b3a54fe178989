//! Gapless track transitions

pub mod config;
pub mod engine;

pub use config::{
    CrossfadeConfig, DISABLE_THRESHOLD, FADE_OUT_FACTOR, SHORT_FADE_THRESHOLD,
};
pub use engine::{CrossfadeEngine, TransitionState, FADE_IN_SECONDS};
