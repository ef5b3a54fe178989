//! Player settings and the provider contract the pipeline consumes
//!
//! The pipeline never persists settings itself; it reads them through
//! `SettingsProvider` at the moment they matter (a crossfade recomputes
//! its config at the start of every transition). `PlayerSettings` is the
//! serializable shape the host application loads and saves via `io`.

pub mod io;

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::element::GainMetadata;
use crate::types::db_to_linear;

/// Loudness normalization source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationMode {
    /// No gain compensation
    #[default]
    Off,
    /// Prefer per-track gain, fall back to album gain
    TrackGain,
    /// Prefer album gain, fall back to per-track gain
    AlbumGain,
}

/// Safety limit for normalization boost (quiet tracks)
pub const NORMALIZATION_MAX_BOOST_DB: f32 = 12.0;

/// Safety limit for normalization cut (loud tracks)
pub const NORMALIZATION_MAX_CUT_DB: f32 = -24.0;

/// Normalization gain in dB for an element's metadata, clamped to the
/// safety limits. `None` when normalization is off or nothing is measured.
pub fn normalization_gain_db(mode: NormalizationMode, meta: GainMetadata) -> Option<f32> {
    let gain = match mode {
        NormalizationMode::Off => None,
        NormalizationMode::TrackGain => meta.track_gain_db.or(meta.album_gain_db),
        NormalizationMode::AlbumGain => meta.album_gain_db.or(meta.track_gain_db),
    };
    gain.map(|db| db.clamp(NORMALIZATION_MAX_CUT_DB, NORMALIZATION_MAX_BOOST_DB))
}

/// Linear normalization multiplier; unity when nothing applies
pub fn normalization_gain_linear(mode: NormalizationMode, meta: GainMetadata) -> f32 {
    normalization_gain_db(mode, meta)
        .map(db_to_linear)
        .unwrap_or(1.0)
}

/// Persistable player settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// User crossfade duration in seconds (0 disables crossfading)
    pub crossfade_duration_seconds: f64,
    /// Whether the spectrum visualizer is shown
    pub visualizer_enabled: bool,
    /// Loudness normalization source
    pub normalization: NormalizationMode,
    /// Saved volume on the 0-100 user scale
    pub volume: u8,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            crossfade_duration_seconds: 2.0,
            visualizer_enabled: true,
            normalization: NormalizationMode::Off,
            volume: 100,
        }
    }
}

/// Read-side contract the crossfade engine and visualizer consume
pub trait SettingsProvider: Send + Sync {
    fn crossfade_duration_seconds(&self) -> f64;
    fn visualizer_enabled(&self) -> bool;
    fn normalization_mode(&self) -> NormalizationMode;
}

/// Thread-safe settings holder implementing the provider contract
#[derive(Default)]
pub struct SharedSettings {
    inner: RwLock<PlayerSettings>,
}

impl SharedSettings {
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Current settings snapshot
    pub fn snapshot(&self) -> PlayerSettings {
        self.inner.read().unwrap().clone()
    }

    /// Apply a mutation to the settings
    pub fn update(&self, f: impl FnOnce(&mut PlayerSettings)) {
        f(&mut self.inner.write().unwrap());
    }
}

impl SettingsProvider for SharedSettings {
    fn crossfade_duration_seconds(&self) -> f64 {
        self.inner.read().unwrap().crossfade_duration_seconds
    }

    fn visualizer_enabled(&self) -> bool {
        self.inner.read().unwrap().visualizer_enabled
    }

    fn normalization_mode(&self) -> NormalizationMode {
        self.inner.read().unwrap().normalization
    }
}
