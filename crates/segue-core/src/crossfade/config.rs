//! Per-transition crossfade configuration
//!
//! Derived fresh from the user's crossfade-duration setting at the start
//! of every transition; never persisted.

use crate::types::Seconds;

/// Durations below this disable fading entirely (instant cut)
pub const DISABLE_THRESHOLD: Seconds = 0.01;

/// Durations below this use the short tier: the same timing, but no fade
/// curve is scheduled (hold, then cut)
pub const SHORT_FADE_THRESHOLD: Seconds = 0.51;

/// Fade-out length as a multiple of the configured duration
pub const FADE_OUT_FACTOR: Seconds = 2.0;

/// Settings for one track transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeConfig {
    /// Whether any transition handling happens at all
    pub enabled: bool,
    /// Skip curve scheduling (short tier and disabled tier)
    pub disable_fade: bool,
    /// Fade-out length in seconds
    pub fade_out: Seconds,
    /// Time until the outgoing element's visual resources are released
    pub sustain: Seconds,
}

impl CrossfadeConfig {
    /// Derive the config for a transition from the user duration setting
    pub fn from_duration(duration: Seconds) -> Self {
        if duration < DISABLE_THRESHOLD {
            return Self {
                enabled: false,
                disable_fade: true,
                fade_out: 0.0,
                sustain: 0.0,
            };
        }

        Self {
            enabled: true,
            disable_fade: duration < SHORT_FADE_THRESHOLD,
            fade_out: duration * FADE_OUT_FACTOR,
            sustain: duration,
        }
    }

    /// Config for an instant cut, used when a transition is forced to
    /// degrade (no audible outgoing track to fade)
    pub fn instant_cut() -> Self {
        Self::from_duration(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tier() {
        let cfg = CrossfadeConfig::from_duration(0.0);
        assert!(!cfg.enabled);
        assert!(cfg.disable_fade);
        assert_eq!(cfg.fade_out, 0.0);
        assert_eq!(cfg.sustain, 0.0);

        let cfg = CrossfadeConfig::from_duration(0.009);
        assert!(!cfg.enabled);
    }

    #[test]
    fn test_short_tier() {
        let cfg = CrossfadeConfig::from_duration(0.3);
        assert!(cfg.enabled);
        assert!(cfg.disable_fade);
        assert!((cfg.fade_out - 0.3 * FADE_OUT_FACTOR).abs() < 1e-9);
        assert!((cfg.sustain - 0.3).abs() < 1e-9);

        // Boundary: just below the full-fade threshold
        assert!(CrossfadeConfig::from_duration(0.5099).disable_fade);
    }

    #[test]
    fn test_full_tier() {
        let cfg = CrossfadeConfig::from_duration(2.0);
        assert!(cfg.enabled);
        assert!(!cfg.disable_fade);
        assert!((cfg.fade_out - 2.0 * FADE_OUT_FACTOR).abs() < 1e-9);
        assert!((cfg.sustain - 2.0).abs() < 1e-9);

        // Boundary: exactly at the threshold uses the full tier
        assert!(!CrossfadeConfig::from_duration(0.51).disable_fade);
    }
}
