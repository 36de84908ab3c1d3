//! Sensor configuration
//!
//! The sensor has no environment-variable surface; everything that changes
//! at runtime arrives as a command. What remains here are the tuning
//! constants, grouped by concern, and [`SensorConfig`], which bundles the
//! ones an embedder may want to override at construction time.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::focus::FocusStyle;

/// Audio parameter automation
pub mod ramp {
    /// Time constant (seconds) for `setTargetAtTime` ramps
    pub const TIME_CONSTANT_SECS: f64 = 0.1;

    /// Frequency used to realize a bypass filter (above the audible band)
    pub const BYPASS_FREQUENCY_HZ: f32 = 22_000.0;
}

/// Focus Mode qualification
pub mod focus {
    /// Non-video clips shorter than this are treated as UI sound effects
    pub const SHORT_CLIP_SECS: f64 = 5.0;
}

/// Ducking defaults
pub mod ducking {
    /// Volume fraction used when `SET_VOLUME` carries no usable value
    pub const DEFAULT_VOLUME_FRACTION: f32 = 0.3;

    /// Intensity (percent) used when a `DUCK` command omits it
    pub const DEFAULT_INTENSITY: f32 = 30.0;
}

/// Construction-time tuning for a sensor instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Ramp time constant in seconds
    pub ramp_time_constant: f64,
    /// Short-clip threshold in seconds
    pub short_clip_secs: f64,
    /// Fallback fraction for `SET_VOLUME`
    pub default_volume_fraction: f32,
    /// Fallback intensity (percent) for `DUCK`
    pub default_intensity: f32,
    /// Style used when `ENABLE_FOCUS` names none
    pub default_focus_style: FocusStyle,
    /// Cutoff used for bypassed tone filters
    pub bypass_frequency: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ramp_time_constant: ramp::TIME_CONSTANT_SECS,
            short_clip_secs: focus::SHORT_CLIP_SECS,
            default_volume_fraction: ducking::DEFAULT_VOLUME_FRACTION,
            default_intensity: ducking::DEFAULT_INTENSITY,
            default_focus_style: FocusStyle::Normal,
            bypass_frequency: ramp::BYPASS_FREQUENCY_HZ,
        }
    }
}

impl SensorConfig {
    /// Parse a JSON override; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SensorConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamp values into their usable ranges
    pub fn sanitized(mut self) -> Self {
        if !self.ramp_time_constant.is_finite() || self.ramp_time_constant <= 0.0 {
            self.ramp_time_constant = ramp::TIME_CONSTANT_SECS;
        }
        if !self.short_clip_secs.is_finite() || self.short_clip_secs < 0.0 {
            self.short_clip_secs = focus::SHORT_CLIP_SECS;
        }
        if !self.default_volume_fraction.is_finite() {
            self.default_volume_fraction = ducking::DEFAULT_VOLUME_FRACTION;
        }
        self.default_volume_fraction = self.default_volume_fraction.clamp(0.0, 1.0);
        if !self.default_intensity.is_finite() {
            self.default_intensity = ducking::DEFAULT_INTENSITY;
        }
        self.default_intensity = self.default_intensity.clamp(0.0, 100.0);
        if !self.bypass_frequency.is_finite() || self.bypass_frequency <= 0.0 {
            self.bypass_frequency = ramp::BYPASS_FREQUENCY_HZ;
        }
        self
    }
}
