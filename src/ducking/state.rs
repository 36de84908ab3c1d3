//! Duck modes and controller state

use serde::{Deserialize, Serialize};

/// How the tab is attenuated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuckMode {
    /// Tab-level mute flag
    Mute,
    /// Pause playing elements and suspend running contexts
    Pause,
    /// Scale element volumes and master gains by the duck fraction
    Volume,
}

impl DuckMode {
    pub fn name(&self) -> &'static str {
        match self {
            DuckMode::Mute => "mute",
            DuckMode::Pause => "pause",
            DuckMode::Volume => "volume",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mute" => Some(DuckMode::Mute),
            "pause" => Some(DuckMode::Pause),
            "volume" => Some(DuckMode::Volume),
            _ => None,
        }
    }
}

impl std::fmt::Display for DuckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuckPhase {
    #[default]
    Idle,
    Ducked(DuckMode),
}

/// Single duck state of the tab
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuckState {
    pub phase: DuckPhase,
    /// Always within `[0, 1]`
    pub fraction: f32,
}

impl Default for DuckState {
    fn default() -> Self {
        Self {
            phase: DuckPhase::Idle,
            fraction: 1.0,
        }
    }
}

impl DuckState {
    pub fn is_ducked(&self) -> bool {
        matches!(self.phase, DuckPhase::Ducked(_))
    }

    pub fn mode(&self) -> Option<DuckMode> {
        match self.phase {
            DuckPhase::Idle => None,
            DuckPhase::Ducked(mode) => Some(mode),
        }
    }
}

/// Clamp a fraction into `[0, 1]`; non-finite input yields `fallback`
pub fn clamp_fraction(fraction: f32, fallback: f32) -> f32 {
    if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        fallback.clamp(0.0, 1.0)
    }
}

/// Convert a duck intensity percentage to a volume fraction
pub fn intensity_to_fraction(intensity: f32) -> f32 {
    clamp_fraction(intensity / 100.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test_case(30.0, 0.3 ; "default intensity")]
    #[test_case(0.0, 0.0 ; "silent")]
    #[test_case(100.0, 1.0 ; "full")]
    #[test_case(250.0, 1.0 ; "clamped high")]
    #[test_case(-5.0, 0.0 ; "clamped low")]
    fn test_intensity_to_fraction(intensity: f32, expected: f32) {
        assert_abs_diff_eq!(intensity_to_fraction(intensity), expected);
    }

    #[test]
    fn test_non_finite_fraction_falls_back() {
        assert_abs_diff_eq!(clamp_fraction(f32::NAN, 0.3), 0.3);
        assert_abs_diff_eq!(clamp_fraction(f32::INFINITY, 0.3), 0.3);
    }

    #[test]
    fn test_mode_names() {
        for mode in [DuckMode::Mute, DuckMode::Pause, DuckMode::Volume] {
            assert_eq!(DuckMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(DuckMode::from_name(" Volume "), Some(DuckMode::Volume));
        assert_eq!(DuckMode::from_name("loud"), None);
    }

    #[test]
    fn test_default_state_idle() {
        let state = DuckState::default();
        assert!(!state.is_ducked());
        assert_eq!(state.mode(), None);
        assert_abs_diff_eq!(state.fraction, 1.0);
    }
}
