//! Focus style table
//!
//! Fixed mapping from style name to the parameter tuple the focus chain
//! ramps toward. Read-only; selected by name on command.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Response of the tone filter at the head of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneFilter {
    /// Pass everything; realized as a lowpass above the audible band
    Bypass,
    Lowpass,
    Bandpass,
}

/// Parameter tuple for one style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleParams {
    pub filter: ToneFilter,
    /// Tone filter cutoff/center in Hz
    pub filter_freq: f32,
    /// Dry path level
    pub dry: f32,
    /// Wet (reverb) path level
    pub wet: f32,
    /// Lowpass cutoff applied to the reverb tail only
    pub wet_lowpass: f32,
    /// Focus gain after the wet/dry merge
    pub output_gain: f32,
    /// Impulse length in seconds
    pub reverb_duration: f32,
    /// Exponent of the impulse decay envelope
    pub reverb_decay: f32,
}

impl StyleParams {
    /// Whether the style uses the reverb path at all
    pub fn has_reverb(&self) -> bool {
        self.wet > 0.0 && self.reverb_duration > 0.0
    }
}

const NEUTRAL: StyleParams = StyleParams {
    filter: ToneFilter::Bypass,
    filter_freq: 20_000.0,
    dry: 1.0,
    wet: 0.0,
    wet_lowpass: 20_000.0,
    output_gain: 1.0,
    reverb_duration: 0.0,
    reverb_decay: 0.0,
};

/// Named acoustic styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusStyle {
    /// Transparent chain
    #[default]
    Normal,
    /// Dull lowpass, as if through a wall
    Muffle,
    /// Dark and reverberant, as if from another room
    FarAway,
    /// Clear direct signal with a short room tail
    SoftRoom,
    /// Deep lowpass with a long tail
    FocusBackground,
    /// Telephone-like band around the voice range
    ///
    /// Stored settings may carry this name in place of the legacy
    /// `soft_room`; its bandpass tuning is specific to this crate, while
    /// `soft_room` keeps its own room-reverb tuning.
    VoiceBand,
}

impl FocusStyle {
    pub const ALL: [FocusStyle; 6] = [
        FocusStyle::Normal,
        FocusStyle::Muffle,
        FocusStyle::FarAway,
        FocusStyle::SoftRoom,
        FocusStyle::FocusBackground,
        FocusStyle::VoiceBand,
    ];

    /// Resolve a style name; unknown names fall back to `Normal`
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.name() == name)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FocusStyle::Normal => "normal",
            FocusStyle::Muffle => "muffle",
            FocusStyle::FarAway => "far_away",
            FocusStyle::SoftRoom => "soft_room",
            FocusStyle::FocusBackground => "focus_background",
            FocusStyle::VoiceBand => "voice_band",
        }
    }

    /// Look up the parameter tuple
    pub fn params(&self) -> StyleParams {
        match self {
            FocusStyle::Normal => NEUTRAL,
            FocusStyle::Muffle => StyleParams {
                filter: ToneFilter::Lowpass,
                filter_freq: 800.0,
                output_gain: 0.9,
                ..NEUTRAL
            },
            FocusStyle::FarAway => StyleParams {
                filter: ToneFilter::Lowpass,
                filter_freq: 1_000.0,
                dry: 0.6,
                wet: 0.4,
                output_gain: 0.7,
                reverb_duration: 2.0,
                reverb_decay: 2.0,
                ..NEUTRAL
            },
            FocusStyle::SoftRoom => StyleParams {
                dry: 0.85,
                wet: 0.25,
                wet_lowpass: 3_000.0,
                output_gain: 0.9,
                reverb_duration: 1.0,
                reverb_decay: 2.2,
                ..NEUTRAL
            },
            FocusStyle::FocusBackground => StyleParams {
                filter: ToneFilter::Lowpass,
                filter_freq: 600.0,
                dry: 0.7,
                wet: 0.3,
                output_gain: 0.75,
                reverb_duration: 2.5,
                reverb_decay: 3.0,
                ..NEUTRAL
            },
            FocusStyle::VoiceBand => StyleParams {
                filter: ToneFilter::Bandpass,
                filter_freq: 1_000.0,
                output_gain: 0.9,
                ..NEUTRAL
            },
        }
    }
}

impl fmt::Display for FocusStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("normal", FocusStyle::Normal)]
    #[test_case("muffle", FocusStyle::Muffle)]
    #[test_case("far_away", FocusStyle::FarAway)]
    #[test_case("soft_room", FocusStyle::SoftRoom)]
    #[test_case("focus_background", FocusStyle::FocusBackground)]
    #[test_case("voice_band", FocusStyle::VoiceBand)]
    #[test_case("lo_fi", FocusStyle::Normal ; "unknown falls back")]
    #[test_case("", FocusStyle::Normal ; "empty falls back")]
    fn test_from_name(name: &str, expected: FocusStyle) {
        assert_eq!(FocusStyle::from_name(name), expected);
    }

    #[test]
    fn test_normal_is_transparent() {
        let p = FocusStyle::Normal.params();
        assert_eq!(p.filter, ToneFilter::Bypass);
        assert_eq!(p.dry, 1.0);
        assert_eq!(p.wet, 0.0);
        assert_eq!(p.output_gain, 1.0);
        assert!(!p.has_reverb());
    }

    #[test]
    fn test_reverb_styles() {
        let with_reverb: Vec<_> = FocusStyle::ALL
            .iter()
            .filter(|s| s.params().has_reverb())
            .copied()
            .collect();
        assert_eq!(
            with_reverb,
            vec![
                FocusStyle::FarAway,
                FocusStyle::SoftRoom,
                FocusStyle::FocusBackground
            ]
        );
    }

    #[test]
    fn test_voice_band_is_dry_bandpass() {
        let p = FocusStyle::VoiceBand.params();
        assert_eq!(p.filter, ToneFilter::Bandpass);
        assert_eq!(p.filter_freq, 1_000.0);
        assert!(!p.has_reverb());
        assert_ne!(p, FocusStyle::Normal.params());
    }

    #[test]
    fn test_levels_in_range() {
        for style in FocusStyle::ALL {
            let p = style.params();
            for level in [p.dry, p.wet, p.output_gain] {
                assert!((0.0..=1.0).contains(&level), "{} level {}", style, level);
            }
        }
    }

    #[test]
    fn test_serde_names_match() {
        for style in FocusStyle::ALL {
            let json = serde_json::to_value(style).unwrap();
            assert_eq!(json, serde_json::json!(style.name()));
        }
    }
}
