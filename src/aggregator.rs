//! Audibility Aggregator
//!
//! Folds the element and synthesized-audio signals into one boolean and
//! reports changes only.

use serde::{Deserialize, Serialize};

/// Subsystem that triggered an audibility change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    Media,
    WebAudio,
}

impl std::fmt::Display for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioSource::Media => write!(f, "media"),
            AudioSource::WebAudio => write!(f, "webaudio"),
        }
    }
}

/// A change of the tab's audibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudibilityChange {
    pub audible: bool,
    pub source: AudioSource,
}

/// Owner of the tab's audibility value
#[derive(Debug, Default)]
pub struct AudibilityAggregator {
    /// `None` until the first recomputation
    last: Option<bool>,
}

impl AudibilityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value; `false` before the first recomputation
    pub fn is_audible(&self) -> bool {
        self.last.unwrap_or(false)
    }

    /// Recompute from the contributing signals
    ///
    /// # Arguments
    /// * `audible_elements` - Number of audible tracked elements
    /// * `webaudio_audible` - Any running context with live generators
    /// * `hint` - Subsystem that triggered the recomputation, if known
    ///
    /// Returns `Some` exactly when the value differs from the previous one
    /// (always on the first call).
    pub fn recompute(
        &mut self,
        audible_elements: usize,
        webaudio_audible: bool,
        hint: Option<AudioSource>,
    ) -> Option<AudibilityChange> {
        let audible = audible_elements > 0 || webaudio_audible;
        if self.last == Some(audible) {
            return None;
        }
        self.last = Some(audible);

        let source = hint.unwrap_or(if audible_elements > 0 {
            AudioSource::Media
        } else {
            AudioSource::WebAudio
        });
        tracing::debug!(audible, source = %source, "[AGGREGATOR] Audibility changed");
        Some(AudibilityChange { audible, source })
    }
}
