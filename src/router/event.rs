//! Outbound messages

use serde::{Deserialize, Serialize};

use crate::aggregator::{AudibilityChange, AudioSource};

/// Event sent toward the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundEvent {
    AudioState { audible: bool, source: AudioSource },
}

impl From<AudibilityChange> for OutboundEvent {
    fn from(change: AudibilityChange) -> Self {
        OutboundEvent::AudioState {
            audible: change.audible,
            source: change.source,
        }
    }
}

impl OutboundEvent {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Acknowledgement returned for every recognized command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
