//! Host adapter interfaces
//!
//! The sensor never touches the page directly. Everything it observes or
//! changes goes through these traits:
//! - [`MediaHost`]: the document, its media elements and the tab mute flag
//! - [`AudioBackend`]: the page's original (un-intercepted) audio API
//! - [`EventSink`]: the outbound messaging transport
//! - [`PageEvents`]: a queue of page events, for hosts that buffer them
//!
//! A browser binding implements them over the real DOM and audio API;
//! [`crate::sim`] implements them in memory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::focus::ImpulseResponse;
use crate::router::OutboundEvent;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier of a DOM element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Stable identifier of an audio-processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Stable identifier of a node inside an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AudioNodeId(pub u64);

impl fmt::Display for AudioNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// ============================================================================
// Media Elements
// ============================================================================

/// Kind of playable element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Point-in-time view of a media element's playback state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaSnapshot {
    pub kind: MediaKind,
    pub paused: bool,
    pub ended: bool,
    pub muted: bool,
    /// Element volume in `[0, 1]`
    pub volume: f64,
    /// Duration in seconds; NaN while metadata is unknown, infinite for live streams
    pub duration: f64,
}

impl MediaSnapshot {
    /// Playing means neither paused nor ended
    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended
    }

    /// Audible means playing, unmuted and with non-zero volume
    pub fn is_audible(&self) -> bool {
        self.is_playing() && !self.muted && self.volume > 0.0
    }
}

/// Media element events that can change audibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaEventKind {
    Play,
    Playing,
    Pause,
    Ended,
    Suspend,
    Stalled,
    Emptied,
    Abort,
    VolumeChange,
    Seeking,
    Seeked,
    LoadedData,
    RateChange,
    Waiting,
    CanPlay,
}

impl MediaEventKind {
    /// Every event the monitor listens to
    pub const ALL: [MediaEventKind; 15] = [
        MediaEventKind::Play,
        MediaEventKind::Playing,
        MediaEventKind::Pause,
        MediaEventKind::Ended,
        MediaEventKind::Suspend,
        MediaEventKind::Stalled,
        MediaEventKind::Emptied,
        MediaEventKind::Abort,
        MediaEventKind::VolumeChange,
        MediaEventKind::Seeking,
        MediaEventKind::Seeked,
        MediaEventKind::LoadedData,
        MediaEventKind::RateChange,
        MediaEventKind::Waiting,
        MediaEventKind::CanPlay,
    ];

    /// DOM event name
    pub fn dom_name(&self) -> &'static str {
        match self {
            MediaEventKind::Play => "play",
            MediaEventKind::Playing => "playing",
            MediaEventKind::Pause => "pause",
            MediaEventKind::Ended => "ended",
            MediaEventKind::Suspend => "suspend",
            MediaEventKind::Stalled => "stalled",
            MediaEventKind::Emptied => "emptied",
            MediaEventKind::Abort => "abort",
            MediaEventKind::VolumeChange => "volumechange",
            MediaEventKind::Seeking => "seeking",
            MediaEventKind::Seeked => "seeked",
            MediaEventKind::LoadedData => "loadeddata",
            MediaEventKind::RateChange => "ratechange",
            MediaEventKind::Waiting => "waiting",
            MediaEventKind::CanPlay => "canplay",
        }
    }

    /// Parse a DOM event name; events outside the watched set yield `None`
    pub fn from_dom_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.dom_name() == name)
    }
}

// ============================================================================
// Audio Graph
// ============================================================================

/// Running state of an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// Biquad filter response types used by the focus chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiquadKind {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Automatable parameters the sensor writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioParamKind {
    Gain,
    Frequency,
}

// ============================================================================
// Page Events
// ============================================================================

/// Discrete things that happen in the page and feed the sensor
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// The document finished parsing; triggers a full scan
    DocumentReady,
    /// Subtrees were inserted (mutation observation)
    NodesAdded(Vec<ElementId>),
    /// Subtrees were removed; detached media are evicted
    NodesRemoved(Vec<ElementId>),
    /// A watched media element fired an event
    Media(ElementId, MediaEventKind),
    /// A context transitioned between running and suspended
    ContextStateChanged(ContextId),
    /// A generator reached its natural end
    SourceEnded(AudioNodeId),
}

// ============================================================================
// Adapter Traits
// ============================================================================

/// The document and its playable elements
pub trait MediaHost {
    /// All audio/video elements currently in the document
    fn query_media(&self) -> Vec<ElementId>;

    /// The media kind of a node, or `None` if it is not playable
    fn media_kind(&self, node: ElementId) -> Option<MediaKind>;

    /// Media elements inside the subtree rooted at `root` (excluding `root`)
    fn media_within(&self, root: ElementId) -> Vec<ElementId>;

    /// Whether the element is still attached to the document
    fn is_connected(&self, element: ElementId) -> bool;

    /// Current playback state, or `None` if the element is gone
    fn snapshot(&self, element: ElementId) -> Option<MediaSnapshot>;

    /// Write the element's volume
    fn set_volume(&mut self, element: ElementId, volume: f64) -> Result<()>;

    /// Pause playback
    fn pause(&mut self, element: ElementId) -> Result<()>;

    /// Resume playback
    fn play(&mut self, element: ElementId) -> Result<()>;

    /// Set or clear the tab-level mute flag
    fn set_tab_muted(&mut self, muted: bool) -> Result<()>;
}

/// The page's original audio API, before interception
pub trait AudioBackend {
    /// Whether an audio context constructor exists at all
    fn is_supported(&self) -> bool;

    /// Construct a context (the original constructor)
    fn create_context(&mut self) -> Result<ContextId>;

    fn context_state(&self, context: ContextId) -> Option<ContextState>;

    /// The context's true output node
    fn destination(&self, context: ContextId) -> Result<AudioNodeId>;

    /// Audio clock in seconds
    fn current_time(&self, context: ContextId) -> f64;

    fn sample_rate(&self, context: ContextId) -> f32;

    fn create_gain(&mut self, context: ContextId) -> Result<AudioNodeId>;

    fn create_biquad(&mut self, context: ContextId) -> Result<AudioNodeId>;

    fn create_convolver(&mut self, context: ContextId) -> Result<AudioNodeId>;

    /// Capture an element's audio output as a graph source
    ///
    /// Fails with [`crate::SensorError::CaptureConflict`] when another consumer
    /// already captured the element.
    fn create_media_source(&mut self, context: ContextId, element: ElementId)
        -> Result<AudioNodeId>;

    fn connect(&mut self, from: AudioNodeId, to: AudioNodeId) -> Result<()>;

    /// Disconnect every outgoing connection of `node`
    fn disconnect(&mut self, node: AudioNodeId) -> Result<()>;

    fn node_context(&self, node: AudioNodeId) -> Option<ContextId>;

    fn set_biquad_type(&mut self, node: AudioNodeId, kind: BiquadKind) -> Result<()>;

    /// Instantaneous write (cancels any running ramp)
    fn set_param(&mut self, param: AudioParamTarget, value: f32) -> Result<()>;

    /// Exponential approach toward `target` starting at `start_time`
    fn set_param_target(
        &mut self,
        param: AudioParamTarget,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<()>;

    /// Current value of a parameter at the context's clock
    fn param_value(&self, param: AudioParamTarget) -> Option<f32>;

    fn set_convolver_buffer(&mut self, node: AudioNodeId, buffer: ImpulseResponse) -> Result<()>;

    /// Start a scheduled generator (the original `start`)
    fn start_source(&mut self, node: AudioNodeId) -> Result<()>;

    /// Stop a scheduled generator (the original `stop`)
    fn stop_source(&mut self, node: AudioNodeId) -> Result<()>;

    fn suspend(&mut self, context: ContextId) -> Result<()>;

    fn resume(&mut self, context: ContextId) -> Result<()>;
}

/// A parameter on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioParamTarget {
    pub node: AudioNodeId,
    pub param: AudioParamKind,
}

impl AudioParamTarget {
    pub fn gain(node: AudioNodeId) -> Self {
        Self {
            node,
            param: AudioParamKind::Gain,
        }
    }

    pub fn frequency(node: AudioNodeId) -> Self {
        Self {
            node,
            param: AudioParamKind::Frequency,
        }
    }
}

/// Outbound transport toward the coordinator
pub trait EventSink {
    /// Fire-and-forget send; `Err(NoListener)` is an expected steady state
    fn send(&mut self, event: &OutboundEvent) -> Result<()>;
}

/// Hosts that buffer page events for the sensor to drain
pub trait PageEvents {
    fn poll_event(&mut self) -> Option<PageEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(paused: bool, ended: bool, muted: bool, volume: f64) -> MediaSnapshot {
        MediaSnapshot {
            kind: MediaKind::Audio,
            paused,
            ended,
            muted,
            volume,
            duration: 120.0,
        }
    }

    #[test]
    fn test_snapshot_audibility() {
        assert!(snapshot(false, false, false, 1.0).is_audible());
        assert!(!snapshot(true, false, false, 1.0).is_audible());
        assert!(!snapshot(false, true, false, 1.0).is_audible());
        assert!(!snapshot(false, false, true, 1.0).is_audible());
        assert!(!snapshot(false, false, false, 0.0).is_audible());
    }

    #[test]
    fn test_muted_element_still_playing() {
        let snap = snapshot(false, false, true, 1.0);
        assert!(snap.is_playing());
        assert!(!snap.is_audible());
    }

    #[test]
    fn test_media_event_names_round_trip() {
        for kind in MediaEventKind::ALL {
            assert_eq!(MediaEventKind::from_dom_name(kind.dom_name()), Some(kind));
        }
        assert_eq!(MediaEventKind::from_dom_name("timeupdate"), None);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ElementId(3).to_string(), "el#3");
        assert_eq!(ContextId(1).to_string(), "ctx#1");
        assert_eq!(AudioNodeId(9).to_string(), "node#9");
    }
}
