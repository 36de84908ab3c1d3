//! Per-element tracking record

use crate::host::{ElementId, MediaKind, MediaSnapshot};

/// What the sensor remembers about one media element
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedElement {
    pub id: ElementId,
    pub kind: MediaKind,
    pub playing: bool,
    pub audible: bool,
    /// Volume before the first volume-mode duck
    pub saved_volume: Option<f64>,
    /// Paused by a pause-mode duck; only these are resumed
    pub paused_by_core: bool,
}

impl TrackedElement {
    pub fn new(id: ElementId, snapshot: &MediaSnapshot) -> Self {
        Self {
            id,
            kind: snapshot.kind,
            playing: snapshot.is_playing(),
            audible: snapshot.is_audible(),
            saved_volume: None,
            paused_by_core: false,
        }
    }

    /// Re-derive playback flags; returns whether `audible` flipped
    pub fn update(&mut self, snapshot: &MediaSnapshot) -> bool {
        let was_audible = self.audible;
        self.kind = snapshot.kind;
        self.playing = snapshot.is_playing();
        self.audible = snapshot.is_audible();
        was_audible != self.audible
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(paused: bool, muted: bool, volume: f64) -> MediaSnapshot {
        MediaSnapshot {
            kind: MediaKind::Audio,
            paused,
            ended: false,
            muted,
            volume,
            duration: 60.0,
        }
    }

    #[test]
    fn test_update_reports_flip() {
        let mut el = TrackedElement::new(ElementId(1), &snapshot(true, false, 1.0));
        assert!(!el.audible);
        assert!(el.update(&snapshot(false, false, 1.0)));
        assert!(el.playing);
        assert!(el.audible);
        assert!(!el.update(&snapshot(false, false, 0.5)));
    }

    #[test]
    fn test_muted_playing_is_not_audible() {
        let el = TrackedElement::new(ElementId(1), &snapshot(false, true, 1.0));
        assert!(el.playing);
        assert!(!el.audible);
    }
}
