//! Simulated document with media elements
//!
//! Nodes form a forest; a subtree is "connected" once its root is attached
//! to the document. Every state change queues the page events a browser
//! would fire, in browser order.

use std::collections::{BTreeMap, VecDeque};

use crate::error::{Result, SensorError};
use crate::host::{
    ElementId, MediaEventKind, MediaHost, MediaKind, MediaSnapshot, PageEvent, PageEvents,
};

/// Duration given to simulated media unless overridden
pub const DEFAULT_DURATION_SECS: f64 = 180.0;

#[derive(Debug, Clone)]
struct SimNode {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    connected: bool,
    media: Option<MediaSnapshot>,
}

/// In-memory [`MediaHost`]
#[derive(Debug, Default)]
pub struct SimDocument {
    nodes: BTreeMap<ElementId, SimNode>,
    next_id: u64,
    events: VecDeque<PageEvent>,
    tab_muted: bool,
}

impl SimDocument {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    // ========================================================================
    // Building the tree
    // ========================================================================

    /// Create a detached non-media element
    pub fn create_container(&mut self) -> ElementId {
        self.create_node(None)
    }

    /// Create a detached, paused media element at full volume
    pub fn create_media(&mut self, kind: MediaKind) -> ElementId {
        self.create_node(Some(MediaSnapshot {
            kind,
            paused: true,
            ended: false,
            muted: false,
            volume: 1.0,
            duration: DEFAULT_DURATION_SECS,
        }))
    }

    fn create_node(&mut self, media: Option<MediaSnapshot>) -> ElementId {
        let id = ElementId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.nodes.insert(
            id,
            SimNode {
                parent: None,
                children: Vec::new(),
                connected: false,
                media,
            },
        );
        id
    }

    /// Make `child` a child of `parent` (both detached or both connected)
    pub fn append(&mut self, parent: ElementId, child: ElementId) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        let connected = self.nodes.get(&parent).map(|n| n.connected).unwrap_or(false);
        if connected {
            self.set_connected(child, true);
            self.events.push_back(PageEvent::NodesAdded(vec![child]));
        }
    }

    /// Insert a detached subtree into the document (one mutation record)
    pub fn attach(&mut self, root: ElementId) {
        self.set_connected(root, true);
        self.events.push_back(PageEvent::NodesAdded(vec![root]));
    }

    /// Remove a subtree from the document (one mutation record)
    pub fn detach(&mut self, root: ElementId) {
        self.set_connected(root, false);
        self.events.push_back(PageEvent::NodesRemoved(vec![root]));
    }

    fn set_connected(&mut self, root: ElementId, connected: bool) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.connected = connected;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Create and attach an `<audio>` element
    pub fn add_audio(&mut self) -> ElementId {
        let id = self.create_media(MediaKind::Audio);
        self.attach(id);
        id
    }

    /// Create and attach a `<video>` element
    pub fn add_video(&mut self) -> ElementId {
        let id = self.create_media(MediaKind::Video);
        self.attach(id);
        id
    }

    // ========================================================================
    // Page-side playback control
    // ========================================================================

    fn media_mut(&mut self, element: ElementId) -> Result<&mut MediaSnapshot> {
        self.nodes
            .get_mut(&element)
            .and_then(|n| n.media.as_mut())
            .ok_or(SensorError::UnknownElement { element })
    }

    fn fire(&mut self, element: ElementId, kind: MediaEventKind) {
        self.events.push_back(PageEvent::Media(element, kind));
    }

    /// Page toggles the element's own `muted` attribute
    pub fn set_muted(&mut self, element: ElementId, muted: bool) -> Result<()> {
        let media = self.media_mut(element)?;
        if media.muted != muted {
            media.muted = muted;
            self.fire(element, MediaEventKind::VolumeChange);
        }
        Ok(())
    }

    /// Metadata arrives with a known duration
    pub fn set_duration(&mut self, element: ElementId, duration: f64) -> Result<()> {
        self.media_mut(element)?.duration = duration;
        self.fire(element, MediaEventKind::LoadedData);
        Ok(())
    }

    /// Playback reaches the end of the media
    pub fn finish(&mut self, element: ElementId) -> Result<()> {
        let media = self.media_mut(element)?;
        media.ended = true;
        let was_playing = !media.paused;
        media.paused = true;
        if was_playing {
            self.fire(element, MediaEventKind::Pause);
        }
        self.fire(element, MediaEventKind::Ended);
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn volume(&self, element: ElementId) -> Option<f64> {
        self.snapshot(element).map(|s| s.volume)
    }

    pub fn is_paused(&self, element: ElementId) -> Option<bool> {
        self.snapshot(element).map(|s| s.paused)
    }

    pub fn tab_muted(&self) -> bool {
        self.tab_muted
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Drop queued events (e.g. after a setup phase)
    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl MediaHost for SimDocument {
    fn query_media(&self) -> Vec<ElementId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.connected && n.media.is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    fn media_kind(&self, node: ElementId) -> Option<MediaKind> {
        self.nodes.get(&node)?.media.map(|m| m.kind)
    }

    fn media_within(&self, root: ElementId) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut stack: Vec<ElementId> = self
            .nodes
            .get(&root)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                if node.media.is_some() {
                    found.push(id);
                }
                stack.extend(node.children.iter().copied());
            }
        }
        found.sort();
        found
    }

    fn is_connected(&self, element: ElementId) -> bool {
        self.nodes.get(&element).map(|n| n.connected).unwrap_or(false)
    }

    fn snapshot(&self, element: ElementId) -> Option<MediaSnapshot> {
        self.nodes.get(&element)?.media
    }

    fn set_volume(&mut self, element: ElementId, volume: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SensorError::backend(format!(
                "volume {} outside [0, 1]",
                volume
            )));
        }
        let media = self.media_mut(element)?;
        if media.volume != volume {
            media.volume = volume;
            self.fire(element, MediaEventKind::VolumeChange);
        }
        Ok(())
    }

    fn pause(&mut self, element: ElementId) -> Result<()> {
        let media = self.media_mut(element)?;
        if !media.paused {
            media.paused = true;
            self.fire(element, MediaEventKind::Pause);
        }
        Ok(())
    }

    fn play(&mut self, element: ElementId) -> Result<()> {
        let media = self.media_mut(element)?;
        if media.paused {
            media.paused = false;
            media.ended = false;
            self.fire(element, MediaEventKind::Play);
            self.fire(element, MediaEventKind::Playing);
        }
        Ok(())
    }

    fn set_tab_muted(&mut self, muted: bool) -> Result<()> {
        self.tab_muted = muted;
        Ok(())
    }
}

impl PageEvents for SimDocument {
    fn poll_event(&mut self) -> Option<PageEvent> {
        self.events.pop_front()
    }
}
