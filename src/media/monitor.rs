//! Registry of tracked media elements

use std::collections::HashMap;

use crate::host::{ElementId, MediaHost};

use super::element::TrackedElement;

/// Every media element the sensor watches, keyed by element id
#[derive(Debug, Default)]
pub struct ElementMonitor {
    elements: HashMap<ElementId, TrackedElement>,
}

impl ElementMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every connected media element in the document
    ///
    /// Returns the newly registered ids; already-tracked elements are skipped.
    pub fn scan<H: MediaHost>(&mut self, host: &H) -> Vec<ElementId> {
        let found: Vec<ElementId> = host
            .query_media()
            .into_iter()
            .filter(|el| self.monitor(*el, host))
            .collect();
        if !found.is_empty() {
            tracing::debug!(count = found.len(), "[MONITOR] Scan registered elements");
        }
        found
    }

    /// Handle inserted subtrees: a media root is monitored directly, any
    /// other root is searched for media descendants
    pub fn on_nodes_added<H: MediaHost>(&mut self, nodes: &[ElementId], host: &H) -> Vec<ElementId> {
        let mut found = Vec::new();
        for &node in nodes {
            if host.media_kind(node).is_some() {
                if self.monitor(node, host) {
                    found.push(node);
                }
            } else {
                for el in host.media_within(node) {
                    if self.monitor(el, host) {
                        found.push(el);
                    }
                }
            }
        }
        found
    }

    /// Start tracking `element`; returns `true` only on first registration
    ///
    /// Non-playable nodes are ignored.
    pub fn monitor<H: MediaHost>(&mut self, element: ElementId, host: &H) -> bool {
        if self.elements.contains_key(&element) {
            return false;
        }
        let Some(snapshot) = host.snapshot(element) else {
            return false;
        };
        self.elements
            .insert(element, TrackedElement::new(element, &snapshot));
        tracing::trace!(element = %element, kind = ?snapshot.kind, "[MONITOR] Tracking element");
        true
    }

    /// Re-read a tracked element's state after one of its events
    pub fn refresh<H: MediaHost>(&mut self, element: ElementId, host: &H) -> Option<&TrackedElement> {
        let snapshot = host.snapshot(element)?;
        let tracked = self.elements.get_mut(&element)?;
        if tracked.update(&snapshot) {
            tracing::trace!(element = %element, audible = tracked.audible, "[MONITOR] Audibility flipped");
        }
        Some(&*tracked)
    }

    /// Stop tracking `element`, returning its record
    pub fn evict(&mut self, element: ElementId) -> Option<TrackedElement> {
        self.elements.remove(&element)
    }

    /// Evict every tracked element no longer in the document
    pub fn evict_detached<H: MediaHost>(&mut self, host: &H) -> Vec<TrackedElement> {
        let detached: Vec<ElementId> = self
            .elements
            .keys()
            .copied()
            .filter(|el| !host.is_connected(*el))
            .collect();
        let mut evicted: Vec<TrackedElement> = detached
            .into_iter()
            .filter_map(|el| self.elements.remove(&el))
            .collect();
        evicted.sort_by_key(|el| el.id);
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "[MONITOR] Evicted detached elements");
        }
        evicted
    }

    pub fn audible_count(&self) -> usize {
        self.elements.values().filter(|el| el.audible).count()
    }

    pub fn is_tracked(&self, element: ElementId) -> bool {
        self.elements.contains_key(&element)
    }

    pub fn get(&self, element: ElementId) -> Option<&TrackedElement> {
        self.elements.get(&element)
    }

    pub fn get_mut(&mut self, element: ElementId) -> Option<&mut TrackedElement> {
        self.elements.get_mut(&element)
    }

    /// Tracked ids in ascending order
    pub fn ids(&self) -> Vec<ElementId> {
        let mut ids: Vec<_> = self.elements.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedElement> {
        self.elements.values_mut()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MediaKind;
    use crate::sim::SimDocument;

    #[test]
    fn test_scan_registers_once() {
        let mut doc = SimDocument::new();
        let a = doc.add_audio();
        let v = doc.add_video();
        let mut monitor = ElementMonitor::new();

        assert_eq!(monitor.scan(&doc), vec![a, v]);
        assert!(monitor.scan(&doc).is_empty());
        assert!(monitor.on_nodes_added(&[a], &doc).is_empty());
        assert_eq!(monitor.len(), 2);
    }

    #[test]
    fn test_nodes_added_finds_nested_media() {
        let mut doc = SimDocument::new();
        let div = doc.create_container();
        let video = doc.create_media(MediaKind::Video);
        doc.append(div, video);
        doc.attach(div);

        let mut monitor = ElementMonitor::new();
        assert_eq!(monitor.on_nodes_added(&[div], &doc), vec![video]);
        assert!(monitor.get(video).unwrap().is_video());
    }

    #[test]
    fn test_non_playable_ignored() {
        let mut doc = SimDocument::new();
        let div = doc.create_container();
        doc.attach(div);
        let mut monitor = ElementMonitor::new();
        assert!(!monitor.monitor(div, &doc));
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_refresh_tracks_audibility() {
        let mut doc = SimDocument::new();
        let el = doc.add_audio();
        let mut monitor = ElementMonitor::new();
        monitor.scan(&doc);
        assert_eq!(monitor.audible_count(), 0);

        doc.play(el).unwrap();
        assert!(monitor.refresh(el, &doc).unwrap().audible);
        assert_eq!(monitor.audible_count(), 1);

        doc.set_muted(el, true).unwrap();
        assert!(!monitor.refresh(el, &doc).unwrap().audible);
        assert_eq!(monitor.audible_count(), 0);
    }

    #[test]
    fn test_refresh_untracked_is_none() {
        let mut doc = SimDocument::new();
        let el = doc.add_audio();
        let mut monitor = ElementMonitor::new();
        assert!(monitor.refresh(el, &doc).is_none());
    }

    #[test]
    fn test_evict_detached() {
        let mut doc = SimDocument::new();
        let keep = doc.add_audio();
        let gone = doc.add_video();
        let mut monitor = ElementMonitor::new();
        monitor.scan(&doc);

        doc.detach(gone);
        let evicted = monitor.evict_detached(&doc);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, gone);
        assert_eq!(monitor.ids(), vec![keep]);
    }
}
