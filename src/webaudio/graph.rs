//! Bookkeeping for one intercepted audio context

use std::collections::HashSet;

use crate::host::{AudioNodeId, ContextId};

/// Per-context state the interceptor keeps next to the page's graph
#[derive(Debug, Clone, PartialEq)]
pub struct AudioGraphInfo {
    pub context: ContextId,
    /// Gain node every destination-bound page connection is routed through;
    /// `None` if it could not be installed
    pub master_gain: Option<AudioNodeId>,
    pub master_gain_level: f32,
    /// Level before the first volume-mode duck
    pub original_gain: Option<f32>,
    pub ducked: bool,
    /// Suspended by a pause-mode duck; only these are resumed
    pub paused_by_core: bool,
    /// Started generators that have neither stopped nor ended
    pub active_sources: HashSet<AudioNodeId>,
    pub running: bool,
}

impl AudioGraphInfo {
    pub fn new(context: ContextId, master_gain: Option<AudioNodeId>, running: bool) -> Self {
        Self {
            context,
            master_gain,
            master_gain_level: 1.0,
            original_gain: None,
            ducked: false,
            paused_by_core: false,
            active_sources: HashSet::new(),
            running,
        }
    }

    pub fn active_source_count(&self) -> usize {
        self.active_sources.len()
    }

    /// Running with at least one live generator
    pub fn is_audible(&self) -> bool {
        self.running && !self.active_sources.is_empty()
    }
}
