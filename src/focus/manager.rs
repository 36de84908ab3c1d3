//! Focus Mode registry and lifecycle
//!
//! Holds the global enabled flag and current style, the captured media
//! sources and one [`FocusEngine`] per attached element. Transitions:
//!
//! - `attach`: enabled, element qualifies, not attached, never failed → chain built
//! - `detach`: chain torn down, source routed straight to the destination
//! - `restyle`: every attached chain ramps toward the current style
//! - `evict`: element left the document; all bookkeeping dropped
//!
//! Capture failures are remembered per element; attach is a no-op for them
//! afterwards and plain volume ducking stays their only attenuation path.

use std::collections::{HashMap, HashSet};

use crate::config::SensorConfig;
use crate::error::SensorError;
use crate::host::{AudioBackend, AudioNodeId, ContextId, ElementId, MediaKind, MediaSnapshot};

use super::engine::FocusEngine;
use super::impulse::ImpulseGenerator;
use super::style::FocusStyle;

/// Owner of every focus engine in the tab
#[derive(Debug, Default)]
pub struct FocusManager {
    enabled: bool,
    style: FocusStyle,
    /// Private context for focus graphs (never intercepted)
    context: Option<ContextId>,
    /// An element can be captured once; the source node is reused across attaches
    captured: HashMap<ElementId, AudioNodeId>,
    engines: HashMap<ElementId, FocusEngine>,
    failed: HashSet<ElementId>,
    impulses: ImpulseGenerator,
}

impl FocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with a deterministic impulse generator
    pub fn with_impulses(impulses: ImpulseGenerator) -> Self {
        Self {
            impulses,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn style(&self) -> FocusStyle {
        self.style
    }

    pub fn is_attached(&self, element: ElementId) -> bool {
        self.engines.contains_key(&element)
    }

    pub fn has_failed(&self, element: ElementId) -> bool {
        self.failed.contains(&element)
    }

    /// The private focus context, once created
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    pub fn captured_source(&self, element: ElementId) -> Option<AudioNodeId> {
        self.captured.get(&element).copied()
    }

    pub fn engine(&self, element: ElementId) -> Option<&FocusEngine> {
        self.engines.get(&element)
    }

    pub fn active_count(&self) -> usize {
        self.engines.len()
    }

    pub fn attached_elements(&self) -> Vec<ElementId> {
        let mut elements: Vec<_> = self.engines.keys().copied().collect();
        elements.sort();
        elements
    }

    /// Whether Focus Mode should process this element
    ///
    /// Short non-video clips are UI sound effects and are skipped. Unknown
    /// (NaN) and live (infinite) durations qualify.
    pub fn qualifies(&self, snapshot: &MediaSnapshot, config: &SensorConfig) -> bool {
        let short_clip =
            snapshot.kind == MediaKind::Audio && snapshot.duration < config.short_clip_secs;
        self.enabled && !short_clip
    }

    /// Turn Focus Mode on; callers then attach qualifying elements
    pub fn enable(&mut self, style: FocusStyle) {
        self.enabled = true;
        self.style = style;
        tracing::debug!(style = %style, "[FOCUS] Enabled");
    }

    /// Turn Focus Mode off and tear down every chain
    pub fn disable<B: AudioBackend>(&mut self, backend: &mut B) {
        self.enabled = false;
        for element in self.attached_elements() {
            self.detach(element, backend);
        }
        tracing::debug!("[FOCUS] Disabled");
    }

    /// Select a new style; attached chains are restyled by [`Self::restyle`]
    pub fn set_style(&mut self, style: FocusStyle) {
        self.style = style;
    }

    /// Build a chain for `element` if it qualifies
    ///
    /// Returns whether an engine is attached afterwards. Idempotent.
    pub fn attach<B: AudioBackend>(
        &mut self,
        element: ElementId,
        snapshot: &MediaSnapshot,
        backend: &mut B,
        config: &SensorConfig,
        duck_target: f32,
    ) -> bool {
        if self.engines.contains_key(&element) {
            return true;
        }
        if !self.qualifies(snapshot, config) || self.failed.contains(&element) {
            return false;
        }
        if !backend.is_supported() {
            return false;
        }
        let Some(context) = self.ensure_context(backend) else {
            return false;
        };

        let source = match self.captured.get(&element) {
            Some(source) => *source,
            None => match backend.create_media_source(context, element) {
                Ok(source) => {
                    self.captured.insert(element, source);
                    source
                }
                Err(err) => {
                    tracing::debug!(
                        element = %element,
                        error = %err,
                        "[FOCUS] Could not capture media source, volume ducking only"
                    );
                    self.failed.insert(element);
                    return false;
                }
            },
        };

        let mut engine = match FocusEngine::build(backend, context, element, source) {
            Ok(engine) => engine,
            Err(err) => {
                tracing::warn!(element = %element, error = %err, "[FOCUS] Chain construction failed");
                self.failed.insert(element);
                return false;
            }
        };

        let styled = engine
            .apply_style(backend, self.style, &mut self.impulses, config)
            .and_then(|_| engine.update_ducking(backend, duck_target, config));
        if let Err(err) = styled {
            tracing::warn!(element = %element, error = %err, "[FOCUS] Styling failed, tearing down");
            if let Err(err) = engine.teardown(backend) {
                tracing::debug!(element = %element, error = %err, "[FOCUS] Teardown incomplete");
            }
            self.failed.insert(element);
            return false;
        }

        tracing::debug!(
            element = %element,
            engine = %engine.id(),
            style = %self.style,
            "[FOCUS] Attached"
        );
        self.engines.insert(element, engine);
        true
    }

    /// Tear down the chain for `element`, if any
    pub fn detach<B: AudioBackend>(&mut self, element: ElementId, backend: &mut B) -> bool {
        let Some(engine) = self.engines.remove(&element) else {
            return false;
        };
        if let Err(err) = engine.teardown(backend) {
            tracing::warn!(element = %element, error = %err, "[FOCUS] Teardown incomplete");
        }
        true
    }

    /// Ramp every attached chain toward the current style
    pub fn restyle<B: AudioBackend>(&mut self, backend: &mut B, config: &SensorConfig) {
        let style = self.style;
        for (element, engine) in self.engines.iter_mut() {
            if let Err(err) = engine.apply_style(backend, style, &mut self.impulses, config) {
                tracing::warn!(element = %element, error = %err, "[FOCUS] Restyle failed");
            }
        }
    }

    /// Forward a duck target to the element's chain
    ///
    /// Returns `false` when no engine owns the element, meaning the caller
    /// must fall back to element volume.
    pub fn update_ducking<B: AudioBackend>(
        &mut self,
        element: ElementId,
        target: f32,
        backend: &mut B,
        config: &SensorConfig,
    ) -> bool {
        let Some(engine) = self.engines.get_mut(&element) else {
            return false;
        };
        if let Err(err) = engine.update_ducking(backend, target, config) {
            tracing::warn!(element = %element, error = %err, "[FOCUS] Duck gain update failed");
        }
        true
    }

    /// Drop every trace of a detached element
    pub fn evict<B: AudioBackend>(&mut self, element: ElementId, backend: &mut B) {
        self.detach(element, backend);
        self.captured.remove(&element);
        self.failed.remove(&element);
    }

    fn ensure_context<B: AudioBackend>(&mut self, backend: &mut B) -> Option<ContextId> {
        if let Some(context) = self.context {
            return Some(context);
        }
        match backend.create_context() {
            Ok(context) => {
                self.context = Some(context);
                Some(context)
            }
            Err(SensorError::UnsupportedEnvironment) => None,
            Err(err) => {
                tracing::warn!(error = %err, "[FOCUS] Could not create focus context");
                None
            }
        }
    }
}
