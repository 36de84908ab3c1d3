//! Audio-Graph Interceptor
//!
//! Page-facing wrappers around context construction, generator start/stop
//! and node connection. Each wrapper runs the original operation and then
//! updates bookkeeping. Only the original operation's result reaches the
//! caller; bookkeeping failures are logged and swallowed.

use std::collections::HashMap;

use crate::error::Result;
use crate::host::{AudioBackend, AudioNodeId, AudioParamTarget, ContextId, ContextState};

use super::graph::AudioGraphInfo;

/// Registry of intercepted contexts and their live generators
#[derive(Debug, Default)]
pub struct Interceptor {
    graphs: HashMap<ContextId, AudioGraphInfo>,
    /// Live generator → owning context
    sources: HashMap<AudioNodeId, ContextId>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the environment has an audio API to intercept at all
    pub fn is_supported<B: AudioBackend>(backend: &B) -> bool {
        backend.is_supported()
    }

    // ========================================================================
    // Page-facing wrappers
    // ========================================================================

    /// Construct a context for the page and register it
    ///
    /// `duck_fraction` is `Some` while a volume-mode duck is active; the new
    /// context then starts attenuated.
    pub fn create_context<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        duck_fraction: Option<f32>,
    ) -> Result<ContextId> {
        let context = backend.create_context()?;
        self.register(backend, context, duck_fraction);
        Ok(context)
    }

    /// Start a generator; its context is registered on first sight
    pub fn start_source<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        node: AudioNodeId,
        duck_fraction: Option<f32>,
    ) -> Result<()> {
        backend.start_source(node)?;
        let Some(context) = backend.node_context(node) else {
            tracing::warn!(node = %node, "[WEBAUDIO] Started generator has no context");
            return Ok(());
        };
        self.register(backend, context, duck_fraction);
        if let Some(info) = self.graphs.get_mut(&context) {
            info.active_sources.insert(node);
            self.sources.insert(node, context);
            tracing::trace!(
                node = %node,
                context = %context,
                active = info.active_source_count(),
                "[WEBAUDIO] Generator started"
            );
        }
        Ok(())
    }

    /// Stop a generator early
    pub fn stop_source<B: AudioBackend>(&mut self, backend: &mut B, node: AudioNodeId) -> Result<()> {
        backend.stop_source(node)?;
        self.source_ended(node);
        Ok(())
    }

    /// A generator finished; returns whether it was still counted
    pub fn source_ended(&mut self, node: AudioNodeId) -> bool {
        let Some(context) = self.sources.remove(&node) else {
            return false;
        };
        if let Some(info) = self.graphs.get_mut(&context) {
            info.active_sources.remove(&node);
            tracing::trace!(
                node = %node,
                context = %context,
                active = info.active_source_count(),
                "[WEBAUDIO] Generator ended"
            );
        }
        true
    }

    /// Connect two nodes, routing destination-bound connections through the
    /// context's master gain
    pub fn connect<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        from: AudioNodeId,
        to: AudioNodeId,
    ) -> Result<()> {
        let redirect = self.master_gain_for_destination(backend, to);
        match redirect {
            Some(master) if master != from => backend.connect(from, master),
            _ => backend.connect(from, to),
        }
    }

    fn master_gain_for_destination<B: AudioBackend>(
        &self,
        backend: &B,
        node: AudioNodeId,
    ) -> Option<AudioNodeId> {
        let context = backend.node_context(node)?;
        let info = self.graphs.get(&context)?;
        let destination = backend.destination(context).ok()?;
        if destination == node {
            info.master_gain
        } else {
            None
        }
    }

    /// Sync the running flag after a state transition
    ///
    /// Closed contexts are forgotten together with their generators.
    pub fn context_state_changed<B: AudioBackend>(&mut self, backend: &B, context: ContextId) -> bool {
        let state = backend.context_state(context).unwrap_or(ContextState::Closed);
        if state == ContextState::Closed {
            if self.graphs.remove(&context).is_some() {
                self.sources.retain(|_, ctx| *ctx != context);
                tracing::debug!(context = %context, "[WEBAUDIO] Context closed");
                return true;
            }
            return false;
        }
        let Some(info) = self.graphs.get_mut(&context) else {
            return false;
        };
        let running = state == ContextState::Running;
        if info.running == running {
            return false;
        }
        info.running = running;
        tracing::debug!(context = %context, running, "[WEBAUDIO] Context state changed");
        true
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Install bookkeeping and the master gain for a context seen for the
    /// first time; a no-op for known contexts
    pub fn register<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        context: ContextId,
        duck_fraction: Option<f32>,
    ) {
        if self.graphs.contains_key(&context) {
            return;
        }
        let master_gain = match Self::install_master_gain(backend, context) {
            Ok(gain) => Some(gain),
            Err(err) => {
                tracing::warn!(context = %context, error = %err, "[WEBAUDIO] Master gain not installed");
                None
            }
        };
        let running = backend.context_state(context) == Some(ContextState::Running);
        let mut info = AudioGraphInfo::new(context, master_gain, running);
        if let Some(fraction) = duck_fraction {
            Self::duck_graph(backend, &mut info, fraction);
        }
        tracing::debug!(context = %context, running, "[WEBAUDIO] Context registered");
        self.graphs.insert(context, info);
    }

    fn install_master_gain<B: AudioBackend>(backend: &mut B, context: ContextId) -> Result<AudioNodeId> {
        let gain = backend.create_gain(context)?;
        backend.set_param(AudioParamTarget::gain(gain), 1.0)?;
        let destination = backend.destination(context)?;
        backend.connect(gain, destination)?;
        Ok(gain)
    }

    // ========================================================================
    // Ducking hooks
    // ========================================================================

    /// Scale every master gain by `fraction` of its pre-duck level
    pub fn duck_all<B: AudioBackend>(&mut self, backend: &mut B, fraction: f32) {
        for info in self.graphs.values_mut() {
            Self::duck_graph(backend, info, fraction);
        }
    }

    fn duck_graph<B: AudioBackend>(backend: &mut B, info: &mut AudioGraphInfo, fraction: f32) {
        let Some(master) = info.master_gain else {
            return;
        };
        let original = *info.original_gain.get_or_insert(info.master_gain_level);
        let target = (original * fraction.clamp(0.0, 1.0)).clamp(0.0, 1.0);
        match backend.set_param(AudioParamTarget::gain(master), target) {
            Ok(()) => {
                info.master_gain_level = target;
                info.ducked = true;
            }
            Err(err) => {
                tracing::warn!(context = %info.context, error = %err, "[WEBAUDIO] Duck failed");
            }
        }
    }

    /// Return every ducked master gain to its exact pre-duck level
    pub fn restore_all<B: AudioBackend>(&mut self, backend: &mut B) {
        for info in self.graphs.values_mut() {
            let Some(master) = info.master_gain else {
                continue;
            };
            if !info.ducked {
                continue;
            }
            let level = info.original_gain.take().unwrap_or(1.0);
            if let Err(err) = backend.set_param(AudioParamTarget::gain(master), level) {
                tracing::warn!(context = %info.context, error = %err, "[WEBAUDIO] Restore failed");
            }
            info.master_gain_level = level;
            info.ducked = false;
        }
    }

    /// Suspend every running context, remembering which ones
    pub fn suspend_running<B: AudioBackend>(&mut self, backend: &mut B) {
        for info in self.graphs.values_mut() {
            if !info.running || info.paused_by_core {
                continue;
            }
            match backend.suspend(info.context) {
                Ok(()) => {
                    info.paused_by_core = true;
                    info.running = backend.context_state(info.context) == Some(ContextState::Running);
                }
                Err(err) => {
                    tracing::warn!(context = %info.context, error = %err, "[WEBAUDIO] Suspend failed");
                }
            }
        }
    }

    /// Resume only the contexts a pause-mode duck suspended
    pub fn resume_suspended<B: AudioBackend>(&mut self, backend: &mut B) {
        for info in self.graphs.values_mut() {
            if !info.paused_by_core {
                continue;
            }
            info.paused_by_core = false;
            match backend.resume(info.context) {
                Ok(()) => {
                    info.running = backend.context_state(info.context) == Some(ContextState::Running);
                }
                Err(err) => {
                    tracing::warn!(context = %info.context, error = %err, "[WEBAUDIO] Resume failed");
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Any running context with a live generator
    pub fn is_audible(&self) -> bool {
        self.graphs.values().any(AudioGraphInfo::is_audible)
    }

    pub fn graph(&self, context: ContextId) -> Option<&AudioGraphInfo> {
        self.graphs.get(&context)
    }

    pub fn is_registered(&self, context: ContextId) -> bool {
        self.graphs.contains_key(&context)
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    pub fn active_source_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimAudio, SimFault};
    use approx::assert_abs_diff_eq;

    fn master(interceptor: &Interceptor, ctx: ContextId) -> AudioNodeId {
        interceptor.graph(ctx).unwrap().master_gain.unwrap()
    }

    #[test]
    fn test_create_installs_master_gain() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();

        let gain = master(&interceptor, ctx);
        let dest = audio.destination(ctx).unwrap();
        assert!(audio.is_connected(gain, dest));
        assert_eq!(audio.param_value(AudioParamTarget::gain(gain)), Some(1.0));
        assert!(interceptor.graph(ctx).unwrap().running);
    }

    #[test]
    fn test_connect_to_destination_is_redirected() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let osc = audio.create_generator(ctx).unwrap();
        let gain = audio.create_gain(ctx).unwrap();
        let dest = audio.destination(ctx).unwrap();

        interceptor.connect(&mut audio, osc, gain).unwrap();
        interceptor.connect(&mut audio, gain, dest).unwrap();

        assert!(audio.is_connected(osc, gain));
        assert!(!audio.is_connected(gain, dest));
        assert!(audio.is_connected(gain, master(&interceptor, ctx)));
    }

    #[test]
    fn test_generator_counted_once() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let osc = audio.create_generator(ctx).unwrap();

        interceptor.start_source(&mut audio, osc, None).unwrap();
        assert!(interceptor.is_audible());

        interceptor.stop_source(&mut audio, osc).unwrap();
        assert!(!interceptor.source_ended(osc));
        assert_eq!(interceptor.graph(ctx).unwrap().active_source_count(), 0);
        assert!(!interceptor.is_audible());
    }

    #[test]
    fn test_unknown_context_registered_on_start() {
        let mut audio = SimAudio::new();
        let ctx = audio.create_context().unwrap();
        let osc = audio.create_generator(ctx).unwrap();
        let mut interceptor = Interceptor::new();

        interceptor.start_source(&mut audio, osc, None).unwrap();
        assert!(interceptor.is_registered(ctx));
        assert_eq!(interceptor.graph(ctx).unwrap().active_source_count(), 1);
    }

    #[test]
    fn test_original_failure_is_returned() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let osc = audio.create_generator(ctx).unwrap();
        interceptor.start_source(&mut audio, osc, None).unwrap();

        assert!(interceptor.start_source(&mut audio, osc, None).is_err());
        assert_eq!(interceptor.active_source_count(), 1);
    }

    #[test]
    fn test_suspended_context_not_audible() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let osc = audio.create_generator(ctx).unwrap();
        interceptor.start_source(&mut audio, osc, None).unwrap();

        audio.set_context_state(ctx, ContextState::Suspended).unwrap();
        assert!(interceptor.context_state_changed(&audio, ctx));
        assert!(!interceptor.is_audible());
        assert!(!interceptor.context_state_changed(&audio, ctx));
    }

    #[test]
    fn test_duck_and_restore_master_gain() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let gain = AudioParamTarget::gain(master(&interceptor, ctx));

        interceptor.duck_all(&mut audio, 0.25);
        assert_abs_diff_eq!(audio.param_value(gain).unwrap(), 0.25);
        interceptor.duck_all(&mut audio, 0.5);
        assert_abs_diff_eq!(audio.param_value(gain).unwrap(), 0.5);

        interceptor.restore_all(&mut audio);
        assert_abs_diff_eq!(audio.param_value(gain).unwrap(), 1.0);
        assert!(!interceptor.graph(ctx).unwrap().ducked);
    }

    #[test]
    fn test_context_created_while_ducked() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, Some(0.3)).unwrap();
        let info = interceptor.graph(ctx).unwrap();
        assert!(info.ducked);
        assert_abs_diff_eq!(
            audio.param_value(AudioParamTarget::gain(master(&interceptor, ctx))).unwrap(),
            0.3
        );
    }

    #[test]
    fn test_resume_only_suspended_by_core() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let running = interceptor.create_context(&mut audio, None).unwrap();
        let page_suspended = interceptor.create_context(&mut audio, None).unwrap();
        audio.set_context_state(page_suspended, ContextState::Suspended).unwrap();
        interceptor.context_state_changed(&audio, page_suspended);

        interceptor.suspend_running(&mut audio);
        assert_eq!(audio.context_state(running), Some(ContextState::Suspended));

        interceptor.resume_suspended(&mut audio);
        assert_eq!(audio.context_state(running), Some(ContextState::Running));
        assert_eq!(audio.context_state(page_suspended), Some(ContextState::Suspended));
    }

    #[test]
    fn test_closed_context_forgotten() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let osc = audio.create_generator(ctx).unwrap();
        interceptor.start_source(&mut audio, osc, None).unwrap();

        audio.set_context_state(ctx, ContextState::Closed).unwrap();
        assert!(interceptor.context_state_changed(&audio, ctx));
        assert_eq!(interceptor.graph_count(), 0);
        assert_eq!(interceptor.active_source_count(), 0);
    }

    #[test]
    fn test_master_gain_failure_is_swallowed() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        audio.fail_next(SimFault::CreateGain);

        let ctx = interceptor.create_context(&mut audio, None).unwrap();
        let info = interceptor.graph(ctx).unwrap();
        assert_eq!(info.master_gain, None);

        let osc = audio.create_generator(ctx).unwrap();
        let dest = audio.destination(ctx).unwrap();
        interceptor.connect(&mut audio, osc, dest).unwrap();
        assert!(audio.is_connected(osc, dest));

        interceptor.start_source(&mut audio, osc, None).unwrap();
        assert!(interceptor.is_audible());

        interceptor.duck_all(&mut audio, 0.5);
        assert!(!interceptor.graph(ctx).unwrap().ducked);
        interceptor.restore_all(&mut audio);
    }

    #[test]
    fn test_master_gain_wiring_failure_is_swallowed() {
        let mut audio = SimAudio::new();
        let mut interceptor = Interceptor::new();
        audio.fail_next(SimFault::Connect);

        let ctx = interceptor.create_context(&mut audio, Some(0.3)).unwrap();
        let info = interceptor.graph(ctx).unwrap();
        assert_eq!(info.master_gain, None);
        assert!(!info.ducked);
        assert!(info.running);
    }

    #[test]
    fn test_unsupported_is_pass_through() {
        let mut audio = SimAudio::unsupported();
        let mut interceptor = Interceptor::new();
        assert!(!Interceptor::is_supported(&audio));
        assert!(interceptor.create_context(&mut audio, None).is_err());
        assert_eq!(interceptor.graph_count(), 0);
    }
}
