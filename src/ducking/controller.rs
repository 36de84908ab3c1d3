//! Duck and restore over elements and intercepted graphs

use crate::config::SensorConfig;
use crate::focus::FocusManager;
use crate::host::{AudioBackend, ElementId, MediaHost};
use crate::media::ElementMonitor;
use crate::webaudio::Interceptor;

use super::state::{clamp_fraction, DuckMode, DuckPhase, DuckState};

/// Everything a duck or restore writes to
///
/// Borrowed field by field from the sensor state for the duration of one
/// transition.
pub struct DuckTargets<'a, H: MediaHost, B: AudioBackend> {
    pub host: &'a mut H,
    pub backend: &'a mut B,
    pub monitor: &'a mut ElementMonitor,
    pub interceptor: &'a mut Interceptor,
    pub focus: &'a mut FocusManager,
    pub config: &'a SensorConfig,
}

/// The tab's ducking state machine
#[derive(Debug, Default)]
pub struct DuckingController {
    state: DuckState,
}

impl DuckingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DuckState {
        self.state
    }

    pub fn is_ducked(&self) -> bool {
        self.state.is_ducked()
    }

    pub fn mode(&self) -> Option<DuckMode> {
        self.state.mode()
    }

    pub fn fraction(&self) -> f32 {
        self.state.fraction
    }

    /// Fraction to apply to newly created contexts; `Some` only while volume-ducked
    pub fn volume_fraction(&self) -> Option<f32> {
        (self.state.phase == DuckPhase::Ducked(DuckMode::Volume)).then_some(self.state.fraction)
    }

    /// Target for focus duck-gain stages
    pub fn gain_target(&self) -> f32 {
        self.volume_fraction().unwrap_or(1.0)
    }

    /// Enter `Ducked(mode)`
    ///
    /// # Arguments
    /// * `mode` - Attenuation mode
    /// * `fraction` - Volume fraction, clamped into `[0, 1]` (only used by volume mode)
    /// * `targets` - Elements and graphs to attenuate
    ///
    /// Returns `false` when nothing changed (same mode, same fraction).
    pub fn duck<H: MediaHost, B: AudioBackend>(
        &mut self,
        mode: DuckMode,
        fraction: f32,
        targets: &mut DuckTargets<'_, H, B>,
    ) -> bool {
        let fraction = clamp_fraction(fraction, targets.config.default_volume_fraction);
        match self.state.phase {
            DuckPhase::Ducked(current) if current == mode => {
                if mode != DuckMode::Volume || fraction == self.state.fraction {
                    return false;
                }
                // Re-derive from the saved baselines
                self.state.fraction = fraction;
                self.apply_volume(targets);
                tracing::debug!(fraction, "[DUCK] Volume fraction changed");
                return true;
            }
            DuckPhase::Ducked(current) => {
                tracing::debug!(from = %current, to = %mode, "[DUCK] Switching mode");
                self.undo(current, targets);
            }
            DuckPhase::Idle => {}
        }

        self.state = DuckState {
            phase: DuckPhase::Ducked(mode),
            fraction,
        };
        match mode {
            DuckMode::Mute => {
                if let Err(err) = targets.host.set_tab_muted(true) {
                    tracing::warn!(error = %err, "[DUCK] Could not mute tab");
                }
            }
            DuckMode::Pause => Self::apply_pause(targets),
            DuckMode::Volume => self.apply_volume(targets),
        }
        tracing::debug!(mode = %mode, fraction, "[DUCK] Ducked");
        true
    }

    /// Return to `Idle`, undoing the active mode; a no-op when idle
    pub fn restore<H: MediaHost, B: AudioBackend>(
        &mut self,
        targets: &mut DuckTargets<'_, H, B>,
    ) -> bool {
        let DuckPhase::Ducked(mode) = self.state.phase else {
            return false;
        };
        self.undo(mode, targets);
        self.state = DuckState::default();
        tracing::debug!(mode = %mode, "[DUCK] Restored");
        true
    }

    /// Restore only if `mode` is the active one
    pub fn restore_mode<H: MediaHost, B: AudioBackend>(
        &mut self,
        mode: DuckMode,
        targets: &mut DuckTargets<'_, H, B>,
    ) -> bool {
        if self.state.mode() != Some(mode) {
            tracing::trace!(requested = %mode, active = ?self.state.mode(), "[DUCK] Restore ignored");
            return false;
        }
        self.restore(targets)
    }

    /// Bring an element observed while volume-ducked in line with the others
    pub fn apply_to_element<H: MediaHost, B: AudioBackend>(
        &self,
        element: ElementId,
        targets: &mut DuckTargets<'_, H, B>,
    ) {
        if let Some(fraction) = self.volume_fraction() {
            Self::duck_element(element, fraction, targets);
        }
    }

    // ========================================================================
    // Mode application
    // ========================================================================

    fn apply_volume<H: MediaHost, B: AudioBackend>(&self, targets: &mut DuckTargets<'_, H, B>) {
        let fraction = self.state.fraction;
        for element in targets.monitor.ids() {
            Self::duck_element(element, fraction, targets);
        }
        targets.interceptor.duck_all(targets.backend, fraction);
    }

    fn duck_element<H: MediaHost, B: AudioBackend>(
        element: ElementId,
        fraction: f32,
        targets: &mut DuckTargets<'_, H, B>,
    ) {
        // A focus chain owns the element's final gain stage
        if targets
            .focus
            .update_ducking(element, fraction, targets.backend, targets.config)
        {
            return;
        }
        let Some(tracked) = targets.monitor.get_mut(element) else {
            return;
        };
        let saved = match tracked.saved_volume {
            Some(volume) => volume,
            None => {
                let Some(snapshot) = targets.host.snapshot(element) else {
                    return;
                };
                tracked.saved_volume = Some(snapshot.volume);
                snapshot.volume
            }
        };
        let target = (saved * f64::from(fraction)).clamp(0.0, 1.0);
        if let Err(err) = targets.host.set_volume(element, target) {
            tracing::warn!(element = %element, error = %err, "[DUCK] Could not set volume");
        }
    }

    fn apply_pause<H: MediaHost, B: AudioBackend>(targets: &mut DuckTargets<'_, H, B>) {
        for element in targets.monitor.ids() {
            let playing = targets
                .host
                .snapshot(element)
                .map(|s| s.is_playing())
                .unwrap_or(false);
            if !playing {
                continue;
            }
            match targets.host.pause(element) {
                Ok(()) => {
                    if let Some(tracked) = targets.monitor.get_mut(element) {
                        tracked.paused_by_core = true;
                    }
                }
                Err(err) => {
                    tracing::warn!(element = %element, error = %err, "[DUCK] Could not pause");
                }
            }
        }
        targets.interceptor.suspend_running(targets.backend);
    }

    // ========================================================================
    // Undo
    // ========================================================================

    fn undo<H: MediaHost, B: AudioBackend>(&self, mode: DuckMode, targets: &mut DuckTargets<'_, H, B>) {
        match mode {
            DuckMode::Mute => {
                if let Err(err) = targets.host.set_tab_muted(false) {
                    tracing::warn!(error = %err, "[DUCK] Could not unmute tab");
                }
            }
            DuckMode::Pause => {
                for element in targets.monitor.ids() {
                    let Some(tracked) = targets.monitor.get_mut(element) else {
                        continue;
                    };
                    if !std::mem::take(&mut tracked.paused_by_core) {
                        continue;
                    }
                    if let Err(err) = targets.host.play(element) {
                        tracing::warn!(element = %element, error = %err, "[DUCK] Could not resume");
                    }
                }
                targets.interceptor.resume_suspended(targets.backend);
            }
            DuckMode::Volume => {
                for element in targets.monitor.ids() {
                    targets
                        .focus
                        .update_ducking(element, 1.0, targets.backend, targets.config);
                    let Some(saved) = targets
                        .monitor
                        .get_mut(element)
                        .and_then(|tracked| tracked.saved_volume.take())
                    else {
                        continue;
                    };
                    if let Err(err) = targets.host.set_volume(element, saved) {
                        tracing::warn!(element = %element, error = %err, "[DUCK] Could not restore volume");
                    }
                }
                targets.interceptor.restore_all(targets.backend);
            }
        }
    }
}
