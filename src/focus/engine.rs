//! Per-element focus chain
//!
//! ```text
//! source -> tone filter -+-> dry gain ---------------------------+-> focus gain -> duck gain -> destination
//!                        +-> convolver -> wet tone -> wet gain --+
//! ```
//!
//! The duck gain is always the last stage. While an engine owns an element,
//! the ducking controller attenuates through it instead of the element's
//! volume.

use uuid::Uuid;

use crate::config::SensorConfig;
use crate::error::Result;
use crate::host::{AudioBackend, AudioNodeId, AudioParamTarget, BiquadKind, ContextId, ElementId};

use super::impulse::ImpulseGenerator;
use super::style::{FocusStyle, ToneFilter};

/// Node handles of one focus chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChain {
    pub source: AudioNodeId,
    pub filter: AudioNodeId,
    pub convolver: AudioNodeId,
    pub wet_tone: AudioNodeId,
    pub dry_gain: AudioNodeId,
    pub wet_gain: AudioNodeId,
    pub focus_gain: AudioNodeId,
    pub duck_gain: AudioNodeId,
}

impl FocusChain {
    /// Every node the chain created (excludes the captured source)
    fn owned_nodes(&self) -> [AudioNodeId; 7] {
        [
            self.filter,
            self.convolver,
            self.wet_tone,
            self.dry_gain,
            self.wet_gain,
            self.focus_gain,
            self.duck_gain,
        ]
    }
}

/// Focus processing attached to a single media element
#[derive(Debug)]
pub struct FocusEngine {
    id: Uuid,
    element: ElementId,
    context: ContextId,
    chain: FocusChain,
    active: bool,
    current_style: Option<FocusStyle>,
    /// Style whose impulse is loaded in the convolver
    impulse_style: Option<FocusStyle>,
}

impl FocusEngine {
    /// Create the chain nodes and splice them between `source` and the destination
    ///
    /// On a wiring failure the source is reconnected to the destination
    /// before the error is returned, so the element keeps playing.
    pub fn build<B: AudioBackend>(
        backend: &mut B,
        context: ContextId,
        element: ElementId,
        source: AudioNodeId,
    ) -> Result<Self> {
        let destination = backend.destination(context)?;
        let chain = FocusChain {
            source,
            filter: backend.create_biquad(context)?,
            convolver: backend.create_convolver(context)?,
            wet_tone: backend.create_biquad(context)?,
            dry_gain: backend.create_gain(context)?,
            wet_gain: backend.create_gain(context)?,
            focus_gain: backend.create_gain(context)?,
            duck_gain: backend.create_gain(context)?,
        };

        if let Err(err) = Self::wire(backend, &chain, destination) {
            for node in chain.owned_nodes() {
                let _ = backend.disconnect(node);
            }
            let _ = backend.disconnect(source);
            let _ = backend.connect(source, destination);
            return Err(err);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            element,
            context,
            chain,
            active: true,
            current_style: None,
            impulse_style: None,
        })
    }

    fn wire<B: AudioBackend>(
        backend: &mut B,
        chain: &FocusChain,
        destination: AudioNodeId,
    ) -> Result<()> {
        backend.disconnect(chain.source)?;
        backend.connect(chain.source, chain.filter)?;

        backend.connect(chain.filter, chain.dry_gain)?;
        backend.connect(chain.filter, chain.convolver)?;

        backend.connect(chain.convolver, chain.wet_tone)?;
        backend.set_biquad_type(chain.wet_tone, BiquadKind::Lowpass)?;
        backend.connect(chain.wet_tone, chain.wet_gain)?;

        backend.connect(chain.dry_gain, chain.focus_gain)?;
        backend.connect(chain.wet_gain, chain.focus_gain)?;

        backend.connect(chain.focus_gain, chain.duck_gain)?;
        backend.connect(chain.duck_gain, destination)?;
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn chain(&self) -> &FocusChain {
        &self.chain
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_style(&self) -> Option<FocusStyle> {
        self.current_style
    }

    /// Ramp every stage toward `style`
    ///
    /// The impulse is only regenerated when the loaded one belongs to a
    /// different style and the new style actually uses the reverb path.
    pub fn apply_style<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        style: FocusStyle,
        impulses: &mut ImpulseGenerator,
        config: &SensorConfig,
    ) -> Result<()> {
        let now = backend.current_time(self.context);
        let tau = config.ramp_time_constant;
        let p = style.params();

        let (kind, freq) = match p.filter {
            ToneFilter::Bypass => (BiquadKind::Lowpass, config.bypass_frequency),
            ToneFilter::Lowpass => (BiquadKind::Lowpass, p.filter_freq),
            ToneFilter::Bandpass => (BiquadKind::Bandpass, p.filter_freq),
        };
        backend.set_biquad_type(self.chain.filter, kind)?;
        backend.set_param_target(AudioParamTarget::frequency(self.chain.filter), freq, now, tau)?;

        if p.has_reverb() && self.impulse_style != Some(style) {
            let sample_rate = backend.sample_rate(self.context);
            let impulse = impulses.generate(sample_rate, p.reverb_duration, p.reverb_decay);
            backend.set_convolver_buffer(self.chain.convolver, impulse)?;
            self.impulse_style = Some(style);
            tracing::debug!(engine = %self.id, style = %style, "[FOCUS] Regenerated impulse");
        }

        backend.set_param_target(
            AudioParamTarget::frequency(self.chain.wet_tone),
            p.wet_lowpass,
            now,
            tau,
        )?;
        backend.set_param_target(AudioParamTarget::gain(self.chain.dry_gain), p.dry, now, tau)?;
        backend.set_param_target(AudioParamTarget::gain(self.chain.wet_gain), p.wet, now, tau)?;
        backend.set_param_target(
            AudioParamTarget::gain(self.chain.focus_gain),
            p.output_gain,
            now,
            tau,
        )?;

        self.current_style = Some(style);
        Ok(())
    }

    /// Ramp the duck-gain stage toward `target`
    pub fn update_ducking<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        target: f32,
        config: &SensorConfig,
    ) -> Result<()> {
        let now = backend.current_time(self.context);
        backend.set_param_target(
            AudioParamTarget::gain(self.chain.duck_gain),
            target.clamp(0.0, 1.0),
            now,
            config.ramp_time_constant,
        )
    }

    /// Disconnect the chain and route the raw source straight to the destination
    ///
    /// Best effort: individual disconnect failures do not stop the reconnect.
    pub fn teardown<B: AudioBackend>(mut self, backend: &mut B) -> Result<()> {
        self.active = false;
        let _ = backend.disconnect(self.chain.source);
        for node in self.chain.owned_nodes() {
            let _ = backend.disconnect(node);
        }
        let destination = backend.destination(self.context)?;
        backend.connect(self.chain.source, destination)?;
        tracing::debug!(engine = %self.id, element = %self.element, "[FOCUS] Chain torn down");
        Ok(())
    }
}
