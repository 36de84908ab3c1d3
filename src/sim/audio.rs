//! Simulated audio API
//!
//! Models just enough of an audio-context implementation for the sensor:
//! node creation, connections, parameter automation against a shared clock,
//! single-capture media sources and scheduled generators.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::{Result, SensorError};
use crate::focus::ImpulseResponse;
use crate::host::{
    AudioBackend, AudioNodeId, AudioParamTarget, BiquadKind, ContextId, ContextState, ElementId,
    PageEvent, PageEvents,
};

/// Sample rate of simulated contexts
pub const SIM_SAMPLE_RATE: f32 = 8_000.0;

/// Default biquad frequency (matches the web platform)
const DEFAULT_FREQUENCY: f32 = 350.0;

#[derive(Debug, Clone)]
struct SimContext {
    state: ContextState,
    destination: AudioNodeId,
}

#[derive(Debug, Clone)]
enum SimNodeKind {
    Destination,
    Gain,
    Biquad(BiquadKind),
    Convolver {
        buffer: Option<ImpulseResponse>,
        writes: usize,
    },
    MediaSource,
    Generator {
        started: bool,
        stopped: bool,
    },
}

#[derive(Debug, Clone)]
struct SimNode {
    context: ContextId,
    kind: SimNodeKind,
    outputs: BTreeSet<AudioNodeId>,
}

/// Backend operations that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimFault {
    CreateGain,
    /// `set_param` and `set_param_target`
    ParamWrite,
    Connect,
}

/// Parameter automation: a held value or an exponential approach
#[derive(Debug, Clone, Copy)]
enum Automation {
    Fixed(f32),
    Target {
        from: f32,
        target: f32,
        start: f64,
        time_constant: f64,
    },
}

impl Automation {
    fn value_at(&self, time: f64) -> f32 {
        match *self {
            Automation::Fixed(value) => value,
            Automation::Target {
                from,
                target,
                start,
                time_constant,
            } => {
                if time <= start || time_constant <= 0.0 {
                    return if time_constant <= 0.0 && time > start {
                        target
                    } else {
                        from
                    };
                }
                let decay = (-(time - start) / time_constant).exp() as f32;
                target + (from - target) * decay
            }
        }
    }
}

/// In-memory [`AudioBackend`]
#[derive(Debug)]
pub struct SimAudio {
    supported: bool,
    clock: f64,
    next_id: u64,
    contexts: BTreeMap<ContextId, SimContext>,
    nodes: BTreeMap<AudioNodeId, SimNode>,
    params: HashMap<AudioParamTarget, Automation>,
    captured: HashSet<ElementId>,
    media_sources: usize,
    initial_state: ContextState,
    events: VecDeque<PageEvent>,
    faults: HashSet<SimFault>,
}

impl Default for SimAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAudio {
    pub fn new() -> Self {
        Self {
            supported: true,
            clock: 0.0,
            next_id: 1,
            contexts: BTreeMap::new(),
            nodes: BTreeMap::new(),
            params: HashMap::new(),
            captured: HashSet::new(),
            media_sources: 0,
            initial_state: ContextState::Running,
            events: VecDeque::new(),
            faults: HashSet::new(),
        }
    }

    /// Environment without any audio API
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// State new contexts start in (autoplay policies start them suspended)
    pub fn set_initial_state(&mut self, state: ContextState) {
        self.initial_state = state;
    }

    /// Make the next call of `op` fail with a backend error
    pub fn fail_next(&mut self, op: SimFault) {
        self.faults.insert(op);
    }

    fn check_fault(&mut self, op: SimFault) -> Result<()> {
        if self.faults.remove(&op) {
            return Err(SensorError::backend(format!("injected {:?} failure", op)));
        }
        Ok(())
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn add_node(&mut self, context: ContextId, kind: SimNodeKind) -> Result<AudioNodeId> {
        if !self.contexts.contains_key(&context) {
            return Err(SensorError::UnknownContext { context });
        }
        let id = AudioNodeId(self.next());
        match kind {
            SimNodeKind::Gain => {
                self.params
                    .insert(AudioParamTarget::gain(id), Automation::Fixed(1.0));
            }
            SimNodeKind::Biquad(_) => {
                self.params.insert(
                    AudioParamTarget::frequency(id),
                    Automation::Fixed(DEFAULT_FREQUENCY),
                );
            }
            _ => {}
        }
        self.nodes.insert(
            id,
            SimNode {
                context,
                kind,
                outputs: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    fn node_mut(&mut self, node: AudioNodeId) -> Result<&mut SimNode> {
        self.nodes
            .get_mut(&node)
            .ok_or(SensorError::UnknownNode { node })
    }

    // ========================================================================
    // Page-side operations
    // ========================================================================

    /// Page creates a generator (oscillator, buffer source, ...)
    pub fn create_generator(&mut self, context: ContextId) -> Result<AudioNodeId> {
        self.add_node(
            context,
            SimNodeKind::Generator {
                started: false,
                stopped: false,
            },
        )
    }

    /// A started generator reaches its natural end
    pub fn finish_generator(&mut self, node: AudioNodeId) -> Result<()> {
        match &mut self.node_mut(node)?.kind {
            SimNodeKind::Generator { started, stopped } if *started && !*stopped => {
                *stopped = true;
            }
            SimNodeKind::Generator { .. } => return Ok(()),
            _ => return Err(SensorError::backend("not a generator")),
        }
        self.events.push_back(PageEvent::SourceEnded(node));
        Ok(())
    }

    /// Browser-driven running/suspended transition (autoplay, tab freeze)
    pub fn set_context_state(&mut self, context: ContextId, state: ContextState) -> Result<()> {
        let ctx = self
            .contexts
            .get_mut(&context)
            .ok_or(SensorError::UnknownContext { context })?;
        if ctx.state != state {
            ctx.state = state;
            self.events.push_back(PageEvent::ContextStateChanged(context));
        }
        Ok(())
    }

    /// Page captured the element itself, blocking a second capture
    pub fn claim_element(&mut self, element: ElementId) {
        self.captured.insert(element);
    }

    pub fn release_element(&mut self, element: ElementId) {
        self.captured.remove(&element);
    }

    /// Advance the audio clock
    pub fn advance(&mut self, seconds: f64) {
        self.clock += seconds.max(0.0);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn now(&self) -> f64 {
        self.clock
    }

    pub fn is_connected(&self, from: AudioNodeId, to: AudioNodeId) -> bool {
        self.nodes
            .get(&from)
            .map(|n| n.outputs.contains(&to))
            .unwrap_or(false)
    }

    pub fn outputs(&self, node: AudioNodeId) -> Vec<AudioNodeId> {
        self.nodes
            .get(&node)
            .map(|n| n.outputs.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn biquad_type(&self, node: AudioNodeId) -> Option<BiquadKind> {
        match self.nodes.get(&node)?.kind {
            SimNodeKind::Biquad(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn convolver_buffer(&self, node: AudioNodeId) -> Option<&ImpulseResponse> {
        match &self.nodes.get(&node)?.kind {
            SimNodeKind::Convolver { buffer, .. } => buffer.as_ref(),
            _ => None,
        }
    }

    /// How many times a buffer was assigned to the convolver
    pub fn convolver_writes(&self, node: AudioNodeId) -> usize {
        match self.nodes.get(&node).map(|n| &n.kind) {
            Some(SimNodeKind::Convolver { writes, .. }) => *writes,
            _ => 0,
        }
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Media sources successfully created through this backend
    pub fn media_source_count(&self) -> usize {
        self.media_sources
    }

    pub fn is_started(&self, node: AudioNodeId) -> bool {
        matches!(
            self.nodes.get(&node).map(|n| &n.kind),
            Some(SimNodeKind::Generator { started: true, .. })
        )
    }
}

impl AudioBackend for SimAudio {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create_context(&mut self) -> Result<ContextId> {
        if !self.supported {
            return Err(SensorError::UnsupportedEnvironment);
        }
        let context = ContextId(self.next());
        let destination = AudioNodeId(self.next());
        self.contexts.insert(
            context,
            SimContext {
                state: self.initial_state,
                destination,
            },
        );
        self.nodes.insert(
            destination,
            SimNode {
                context,
                kind: SimNodeKind::Destination,
                outputs: BTreeSet::new(),
            },
        );
        Ok(context)
    }

    fn context_state(&self, context: ContextId) -> Option<ContextState> {
        self.contexts.get(&context).map(|c| c.state)
    }

    fn destination(&self, context: ContextId) -> Result<AudioNodeId> {
        self.contexts
            .get(&context)
            .map(|c| c.destination)
            .ok_or(SensorError::UnknownContext { context })
    }

    fn current_time(&self, _context: ContextId) -> f64 {
        self.clock
    }

    fn sample_rate(&self, _context: ContextId) -> f32 {
        SIM_SAMPLE_RATE
    }

    fn create_gain(&mut self, context: ContextId) -> Result<AudioNodeId> {
        self.check_fault(SimFault::CreateGain)?;
        self.add_node(context, SimNodeKind::Gain)
    }

    fn create_biquad(&mut self, context: ContextId) -> Result<AudioNodeId> {
        self.add_node(context, SimNodeKind::Biquad(BiquadKind::Lowpass))
    }

    fn create_convolver(&mut self, context: ContextId) -> Result<AudioNodeId> {
        self.add_node(
            context,
            SimNodeKind::Convolver {
                buffer: None,
                writes: 0,
            },
        )
    }

    fn create_media_source(
        &mut self,
        context: ContextId,
        element: ElementId,
    ) -> Result<AudioNodeId> {
        if self.captured.contains(&element) {
            return Err(SensorError::CaptureConflict { element });
        }
        let node = self.add_node(context, SimNodeKind::MediaSource)?;
        self.captured.insert(element);
        self.media_sources += 1;
        Ok(node)
    }

    fn connect(&mut self, from: AudioNodeId, to: AudioNodeId) -> Result<()> {
        self.check_fault(SimFault::Connect)?;
        let target_context = self
            .nodes
            .get(&to)
            .map(|n| n.context)
            .ok_or(SensorError::UnknownNode { node: to })?;
        let source = self.node_mut(from)?;
        if source.context != target_context {
            return Err(SensorError::backend("cannot connect nodes of different contexts"));
        }
        source.outputs.insert(to);
        Ok(())
    }

    fn disconnect(&mut self, node: AudioNodeId) -> Result<()> {
        self.node_mut(node)?.outputs.clear();
        Ok(())
    }

    fn node_context(&self, node: AudioNodeId) -> Option<ContextId> {
        self.nodes.get(&node).map(|n| n.context)
    }

    fn set_biquad_type(&mut self, node: AudioNodeId, kind: BiquadKind) -> Result<()> {
        match &mut self.node_mut(node)?.kind {
            SimNodeKind::Biquad(current) => {
                *current = kind;
                Ok(())
            }
            _ => Err(SensorError::backend("not a biquad filter")),
        }
    }

    fn set_param(&mut self, param: AudioParamTarget, value: f32) -> Result<()> {
        self.check_fault(SimFault::ParamWrite)?;
        let slot = self
            .params
            .get_mut(&param)
            .ok_or(SensorError::UnknownNode { node: param.node })?;
        *slot = Automation::Fixed(value);
        Ok(())
    }

    fn set_param_target(
        &mut self,
        param: AudioParamTarget,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<()> {
        self.check_fault(SimFault::ParamWrite)?;
        let clock = self.clock;
        let slot = self
            .params
            .get_mut(&param)
            .ok_or(SensorError::UnknownNode { node: param.node })?;
        let from = slot.value_at(clock);
        *slot = Automation::Target {
            from,
            target,
            start: start_time.max(clock),
            time_constant,
        };
        Ok(())
    }

    fn param_value(&self, param: AudioParamTarget) -> Option<f32> {
        self.params.get(&param).map(|a| a.value_at(self.clock))
    }

    fn set_convolver_buffer(&mut self, node: AudioNodeId, impulse: ImpulseResponse) -> Result<()> {
        match &mut self.node_mut(node)?.kind {
            SimNodeKind::Convolver { buffer, writes } => {
                *buffer = Some(impulse);
                *writes += 1;
                Ok(())
            }
            _ => Err(SensorError::backend("not a convolver")),
        }
    }

    fn start_source(&mut self, node: AudioNodeId) -> Result<()> {
        match &mut self.node_mut(node)?.kind {
            SimNodeKind::Generator { started, .. } if !*started => {
                *started = true;
                Ok(())
            }
            SimNodeKind::Generator { .. } => Err(SensorError::backend("generator already started")),
            _ => Err(SensorError::backend("not a generator")),
        }
    }

    fn stop_source(&mut self, node: AudioNodeId) -> Result<()> {
        let first_stop = match &mut self.node_mut(node)?.kind {
            SimNodeKind::Generator { started, stopped } if *started => {
                !std::mem::replace(stopped, true)
            }
            SimNodeKind::Generator { .. } => {
                return Err(SensorError::backend("generator not started"))
            }
            _ => return Err(SensorError::backend("not a generator")),
        };
        if first_stop {
            // A stopped generator still fires `ended`
            self.events.push_back(PageEvent::SourceEnded(node));
        }
        Ok(())
    }

    fn suspend(&mut self, context: ContextId) -> Result<()> {
        self.set_context_state(context, ContextState::Suspended)
    }

    fn resume(&mut self, context: ContextId) -> Result<()> {
        self.set_context_state(context, ContextState::Running)
    }
}

impl PageEvents for SimAudio {
    fn poll_event(&mut self) -> Option<PageEvent> {
        self.events.pop_front()
    }
}
