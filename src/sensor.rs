//! Per-tab audio sensor
//!
//! [`AudioSensor`] owns the adapters and one [`SensorState`], and is the
//! single entry point for everything that happens in the tab:
//!
//! - page events ([`AudioSensor::handle_page_event`], [`AudioSensor::pump`])
//! - page calls into the audio API ([`AudioSensor::audio`])
//! - coordinator commands ([`AudioSensor::handle_command`])
//!
//! Every path ends in an audibility recomputation; changes are forwarded to
//! the event sink. Send failures never affect state.

use serde_json::Value;

use crate::aggregator::{AudibilityAggregator, AudioSource};
use crate::config::SensorConfig;
use crate::ducking::{DuckMode, DuckState, DuckTargets, DuckingController};
use crate::error::{Result, SensorError};
use crate::focus::{FocusManager, ImpulseGenerator};
use crate::host::{
    AudioBackend, AudioNodeId, ContextId, ElementId, EventSink, MediaHost, PageEvent, PageEvents,
};
use crate::media::ElementMonitor;
use crate::router::{Ack, Command, OutboundEvent};
use crate::webaudio::Interceptor;

/// All mutable sensing and actuation state of one tab
#[derive(Debug, Default)]
pub struct SensorState {
    pub monitor: ElementMonitor,
    pub interceptor: Interceptor,
    pub aggregator: AudibilityAggregator,
    pub ducking: DuckingController,
    pub focus: FocusManager,
}

/// Sensing and actuation core for one tab
pub struct AudioSensor<H: MediaHost, B: AudioBackend, E: EventSink> {
    host: H,
    backend: B,
    sink: E,
    config: SensorConfig,
    state: SensorState,
    started: bool,
}

impl<H: MediaHost, B: AudioBackend, E: EventSink> AudioSensor<H, B, E> {
    pub fn new(host: H, backend: B, sink: E) -> Self {
        Self::with_config(host, backend, sink, SensorConfig::default())
    }

    pub fn with_config(host: H, backend: B, sink: E, config: SensorConfig) -> Self {
        Self {
            host,
            backend,
            sink,
            config: config.sanitized(),
            state: SensorState::default(),
            started: false,
        }
    }

    /// Use a specific impulse generator (seeded in tests)
    pub fn with_impulses(mut self, impulses: ImpulseGenerator) -> Self {
        self.state.focus = FocusManager::with_impulses(impulses);
        self
    }

    /// Initial scan and baseline report; later calls only rescan
    pub fn start(&mut self) {
        if !self.started {
            self.started = true;
            tracing::debug!(
                webaudio = Interceptor::is_supported(&self.backend),
                "[SENSOR] Starting"
            );
        }
        let found = self.state.monitor.scan(&self.host);
        for element in found {
            self.element_updated(element);
        }
        self.recompute(None);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Raw backend access for operations the interceptor does not wrap
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn state(&self) -> &SensorState {
        &self.state
    }

    pub fn is_audible(&self) -> bool {
        self.state.aggregator.is_audible()
    }

    pub fn duck_state(&self) -> DuckState {
        self.state.ducking.state()
    }

    // ========================================================================
    // Page events
    // ========================================================================

    /// React to one page event
    pub fn handle_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::DocumentReady => {
                for element in self.state.monitor.scan(&self.host) {
                    self.element_updated(element);
                }
                self.recompute(Some(AudioSource::Media));
            }
            PageEvent::NodesAdded(nodes) => {
                let found = self.state.monitor.on_nodes_added(&nodes, &self.host);
                if found.is_empty() {
                    return;
                }
                for element in found {
                    self.element_updated(element);
                }
                self.recompute(Some(AudioSource::Media));
            }
            PageEvent::NodesRemoved(_) => {
                let evicted = self.state.monitor.evict_detached(&self.host);
                if evicted.is_empty() {
                    return;
                }
                for tracked in evicted {
                    self.state.focus.evict(tracked.id, &mut self.backend);
                }
                self.recompute(Some(AudioSource::Media));
            }
            PageEvent::Media(element, kind) => {
                if !self.state.monitor.is_tracked(element) {
                    tracing::trace!(element = %element, event = kind.dom_name(), "[SENSOR] Event for untracked element");
                    return;
                }
                self.element_updated(element);
                self.recompute(Some(AudioSource::Media));
            }
            PageEvent::ContextStateChanged(context) => {
                self.state
                    .interceptor
                    .context_state_changed(&self.backend, context);
                self.recompute(Some(AudioSource::WebAudio));
            }
            PageEvent::SourceEnded(node) => {
                self.state.interceptor.source_ended(node);
                self.recompute(Some(AudioSource::WebAudio));
            }
        }
    }

    /// Refresh an element, then bring its focus chain and duck in line
    fn element_updated(&mut self, element: ElementId) {
        if self.state.monitor.refresh(element, &self.host).is_none() {
            return;
        }
        self.sync_focus(element, false);

        let (ducking, mut targets) = self.split();
        ducking.apply_to_element(element, &mut targets);
    }

    /// Attach or detach the element's focus chain
    ///
    /// With `eager` the element is attached whether or not it is audible
    /// (Focus Mode just turned on or changed style).
    fn sync_focus(&mut self, element: ElementId, eager: bool) {
        if !self.state.focus.is_enabled() {
            return;
        }
        let Some(snapshot) = self.host.snapshot(element) else {
            return;
        };
        let qualifies = self.state.focus.qualifies(&snapshot, &self.config);
        if self.state.focus.is_attached(element) {
            if !qualifies {
                self.state.focus.detach(element, &mut self.backend);
                let (ducking, mut targets) = self.split();
                ducking.apply_to_element(element, &mut targets);
            }
            return;
        }
        if !qualifies || !(eager || snapshot.is_audible()) {
            return;
        }

        let duck_target = self.state.ducking.gain_target();
        let attached =
            self.state
                .focus
                .attach(element, &snapshot, &mut self.backend, &self.config, duck_target);
        if !attached {
            return;
        }
        // The chain's duck gain takes over; hand back the element's own volume
        let saved = self
            .state
            .monitor
            .get_mut(element)
            .and_then(|tracked| tracked.saved_volume.take());
        if let Some(volume) = saved {
            if let Err(err) = self.host.set_volume(element, volume) {
                tracing::warn!(element = %element, error = %err, "[SENSOR] Could not hand back volume");
            }
        }
    }

    /// Borrow the ducking controller next to everything it writes to
    fn split(&mut self) -> (&mut DuckingController, DuckTargets<'_, H, B>) {
        let Self {
            host,
            backend,
            config,
            state,
            ..
        } = self;
        let SensorState {
            monitor,
            interceptor,
            ducking,
            focus,
            ..
        } = state;
        let targets = DuckTargets {
            host,
            backend,
            monitor,
            interceptor,
            focus,
            config,
        };
        (ducking, targets)
    }

    fn recompute(&mut self, hint: Option<AudioSource>) {
        let change = self.state.aggregator.recompute(
            self.state.monitor.audible_count(),
            self.state.interceptor.is_audible(),
            hint,
        );
        let Some(change) = change else {
            return;
        };
        let event = OutboundEvent::from(change);
        match self.sink.send(&event) {
            Ok(()) => {}
            Err(SensorError::NoListener) => {
                tracing::trace!("[SENSOR] No listener for audibility change");
            }
            Err(err) => {
                tracing::debug!(error = %err, "[SENSOR] Dropped audibility change");
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Dispatch a command object; unknown or malformed commands get no ack
    pub fn handle_command(&mut self, command: &Value) -> Option<Ack> {
        match Command::from_value(command, &self.config) {
            Ok(command) => Some(self.dispatch(command)),
            Err(err) => {
                tracing::debug!(error = %err, "[ROUTER] Ignoring command");
                None
            }
        }
    }

    /// Dispatch a command given as JSON text
    pub fn handle_command_json(&mut self, json: &str) -> Option<Ack> {
        match Command::from_json(json, &self.config) {
            Ok(command) => Some(self.dispatch(command)),
            Err(err) => {
                tracing::debug!(error = %err, "[ROUTER] Ignoring command");
                None
            }
        }
    }

    /// Route a parsed command to the ducking controller or focus manager
    pub fn dispatch(&mut self, command: Command) -> Ack {
        tracing::debug!(command = command.kind(), "[ROUTER] Dispatching");
        match command {
            Command::Ping => return Ack::ok(),
            Command::PauseAudio => {
                self.duck(DuckMode::Pause, 1.0);
            }
            Command::ResumeAudio => {
                self.restore(Some(DuckMode::Pause));
            }
            Command::SetVolume { fraction } => {
                self.duck(DuckMode::Volume, fraction);
            }
            Command::RestoreVolume => {
                self.restore(Some(DuckMode::Volume));
            }
            Command::MuteAudio => {
                self.duck(DuckMode::Mute, 1.0);
            }
            Command::UnmuteAudio => {
                self.restore(Some(DuckMode::Mute));
            }
            Command::Duck { mode, fraction } => {
                self.duck(mode, fraction);
            }
            Command::Restore => {
                self.restore(None);
            }
            Command::EnableFocus { style } => {
                self.state.focus.enable(style);
                self.refocus();
            }
            Command::SetFocusStyle { style } => {
                self.state.focus.set_style(style);
                if self.state.focus.is_enabled() {
                    self.refocus();
                }
            }
            Command::DisableFocus => {
                let released = self.state.focus.attached_elements();
                self.state.focus.disable(&mut self.backend);
                // Released elements fall back to volume ducking
                for element in released {
                    self.element_updated(element);
                }
            }
        }
        self.settle();
        Ack::ok()
    }

    fn duck(&mut self, mode: DuckMode, fraction: f32) -> bool {
        let (ducking, mut targets) = self.split();
        ducking.duck(mode, fraction, &mut targets)
    }

    /// Generic restore when `mode` is `None`, mode-matched otherwise
    fn restore(&mut self, mode: Option<DuckMode>) -> bool {
        let (ducking, mut targets) = self.split();
        match mode {
            Some(mode) => ducking.restore_mode(mode, &mut targets),
            None => ducking.restore(&mut targets),
        }
    }

    /// Attach every qualifying element and ramp all chains to the current style
    fn refocus(&mut self) {
        for element in self.state.monitor.ids() {
            self.sync_focus(element, true);
        }
        self.state.focus.restyle(&mut self.backend, &self.config);
    }

    /// Re-read every element after actuation and report any change
    ///
    /// A change is attributed to media when element audibility moved,
    /// otherwise to synthesized audio (suspended or resumed contexts).
    fn settle(&mut self) {
        let before = self.state.monitor.audible_count();
        for element in self.state.monitor.ids() {
            self.element_updated(element);
        }
        let hint = if self.state.monitor.audible_count() != before {
            AudioSource::Media
        } else {
            AudioSource::WebAudio
        };
        self.recompute(Some(hint));
    }

    // ========================================================================
    // Page-facing audio API
    // ========================================================================

    /// Intercepted audio API for the page
    pub fn audio(&mut self) -> PageAudio<'_, H, B, E> {
        PageAudio { sensor: self }
    }
}

impl<H, B, E> AudioSensor<H, B, E>
where
    H: MediaHost + PageEvents,
    B: AudioBackend + PageEvents,
    E: EventSink,
{
    /// Drain queued page events from both adapters
    ///
    /// Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.host.poll_event() {
                Some(event) => event,
                None => match self.backend.poll_event() {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle_page_event(event);
            handled += 1;
        }
        handled
    }
}

/// The page's view of the audio API, with interception in place
pub struct PageAudio<'s, H: MediaHost, B: AudioBackend, E: EventSink> {
    sensor: &'s mut AudioSensor<H, B, E>,
}

impl<H: MediaHost, B: AudioBackend, E: EventSink> PageAudio<'_, H, B, E> {
    /// Construct a context; while volume-ducked it starts attenuated
    pub fn create_context(&mut self) -> Result<ContextId> {
        let sensor = &mut *self.sensor;
        let fraction = sensor.state.ducking.volume_fraction();
        let context = sensor
            .state
            .interceptor
            .create_context(&mut sensor.backend, fraction)?;
        sensor.recompute(Some(AudioSource::WebAudio));
        Ok(context)
    }

    /// Start a generator
    pub fn start(&mut self, node: AudioNodeId) -> Result<()> {
        let sensor = &mut *self.sensor;
        let fraction = sensor.state.ducking.volume_fraction();
        sensor
            .state
            .interceptor
            .start_source(&mut sensor.backend, node, fraction)?;
        sensor.recompute(Some(AudioSource::WebAudio));
        Ok(())
    }

    /// Stop a generator before its natural end
    pub fn stop(&mut self, node: AudioNodeId) -> Result<()> {
        let sensor = &mut *self.sensor;
        sensor
            .state
            .interceptor
            .stop_source(&mut sensor.backend, node)?;
        sensor.recompute(Some(AudioSource::WebAudio));
        Ok(())
    }

    /// Connect two nodes; destination-bound connections pass the master gain
    pub fn connect(&mut self, from: AudioNodeId, to: AudioNodeId) -> Result<()> {
        let sensor = &mut *self.sensor;
        sensor
            .state
            .interceptor
            .connect(&mut sensor.backend, from, to)
    }

    /// Un-intercepted operations (node creation, parameters)
    pub fn raw(&mut self) -> &mut B {
        &mut self.sensor.backend
    }
}
