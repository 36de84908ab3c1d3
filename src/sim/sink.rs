//! Outbound transports for tests

use crate::error::{Result, SensorError};
use crate::host::EventSink;
use crate::router::OutboundEvent;

/// Records every event it is handed
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<OutboundEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[OutboundEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&OutboundEvent> {
        self.events.last()
    }

    /// Take the recorded events, leaving the sink empty
    pub fn drain(&mut self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for RecordingSink {
    fn send(&mut self, event: &OutboundEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// A transport with nobody listening on the other end
#[derive(Debug, Default)]
pub struct DisconnectedSink {
    attempts: usize,
}

impl DisconnectedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl EventSink for DisconnectedSink {
    fn send(&mut self, _event: &OutboundEvent) -> Result<()> {
        self.attempts += 1;
        Err(SensorError::NoListener)
    }
}
