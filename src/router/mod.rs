//! Command Router
//!
//! Wire types on both sides of the sensor: inbound [`Command`]s with their
//! [`Ack`], and the outbound [`OutboundEvent`]. Dispatch itself lives in
//! [`crate::sensor::AudioSensor::handle_command`].

mod command;
mod event;

pub use command::Command;
pub use event::{Ack, OutboundEvent};
