//! In-memory page simulation
//!
//! Deterministic implementations of the adapter traits in [`crate::host`].
//! They back every test in the crate and double as the reference for what a
//! browser binding has to provide.

mod audio;
mod document;
mod sink;

pub use audio::{SimAudio, SimFault, SIM_SAMPLE_RATE};
pub use document::{SimDocument, DEFAULT_DURATION_SECS};
pub use sink::{DisconnectedSink, RecordingSink};
