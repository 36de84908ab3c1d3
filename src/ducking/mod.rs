//! Ducking Controller
//!
//! `Idle` ⇄ `Ducked(mode)` state machine that attenuates every tracked
//! element and intercepted graph, and undoes exactly what it applied.

mod controller;
mod state;

pub use controller::{DuckTargets, DuckingController};
pub use state::{clamp_fraction, intensity_to_fraction, DuckMode, DuckPhase, DuckState};
