//! Focus Mode
//!
//! Optional tonal re-coloration of media elements: a tone filter, a
//! convolution reverb blended wet/dry, an output gain and a duck gain that
//! the ducking controller drives.

mod engine;
mod impulse;
mod manager;
mod style;

pub use engine::{FocusChain, FocusEngine};
pub use impulse::{ImpulseGenerator, ImpulseResponse};
pub use manager::FocusManager;
pub use style::{FocusStyle, StyleParams, ToneFilter};
