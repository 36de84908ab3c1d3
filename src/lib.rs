//! duckit - In-tab audio sensing and actuation
//!
//! One [`AudioSensor`] runs per browser tab. It answers two questions:
//! 1. Is this tab producing audible sound right now? (reported on change only)
//! 2. On command, attenuate or re-color the tab's audio without breaking
//!    whatever the page itself does with audio.
//!
//! # Architecture
//!
//! Components, leaves first:
//! - [`media`]: Element Monitor, tracks every audio/video element
//! - [`webaudio`]: Audio-Graph Interceptor, tracks contexts and generators
//! - [`aggregator`]: folds both into one audibility boolean
//! - [`ducking`]: mute / pause / volume attenuation state machine
//! - [`focus`]: per-element filter + reverb chains ("Focus Mode")
//! - [`router`] and [`sensor`]: command dispatch and event forwarding
//!
//! The page is reached only through the adapter traits in [`host`];
//! [`sim`] implements them in memory.

pub mod aggregator;
pub mod config;
pub mod ducking;
pub mod error;
pub mod focus;
pub mod host;
pub mod media;
pub mod router;
pub mod sensor;
pub mod sim;
pub mod webaudio;

pub use aggregator::{AudibilityChange, AudioSource};
pub use config::SensorConfig;
pub use ducking::DuckMode;
pub use error::{Result, SensorError};
pub use focus::FocusStyle;
pub use host::{AudioBackend, EventSink, MediaHost, PageEvent, PageEvents};
pub use router::{Ack, Command, OutboundEvent};
pub use sensor::{AudioSensor, PageAudio, SensorState};
