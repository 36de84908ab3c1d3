//! Element Monitor
//!
//! Discovers playable elements (full scans and inserted subtrees) and keeps
//! a [`TrackedElement`] per element up to date from its media events.

mod element;
mod monitor;

pub use element::TrackedElement;
pub use monitor::ElementMonitor;
