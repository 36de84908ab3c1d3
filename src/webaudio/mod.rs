//! Audio-Graph Interceptor
//!
//! Observes synthesized audio (contexts and their generators) without
//! altering the page's routing beyond one master gain per context.

mod graph;
mod interceptor;

pub use graph::AudioGraphInfo;
pub use interceptor::Interceptor;
