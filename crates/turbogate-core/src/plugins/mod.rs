//! Plugin system
//!
//! - [`core`]: the [`Plugin`] and [`ObservabilityPlugin`] traits and hook outcomes
//! - [`registry`]: ordered, named plugin collection with lifecycle status

pub mod core;
pub mod registry;

pub use self::core::{ChunkOutcome, ObservabilityPlugin, Plugin, PostHookOutcome, PreHookOutcome};
pub use registry::{PluginEntry, PluginRegistry, PluginSnapshot};
