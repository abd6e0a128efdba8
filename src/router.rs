//! Page routing.
//!
//! This module re-exports `minipages-router`: the [`Router`], route
//! registration types, the [`MemoryHistory`] navigator and the in-memory
//! [`Templates`] engine.

pub use minipages_router::*;
