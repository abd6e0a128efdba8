//! # minipages-reactive
//!
//! The reactive layer the router is built on:
//!
//! - [`Signal`]: a value cell that records who reads it
//! - [`Computation`]: work that re-runs when the signals it read change, with an
//!   explicit [`Computation::stop`] handle
//! - [`ReactiveStore`]: a keyed map of JSON values, one signal per key
//!
//! Everything is single-threaded. Invalidated computations are queued and run
//! on [`flush`], or by the scheduler installed with [`set_scheduler`].

pub mod computation;
pub mod runtime;
pub mod signal;
pub mod store;

pub use computation::Computation;
pub use runtime::{NodeId, Runtime, flush, set_scheduler, untrack, with_runtime};
pub use signal::Signal;
pub use store::ReactiveStore;
