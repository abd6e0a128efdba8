//! Reactive primitives the router is built on.
//!
//! This module re-exports `minipages-reactive`.
//!
//! ```rust,ignore
//! use minipages::reactive::{Computation, Signal, flush};
//!
//! let signed_in = Signal::new(false);
//! let _watch = {
//!     let signed_in = signed_in.clone();
//!     Computation::new(move || println!("signed in: {}", signed_in.get()))
//! };
//! signed_in.set(true);
//! flush();
//! ```

pub use minipages_reactive::*;
