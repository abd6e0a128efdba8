//! Computation
//!
//! A [`Computation`] runs a closure once immediately and again whenever a
//! [`Signal`](crate::Signal) it read during its previous run changes. Each run
//! starts from a clean dependency set, so only values read by the latest run
//! are tracked.
//!
//! The returned handle is the only way to cancel the work: [`Computation::stop`]
//! detaches it from the dependency graph, and a stopped computation never runs
//! again. Dropping the handle stops it as well.
//!
//! ```ignore
//! use minipages_reactive::{Computation, Signal, flush};
//!
//! let signed_in = Signal::new(false);
//! let watcher = {
//!     let signed_in = signed_in.clone();
//!     Computation::new(move || println!("signed in: {}", signed_in.get()))
//! };
//!
//! signed_in.set(true);
//! flush(); // prints "signed in: true"
//! watcher.stop();
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::runtime::{NodeId, try_with_runtime, with_runtime};

type ComputationFn = Rc<RefCell<Box<dyn FnMut() + 'static>>>;

struct Registered {
	run: ComputationFn,
	stopped: Rc<Cell<bool>>,
}

thread_local! {
	static COMPUTATIONS: RefCell<BTreeMap<NodeId, Registered>> = const { RefCell::new(BTreeMap::new()) };
}

/// Handle to a re-runnable unit of reactive work.
#[derive(Debug)]
pub struct Computation {
	id: NodeId,
	stopped: Rc<Cell<bool>>,
}

impl Computation {
	/// Register `f` and run it for the first time.
	pub fn new<F>(f: F) -> Self
	where
		F: FnMut() + 'static,
	{
		let computation = Self::deferred(f);
		computation.run();
		computation
	}

	/// Register `f` without running it. Nothing is tracked until
	/// [`Computation::run`] is called.
	///
	/// Useful when the handle must be stored somewhere before the first run
	/// can observe it.
	pub fn deferred<F>(f: F) -> Self
	where
		F: FnMut() + 'static,
	{
		let id = NodeId::new();
		let stopped = Rc::new(Cell::new(false));
		COMPUTATIONS.with(|map| {
			map.borrow_mut().insert(
				id,
				Registered {
					run: Rc::new(RefCell::new(Box::new(f))),
					stopped: stopped.clone(),
				},
			);
		});
		Self { id, stopped }
	}

	/// Run now, re-tracking dependencies. Does nothing once stopped.
	pub fn run(&self) {
		if !self.is_stopped() {
			execute_computation(self.id);
		}
	}

	/// Node identifier in the dependency graph.
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Whether [`Computation::stop`] has been called.
	pub fn is_stopped(&self) -> bool {
		self.stopped.get()
	}

	/// Queue a re-run as if one of the computation's dependencies changed.
	pub fn invalidate(&self) {
		if self.is_stopped() {
			return;
		}
		with_runtime(|rt| rt.schedule_update(self.id));
	}

	/// Detach the computation. Calling this more than once is harmless.
	///
	/// A run already in progress finishes, but nothing it reads is tracked
	/// afterwards and it is never scheduled again.
	pub fn stop(&self) {
		if self.stopped.replace(true) {
			return;
		}
		unregister(self.id);
		let _ = try_with_runtime(|rt| rt.remove_node(self.id));
		tracing::trace!(node = ?self.id, "computation stopped");
	}
}

impl Drop for Computation {
	fn drop(&mut self) {
		if self.stopped.get() {
			return;
		}
		self.stopped.set(true);
		unregister(self.id);
		let _ = try_with_runtime(|rt| rt.remove_node(self.id));
	}
}

/// Remove the stored closure. It is dropped after the map borrow ends, since
/// its captures may own other computations.
fn unregister(id: NodeId) {
	let removed = COMPUTATIONS
		.try_with(|map| map.try_borrow_mut().ok().and_then(|mut map| map.remove(&id)))
		.ok()
		.flatten();
	drop(removed);
}

/// Run the computation registered under `id`, tracking what it reads.
pub(crate) fn execute_computation(id: NodeId) {
	let Some((run, stopped)) = COMPUTATIONS.with(|map| {
		map.borrow()
			.get(&id)
			.map(|entry| (entry.run.clone(), entry.stopped.clone()))
	}) else {
		return;
	};
	if stopped.get() {
		return;
	}

	let Ok(mut body) = run.try_borrow_mut() else {
		// already on the stack; run again once the current pass returns
		with_runtime(|rt| rt.schedule_update(id));
		return;
	};

	with_runtime(|rt| {
		rt.clear_dependencies(id);
		rt.push_observer(id);
	});
	let _observing = Observing { id, stopped };
	(&mut **body)();
}

/// Pops the running computation off the observer stack when its body returns
/// or panics.
struct Observing {
	id: NodeId,
	stopped: Rc<Cell<bool>>,
}

impl Drop for Observing {
	fn drop(&mut self) {
		let _ = try_with_runtime(|rt| {
			rt.pop_observer();
			if self.stopped.get() {
				// stopped by its own body: drop what this run tracked
				rt.remove_node(self.id);
			}
		});
	}
}
