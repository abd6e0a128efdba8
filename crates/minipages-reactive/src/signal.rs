//! Signal
//!
//! `Signal<T>` holds one value and records a dependency whenever it is read
//! inside a running [`Computation`](crate::Computation). Writing the signal
//! invalidates every computation that read it.
//!
//! ```ignore
//! use minipages_reactive::Signal;
//!
//! let title = Signal::new(String::from("home"));
//! title.set(String::from("about"));
//! assert_eq!(title.get(), "about");
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::{NodeId, try_with_runtime, with_runtime};

/// A reactive cell.
///
/// Clones share the same value and the same node in the dependency graph.
#[derive(Clone)]
pub struct Signal<T: 'static> {
	id: NodeId,
	value: Rc<RefCell<T>>,
}

impl<T: 'static> Signal<T> {
	/// Create a signal holding `value`.
	pub fn new(value: T) -> Self {
		Self {
			id: NodeId::new(),
			value: Rc::new(RefCell::new(value)),
		}
	}

	/// Read the value and register the current computation as a dependent.
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.track();
		self.get_untracked()
	}

	/// Read the value without registering a dependency.
	pub fn get_untracked(&self) -> T
	where
		T: Clone,
	{
		self.value.borrow().clone()
	}

	/// Borrow the value, registering a dependency, and map it through `f`.
	pub fn with<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&T) -> R,
	{
		self.track();
		f(&self.value.borrow())
	}

	/// Borrow the value without registering a dependency.
	pub fn with_untracked<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&T) -> R,
	{
		f(&self.value.borrow())
	}

	/// Replace the value and invalidate dependents.
	pub fn set(&self, value: T) {
		*self.value.borrow_mut() = value;
		self.notify();
	}

	/// Replace the value only if it differs from the current one.
	///
	/// Returns `true` when dependents were invalidated.
	pub fn set_if_changed(&self, value: T) -> bool
	where
		T: PartialEq,
	{
		if *self.value.borrow() == value {
			return false;
		}
		self.set(value);
		true
	}

	/// Mutate the value in place and invalidate dependents.
	pub fn update<F>(&self, f: F)
	where
		F: FnOnce(&mut T),
	{
		f(&mut *self.value.borrow_mut());
		self.notify();
	}

	/// Node identifier in the dependency graph.
	pub fn id(&self) -> NodeId {
		self.id
	}

	fn track(&self) {
		with_runtime(|rt| rt.track_dependency(self.id));
	}

	fn notify(&self) {
		with_runtime(|rt| rt.notify_signal_change(self.id));
	}
}

impl<T: 'static> Drop for Signal<T> {
	fn drop(&mut self) {
		// last clone owns the graph entry
		if Rc::strong_count(&self.value) == 1 {
			let _ = try_with_runtime(|rt| rt.remove_node(self.id));
		}
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("id", &self.id)
			.field("value", &*self.value.borrow())
			.finish()
	}
}
