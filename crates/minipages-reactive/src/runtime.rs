//! Reactive Runtime
//!
//! This module provides the dependency graph that links [`Signal`](crate::Signal)s
//! to the [`Computation`](crate::Computation)s that read them, plus the queue of
//! invalidated computations waiting to be re-run.
//!
//! ## Architecture
//!
//! 1. **Observer Stack**: Tracks the currently executing computation
//! 2. **Dependency Tracking**: `Signal::get()` records an edge to the current observer
//! 3. **Invalidation**: `Signal::set()` queues every subscriber for a re-run
//! 4. **Flush**: Queued computations re-run when [`flush`] is called, or when the
//!    installed scheduler decides to flush
//!
//! Re-runs never happen synchronously inside `Signal::set()`. A computation that
//! writes a signal it also reads is simply queued again.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upper bound on flush rounds before the runtime gives up on a cycle.
const MAX_FLUSH_ROUNDS: usize = 1000;

/// Unique identifier for reactive nodes (signals and computations)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Create a new unique NodeId
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

/// Dependency graph node
#[derive(Debug, Default)]
pub(crate) struct DependencyNode {
	/// IDs of nodes that depend on this node
	pub(crate) subscribers: Vec<NodeId>,
	/// IDs of nodes this node depends on
	pub(crate) dependencies: Vec<NodeId>,
}

/// Type for the flush scheduler hook
type SchedulerFn = Box<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

/// Global scheduler function
static SCHEDULER: OnceLock<SchedulerFn> = OnceLock::new();

/// Set the global scheduler used to flush invalidated computations.
///
/// Call this once at application startup. In a browser this would typically
/// queue a micro-task. Without a scheduler, invalidated computations wait
/// until [`flush`] is called explicitly, which is what tests do.
///
/// # Example
///
/// ```ignore
/// minipages_reactive::set_scheduler(|task| {
///     wasm_bindgen_futures::spawn_local(async move { task() });
/// });
/// ```
pub fn set_scheduler<F>(scheduler: F)
where
	F: Fn(Box<dyn FnOnce() + Send>) + Send + Sync + 'static,
{
	let _ = SCHEDULER.set(Box::new(scheduler));
}

/// Per-thread reactive runtime
///
/// Holds the dependency graph and the invalidation queue. A UI event loop runs
/// on a single thread, so the thread-local instance is effectively global.
pub struct Runtime {
	/// Observer stack for tracking the currently executing computation
	observer_stack: RefCell<Vec<NodeId>>,
	/// Dependency graph: NodeId -> DependencyNode
	pub(crate) dependency_graph: RefCell<BTreeMap<NodeId, DependencyNode>>,
	/// Computations waiting to be re-run
	pub(crate) pending_updates: RefCell<Vec<NodeId>>,
	/// Whether a flush has been handed to the scheduler
	update_scheduled: Cell<bool>,
	/// Whether a flush is in progress
	flushing: Cell<bool>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new() -> Self {
		Self {
			observer_stack: RefCell::new(Vec::new()),
			dependency_graph: RefCell::new(BTreeMap::new()),
			pending_updates: RefCell::new(Vec::new()),
			update_scheduled: Cell::new(false),
			flushing: Cell::new(false),
		}
	}

	/// Get the currently executing computation, if any
	pub fn current_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow().last().copied()
	}

	/// Push an observer onto the stack
	pub fn push_observer(&self, id: NodeId) {
		self.observer_stack.borrow_mut().push(id);
	}

	/// Pop an observer from the stack
	pub fn pop_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow_mut().pop()
	}

	/// Temporarily empty the observer stack, returning the saved stack.
	pub(crate) fn suspend_observers(&self) -> Vec<NodeId> {
		std::mem::take(&mut *self.observer_stack.borrow_mut())
	}

	/// Restore a stack saved by [`Runtime::suspend_observers`].
	pub(crate) fn resume_observers(&self, saved: Vec<NodeId>) {
		*self.observer_stack.borrow_mut() = saved;
	}

	/// Record that the current observer read `signal_id`
	pub fn track_dependency(&self, signal_id: NodeId) {
		let Some(observer_id) = self.current_observer() else {
			return;
		};
		let mut graph = self.dependency_graph.borrow_mut();

		let signal_node = graph.entry(signal_id).or_default();
		if !signal_node.subscribers.contains(&observer_id) {
			signal_node.subscribers.push(observer_id);
		}

		let observer_node = graph.entry(observer_id).or_default();
		if !observer_node.dependencies.contains(&signal_id) {
			observer_node.dependencies.push(signal_id);
		}
	}

	/// Queue every subscriber of `signal_id` for a re-run
	pub fn notify_signal_change(&self, signal_id: NodeId) {
		let subscribers = self
			.dependency_graph
			.borrow()
			.get(&signal_id)
			.map(|node| node.subscribers.clone())
			.unwrap_or_default();

		for subscriber in subscribers {
			self.schedule_update(subscriber);
		}
	}

	/// Queue a computation for a re-run
	pub fn schedule_update(&self, node_id: NodeId) {
		{
			let mut pending = self.pending_updates.borrow_mut();
			if pending.contains(&node_id) {
				return;
			}
			pending.push(node_id);
		}
		tracing::trace!(node = ?node_id, "computation invalidated");

		if !self.update_scheduled.get() {
			if let Some(scheduler) = SCHEDULER.get() {
				self.update_scheduled.set(true);
				scheduler(Box::new(|| {
					RUNTIME.with(|rt| rt.flush());
				}));
			}
		}
	}

	/// Re-run queued computations until the queue is empty.
	///
	/// Nested calls (a computation calling `flush()` while it runs) are ignored;
	/// the outer flush picks up anything queued in the meantime.
	pub fn flush(&self) {
		if self.flushing.replace(true) {
			return;
		}
		let mut guard = FlushGuard {
			runtime: self,
			batch: VecDeque::new(),
		};
		self.update_scheduled.set(false);

		let mut rounds = 0;
		loop {
			guard.batch = std::mem::take(&mut *self.pending_updates.borrow_mut()).into();
			if guard.batch.is_empty() {
				break;
			}
			rounds += 1;
			if rounds > MAX_FLUSH_ROUNDS {
				tracing::warn!(
					rounds,
					"reactive flush did not settle, dropping remaining invalidations"
				);
				guard.batch.clear();
				break;
			}
			tracing::trace!(count = guard.batch.len(), "flushing computations");
			while let Some(node_id) = guard.batch.pop_front() {
				crate::computation::execute_computation(node_id);
			}
		}
	}

	/// Whether any computation is waiting to be re-run
	pub fn has_pending_updates(&self) -> bool {
		!self.pending_updates.borrow().is_empty()
	}

	/// Clear the dependencies of a node before it re-runs
	pub fn clear_dependencies(&self, node_id: NodeId) {
		let mut graph = self.dependency_graph.borrow_mut();

		let dependencies = match graph.get_mut(&node_id) {
			Some(node) => std::mem::take(&mut node.dependencies),
			None => return,
		};

		for dep_id in dependencies {
			if let Some(dep_node) = graph.get_mut(&dep_id) {
				dep_node.subscribers.retain(|&id| id != node_id);
			}
		}
	}

	/// Remove a node from the dependency graph and the queue
	pub fn remove_node(&self, node_id: NodeId) {
		self.clear_dependencies(node_id);
		self.dependency_graph.borrow_mut().remove(&node_id);
		self.pending_updates.borrow_mut().retain(|&id| id != node_id);
	}

	/// Check if a node exists in the dependency graph
	pub fn has_node(&self, node_id: NodeId) -> bool {
		self.dependency_graph.borrow().contains_key(&node_id)
	}

	/// Get the number of subscribers for a node
	pub fn subscriber_count(&self, node_id: NodeId) -> usize {
		self.dependency_graph
			.borrow()
			.get(&node_id)
			.map(|node| node.subscribers.len())
			.unwrap_or(0)
	}
}

/// Ends a flush, even one unwinding out of a panicking computation. Whatever
/// the interrupted round had not run yet goes back to the front of the queue.
struct FlushGuard<'a> {
	runtime: &'a Runtime,
	batch: VecDeque<NodeId>,
}

impl Drop for FlushGuard<'_> {
	fn drop(&mut self) {
		if !self.batch.is_empty() {
			let mut pending = self.runtime.pending_updates.borrow_mut();
			let rest: Vec<NodeId> = self
				.batch
				.drain(..)
				.filter(|id| !pending.contains(id))
				.collect();
			pending.splice(0..0, rest);
		}
		self.runtime.flushing.set(false);
		self.runtime.update_scheduled.set(false);
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` with the thread's runtime
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub(crate) fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// Re-run every invalidated computation on this thread.
pub fn flush() {
	with_runtime(|rt| rt.flush());
}

/// Run `f` without recording any dependency for the current computation.
pub fn untrack<F, R>(f: F) -> R
where
	F: FnOnce() -> R,
{
	struct Resume(Option<Vec<NodeId>>);

	impl Drop for Resume {
		fn drop(&mut self) {
			if let Some(saved) = self.0.take() {
				let _ = try_with_runtime(|rt| rt.resume_observers(saved));
			}
		}
	}

	let _resume = Resume(Some(with_runtime(|rt| rt.suspend_observers())));
	f()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_node_id_uniqueness() {
		let id1 = NodeId::new();
		let id2 = NodeId::new();
		let id3 = NodeId::new();

		assert_ne!(id1, id2);
		assert_ne!(id2, id3);
		assert_ne!(id1, id3);
	}

	#[rstest]
	fn test_runtime_observer_stack() {
		let runtime = Runtime::new();
		assert!(runtime.current_observer().is_none());

		let id1 = NodeId::new();
		runtime.push_observer(id1);
		assert_eq!(runtime.current_observer(), Some(id1));

		let id2 = NodeId::new();
		runtime.push_observer(id2);
		assert_eq!(runtime.current_observer(), Some(id2));

		runtime.pop_observer();
		assert_eq!(runtime.current_observer(), Some(id1));

		runtime.pop_observer();
		assert!(runtime.current_observer().is_none());
	}

	#[rstest]
	fn test_track_without_observer_is_noop() {
		let runtime = Runtime::new();
		let signal_id = NodeId::new();

		runtime.track_dependency(signal_id);

		assert!(!runtime.has_node(signal_id));
	}

	#[rstest]
	fn test_track_and_clear_dependencies() {
		// Arrange
		let runtime = Runtime::new();
		let signal_id = NodeId::new();
		let observer_id = NodeId::new();

		// Act
		runtime.push_observer(observer_id);
		runtime.track_dependency(signal_id);
		runtime.track_dependency(signal_id);
		runtime.pop_observer();

		// Assert
		assert_eq!(runtime.subscriber_count(signal_id), 1);
		runtime.clear_dependencies(observer_id);
		assert_eq!(runtime.subscriber_count(signal_id), 0);
	}

	#[rstest]
	fn test_notify_queues_subscribers_once() {
		let runtime = Runtime::new();
		let signal_id = NodeId::new();
		let observer_id = NodeId::new();

		runtime.push_observer(observer_id);
		runtime.track_dependency(signal_id);
		runtime.pop_observer();

		runtime.notify_signal_change(signal_id);
		runtime.notify_signal_change(signal_id);

		assert_eq!(*runtime.pending_updates.borrow(), vec![observer_id]);
	}

	#[rstest]
	fn test_remove_node_drops_pending_update() {
		let runtime = Runtime::new();
		let node_id = NodeId::new();

		runtime.schedule_update(node_id);
		assert!(runtime.has_pending_updates());

		runtime.remove_node(node_id);
		assert!(!runtime.has_pending_updates());
	}

	#[rstest]
	fn test_untrack_hides_current_observer() {
		let observer_id = NodeId::new();
		with_runtime(|rt| rt.push_observer(observer_id));

		let inside = untrack(|| with_runtime(|rt| rt.current_observer()));
		let after = with_runtime(|rt| rt.pop_observer());

		assert_eq!(inside, None);
		assert_eq!(after, Some(observer_id));
	}

	#[rstest]
	fn test_untrack_restores_observers_after_panic() {
		let observer_id = NodeId::new();
		with_runtime(|rt| rt.push_observer(observer_id));

		let outcome = std::panic::catch_unwind(|| untrack::<_, usize>(|| panic!("untracked read failed")));
		let after = with_runtime(|rt| rt.pop_observer());

		assert!(outcome.is_err());
		assert_eq!(after, Some(observer_id));
	}
}
