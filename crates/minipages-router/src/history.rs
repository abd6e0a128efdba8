//! Navigation plumbing.
//!
//! The router never touches browser history itself. It registers one callback
//! per route with a [`Navigator`] and asks it to [`go`](Navigator::go)
//! somewhere; the navigator decides which callback fires and hands it a
//! [`NavigationContext`].
//!
//! [`MemoryHistory`] is an in-memory navigator: dispatch is first match wins in
//! registration order, navigations requested while a callback is running are
//! queued until it returns, and a context that was stopped is not saved.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::pattern::{Params, PathPattern, strip_query};

/// Callback invoked by a [`Navigator`] when its pattern matches.
pub type NavigationCallback = Rc<dyn Fn(Rc<NavigationContext>)>;

/// The navigation library capability.
pub trait Navigator {
	/// Call `callback` whenever a navigation matches `pattern`.
	fn register(&self, pattern: PathPattern, callback: NavigationCallback);

	/// Begin dispatching, starting with the current location.
	fn start(&self);

	/// Navigate to `path`, attaching `state` to the new history entry.
	fn go(&self, path: &str, state: Value);
}

/// One navigation event, as seen by route callbacks.
#[derive(Debug)]
pub struct NavigationContext {
	path: String,
	params: Params,
	state: Value,
	stopped: Cell<bool>,
}

impl NavigationContext {
	/// Create a context for `path`.
	pub fn new(path: impl Into<String>, params: Params, state: Value) -> Self {
		Self {
			path: path.into(),
			params,
			state,
			stopped: Cell::new(false),
		}
	}

	/// Full path, including any query string.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Path without query string or fragment.
	pub fn pathname(&self) -> &str {
		strip_query(&self.path)
	}

	/// Query string without the leading `?`, if any.
	pub fn querystring(&self) -> Option<&str> {
		let (_, rest) = self.path.split_once('?')?;
		Some(rest.split('#').next().unwrap_or(rest))
	}

	/// Parameters captured by the matching pattern.
	pub fn params(&self) -> &Params {
		&self.params
	}

	/// State attached by whoever started the navigation.
	pub fn state(&self) -> &Value {
		&self.state
	}

	/// Ask the navigator not to save this navigation to history.
	pub fn stop(&self) {
		self.stopped.set(true);
	}

	/// Whether [`NavigationContext::stop`] was called.
	pub fn is_stopped(&self) -> bool {
		self.stopped.get()
	}
}

/// Contexts are equal when they describe the same navigation, regardless of
/// whether either was stopped.
impl PartialEq for NavigationContext {
	fn eq(&self, other: &Self) -> bool {
		self.path == other.path && self.params == other.params && self.state == other.state
	}
}

/// A saved history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
	/// Path of the entry.
	pub path: String,
	/// State attached to the entry.
	pub state: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Save {
	Push,
	Replace,
	Skip,
}

struct Request {
	path: String,
	state: Value,
	save: Save,
}

/// In-memory [`Navigator`].
pub struct MemoryHistory {
	handlers: RefCell<Vec<(PathPattern, NavigationCallback)>>,
	queue: RefCell<VecDeque<Request>>,
	entries: RefCell<Vec<HistoryEntry>>,
	initial: String,
	started: Cell<bool>,
	dispatching: Cell<bool>,
	dispatched: Cell<usize>,
}

impl MemoryHistory {
	/// Create a history whose current location is `initial_path`.
	pub fn new(initial_path: impl Into<String>) -> Self {
		Self {
			handlers: RefCell::new(Vec::new()),
			queue: RefCell::new(VecDeque::new()),
			entries: RefCell::new(Vec::new()),
			initial: initial_path.into(),
			started: Cell::new(false),
			dispatching: Cell::new(false),
			dispatched: Cell::new(0),
		}
	}

	/// Whether [`Navigator::start`] has been called.
	pub fn is_started(&self) -> bool {
		self.started.get()
	}

	/// Path of the latest saved entry, or the initial path.
	pub fn location(&self) -> String {
		self.entries
			.borrow()
			.last()
			.map(|entry| entry.path.clone())
			.unwrap_or_else(|| self.initial.clone())
	}

	/// Saved entries, oldest first.
	pub fn entries(&self) -> Vec<HistoryEntry> {
		self.entries.borrow().clone()
	}

	/// Number of callbacks invoked so far.
	pub fn dispatch_count(&self) -> usize {
		self.dispatched.get()
	}

	/// Simulate the browser firing `popstate` for `path`: dispatch without
	/// saving a new entry.
	pub fn pop_state(&self, path: &str, state: Value) {
		self.enqueue(Request {
			path: path.to_string(),
			state,
			save: Save::Skip,
		});
	}

	/// Dispatch the current entry again, as a duplicate `popstate` would.
	pub fn replay(&self) {
		let current = self.entries.borrow().last().cloned();
		let entry = current.unwrap_or_else(|| HistoryEntry {
			path: self.initial.clone(),
			state: Value::Null,
		});
		self.pop_state(&entry.path, entry.state);
	}

	fn enqueue(&self, request: Request) {
		self.queue.borrow_mut().push_back(request);
		if self.started.get() && !self.dispatching.get() {
			self.drain();
		}
	}

	fn drain(&self) {
		self.dispatching.set(true);
		let _dispatching = Dispatching(self);
		loop {
			let next = self.queue.borrow_mut().pop_front();
			let Some(request) = next else {
				break;
			};
			self.dispatch(request);
		}
	}

	fn dispatch(&self, request: Request) {
		let matched = {
			let handlers = self.handlers.borrow();
			handlers.iter().find_map(|(pattern, callback)| {
				pattern
					.matches(&request.path)
					.map(|params| (params, callback.clone()))
			})
		};
		let Some((params, callback)) = matched else {
			tracing::debug!(path = %request.path, "no route matches path");
			return;
		};

		let context = Rc::new(NavigationContext::new(
			request.path.clone(),
			params,
			request.state.clone(),
		));
		self.dispatched.set(self.dispatched.get() + 1);
		callback(context.clone());

		if context.is_stopped() {
			return;
		}
		let entry = HistoryEntry {
			path: request.path,
			state: request.state,
		};
		let mut entries = self.entries.borrow_mut();
		match request.save {
			Save::Push => entries.push(entry),
			Save::Replace => {
				entries.pop();
				entries.push(entry);
			}
			Save::Skip => {}
		}
	}
}

/// Clears the dispatching flag when a drain finishes. If a callback panicked,
/// navigations it queued are dropped along with it.
struct Dispatching<'a>(&'a MemoryHistory);

impl Drop for Dispatching<'_> {
	fn drop(&mut self) {
		if std::thread::panicking() {
			let dropped = std::mem::take(&mut *self.0.queue.borrow_mut());
			if !dropped.is_empty() {
				tracing::warn!(count = dropped.len(), "navigation failed, dropping queued navigations");
			}
		}
		self.0.dispatching.set(false);
	}
}

impl Navigator for MemoryHistory {
	fn register(&self, pattern: PathPattern, callback: NavigationCallback) {
		self.handlers.borrow_mut().push((pattern, callback));
	}

	fn start(&self) {
		if self.started.replace(true) {
			return;
		}
		self.queue.borrow_mut().push_front(Request {
			path: self.initial.clone(),
			state: Value::Null,
			save: Save::Replace,
		});
		self.drain();
	}

	fn go(&self, path: &str, state: Value) {
		self.enqueue(Request {
			path: path.to_string(),
			state,
			save: Save::Push,
		});
	}
}

impl std::fmt::Debug for MemoryHistory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryHistory")
			.field("location", &self.location())
			.field("started", &self.started.get())
			.field("routes", &self.handlers.borrow().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn history() -> Rc<MemoryHistory> {
		Rc::new(MemoryHistory::new("/"))
	}

	fn record(history: &MemoryHistory, pattern: &str) -> Rc<RefCell<Vec<String>>> {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink = seen.clone();
		history.register(
			PathPattern::new(pattern).unwrap(),
			Rc::new(move |ctx: Rc<NavigationContext>| sink.borrow_mut().push(ctx.path().to_string())),
		);
		seen
	}

	#[rstest]
	fn test_start_dispatches_initial_location(history: Rc<MemoryHistory>) {
		// Arrange
		let seen = record(&history, "/");

		// Act
		history.start();
		history.start();

		// Assert
		assert_eq!(*seen.borrow(), vec!["/"]);
		assert_eq!(history.entries().len(), 1);
	}

	#[rstest]
	fn test_go_before_start_waits(history: Rc<MemoryHistory>) {
		let seen = record(&history, "*");

		history.go("/about", Value::Null);
		assert!(seen.borrow().is_empty());
		history.start();

		assert_eq!(*seen.borrow(), vec!["/", "/about"]);
		assert_eq!(history.location(), "/about");
	}

	#[rstest]
	fn test_first_registered_match_wins(history: Rc<MemoryHistory>) {
		let specific = record(&history, "/posts/:id");
		let fallback = record(&history, "*");
		history.start();

		history.go("/posts/1", Value::Null);

		assert_eq!(*specific.borrow(), vec!["/posts/1"]);
		assert_eq!(*fallback.borrow(), vec!["/"]);
	}

	#[rstest]
	fn test_stopped_context_is_not_saved(history: Rc<MemoryHistory>) {
		history.register(
			PathPattern::new("*").unwrap(),
			Rc::new(|ctx: Rc<NavigationContext>| {
				if ctx.pathname() == "/secret" {
					ctx.stop();
				}
			}),
		);
		history.start();

		history.go("/secret", Value::Null);

		assert_eq!(history.location(), "/");
		assert_eq!(history.dispatch_count(), 2);
	}

	#[rstest]
	fn test_go_during_dispatch_is_queued(history: Rc<MemoryHistory>) {
		// Arrange
		let order = Rc::new(RefCell::new(Vec::new()));
		let weak = Rc::downgrade(&history);
		let sink = order.clone();
		history.register(
			PathPattern::new("*").unwrap(),
			Rc::new(move |ctx: Rc<NavigationContext>| {
				sink.borrow_mut().push(format!("enter {}", ctx.path()));
				if ctx.path() == "/old" {
					ctx.stop();
					if let Some(history) = weak.upgrade() {
						history.go("/new", json!({"from": "/old"}));
					}
				}
				sink.borrow_mut().push(format!("leave {}", ctx.path()));
			}),
		);
		history.start();

		// Act
		history.go("/old", Value::Null);

		// Assert
		assert_eq!(
			*order.borrow(),
			vec!["enter /", "leave /", "enter /old", "leave /old", "enter /new", "leave /new"]
		);
		assert_eq!(
			history.entries().last(),
			Some(&HistoryEntry {
				path: "/new".to_string(),
				state: json!({"from": "/old"}),
			})
		);
	}

	#[rstest]
	fn test_navigation_after_panicking_callback(history: Rc<MemoryHistory>) {
		// Arrange
		let seen = Rc::new(RefCell::new(Vec::new()));
		let weak = Rc::downgrade(&history);
		let sink = seen.clone();
		history.register(
			PathPattern::new("*").unwrap(),
			Rc::new(move |ctx: Rc<NavigationContext>| {
				if ctx.path() == "/boom" {
					if let Some(history) = weak.upgrade() {
						history.go("/queued", Value::Null);
					}
					panic!("callback failed");
				}
				sink.borrow_mut().push(ctx.path().to_string());
			}),
		);
		history.start();

		// Act
		let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			history.go("/boom", Value::Null);
		}));
		history.go("/about", Value::Null);

		// Assert
		assert!(outcome.is_err());
		assert_eq!(*seen.borrow(), vec!["/", "/about"]);
		assert_eq!(history.location(), "/about");
	}

	#[rstest]
	fn test_replay_dispatches_without_saving(history: Rc<MemoryHistory>) {
		let seen = record(&history, "*");
		history.start();
		history.go("/about", json!({"tab": 1}));

		history.replay();

		assert_eq!(*seen.borrow(), vec!["/", "/about", "/about"]);
		assert_eq!(history.entries().len(), 2);
	}

	#[rstest]
	fn test_context_accessors() {
		let ctx = NavigationContext::new("/search?q=rust#top", Params::new(), Value::Null);

		assert_eq!(ctx.pathname(), "/search");
		assert_eq!(ctx.querystring(), Some("q=rust"));
		assert!(!ctx.is_stopped());
		ctx.stop();
		assert!(ctx.is_stopped());
	}

	#[rstest]
	fn test_context_equality_ignores_stop() {
		let first = NavigationContext::new("/a", Params::new(), json!({"k": 1}));
		let second = NavigationContext::new("/a", Params::new(), json!({"k": 1}));
		second.stop();

		assert_eq!(first, second);
		assert_ne!(first, NavigationContext::new("/a", Params::new(), json!({"k": 2})));
	}
}
