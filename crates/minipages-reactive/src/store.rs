//! Keyed reactive store
//!
//! [`ReactiveStore`] maps string keys to JSON values, each backed by its own
//! [`Signal`]. Reading a key inside a computation subscribes to that key only.
//! `Value::Null` doubles as "unset".

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::signal::Signal;

/// A shared map of reactive values.
///
/// Clones share the same entries.
#[derive(Clone, Default)]
pub struct ReactiveStore {
	entries: Rc<RefCell<HashMap<String, Signal<Value>>>>,
}

impl ReactiveStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	fn signal(&self, key: &str) -> Signal<Value> {
		self.entries
			.borrow_mut()
			.entry(key.to_string())
			.or_insert_with(|| Signal::new(Value::Null))
			.clone()
	}

	/// Read `key`, subscribing the current computation to it.
	///
	/// Unknown keys read as `Value::Null`.
	pub fn get(&self, key: &str) -> Value {
		self.signal(key).get()
	}

	/// Read `key` without subscribing.
	pub fn get_untracked(&self, key: &str) -> Value {
		self.entries
			.borrow()
			.get(key)
			.map(Signal::get_untracked)
			.unwrap_or(Value::Null)
	}

	/// Store `value` under `key`.
	///
	/// Dependents are invalidated only when the stored value changes.
	/// Returns whether it changed.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
		self.signal(key).set_if_changed(value.into())
	}

	/// Tracked equality test against the value stored under `key`.
	pub fn equals(&self, key: &str, expected: &Value) -> bool {
		self.signal(key).with(|current| current == expected)
	}

	/// Reset every key to `Value::Null`.
	pub fn clear(&self) {
		let signals: Vec<_> = self.entries.borrow().values().cloned().collect();
		for signal in signals {
			signal.set_if_changed(Value::Null);
		}
	}

	/// Keys currently holding a non-null value, sorted.
	pub fn keys(&self) -> Vec<String> {
		let mut keys: Vec<_> = self
			.entries
			.borrow()
			.iter()
			.filter(|(_, signal)| signal.with_untracked(|value| !value.is_null()))
			.map(|(key, _)| key.clone())
			.collect();
		keys.sort();
		keys
	}
}

impl std::fmt::Debug for ReactiveStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReactiveStore")
			.field("keys", &self.keys())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::computation::Computation;
	use crate::runtime::flush;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::cell::Cell;

	#[fixture]
	fn store() -> ReactiveStore {
		ReactiveStore::new()
	}

	fn watch(store: &ReactiveStore, key: &'static str) -> (Computation, Rc<Cell<usize>>) {
		let runs = Rc::new(Cell::new(0));
		let computation = {
			let store = store.clone();
			let runs = runs.clone();
			Computation::new(move || {
				store.get(key);
				runs.set(runs.get() + 1);
			})
		};
		(computation, runs)
	}

	#[rstest]
	fn test_unknown_key_reads_null(store: ReactiveStore) {
		assert_eq!(store.get("missing"), Value::Null);
		assert_eq!(store.get_untracked("missing"), Value::Null);
	}

	#[rstest]
	fn test_set_notifies_only_on_change(store: ReactiveStore) {
		// Arrange
		let (_computation, runs) = watch(&store, "page");

		// Act
		assert!(store.set("page", "home"));
		flush();
		assert!(!store.set("page", "home"));
		flush();

		// Assert
		assert_eq!(runs.get(), 2);
		assert_eq!(store.get_untracked("page"), json!("home"));
	}

	#[rstest]
	fn test_subscription_is_per_key(store: ReactiveStore) {
		let (_computation, runs) = watch(&store, "page");

		store.set("other", 1);
		flush();

		assert_eq!(runs.get(), 1);
	}

	#[rstest]
	fn test_equals_is_tracked(store: ReactiveStore) {
		// Arrange
		store.set("nav", "home");
		let results = Rc::new(RefCell::new(Vec::new()));
		let _computation = {
			let store = store.clone();
			let results = results.clone();
			Computation::new(move || {
				results.borrow_mut().push(store.equals("nav", &json!("about")));
			})
		};

		// Act
		store.set("nav", "about");
		flush();

		// Assert
		assert_eq!(*results.borrow(), vec![false, true]);
	}

	#[rstest]
	fn test_clear_resets_keys(store: ReactiveStore) {
		store.set("layout", "layout");
		store.set("template", "home");
		assert_eq!(store.keys(), vec!["layout", "template"]);

		store.clear();

		assert!(store.keys().is_empty());
		assert_eq!(store.get_untracked("template"), Value::Null);
	}
}
