//! Helpers exposed to templates and program code.
//!
//! [`PathHelpers`] holds one `<name>Path` accessor per named route, for
//! building URLs without running any guard. [`RouterHelpers`] gives the view
//! layer reactive access to what the router committed.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::error::MissingTemplateError;
use crate::route::Route;
use crate::router::{LAYOUT_KEY, NAV_KEY, PATH_KEY, RouterShared, TEMPLATE_KEY};

/// Registry of generated `<name>Path` accessors.
#[derive(Debug, Clone, Default)]
pub struct PathHelpers {
	helpers: Rc<RefCell<BTreeMap<String, Rc<Route>>>>,
}

impl PathHelpers {
	/// Helper name generated for route `name`.
	pub fn helper_name(name: &str) -> String {
		format!("{name}Path")
	}

	/// Add the accessor for `route`, returning its name. Unnamed routes get
	/// no accessor.
	pub(crate) fn insert(&self, route: &Rc<Route>) -> Option<String> {
		let helper = Self::helper_name(route.name()?);
		self.helpers
			.borrow_mut()
			.insert(helper.clone(), route.clone());
		Some(helper)
	}

	/// Route behind `helper`.
	pub fn get(&self, helper: &str) -> Option<Rc<Route>> {
		self.helpers.borrow().get(helper).cloned()
	}

	/// Call `helper` with `context`, or `None` if no such helper exists.
	pub fn call(&self, helper: &str, context: &Value) -> Option<String> {
		self.get(helper).map(|route| route.path_for_context(context))
	}

	/// Helper names, sorted.
	pub fn names(&self) -> Vec<String> {
		self.helpers.borrow().keys().cloned().collect()
	}
}

/// Reactive template helpers.
///
/// Every accessor subscribes the current computation to the value it reads.
/// Once the router is gone, accessors behave as if nothing was committed.
#[derive(Clone)]
pub struct RouterHelpers {
	router: Weak<RouterShared>,
}

impl RouterHelpers {
	pub(crate) fn new(router: Weak<RouterShared>) -> Self {
		Self { router }
	}

	fn current(&self, key: &str) -> Option<String> {
		self.router.upgrade()?.current(key)
	}

	fn current_is(&self, key: &str, name: &str) -> bool {
		self.router
			.upgrade()
			.is_some_and(|shared| shared.current_equals(key, name))
	}

	/// Committed template.
	pub fn current_template(&self) -> Option<String> {
		self.current(TEMPLATE_KEY)
	}

	/// Whether the committed template is `name`.
	pub fn current_template_is(&self, name: &str) -> bool {
		self.current_is(TEMPLATE_KEY, name)
	}

	/// Committed nav key.
	pub fn current_nav(&self) -> Option<String> {
		self.current(NAV_KEY)
	}

	/// Whether the committed nav key is `name`; handy for highlighting the
	/// active nav bar entry.
	pub fn current_nav_is(&self, name: &str) -> bool {
		self.current_is(NAV_KEY, name)
	}

	/// Committed layout.
	pub fn current_layout(&self) -> Option<String> {
		self.current(LAYOUT_KEY)
	}

	/// Whether the committed layout is `name`.
	pub fn current_layout_is(&self, name: &str) -> bool {
		self.current_is(LAYOUT_KEY, name)
	}

	/// Current path.
	pub fn current_path(&self) -> Option<String> {
		self.current(PATH_KEY)
	}

	/// Render the whole page: the committed layout around the committed
	/// template, or the template alone when no layout is committed.
	///
	/// # Errors
	///
	/// [`MissingTemplateError`] when the template or layout is not defined.
	pub fn render_page(&self) -> Result<String, MissingTemplateError> {
		match self.router.upgrade() {
			Some(shared) => shared.render_page(),
			None => Ok(String::new()),
		}
	}

	/// Committed page data under `key`, `Value::Null` when absent.
	pub fn page(&self, key: &str) -> Value {
		self.router
			.upgrade()
			.map(|shared| shared.page_data(key))
			.unwrap_or(Value::Null)
	}

	/// Call the path helper `helper`.
	pub fn path(&self, helper: &str, context: &Value) -> Option<String> {
		self.router.upgrade()?.path_helper(helper, context)
	}
}

impl std::fmt::Debug for RouterHelpers {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouterHelpers")
			.field("attached", &(self.router.strong_count() > 0))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::RouteDefaults;
	use crate::template::Templates;
	use rstest::rstest;
	use serde_json::json;

	fn named(pattern: &str, name: &str) -> Rc<Route> {
		let templates = Templates::new().with_static("page", "");
		let options = crate::route::RouteOptions::new().to("page").named(name);
		Rc::new(Route::new(pattern, options.into(), &RouteDefaults::default(), &templates).unwrap())
	}

	#[rstest]
	fn test_helper_names_and_calls() {
		// Arrange
		let helpers = PathHelpers::default();

		// Act
		let first = helpers.insert(&named("/posts/:_id", "postShow"));
		let second = helpers.insert(&named("/", "home"));

		// Assert
		assert_eq!(first.as_deref(), Some("postShowPath"));
		assert_eq!(second.as_deref(), Some("homePath"));
		assert_eq!(helpers.names(), vec!["homePath", "postShowPath"]);
		assert_eq!(helpers.call("postShowPath", &json!({"_id": 9})).as_deref(), Some("/posts/9"));
		assert_eq!(helpers.call("homePath", &Value::Null).as_deref(), Some("/"));
		assert_eq!(helpers.call("missingPath", &Value::Null), None);
	}

	#[rstest]
	fn test_detached_helpers_read_nothing() {
		let helpers = RouterHelpers::new(Weak::new());

		assert_eq!(helpers.current_template(), None);
		assert!(!helpers.current_nav_is("home"));
		assert_eq!(helpers.page("title"), Value::Null);
		assert_eq!(helpers.render_page(), Ok(String::new()));
	}
}
