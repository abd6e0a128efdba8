//! Per-navigation execution context.
//!
//! A fresh [`Invocation`] is created every time a route runs. Guards use it to
//! pick the layout, template and nav key, to stash page data, and to halt the
//! pipeline:
//!
//! ```text
//! RUNNING --done()--> DONE --stop()--> STOPPED
//!    |                                    ^
//!    +------------- stop() ---------------+
//! ```
//!
//! `done()` halts the remaining guards but the invocation is still committed.
//! `stop()` also halts them, tells the navigation context not to save the
//! history entry, and the router commits nothing. `STOPPED` is terminal.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::ConfigurationError;
use crate::history::{NavigationContext, Navigator};
use crate::pattern::Params;
use crate::route::Route;

/// A layout, template or nav selection.
///
/// Distinguishes "never set" from "explicitly cleared": route defaults only
/// fill in [`Selection::Unset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
	/// Nothing chose a value.
	#[default]
	Unset,
	/// A guard explicitly chose "none".
	Cleared,
	/// A guard or the route default chose this name.
	Named(String),
}

impl Selection {
	/// The chosen name, if any.
	pub fn as_deref(&self) -> Option<&str> {
		match self {
			Self::Named(name) => Some(name),
			Self::Unset | Self::Cleared => None,
		}
	}

	/// Whether nothing chose a value yet.
	pub fn is_unset(&self) -> bool {
		matches!(self, Self::Unset)
	}

	fn or_default(&mut self, default: Option<&str>) {
		if self.is_unset() {
			*self = match default {
				Some(name) => Self::Named(name.to_string()),
				None => Self::Cleared,
			};
		}
	}
}

/// The mutable state one navigation threads through its guards.
pub struct Invocation {
	navigator: Rc<dyn Navigator>,
	route: Rc<Route>,
	context: Rc<NavigationContext>,
	dictionary: Map<String, Value>,
	layout: Selection,
	template: Selection,
	nav: Selection,
	done: bool,
	stopped: bool,
}

impl Invocation {
	/// Create an invocation for `route`.
	///
	/// # Errors
	///
	/// [`ConfigurationError::MissingContext`] when `context` is `None`;
	/// invocations only exist inside a navigation.
	pub fn new(
		navigator: Rc<dyn Navigator>,
		route: Rc<Route>,
		context: Option<Rc<NavigationContext>>,
	) -> Result<Self, ConfigurationError> {
		let context = context.ok_or(ConfigurationError::MissingContext)?;
		Ok(Self::for_context(navigator, route, context))
	}

	pub(crate) fn for_context(
		navigator: Rc<dyn Navigator>,
		route: Rc<Route>,
		context: Rc<NavigationContext>,
	) -> Self {
		Self {
			navigator,
			route,
			context,
			dictionary: Map::new(),
			layout: Selection::Unset,
			template: Selection::Unset,
			nav: Selection::Unset,
			done: false,
			stopped: false,
		}
	}

	/// Route being run.
	pub fn route(&self) -> &Rc<Route> {
		&self.route
	}

	/// Navigation context that triggered this run.
	pub fn context(&self) -> &NavigationContext {
		&self.context
	}

	/// Path parameters.
	pub fn params(&self) -> &Params {
		self.context.params()
	}

	/// One path parameter.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.context.params().get(name).map(String::as_str)
	}

	/// Store page data under `key`.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.dictionary.insert(key.into(), value.into());
	}

	/// Page data stored under `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.dictionary.get(key)
	}

	/// All page data as a JSON object.
	pub fn to_object(&self) -> Value {
		Value::Object(self.dictionary.clone())
	}

	/// Selected layout.
	pub fn layout(&self) -> Option<&str> {
		self.layout.as_deref()
	}

	/// Select `layout`.
	pub fn set_layout(&mut self, layout: impl Into<String>) {
		self.layout = Selection::Named(layout.into());
	}

	/// Render without a layout, even if the route has one.
	pub fn clear_layout(&mut self) {
		self.layout = Selection::Cleared;
	}

	/// Layout selection state.
	pub fn layout_selection(&self) -> &Selection {
		&self.layout
	}

	/// Selected template.
	pub fn template(&self) -> Option<&str> {
		self.template.as_deref()
	}

	/// Select `template`.
	pub fn set_template(&mut self, template: impl Into<String>) {
		self.template = Selection::Named(template.into());
	}

	/// Render no content, even if the route has a template.
	pub fn clear_template(&mut self) {
		self.template = Selection::Cleared;
	}

	/// Template selection state.
	pub fn template_selection(&self) -> &Selection {
		&self.template
	}

	/// Selected nav key.
	pub fn nav(&self) -> Option<&str> {
		self.nav.as_deref()
	}

	/// Select `nav`.
	pub fn set_nav(&mut self, nav: impl Into<String>) {
		self.nav = Selection::Named(nav.into());
	}

	/// Clear the nav key, even if the route has one.
	pub fn clear_nav(&mut self) {
		self.nav = Selection::Cleared;
	}

	/// Nav selection state.
	pub fn nav_selection(&self) -> &Selection {
		&self.nav
	}

	/// Skip the remaining guards. The invocation is still committed.
	pub fn done(&mut self) {
		self.done = true;
	}

	/// Whether the remaining guards will be skipped.
	pub fn is_done(&self) -> bool {
		self.done
	}

	/// Abandon this navigation: skip the remaining guards, keep the navigator
	/// from saving the history entry, and commit nothing.
	pub fn stop(&mut self) {
		self.context.stop();
		self.stopped = true;
		self.done = true;
	}

	/// Whether [`Invocation::stop`] was called.
	pub fn is_stopped(&self) -> bool {
		self.stopped
	}

	/// Stop this navigation and start one to `path`.
	pub fn redirect(&mut self, path: &str, state: Value) {
		self.stop();
		tracing::debug!(from = %self.context.path(), to = %path, "redirecting");
		self.navigator.go(path, state);
	}

	pub(crate) fn apply_defaults(&mut self, layout: Option<&str>, template: Option<&str>, nav: Option<&str>) {
		self.layout.or_default(layout);
		self.template.or_default(template);
		self.nav.or_default(nav);
	}
}

impl fmt::Debug for Invocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Invocation")
			.field("path", &self.context.path())
			.field("params", self.context.params())
			.field("dictionary", &self.dictionary)
			.field("layout", &self.layout)
			.field("template", &self.template)
			.field("nav", &self.nav)
			.field("done", &self.done)
			.field("stopped", &self.stopped)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::RouteDefaults;
	use crate::history::NavigationCallback;
	use crate::pattern::PathPattern;
	use crate::template::Templates;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::cell::RefCell;

	#[derive(Default)]
	struct RecordingNavigator {
		visits: RefCell<Vec<(String, Value)>>,
	}

	impl Navigator for RecordingNavigator {
		fn register(&self, _: PathPattern, _: NavigationCallback) {}
		fn start(&self) {}
		fn go(&self, path: &str, state: Value) {
			self.visits.borrow_mut().push((path.to_string(), state));
		}
	}

	#[fixture]
	fn navigator() -> Rc<RecordingNavigator> {
		Rc::new(RecordingNavigator::default())
	}

	fn route() -> Rc<Route> {
		let templates = Templates::new().with_static("home", "");
		Rc::new(Route::new("/posts/:id", "home".into(), &RouteDefaults::default(), &templates).unwrap())
	}

	fn context() -> Rc<NavigationContext> {
		let params = [("id".to_string(), "3".to_string())].into_iter().collect();
		Rc::new(NavigationContext::new("/posts/3", params, Value::Null))
	}

	#[rstest]
	fn test_requires_context(navigator: Rc<RecordingNavigator>) {
		let result = Invocation::new(navigator, route(), None);

		assert_eq!(result.err(), Some(ConfigurationError::MissingContext));
	}

	#[rstest]
	fn test_dictionary_and_params(navigator: Rc<RecordingNavigator>) {
		let mut invocation = Invocation::new(navigator, route(), Some(context())).unwrap();

		invocation.set("title", "Post");
		invocation.set("count", 2);

		assert_eq!(invocation.get("title"), Some(&json!("Post")));
		assert_eq!(invocation.get("missing"), None);
		assert_eq!(invocation.param("id"), Some("3"));
		assert_eq!(invocation.to_object(), json!({"title": "Post", "count": 2}));
	}

	#[rstest]
	fn test_done_is_not_stopped(navigator: Rc<RecordingNavigator>) {
		let mut invocation = Invocation::new(navigator, route(), Some(context())).unwrap();

		invocation.done();

		assert!(invocation.is_done());
		assert!(!invocation.is_stopped());
		assert!(!invocation.context().is_stopped());
	}

	#[rstest]
	fn test_stop_implies_done(navigator: Rc<RecordingNavigator>) {
		let mut invocation = Invocation::new(navigator, route(), Some(context())).unwrap();

		invocation.done();
		invocation.stop();

		assert!(invocation.is_stopped());
		assert!(invocation.is_done());
		assert!(invocation.context().is_stopped());
	}

	#[rstest]
	fn test_redirect_stops_and_navigates(navigator: Rc<RecordingNavigator>) {
		// Arrange
		let mut invocation = Invocation::new(navigator.clone(), route(), Some(context())).unwrap();

		// Act
		invocation.redirect("/login", json!({"next": "/posts/3"}));

		// Assert
		assert!(invocation.is_stopped());
		assert!(invocation.is_done());
		assert_eq!(
			*navigator.visits.borrow(),
			vec![("/login".to_string(), json!({"next": "/posts/3"}))]
		);
	}

	#[rstest]
	#[case(Selection::Unset, Some("default"), Selection::Named("default".into()))]
	#[case(Selection::Unset, None, Selection::Cleared)]
	#[case(Selection::Cleared, Some("default"), Selection::Cleared)]
	#[case(Selection::Named("mine".into()), Some("default"), Selection::Named("mine".into()))]
	fn test_defaulting_only_fills_unset(
		#[case] mut selection: Selection,
		#[case] default: Option<&str>,
		#[case] expected: Selection,
	) {
		selection.or_default(default);

		assert_eq!(selection, expected);
	}
}
