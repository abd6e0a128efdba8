//! The set of registered routes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::ConfigurationError;
use crate::history::{NavigationCallback, Navigator};
use crate::pattern::Params;
use crate::route::Route;

/// Routes in registration order, with a name index.
#[derive(Debug, Default)]
pub struct RouteTable {
	routes: RefCell<Vec<Rc<Route>>>,
	names: RefCell<BTreeMap<String, Rc<Route>>>,
}

impl RouteTable {
	/// Create an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Add `route`.
	///
	/// # Errors
	///
	/// [`ConfigurationError::DuplicateRouteName`] if another route already
	/// uses the same name.
	pub fn add(&self, route: Route) -> Result<Rc<Route>, ConfigurationError> {
		let route = Rc::new(route);
		if let Some(name) = route.name() {
			let mut names = self.names.borrow_mut();
			if names.contains_key(name) {
				return Err(ConfigurationError::DuplicateRouteName(name.to_string()));
			}
			names.insert(name.to_string(), route.clone());
		}
		self.routes.borrow_mut().push(route.clone());
		Ok(route)
	}

	/// Route registered under `name`.
	pub fn get(&self, name: &str) -> Option<Rc<Route>> {
		self.names.borrow().get(name).cloned()
	}

	/// First route, in registration order, whose pattern matches `path`.
	pub fn resolve(&self, path: &str) -> Option<(Rc<Route>, Params)> {
		self.routes
			.borrow()
			.iter()
			.find_map(|route| route.matches(path).map(|params| (route.clone(), params)))
	}

	/// All routes in registration order.
	pub fn routes(&self) -> Vec<Rc<Route>> {
		self.routes.borrow().clone()
	}

	/// Number of routes.
	pub fn len(&self) -> usize {
		self.routes.borrow().len()
	}

	/// Whether no route is registered.
	pub fn is_empty(&self) -> bool {
		self.routes.borrow().is_empty()
	}

	/// Register every route not bound yet with `navigator`, freezing its
	/// guard list. `callback` builds the navigation callback for a route.
	pub fn bind<F>(&self, navigator: &dyn Navigator, callback: F) -> usize
	where
		F: Fn(Rc<Route>) -> NavigationCallback,
	{
		let mut bound = 0;
		for route in self.routes() {
			if route.is_bound() {
				continue;
			}
			route.bind();
			navigator.register(route.pattern().clone(), callback(route.clone()));
			bound += 1;
		}
		bound
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::RouteDefaults;
	use crate::history::{MemoryHistory, NavigationContext};
	use crate::route::{RouteOptions, guard};
	use crate::template::Templates;
	use rstest::{fixture, rstest};
	use serde_json::Value;
	use std::cell::RefCell;

	#[fixture]
	fn templates() -> Templates {
		Templates::new()
			.with_static("home", "")
			.with_static("postShow", "")
			.with_static("notFound", "")
	}

	fn route(pattern: &str, options: RouteOptions, templates: &Templates) -> Route {
		Route::new(pattern, options.into(), &RouteDefaults::default(), templates).unwrap()
	}

	#[rstest]
	fn test_duplicate_names_are_rejected(templates: Templates) {
		let table = RouteTable::new();
		table.add(route("/", RouteOptions::new().to("home"), &templates)).unwrap();

		let result = table.add(route("/start", RouteOptions::new().to("home"), &templates));

		assert_eq!(
			result.err(),
			Some(ConfigurationError::DuplicateRouteName("home".to_string()))
		);
		assert_eq!(table.len(), 1);
	}

	#[rstest]
	fn test_resolve_is_first_match_in_order(templates: Templates) {
		// Arrange
		let table = RouteTable::new();
		table.add(route("/posts/:_id", RouteOptions::new().to("postShow"), &templates)).unwrap();
		table.add(route("*", RouteOptions::new().to("notFound"), &templates)).unwrap();

		// Act
		let post = table.resolve("/posts/5");
		let other = table.resolve("/nowhere");

		// Assert
		let (post_route, params) = post.unwrap();
		assert_eq!(post_route.name(), Some("postShow"));
		assert_eq!(params.get("_id").map(String::as_str), Some("5"));
		assert_eq!(other.unwrap().0.name(), Some("notFound"));
		assert_eq!(table.get("postShow").map(|r| r.pattern().as_str().to_string()), Some("/posts/:_id".to_string()));
	}

	#[rstest]
	fn test_bind_registers_each_route_once(templates: Templates) {
		// Arrange
		let table = RouteTable::new();
		let history = MemoryHistory::new("/");
		let hits = Rc::new(RefCell::new(Vec::new()));
		table.add(route("/", RouteOptions::new().to("home"), &templates)).unwrap();
		let make_callback = |route: Rc<Route>| -> NavigationCallback {
			let hits = hits.clone();
			let callback: NavigationCallback = Rc::new(move |ctx: Rc<NavigationContext>| {
				hits.borrow_mut().push(format!("{}:{}", route.template().unwrap_or(""), ctx.path()));
			});
			callback
		};

		// Act
		let first = table.bind(&history, make_callback);
		table.add(route("/posts/:_id", RouteOptions::new().to("postShow"), &templates)).unwrap();
		let second = table.bind(&history, make_callback);
		history.start();
		history.go("/posts/1", Value::Null);

		// Assert
		assert_eq!((first, second), (1, 1));
		assert_eq!(*hits.borrow(), vec!["home:/", "postShow:/posts/1"]);
		assert!(table.routes().iter().all(|r| r.is_bound()));
		assert!(table.routes()[0].before([guard(|_| {})]).is_err());
	}
}
