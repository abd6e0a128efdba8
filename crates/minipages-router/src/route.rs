//! Routes and their guard pipelines.
//!
//! A [`Route`] binds one path pattern to a default template, layout and nav
//! key, plus an ordered list of [`Guard`]s that run before anything is
//! committed. Registration options arrive as a [`RouteSpec`] and are
//! normalized once, when the route is built.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::config::RouteDefaults;
use crate::error::ConfigurationError;
use crate::invocation::Invocation;
use crate::pattern::{Params, PathPattern};
use crate::template::TemplateEngine;

/// Conventional layout template name.
pub const DEFAULT_LAYOUT: &str = "layout";

/// A callback run before a route's template is committed.
///
/// Guards read and write navigation state only through the [`Invocation`]
/// they receive.
pub type Guard = Rc<dyn Fn(&mut Invocation)>;

/// Wrap a closure as a [`Guard`].
pub fn guard<F>(f: F) -> Guard
where
	F: Fn(&mut Invocation) + 'static,
{
	Rc::new(f)
}

/// Layout selection at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutChoice {
	/// Inherit the router default, which falls back to the conventional
	/// `layout` template when it exists.
	#[default]
	Default,
	/// Use this template.
	Named(String),
	/// Render content without a layout.
	Suppressed,
}

/// Structured registration options.
#[derive(Clone, Default)]
pub struct RouteOptions {
	/// Template to render.
	pub to: Option<String>,
	/// Route name; defaults to `to`.
	pub name: Option<String>,
	/// Layout selection.
	pub layout: LayoutChoice,
	/// Opaque nav key.
	pub nav: Option<String>,
	/// Guards, in order.
	pub before: Vec<Guard>,
}

impl RouteOptions {
	/// Empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the template.
	pub fn to(mut self, template: impl Into<String>) -> Self {
		self.to = Some(template.into());
		self
	}

	/// Set the route name.
	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Use `layout` as the layout template.
	pub fn layout(mut self, layout: impl Into<String>) -> Self {
		self.layout = LayoutChoice::Named(layout.into());
		self
	}

	/// Render without a layout.
	pub fn no_layout(mut self) -> Self {
		self.layout = LayoutChoice::Suppressed;
		self
	}

	/// Set the nav key.
	pub fn nav(mut self, nav: impl Into<String>) -> Self {
		self.nav = Some(nav.into());
		self
	}

	/// Append a guard.
	pub fn before<F>(mut self, f: F) -> Self
	where
		F: Fn(&mut Invocation) + 'static,
	{
		self.before.push(Rc::new(f));
		self
	}

	/// Append already-wrapped guards.
	pub fn before_all(mut self, guards: impl IntoIterator<Item = Guard>) -> Self {
		self.before.extend(guards);
		self
	}
}

impl fmt::Debug for RouteOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteOptions")
			.field("to", &self.to)
			.field("name", &self.name)
			.field("layout", &self.layout)
			.field("nav", &self.nav)
			.field("before", &self.before.len())
			.finish()
	}
}

/// What a path pattern is registered with.
#[derive(Clone)]
pub enum RouteSpec {
	/// Render this template.
	Template(String),
	/// Run this guard; it is expected to pick the template.
	Guard(Guard),
	/// Full options.
	Full(RouteOptions),
}

impl RouteSpec {
	/// Registration made of a single guard.
	pub fn guard<F>(f: F) -> Self
	where
		F: Fn(&mut Invocation) + 'static,
	{
		Self::Guard(Rc::new(f))
	}

	fn into_options(self) -> RouteOptions {
		match self {
			Self::Template(to) => RouteOptions::new().to(to),
			Self::Guard(guard) => RouteOptions {
				before: vec![guard],
				..RouteOptions::default()
			},
			Self::Full(options) => options,
		}
	}
}

impl From<&str> for RouteSpec {
	fn from(template: &str) -> Self {
		Self::Template(template.to_string())
	}
}

impl From<String> for RouteSpec {
	fn from(template: String) -> Self {
		Self::Template(template)
	}
}

impl From<RouteOptions> for RouteSpec {
	fn from(options: RouteOptions) -> Self {
		Self::Full(options)
	}
}

impl From<Guard> for RouteSpec {
	fn from(guard: Guard) -> Self {
		Self::Guard(guard)
	}
}

impl fmt::Debug for RouteSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Template(name) => f.debug_tuple("Template").field(name).finish(),
			Self::Guard(_) => f.write_str("Guard"),
			Self::Full(options) => f.debug_tuple("Full").field(options).finish(),
		}
	}
}

/// A registered path pattern with its defaults and guards.
pub struct Route {
	pattern: PathPattern,
	name: Option<String>,
	template: Option<String>,
	layout: Option<String>,
	nav: Option<String>,
	guards: RefCell<Vec<Guard>>,
	bound: Cell<bool>,
}

impl Route {
	/// Build a route, deriving its name from `to` when none is given.
	///
	/// # Errors
	///
	/// - [`ConfigurationError::InvalidPattern`] if `pattern` does not compile
	/// - [`ConfigurationError::UndefinedTemplate`] if `to` names a template
	///   `templates` does not have
	pub fn new(
		pattern: &str,
		spec: RouteSpec,
		defaults: &RouteDefaults,
		templates: &dyn TemplateEngine,
	) -> Result<Self, ConfigurationError> {
		Self::build(pattern, spec.into_options(), true, defaults, templates)
	}

	pub(crate) fn build(
		pattern: &str,
		options: RouteOptions,
		derive_name: bool,
		defaults: &RouteDefaults,
		templates: &dyn TemplateEngine,
	) -> Result<Self, ConfigurationError> {
		let compiled = PathPattern::new(pattern)?;

		let name = match (options.name, derive_name) {
			(Some(name), _) => Some(name),
			(None, true) => options.to.clone(),
			(None, false) => None,
		};

		let template = options.to.or_else(|| defaults.to.clone());
		if let Some(template) = &template
			&& !templates.has_template(template)
		{
			return Err(ConfigurationError::UndefinedTemplate {
				pattern: pattern.to_string(),
				template: template.clone(),
			});
		}

		let layout = resolve_layout(pattern, options.layout, &defaults.layout, templates);
		let nav = options.nav.or_else(|| defaults.nav.clone());

		let mut guards = defaults.before.clone();
		guards.extend(options.before);

		Ok(Self {
			pattern: compiled,
			name,
			template,
			layout,
			nav,
			guards: RefCell::new(guards),
			bound: Cell::new(false),
		})
	}

	/// The compiled pattern.
	pub fn pattern(&self) -> &PathPattern {
		&self.pattern
	}

	/// Route name, used for the `<name>Path` helper.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Default template.
	pub fn template(&self) -> Option<&str> {
		self.template.as_deref()
	}

	/// Default layout.
	pub fn layout(&self) -> Option<&str> {
		self.layout.as_deref()
	}

	/// Default nav key.
	pub fn nav(&self) -> Option<&str> {
		self.nav.as_deref()
	}

	/// Number of guards.
	pub fn guard_count(&self) -> usize {
		self.guards.borrow().len()
	}

	/// Whether the route has been bound to a navigator.
	pub fn is_bound(&self) -> bool {
		self.bound.get()
	}

	pub(crate) fn bind(&self) {
		self.bound.set(true);
	}

	/// Match `path` against this route's pattern.
	pub fn matches(&self, path: &str) -> Option<Params> {
		self.pattern.matches(path)
	}

	/// Append guards.
	///
	/// # Errors
	///
	/// [`ConfigurationError::GuardsFrozen`] once the route is bound.
	pub fn before(&self, guards: impl IntoIterator<Item = Guard>) -> Result<&Self, ConfigurationError> {
		if self.is_bound() {
			return Err(ConfigurationError::GuardsFrozen(self.label().to_string()));
		}
		self.guards.borrow_mut().extend(guards);
		Ok(self)
	}

	/// Concrete path for this route given a context object. See
	/// [`PathPattern::path_for_context`].
	pub fn path_for_context(&self, context: &Value) -> String {
		self.pattern.path_for_context(context)
	}

	/// Run the guard pipeline, then fill unset selections with the route
	/// defaults.
	///
	/// Guards after the one that marks the invocation done never run.
	pub fn run<'a>(&self, invocation: &'a mut Invocation) -> &'a mut Invocation {
		let guards = self.guards.borrow().clone();
		let total = guards.len();

		for (executed, guard) in guards.iter().enumerate() {
			if invocation.is_done() {
				tracing::debug!(route = %self.label(), executed, total, "guards short-circuited");
				break;
			}
			guard(invocation);
		}

		invocation.apply_defaults(
			self.layout.as_deref(),
			self.template.as_deref(),
			self.nav.as_deref(),
		);
		invocation
	}

	fn label(&self) -> &str {
		self.name.as_deref().unwrap_or_else(|| self.pattern.as_str())
	}
}

impl fmt::Debug for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Route")
			.field("pattern", &self.pattern.as_str())
			.field("name", &self.name)
			.field("template", &self.template)
			.field("layout", &self.layout)
			.field("nav", &self.nav)
			.field("guards", &self.guard_count())
			.field("bound", &self.is_bound())
			.finish()
	}
}

fn resolve_layout(
	pattern: &str,
	choice: LayoutChoice,
	fallback: &LayoutChoice,
	templates: &dyn TemplateEngine,
) -> Option<String> {
	let choice = match choice {
		LayoutChoice::Default => fallback.clone(),
		explicit => explicit,
	};
	match choice {
		LayoutChoice::Named(layout) => {
			if !templates.has_template(&layout) {
				tracing::warn!(route = %pattern, layout = %layout, "layout template is not defined");
			}
			Some(layout)
		}
		LayoutChoice::Suppressed => None,
		LayoutChoice::Default => templates
			.has_template(DEFAULT_LAYOUT)
			.then(|| DEFAULT_LAYOUT.to_string()),
	}
}
