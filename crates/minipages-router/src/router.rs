//! Core Router Implementation.
//!
//! The [`Router`] owns the route table and drives every navigation:
//!
//! 1. The navigator fires a route's callback, which calls [`Router::run`].
//! 2. `run` records the new path and route, then stops the previous guard
//!    pipeline before starting a fresh one inside a [`Computation`].
//! 3. The pipeline builds an [`Invocation`], runs the route's guards and, unless
//!    the invocation was stopped, commits layout, template, nav and page data
//!    to the [`ReactiveStore`].
//!
//! Because the pipeline is a computation, a guard that reads reactive state
//! (say, a signed-in flag) re-runs and recommits when that state changes,
//! without a new URL change. Only one pipeline is alive at a time.
//!
//! Only one router may be installed per UI thread.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use minipages_reactive::{Computation, ReactiveStore};
use serde_json::Value;

use crate::config::RouterOptions;
use crate::error::{ConfigurationError, MissingTemplateError};
use crate::helpers::{PathHelpers, RouterHelpers};
use crate::history::{NavigationCallback, NavigationContext, Navigator};
use crate::invocation::Invocation;
use crate::render::RenderedPage;
use crate::route::{Guard, Route, RouteOptions, RouteSpec};
use crate::table::RouteTable;
use crate::template::{TemplateContext, TemplateEngine, YIELD_MARKER};

/// Store key of the committed layout.
pub const LAYOUT_KEY: &str = "minipages.layout";
/// Store key of the committed template.
pub const TEMPLATE_KEY: &str = "minipages.template";
/// Store key of the committed nav key.
pub const NAV_KEY: &str = "minipages.nav";
/// Store key of the committed page data.
pub const INVOCATION_KEY: &str = "minipages.invocation";
/// Store key of the current path.
pub const PATH_KEY: &str = "minipages.path";

thread_local! {
	static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

#[derive(Default)]
struct NavigationState {
	path: Option<String>,
	route: Option<Rc<Route>>,
	context: Option<Rc<NavigationContext>>,
	pipeline: Option<Rc<Computation>>,
	generation: u64,
}

pub(crate) struct RouterShared {
	navigator: Rc<dyn Navigator>,
	templates: Rc<dyn TemplateEngine>,
	options: RouterOptions,
	table: RouteTable,
	path_helpers: PathHelpers,
	store: ReactiveStore,
	state: RefCell<NavigationState>,
	started: Cell<bool>,
	rendered: Cell<bool>,
	mounted: RefCell<Option<RenderedPage>>,
}

/// Handle to the installed router.
///
/// Clones share the same router. The thread's router slot is released when
/// the last clone is dropped.
#[derive(Clone)]
pub struct Router {
	shared: Rc<RouterShared>,
}

impl Router {
	/// Install the router for this thread.
	///
	/// # Errors
	///
	/// [`ConfigurationError::DuplicateRouter`] if a router is already installed.
	pub fn install(
		navigator: Rc<dyn Navigator>,
		templates: Rc<dyn TemplateEngine>,
		options: RouterOptions,
	) -> Result<Self, ConfigurationError> {
		if INSTALLED.with(|installed| installed.replace(true)) {
			return Err(ConfigurationError::DuplicateRouter);
		}

		Ok(Self {
			shared: Rc::new(RouterShared {
				navigator,
				templates,
				options,
				table: RouteTable::new(),
				path_helpers: PathHelpers::default(),
				store: ReactiveStore::new(),
				state: RefCell::new(NavigationState::default()),
				started: Cell::new(false),
				rendered: Cell::new(false),
				mounted: RefCell::new(None),
			}),
		})
	}

	/// Whether a router is installed on this thread.
	pub fn is_installed() -> bool {
		INSTALLED.with(Cell::get)
	}

	pub(crate) fn downgrade(&self) -> Weak<RouterShared> {
		Rc::downgrade(&self.shared)
	}

	/// Options the router was installed with.
	pub fn options(&self) -> &RouterOptions {
		&self.shared.options
	}

	/// The store navigations are committed to.
	pub fn store(&self) -> &ReactiveStore {
		&self.shared.store
	}

	/// Registered routes.
	pub fn table(&self) -> &RouteTable {
		&self.shared.table
	}

	/// Generated `<name>Path` helpers.
	pub fn path_helpers(&self) -> &PathHelpers {
		&self.shared.path_helpers
	}

	/// Call the path helper `helper` (for example `postShowPath`).
	pub fn path_for(&self, helper: &str, context: &Value) -> Option<String> {
		self.shared.path_helpers.call(helper, context)
	}

	/// Reactive template helpers bound to this router.
	pub fn helpers(&self) -> RouterHelpers {
		RouterHelpers::new(self.downgrade())
	}

	/// Register `pattern`.
	///
	/// # Errors
	///
	/// Any [`ConfigurationError`] raised while building the route, or
	/// [`ConfigurationError::DuplicateRouteName`].
	pub fn register(
		&self,
		pattern: &str,
		spec: impl Into<RouteSpec>,
	) -> Result<Rc<Route>, ConfigurationError> {
		let route = Route::new(
			pattern,
			spec.into(),
			&self.shared.options.defaults,
			self.shared.templates.as_ref(),
		)?;
		self.shared.add_route(route)
	}

	/// Register each `(pattern, spec)` pair in order.
	///
	/// Matching is first match wins in this order, so a catch-all pattern
	/// belongs last.
	///
	/// # Errors
	///
	/// Stops at the first failing registration.
	pub fn register_all<I, P, S>(&self, routes: I) -> Result<Vec<Rc<Route>>, ConfigurationError>
	where
		I: IntoIterator<Item = (P, S)>,
		P: AsRef<str>,
		S: Into<RouteSpec>,
	{
		routes
			.into_iter()
			.map(|(pattern, spec)| self.register(pattern.as_ref(), spec))
			.collect()
	}

	/// Start a chainable route definition for `pattern`.
	pub fn match_path(&self, pattern: &str) -> RouteBuilder<'_> {
		RouteBuilder {
			router: self,
			pattern: pattern.to_string(),
			options: RouteOptions::new(),
		}
	}

	/// Route registered under `name`.
	pub fn route(&self, name: &str) -> Option<Rc<Route>> {
		self.shared.table.get(name)
	}

	/// Bind routes to the navigator and start it. Renders and mounts the page
	/// first when `auto_render` is set. Calling this again does nothing.
	pub fn start(&self) {
		if self.shared.started.replace(true) {
			return;
		}
		if self.shared.options.auto_render {
			let page = self.render();
			*self.shared.mounted.borrow_mut() = Some(page);
		}
		let bound = self.shared.bind_routes();
		tracing::debug!(routes = bound, "router started");
		self.shared.navigator.start();
	}

	/// Whether [`Router::start`] has been called.
	pub fn is_started(&self) -> bool {
		self.shared.started.get()
	}

	/// Navigate to `path`. The navigator decides when the route runs.
	pub fn go(&self, path: &str, state: Value) {
		self.shared.navigator.go(path, state);
	}

	/// Handle one navigation. Called by the navigator through the callback
	/// each route is bound with.
	///
	/// Ignored when `path` and `context` equal the last navigation's.
	pub fn run(&self, path: &str, route: Rc<Route>, context: Rc<NavigationContext>) {
		self.shared.run(path, route, context);
	}

	/// Forget the current navigation and clear everything committed.
	pub fn reset(&self) {
		let previous = {
			let mut state = self.shared.state.borrow_mut();
			state.path = None;
			state.route = None;
			state.context = None;
			state.generation += 1;
			state.pipeline.take()
		};
		if let Some(previous) = previous {
			previous.stop();
		}

		let store = &self.shared.store;
		for key in [PATH_KEY, LAYOUT_KEY, TEMPLATE_KEY, NAV_KEY, INVOCATION_KEY] {
			store.set(key, Value::Null);
		}
		tracing::debug!("router reset");
	}

	/// Route of the current navigation. Not reactive.
	pub fn current_route(&self) -> Option<Rc<Route>> {
		self.shared.state.borrow().route.clone()
	}

	/// Context of the current navigation. Not reactive.
	pub fn current_context(&self) -> Option<Rc<NavigationContext>> {
		self.shared.state.borrow().context.clone()
	}

	/// Current path.
	pub fn path(&self) -> Option<String> {
		self.shared.committed(PATH_KEY)
	}

	/// Committed layout.
	pub fn layout(&self) -> Option<String> {
		self.shared.committed(LAYOUT_KEY)
	}

	/// Committed template.
	pub fn template(&self) -> Option<String> {
		self.shared.committed(TEMPLATE_KEY)
	}

	/// Committed nav key.
	pub fn nav(&self) -> Option<String> {
		self.shared.committed(NAV_KEY)
	}

	/// Committed page data, `Value::Null` before the first commit.
	pub fn invocation(&self) -> Value {
		self.shared.store.get(INVOCATION_KEY)
	}

	/// Whether the committed layout is `layout`.
	pub fn layout_equals(&self, layout: &str) -> bool {
		self.shared.store.equals(LAYOUT_KEY, &Value::from(layout))
	}

	/// Whether the committed template is `template`.
	pub fn template_equals(&self, template: &str) -> bool {
		self.shared.store.equals(TEMPLATE_KEY, &Value::from(template))
	}

	/// Whether the committed nav key is `nav`.
	pub fn nav_equals(&self, nav: &str) -> bool {
		self.shared.store.equals(NAV_KEY, &Value::from(nav))
	}

	/// Render the router: an outer layout region around an inner content
	/// region, each re-rendered on its own when its committed value changes.
	pub fn render(&self) -> RenderedPage {
		self.shared.rendered.set(true);
		RenderedPage::new(self.downgrade())
	}

	/// Whether [`Router::render`] has been called.
	pub fn is_rendered(&self) -> bool {
		self.shared.rendered.get()
	}

	/// Page rendered by [`Router::start`] when `auto_render` is set.
	pub fn mounted(&self) -> Option<RenderedPage> {
		self.shared.mounted.borrow().clone()
	}
}

impl std::fmt::Debug for Router {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.shared.state.borrow();
		f.debug_struct("Router")
			.field("routes", &self.shared.table.len())
			.field("path", &state.path)
			.field("started", &self.shared.started.get())
			.field("rendered", &self.shared.rendered.get())
			.finish()
	}
}

impl RouterShared {
	fn add_route(self: &Rc<Self>, route: Route) -> Result<Rc<Route>, ConfigurationError> {
		let route = self.table.add(route)?;
		if let Some(helper) = self.path_helpers.insert(&route) {
			let weak = Rc::downgrade(&route);
			self.templates.register_path_helper(
				&helper,
				Rc::new(move |context: &Value| {
					weak.upgrade()
						.map(|route| route.path_for_context(context))
						.unwrap_or_default()
				}),
			);
		}
		tracing::debug!(pattern = %route.pattern(), name = ?route.name(), "route registered");

		if self.started.get() {
			self.bind_routes();
		}
		Ok(route)
	}

	fn bind_routes(self: &Rc<Self>) -> usize {
		let weak = Rc::downgrade(self);
		self.table.bind(self.navigator.as_ref(), |route| {
			let weak = weak.clone();
			let callback: NavigationCallback = Rc::new(move |context: Rc<NavigationContext>| {
				if let Some(shared) = weak.upgrade() {
					let path = context.path().to_string();
					shared.run(&path, route.clone(), context);
				}
			});
			callback
		})
	}

	fn run(self: &Rc<Self>, path: &str, route: Rc<Route>, context: Rc<NavigationContext>) {
		let duplicate = {
			let state = self.state.borrow();
			state.path.as_deref() == Some(path) && state.context.as_deref() == Some(&*context)
		};
		if duplicate {
			tracing::debug!(path, "navigation deduplicated");
			return;
		}
		tracing::debug!(path, route = %route.pattern(), "navigation started");

		let (previous, generation) = {
			let mut state = self.state.borrow_mut();
			state.path = Some(path.to_string());
			state.route = Some(route.clone());
			state.context = Some(context.clone());
			state.generation += 1;
			(state.pipeline.take(), state.generation)
		};
		self.store.set(PATH_KEY, path);
		if let Some(previous) = previous {
			previous.stop();
		}

		// stored before the first run so a navigation started by one of its
		// guards finds and stops it
		let weak = Rc::downgrade(self);
		let pipeline = Rc::new(Computation::deferred(move || {
			if let Some(shared) = weak.upgrade() {
				shared.run_pipeline(&route, &context, generation);
			}
		}));
		self.state.borrow_mut().pipeline = Some(pipeline.clone());
		pipeline.run();
	}

	fn run_pipeline(&self, route: &Rc<Route>, context: &Rc<NavigationContext>, generation: u64) {
		let mut invocation =
			Invocation::for_context(self.navigator.clone(), route.clone(), context.clone());
		route.run(&mut invocation);

		if invocation.is_stopped() {
			tracing::debug!(path = %context.path(), "navigation stopped");
			return;
		}
		if self.state.borrow().generation != generation {
			tracing::debug!(path = %context.path(), "navigation superseded");
			return;
		}

		self.store.set(LAYOUT_KEY, name_value(invocation.layout()));
		self.store.set(TEMPLATE_KEY, name_value(invocation.template()));
		self.store.set(NAV_KEY, name_value(invocation.nav()));
		self.store.set(INVOCATION_KEY, invocation.to_object());
		tracing::debug!(
			path = %context.path(),
			layout = ?invocation.layout(),
			template = ?invocation.template(),
			nav = ?invocation.nav(),
			"navigation committed"
		);
	}

	fn committed(&self, key: &str) -> Option<String> {
		match self.store.get(key) {
			Value::String(name) => Some(name),
			_ => None,
		}
	}

	pub(crate) fn page_data(&self, key: &str) -> Value {
		self.store
			.get(INVOCATION_KEY)
			.get(key)
			.cloned()
			.unwrap_or(Value::Null)
	}

	pub(crate) fn current(&self, key: &str) -> Option<String> {
		self.committed(key)
	}

	pub(crate) fn current_equals(&self, key: &str, name: &str) -> bool {
		self.store.equals(key, &Value::from(name))
	}

	pub(crate) fn path_helper(&self, helper: &str, context: &Value) -> Option<String> {
		self.path_helpers.call(helper, context)
	}

	/// Render the committed template. An unset template renders nothing.
	pub(crate) fn render_content(&self) -> Result<String, MissingTemplateError> {
		let Some(name) = self.committed(TEMPLATE_KEY) else {
			return Ok(String::new());
		};
		let store = self.store.clone();
		let data = move || store.get(INVOCATION_KEY);
		let context = TemplateContext::new(self.templates.as_ref(), &data);
		self.templates
			.render(&name, &context)
			.ok_or_else(|| MissingTemplateError::new(name))
	}

	/// Render the committed layout around [`YIELD_MARKER`], or `None` when no
	/// layout is committed.
	pub(crate) fn render_layout(&self) -> Option<Result<String, MissingTemplateError>> {
		let name = self.committed(LAYOUT_KEY)?;
		let store = self.store.clone();
		let data = move || store.get(INVOCATION_KEY);
		let context = TemplateContext::new(self.templates.as_ref(), &data).with_content(YIELD_MARKER);
		Some(
			self.templates
				.render(&name, &context)
				.ok_or_else(|| MissingTemplateError::new(name)),
		)
	}

	/// Render the committed layout with the committed template inside it.
	pub(crate) fn render_page(&self) -> Result<String, MissingTemplateError> {
		let content = self.render_content()?;
		match self.render_layout() {
			None => Ok(content),
			Some(layout) => Ok(layout?.replace(YIELD_MARKER, &content)),
		}
	}
}

impl Drop for RouterShared {
	fn drop(&mut self) {
		let _ = INSTALLED.try_with(|installed| installed.set(false));
	}
}

fn name_value(name: Option<&str>) -> Value {
	name.map_or(Value::Null, Value::from)
}

/// Chainable route definition started by [`Router::match_path`].
///
/// Unlike the options form, naming is explicit: [`RouteBuilder::to`] does not
/// name the route.
#[must_use = "call register() to add the route"]
pub struct RouteBuilder<'a> {
	router: &'a Router,
	pattern: String,
	options: RouteOptions,
}

impl RouteBuilder<'_> {
	/// Template to render.
	pub fn to(mut self, template: &str) -> Self {
		self.options = self.options.to(template);
		self
	}

	/// Route name, which also names the `<name>Path` helper.
	pub fn named(mut self, name: &str) -> Self {
		self.options = self.options.named(name);
		self
	}

	/// Layout template.
	pub fn layout(mut self, layout: &str) -> Self {
		self.options = self.options.layout(layout);
		self
	}

	/// Render without a layout.
	pub fn no_layout(mut self) -> Self {
		self.options = self.options.no_layout();
		self
	}

	/// Nav key.
	pub fn nav(mut self, nav: &str) -> Self {
		self.options = self.options.nav(nav);
		self
	}

	/// Append a guard.
	pub fn before<F>(mut self, f: F) -> Self
	where
		F: Fn(&mut Invocation) + 'static,
	{
		self.options = self.options.before(f);
		self
	}

	/// Append already-wrapped guards.
	pub fn before_all(mut self, guards: impl IntoIterator<Item = Guard>) -> Self {
		self.options = self.options.before_all(guards);
		self
	}

	/// Build and add the route.
	///
	/// # Errors
	///
	/// Same as [`Router::register`].
	pub fn register(self) -> Result<Rc<Route>, ConfigurationError> {
		let shared = &self.router.shared;
		let route = Route::build(
			&self.pattern,
			self.options,
			false,
			&shared.options.defaults,
			shared.templates.as_ref(),
		)?;
		shared.add_route(route)
	}
}
