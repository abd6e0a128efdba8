//! Template lookup and rendering.
//!
//! The router only needs to know whether a template exists, how to render it,
//! and where to install generated `<name>Path` helpers. Any view layer can
//! provide that through [`TemplateEngine`]; [`Templates`] is a simple
//! in-memory implementation built from closures.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// Marker a layout emits where the content region goes.
pub const YIELD_MARKER: &str = "<!--minipages:yield-->";

/// A template render function.
pub type RenderFn = Rc<dyn Fn(&TemplateContext<'_>) -> String>;

/// A generated path helper: builds a concrete path from a context object.
pub type PathHelperFn = Rc<dyn Fn(&Value) -> String>;

/// Template lookup, rendering and helper registration.
pub trait TemplateEngine {
	/// Whether a template named `name` is registered.
	fn has_template(&self, name: &str) -> bool;

	/// Render `name`, or `None` if no such template exists.
	fn render(&self, name: &str, context: &TemplateContext<'_>) -> Option<String>;

	/// Expose `helper` to templates under `name`.
	fn register_path_helper(&self, name: &str, helper: PathHelperFn);

	/// Look up a helper installed with [`TemplateEngine::register_path_helper`].
	fn path_helper(&self, name: &str) -> Option<PathHelperFn>;
}

/// What a render function can see.
pub struct TemplateContext<'a> {
	engine: &'a dyn TemplateEngine,
	data: &'a dyn Fn() -> Value,
	content: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
	/// Context whose page data is produced by `data`.
	///
	/// `data` is called on each access, so reads inside a computation stay
	/// reactive.
	pub fn new(engine: &'a dyn TemplateEngine, data: &'a dyn Fn() -> Value) -> Self {
		Self {
			engine,
			data,
			content: None,
		}
	}

	/// Attach the content region a layout yields to.
	pub fn with_content(mut self, content: &'a str) -> Self {
		self.content = Some(content);
		self
	}

	/// All page data.
	pub fn data(&self) -> Value {
		(self.data)()
	}

	/// One page data value, `Value::Null` when absent.
	pub fn get(&self, key: &str) -> Value {
		(self.data)().get(key).cloned().unwrap_or(Value::Null)
	}

	/// Content region, empty outside a layout.
	pub fn yield_content(&self) -> &str {
		self.content.unwrap_or("")
	}

	/// Call the path helper `helper` (for example `postShowPath`).
	pub fn path(&self, helper: &str, context: &Value) -> Option<String> {
		self.engine.path_helper(helper).map(|f| f(context))
	}

	/// Render another template with the same data, for partials.
	pub fn render(&self, name: &str) -> Option<String> {
		self.engine.render(name, &TemplateContext::new(self.engine, self.data))
	}
}

impl fmt::Debug for TemplateContext<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TemplateContext")
			.field("content", &self.content)
			.finish_non_exhaustive()
	}
}

/// In-memory [`TemplateEngine`].
#[derive(Default)]
pub struct Templates {
	templates: RefCell<BTreeMap<String, RenderFn>>,
	helpers: RefCell<BTreeMap<String, PathHelperFn>>,
}

impl Templates {
	/// Create an empty engine.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`Templates::define`].
	pub fn with<F>(self, name: &str, render: F) -> Self
	where
		F: Fn(&TemplateContext<'_>) -> String + 'static,
	{
		self.define(name, render);
		self
	}

	/// Builder form of [`Templates::define_static`].
	pub fn with_static(self, name: &str, html: &str) -> Self {
		self.define_static(name, html);
		self
	}

	/// Register (or replace) template `name`.
	pub fn define<F>(&self, name: &str, render: F)
	where
		F: Fn(&TemplateContext<'_>) -> String + 'static,
	{
		self.templates
			.borrow_mut()
			.insert(name.to_string(), Rc::new(render));
	}

	/// Register a template that always renders `html`.
	pub fn define_static(&self, name: &str, html: &str) {
		let html = html.to_string();
		self.define(name, move |_| html.clone());
	}

	/// Names of registered helpers.
	pub fn helper_names(&self) -> Vec<String> {
		self.helpers.borrow().keys().cloned().collect()
	}
}

impl TemplateEngine for Templates {
	fn has_template(&self, name: &str) -> bool {
		self.templates.borrow().contains_key(name)
	}

	fn render(&self, name: &str, context: &TemplateContext<'_>) -> Option<String> {
		// clone out so the template may define others while rendering
		let render = self.templates.borrow().get(name).cloned()?;
		Some(render(context))
	}

	fn register_path_helper(&self, name: &str, helper: PathHelperFn) {
		self.helpers.borrow_mut().insert(name.to_string(), helper);
	}

	fn path_helper(&self, name: &str) -> Option<PathHelperFn> {
		self.helpers.borrow().get(name).cloned()
	}
}

impl fmt::Debug for Templates {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Templates")
			.field("templates", &self.templates.borrow().keys().collect::<Vec<_>>())
			.field("helpers", &self.helpers.borrow().keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_render_reads_page_data() {
		// Arrange
		let templates = Templates::new().with("post", |ctx| {
			format!("<h1>{}</h1>", ctx.get("title").as_str().unwrap_or_default())
		});
		let data = || json!({"title": "Hello"});

		// Act
		let html = templates.render("post", &TemplateContext::new(&templates, &data));

		// Assert
		assert_eq!(html.as_deref(), Some("<h1>Hello</h1>"));
	}

	#[rstest]
	fn test_unknown_template_renders_none() {
		let templates = Templates::new();
		let data = || Value::Null;

		assert!(!templates.has_template("missing"));
		assert_eq!(templates.render("missing", &TemplateContext::new(&templates, &data)), None);
	}

	#[rstest]
	fn test_layout_yields_content() {
		let templates = Templates::new()
			.with("layout", |ctx| format!("<main>{}</main>", ctx.yield_content()));
		let data = || Value::Null;
		let ctx = TemplateContext::new(&templates, &data).with_content("body");

		assert_eq!(templates.render("layout", &ctx).as_deref(), Some("<main>body</main>"));
	}

	#[rstest]
	fn test_path_helpers_and_partials() {
		let templates = Templates::new()
			.with_static("footer", "<footer/>")
			.with("nav", |ctx| {
				let link = ctx.path("postShowPath", &json!({"_id": 7})).unwrap_or_default();
				format!("<a href=\"{link}\"></a>{}", ctx.render("footer").unwrap_or_default())
			});
		templates.register_path_helper(
			"postShowPath",
			Rc::new(|ctx: &Value| format!("/posts/{}", ctx["_id"])),
		);
		let data = || Value::Null;

		let html = templates.render("nav", &TemplateContext::new(&templates, &data));

		assert_eq!(html.as_deref(), Some("<a href=\"/posts/7\"></a><footer/>"));
		assert_eq!(templates.helper_names(), vec!["postShowPath"]);
	}
}
