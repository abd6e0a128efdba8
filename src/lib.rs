//! # minipages
//!
//! Client-side page routing with reactive before-filters.
//!
//! Routes map path patterns to templates. Every navigation runs the matched
//! route's guards inside a reactive computation, so a guard that reads
//! reactive state re-runs when that state changes, and commits the chosen
//! layout, template and nav key to a reactive store the view layer renders
//! from.
//!
//! ## Crates
//!
//! - [`reactive`]: signals, computations and the keyed reactive store
//! - [`router`]: routes, invocations, the router and two-region rendering
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use minipages::prelude::*;
//!
//! let history = Rc::new(MemoryHistory::new("/"));
//! let templates = Rc::new(
//!     Templates::new()
//!         .with("layout", |ctx| format!("<body>{}</body>", ctx.yield_content()))
//!         .with_static("home", "<h1>Home</h1>")
//!         .with_static("postShow", "<article/>"),
//! );
//!
//! let router = minipages::pages(
//!     history.clone(),
//!     templates,
//!     [
//!         ("/", RouteSpec::from("home")),
//!         ("/posts/:_id", RouteOptions::new().to("postShow").nav("posts").into()),
//!     ],
//!     RouterOptions::default(),
//! )?;
//!
//! assert_eq!(router.path_for("postShowPath", &serde_json::json!({"_id": 1})).as_deref(), Some("/posts/1"));
//! ```

use std::rc::Rc;

pub mod reactive;
pub mod router;

pub use minipages_router::{ConfigurationError, Error, MissingTemplateError, Result, Router};

/// Commonly used types.
pub mod prelude {
	pub use minipages_reactive::{Computation, ReactiveStore, Signal, flush};
	pub use minipages_router::{
		ConfigurationError, Invocation, LayoutChoice, MemoryHistory, MissingTemplateError,
		Navigator, RouteDefaults, RouteOptions, RouteSpec, Router, RouterOptions, RouterSettings,
		TemplateEngine, Templates, guard,
	};
}

/// Install a router, register `routes` in order, and start it when
/// `options.auto_start` is set.
///
/// # Errors
///
/// [`ConfigurationError::DuplicateRouter`] if a router is already installed on
/// this thread, or the first error raised while registering a route.
pub fn pages<I, P, S>(
	navigator: Rc<dyn minipages_router::Navigator>,
	templates: Rc<dyn minipages_router::TemplateEngine>,
	routes: I,
	options: minipages_router::RouterOptions,
) -> std::result::Result<Router, ConfigurationError>
where
	I: IntoIterator<Item = (P, S)>,
	P: AsRef<str>,
	S: Into<minipages_router::RouteSpec>,
{
	let auto_start = options.auto_start;
	let router = Router::install(navigator, templates, options)?;
	let registered = router.register_all(routes)?;
	tracing::debug!(routes = registered.len(), auto_start, "pages registered");

	if auto_start {
		router.start();
	}
	Ok(router)
}
