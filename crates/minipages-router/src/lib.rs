//! # minipages-router
//!
//! A client-side page router. Path patterns map to templates; each navigation
//! runs the matched route's guards inside a reactive computation and commits
//! the chosen layout, template, nav key and page data to a reactive store that
//! the view layer renders from.
//!
//! ## Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use minipages_router::{MemoryHistory, RouteOptions, Router, RouterOptions, Templates};
//!
//! let history = Rc::new(MemoryHistory::new("/"));
//! let templates = Rc::new(
//!     Templates::new()
//!         .with("layout", |ctx| format!("<main>{}</main>", ctx.yield_content()))
//!         .with_static("home", "<h1>Home</h1>")
//!         .with_static("login", "<form/>")
//!         .with_static("dashboard", "<h1>Dashboard</h1>"),
//! );
//!
//! let router = Router::install(history.clone(), templates, RouterOptions::default())?;
//! router.register("/", "home")?;
//! router.register("/login", "login")?;
//! router.register(
//!     "/dashboard",
//!     RouteOptions::new().to("dashboard").nav("dashboard").before(|inv| {
//!         if inv.get("user").is_none() {
//!             inv.redirect("/login", serde_json::Value::Null);
//!         }
//!     }),
//! )?;
//! router.start();
//!
//! router.go("/dashboard", serde_json::Value::Null);
//! assert_eq!(router.path().as_deref(), Some("/login"));
//! ```

pub mod config;
pub mod error;
pub mod helpers;
pub mod history;
pub mod invocation;
pub mod pattern;
pub mod render;
pub mod route;
pub mod router;
pub mod table;
pub mod template;

pub use config::{LayoutSetting, RouteDefaults, RouterOptions, RouterSettings};
pub use error::{ConfigurationError, Error, MissingTemplateError, Result};
pub use helpers::{PathHelpers, RouterHelpers};
pub use history::{HistoryEntry, MemoryHistory, NavigationCallback, NavigationContext, Navigator};
pub use invocation::{Invocation, Selection};
pub use pattern::{Params, PathPattern};
pub use render::RenderedPage;
pub use route::{Guard, LayoutChoice, Route, RouteOptions, RouteSpec, guard};
pub use router::{RouteBuilder, Router};
pub use table::RouteTable;
pub use template::{PathHelperFn, RenderFn, TemplateContext, TemplateEngine, Templates, YIELD_MARKER};
