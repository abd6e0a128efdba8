//! Router configuration.
//!
//! [`RouterOptions`] is what the router consumes. [`RouterSettings`] is the
//! serializable subset that can live in a TOML file:
//!
//! ```toml
//! auto_start = true
//! auto_render = false
//!
//! [defaults]
//! layout = "shell"   # or `false` to render pages without a layout
//! nav = "main"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::invocation::Invocation;
use crate::route::{Guard, LayoutChoice};

/// Defaults applied to every registered route.
#[derive(Clone, Default)]
pub struct RouteDefaults {
	/// Template for routes that do not name one.
	pub to: Option<String>,
	/// Layout for routes that do not choose one.
	pub layout: LayoutChoice,
	/// Nav key for routes that do not set one.
	pub nav: Option<String>,
	/// Guards run before each route's own guards.
	pub before: Vec<Guard>,
}

impl RouteDefaults {
	/// Append a guard run before every route's own guards.
	pub fn before<F>(mut self, f: F) -> Self
	where
		F: Fn(&mut Invocation) + 'static,
	{
		self.before.push(std::rc::Rc::new(f));
		self
	}
}

impl fmt::Debug for RouteDefaults {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteDefaults")
			.field("to", &self.to)
			.field("layout", &self.layout)
			.field("nav", &self.nav)
			.field("before", &self.before.len())
			.finish()
	}
}

/// Router behavior switches and route defaults.
#[derive(Debug, Clone)]
pub struct RouterOptions {
	/// Start the router as soon as routes are registered through
	/// `minipages::pages`.
	pub auto_start: bool,
	/// Render and mount the page when the router starts.
	pub auto_render: bool,
	/// Defaults applied to every route.
	pub defaults: RouteDefaults,
}

impl Default for RouterOptions {
	fn default() -> Self {
		Self {
			auto_start: true,
			auto_render: true,
			defaults: RouteDefaults::default(),
		}
	}
}

impl RouterOptions {
	/// Default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set [`RouterOptions::auto_start`].
	pub fn auto_start(mut self, enabled: bool) -> Self {
		self.auto_start = enabled;
		self
	}

	/// Set [`RouterOptions::auto_render`].
	pub fn auto_render(mut self, enabled: bool) -> Self {
		self.auto_render = enabled;
		self
	}

	/// Replace the route defaults.
	pub fn defaults(mut self, defaults: RouteDefaults) -> Self {
		self.defaults = defaults;
		self
	}
}

/// A layout setting: a template name, or a boolean (`false` suppresses,
/// `true` keeps the conventional default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutSetting {
	/// Use this template.
	Name(String),
	/// Enable or suppress the conventional layout.
	Enabled(bool),
}

impl From<LayoutSetting> for LayoutChoice {
	fn from(setting: LayoutSetting) -> Self {
		match setting {
			LayoutSetting::Name(name) => LayoutChoice::Named(name),
			LayoutSetting::Enabled(true) => LayoutChoice::Default,
			LayoutSetting::Enabled(false) => LayoutChoice::Suppressed,
		}
	}
}

/// Serializable route defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsSettings {
	/// Default template.
	pub to: Option<String>,
	/// Default layout.
	pub layout: Option<LayoutSetting>,
	/// Default nav key.
	pub nav: Option<String>,
}

/// Serializable router settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterSettings {
	/// See [`RouterOptions::auto_start`].
	pub auto_start: bool,
	/// See [`RouterOptions::auto_render`].
	pub auto_render: bool,
	/// Route defaults.
	pub defaults: DefaultsSettings,
}

impl Default for RouterSettings {
	fn default() -> Self {
		Self {
			auto_start: true,
			auto_render: true,
			defaults: DefaultsSettings::default(),
		}
	}
}

impl RouterSettings {
	/// Parse settings from TOML.
	///
	/// # Errors
	///
	/// [`ConfigurationError::InvalidSettings`] on malformed TOML or unknown keys.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigurationError> {
		toml::from_str(source).map_err(|e| ConfigurationError::InvalidSettings(e.to_string()))
	}

	/// Convert into options. Guards cannot be configured from a file.
	pub fn into_options(self) -> RouterOptions {
		RouterOptions {
			auto_start: self.auto_start,
			auto_render: self.auto_render,
			defaults: RouteDefaults {
				to: self.defaults.to,
				layout: self.defaults.layout.map(LayoutChoice::from).unwrap_or_default(),
				nav: self.defaults.nav,
				before: Vec::new(),
			},
		}
	}
}

impl From<RouterSettings> for RouterOptions {
	fn from(settings: RouterSettings) -> Self {
		settings.into_options()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let options = RouterOptions::default();

		assert!(options.auto_start);
		assert!(options.auto_render);
		assert_eq!(options.defaults.layout, LayoutChoice::Default);
		assert!(options.defaults.before.is_empty());
	}

	#[rstest]
	fn test_empty_toml_matches_defaults() {
		let settings = RouterSettings::from_toml_str("").unwrap();

		assert_eq!(settings, RouterSettings::default());
	}

	#[rstest]
	#[case("layout = \"shell\"", LayoutChoice::Named("shell".to_string()))]
	#[case("layout = false", LayoutChoice::Suppressed)]
	#[case("layout = true", LayoutChoice::Default)]
	#[case("nav = \"main\"", LayoutChoice::Default)]
	fn test_layout_setting(#[case] defaults: &str, #[case] expected: LayoutChoice) {
		// Arrange
		let source = format!("auto_render = false\n\n[defaults]\n{defaults}\n");

		// Act
		let options = RouterSettings::from_toml_str(&source).unwrap().into_options();

		// Assert
		assert!(options.auto_start);
		assert!(!options.auto_render);
		assert_eq!(options.defaults.layout, expected);
	}

	#[rstest]
	#[case("auto_start = \"yes\"")]
	#[case("unknown = 1")]
	#[case("[defaults]\nlayout = 3")]
	fn test_invalid_settings(#[case] source: &str) {
		let result = RouterSettings::from_toml_str(source);

		assert!(matches!(result, Err(ConfigurationError::InvalidSettings(_))));
	}
}
