//! Error types for page routing.
//!
//! Configuration mistakes are reported synchronously while the router is being
//! set up. A layout or template that cannot be resolved is reported when a
//! page is rendered. A failed navigation is never an error: guards express
//! that by redirecting.

/// Fatal setup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
	/// A router is already installed on this thread.
	#[error("Only one instance of Router is allowed")]
	DuplicateRouter,
	/// A route targets a template that is not registered.
	#[error("template '{template}' for route '{pattern}' is not defined")]
	UndefinedTemplate {
		/// Path pattern of the offending route.
		pattern: String,
		/// Name of the missing template.
		template: String,
	},
	/// Two routes share a name.
	#[error("route name '{0}' is already registered")]
	DuplicateRouteName(String),
	/// Guards were added after the route was bound to the navigator.
	#[error("cannot add guards to route '{0}' after the router has started")]
	GuardsFrozen(String),
	/// An invocation was constructed without a navigation context.
	#[error("context is required")]
	MissingContext,
	/// A path pattern could not be compiled.
	#[error("invalid path pattern '{pattern}': {reason}")]
	InvalidPattern {
		/// The rejected pattern.
		pattern: String,
		/// Why it was rejected.
		reason: String,
	},
	/// Router settings could not be parsed.
	#[error("invalid router settings: {0}")]
	InvalidSettings(String),
}

/// A layout or template name did not resolve at render time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template '{name}' is not defined")]
pub struct MissingTemplateError {
	/// The unresolved template name.
	pub name: String,
}

impl MissingTemplateError {
	/// Create an error for `name`.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

/// Any error raised by the router.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// See [`ConfigurationError`].
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),
	/// See [`MissingTemplateError`].
	#[error(transparent)]
	MissingTemplate(#[from] MissingTemplateError),
}

/// Result alias for router operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(ConfigurationError::DuplicateRouter, "Only one instance of Router is allowed")]
	#[case(ConfigurationError::MissingContext, "context is required")]
	#[case(
		ConfigurationError::UndefinedTemplate { pattern: "/about".into(), template: "about".into() },
		"template 'about' for route '/about' is not defined"
	)]
	#[case(
		ConfigurationError::GuardsFrozen("home".into()),
		"cannot add guards to route 'home' after the router has started"
	)]
	fn test_configuration_error_messages(#[case] error: ConfigurationError, #[case] expected: &str) {
		assert_eq!(error.to_string(), expected);
	}

	#[rstest]
	fn test_error_is_transparent() {
		let error: Error = MissingTemplateError::new("layout").into();

		assert_eq!(error.to_string(), "template 'layout' is not defined");
		assert!(matches!(error, Error::MissingTemplate(_)));
	}
}
