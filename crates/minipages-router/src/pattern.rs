//! Path pattern matching.
//!
//! Patterns use the familiar client-router syntax:
//!
//! - `/posts` - exact match (case-insensitive, trailing slash optional)
//! - `/posts/:id` - named segment, excludes `/`
//! - `/posts/:id?` - optional named segment
//! - `*` - wildcard, matches anything including `/`; captures are named
//!   `"0"`, `"1"`, ... in pattern order
//!
//! Captured values are percent-decoded.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ConfigurationError;

/// Parameters captured from a path, keyed by name.
pub type Params = BTreeMap<String, String>;

/// Maximum allowed length for a pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a pattern.
const MAX_PATH_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	Literal(String),
	Param { name: String, optional: bool },
	Wildcard,
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
	pattern: String,
	tokens: Vec<Token>,
	regex: regex::Regex,
	/// Capture names in capture-group order.
	captures: Vec<String>,
}

impl PathPattern {
	/// Compile `pattern`.
	///
	/// # Errors
	///
	/// Returns [`ConfigurationError::InvalidPattern`] if the pattern is longer
	/// than 1024 bytes, has more than 32 segments, declares a parameter without
	/// a name, or does not compile.
	pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
		let invalid = |reason: String| ConfigurationError::InvalidPattern {
			pattern: pattern.to_string(),
			reason,
		};

		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(invalid(format!(
				"length {} exceeds maximum of {} bytes",
				pattern.len(),
				MAX_PATTERN_LENGTH
			)));
		}
		let segment_count = pattern.split('/').count();
		if segment_count > MAX_PATH_SEGMENTS {
			return Err(invalid(format!(
				"{} path segments exceed maximum of {}",
				segment_count, MAX_PATH_SEGMENTS
			)));
		}

		let tokens = tokenize(pattern).map_err(invalid)?;
		let (regex_str, captures) = compile(&tokens);
		let regex = regex::RegexBuilder::new(&regex_str)
			.case_insensitive(true)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| invalid(e.to_string()))?;

		Ok(Self {
			pattern: pattern.to_string(),
			tokens,
			regex,
			captures,
		})
	}

	/// The pattern as written.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Names of the pattern's parameters, wildcards included, in order.
	pub fn param_names(&self) -> &[String] {
		&self.captures
	}

	/// Whether the pattern contains a wildcard.
	pub fn is_catch_all(&self) -> bool {
		self.tokens.contains(&Token::Wildcard)
	}

	/// Match `path`, ignoring any query string or fragment.
	///
	/// Returns the captured parameters, or `None` when the path does not match.
	/// Optional parameters that are absent are left out of the map.
	pub fn matches(&self, path: &str) -> Option<Params> {
		let path = strip_query(path);
		let caps = self.regex.captures(path)?;

		let mut params = Params::new();
		for (index, name) in self.captures.iter().enumerate() {
			if let Some(value) = caps.get(index + 1) {
				let decoded = urlencoding::decode(value.as_str())
					.map(|decoded| decoded.into_owned())
					.unwrap_or_else(|_| value.as_str().to_string());
				params.insert(name.clone(), decoded);
			}
		}
		Some(params)
	}

	/// Build a concrete path by substituting each named parameter with the
	/// matching field of `context`.
	///
	/// This is best effort, not validation: a missing, `null` or `false` field
	/// becomes the empty string, so `/posts/:id/edit` with no context yields
	/// `/posts//edit`. Strings are used verbatim; other values use their JSON
	/// text. Wildcards are left as written.
	pub fn path_for_context(&self, context: &Value) -> String {
		let mut path = String::with_capacity(self.pattern.len());
		for token in &self.tokens {
			match token {
				Token::Literal(text) => path.push_str(text),
				Token::Wildcard => path.push('*'),
				Token::Param { name, .. } => path.push_str(&context_value(context, name)),
			}
		}
		path
	}
}

impl PartialEq for PathPattern {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl Eq for PathPattern {}

impl std::fmt::Display for PathPattern {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.pattern)
	}
}

/// Path without its `?query` and `#fragment`.
pub(crate) fn strip_query(path: &str) -> &str {
	let end = path.find(['?', '#']).unwrap_or(path.len());
	&path[..end]
}

fn context_value(context: &Value, name: &str) -> String {
	match context.get(name) {
		None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
	}
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, String> {
	let mut tokens = Vec::new();
	let mut literal = String::new();
	let mut chars = pattern.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			':' => {
				let mut name = String::new();
				while let Some(&next) = chars.peek() {
					if next.is_alphanumeric() || next == '_' {
						name.push(next);
						chars.next();
					} else {
						break;
					}
				}
				if name.is_empty() {
					return Err("parameter without a name".to_string());
				}
				let optional = chars.next_if_eq(&'?').is_some();
				if !literal.is_empty() {
					tokens.push(Token::Literal(std::mem::take(&mut literal)));
				}
				tokens.push(Token::Param { name, optional });
			}
			'*' => {
				if !literal.is_empty() {
					tokens.push(Token::Literal(std::mem::take(&mut literal)));
				}
				tokens.push(Token::Wildcard);
			}
			_ => literal.push(c),
		}
	}
	if !literal.is_empty() {
		tokens.push(Token::Literal(literal));
	}
	Ok(tokens)
}

fn compile(tokens: &[Token]) -> (String, Vec<String>) {
	let mut regex_str = String::from("^");
	let mut captures = Vec::new();
	let mut wildcards = 0;

	for (index, token) in tokens.iter().enumerate() {
		match token {
			Token::Literal(text) => {
				// a slash owned by an optional segment is emitted with the segment
				let text = match tokens.get(index + 1) {
					Some(Token::Param { optional: true, .. }) => {
						text.strip_suffix('/').unwrap_or(text)
					}
					_ => text.as_str(),
				};
				regex_str.push_str(&regex::escape(text));
			}
			Token::Param { name, optional } => {
				let after_slash = index > 0
					&& matches!(&tokens[index - 1], Token::Literal(text) if text.ends_with('/'));
				match (optional, after_slash) {
					(true, true) => regex_str.push_str("(?:/([^/]+?))?"),
					(true, false) => regex_str.push_str("([^/]+?)?"),
					(false, _) => regex_str.push_str("([^/]+?)"),
				}
				captures.push(name.clone());
			}
			Token::Wildcard => {
				regex_str.push_str("(.*)");
				captures.push(wildcards.to_string());
				wildcards += 1;
			}
		}
	}

	regex_str.push_str("/?$");
	(regex_str, captures)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn params(pairs: &[(&str, &str)]) -> Params {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[rstest]
	#[case("/", "/", Some(params(&[])))]
	#[case("/home", "/home", Some(params(&[])))]
	#[case("/home", "/HOME/", Some(params(&[])))]
	#[case("/home", "/home?tab=1#top", Some(params(&[])))]
	#[case("/home", "/homer", None)]
	#[case("/posts/:_id", "/posts/42", Some(params(&[("_id", "42")])))]
	#[case("/posts/:_id", "/posts/", None)]
	#[case("/posts/:_id/edit", "/posts/a%20b/edit", Some(params(&[("_id", "a b")])))]
	#[case("/posts/:_id?", "/posts", Some(params(&[])))]
	#[case("/posts/:_id?", "/posts/7", Some(params(&[("_id", "7")])))]
	#[case("/files/*", "/files/a/b/c", Some(params(&[("0", "a/b/c")])))]
	#[case("*", "/anything/at/all", Some(params(&[("0", "/anything/at/all")])))]
	fn test_matches(
		#[case] pattern: &str,
		#[case] path: &str,
		#[case] expected: Option<Params>,
	) {
		// Arrange
		let pattern = PathPattern::new(pattern).unwrap();

		// Act
		let result = pattern.matches(path);

		// Assert
		assert_eq!(result, expected);
	}

	#[rstest]
	#[case("/posts/:_id/edit", json!({"_id": 1}), "/posts/1/edit")]
	#[case("/posts/:_id/edit", json!({"_id": "abc"}), "/posts/abc/edit")]
	#[case("/posts/:_id/edit", json!({}), "/posts//edit")]
	#[case("/posts/:_id/edit", Value::Null, "/posts//edit")]
	#[case("/posts/:_id/edit", json!({"_id": null}), "/posts//edit")]
	#[case("/posts/:_id/edit", json!({"_id": false}), "/posts//edit")]
	#[case("/posts/:_id/edit", json!({"_id": 0}), "/posts/0/edit")]
	#[case("/users/:user/posts/:post?", json!({"user": "ann", "post": 3}), "/users/ann/posts/3")]
	#[case("/home", json!({"_id": 1}), "/home")]
	#[case("/home", Value::Null, "/home")]
	fn test_path_for_context(
		#[case] pattern: &str,
		#[case] context: Value,
		#[case] expected: &str,
	) {
		let pattern = PathPattern::new(pattern).unwrap();

		assert_eq!(pattern.path_for_context(&context), expected);
	}

	#[rstest]
	fn test_param_names_in_order() {
		let pattern = PathPattern::new("/a/:first/*/:second?").unwrap();

		assert_eq!(pattern.param_names(), &["first", "0", "second"]);
		assert!(pattern.is_catch_all());
	}

	#[rstest]
	#[case("/posts/:/edit")]
	#[case(&"a".repeat(1025))]
	#[case(&"/a".repeat(40))]
	fn test_rejects_invalid_patterns(#[case] pattern: &str) {
		let result = PathPattern::new(pattern);

		assert!(matches!(
			result,
			Err(ConfigurationError::InvalidPattern { .. })
		));
	}

	#[rstest]
	fn test_literal_metacharacters_are_escaped() {
		let pattern = PathPattern::new("/docs/v1.0").unwrap();

		assert!(pattern.matches("/docs/v1.0").is_some());
		assert!(pattern.matches("/docs/v1x0").is_none());
	}
}
