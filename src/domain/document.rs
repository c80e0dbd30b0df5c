use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Component, Endpoint, EndpointKey};

/// Document level metadata, usually supplied as YAML frontmatter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// API description.
    pub description: String,
    /// Any further keys, kept verbatim.
    pub metadata: BTreeMap<String, Value>,
}

/// A problem found while reading a document.
///
/// Fatal errors stopped construction of the enclosing node; recoverable
/// errors did not, and are reported to callers as warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based byte column within the line.
    pub column: usize,
    /// Whether parsing stopped here.
    pub fatal: bool,
    /// The offending source text, when available.
    pub context: Option<String>,
}

impl ParseError {
    /// A recoverable error at the given position.
    #[must_use]
    pub fn recoverable(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            fatal: false,
            context: None,
        }
    }

    /// A fatal error at the given position.
    #[must_use]
    pub fn fatal(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            fatal: true,
            ..Self::recoverable(message, line, column)
        }
    }

    /// Attaches the surrounding source text.
    #[must_use]
    pub fn with_context(mut self, context: &str) -> Self {
        let context = context.trim();
        if !context.is_empty() {
            self.context = Some(context.to_string());
        }
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)?;
        if let Some(context) = &self.context {
            write!(f, " (near `{context}`)")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// A best-effort value together with the diagnostics produced while
/// building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    /// The (possibly partial) value.
    pub value: T,
    /// Diagnostics in the order they were found.
    pub diagnostics: Vec<ParseError>,
}

impl<T> Outcome<T> {
    /// Wraps a value with its diagnostics.
    #[must_use]
    pub const fn new(value: T, diagnostics: Vec<ParseError>) -> Self {
        Self { value, diagnostics }
    }

    /// Whether any diagnostic was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Whether a fatal diagnostic was recorded.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(|e| e.fatal)
    }

    /// Splits into the value and its recoverable diagnostics, or returns
    /// every diagnostic if any of them was fatal.
    ///
    /// # Errors
    ///
    /// Returns all diagnostics when at least one is fatal.
    pub fn into_result(self) -> Result<(T, Vec<ParseError>), Vec<ParseError>> {
        if self.is_fatal() {
            Err(self.diagnostics)
        } else {
            Ok((self.value, self.diagnostics))
        }
    }
}

/// An in-memory API specification.
///
/// Documents are read-only to callers; they are produced by the parser,
/// the OpenAPI loader, the amendment engine or a
/// [`DocumentBuilder`](super::DocumentBuilder).
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) frontmatter: Option<Frontmatter>,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) components: Vec<Component>,
    pub(crate) errors: Vec<ParseError>,
    pub(crate) created: DateTime<Utc>,
}

impl Document {
    /// Document level metadata.
    #[must_use]
    pub const fn frontmatter(&self) -> Option<&Frontmatter> {
        self.frontmatter.as_ref()
    }

    /// Endpoints in source order.
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Components in source order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Every error found while reading the document, in traversal order.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// When this document value was created.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Whether any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether a fatal error was recorded.
    #[must_use]
    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    /// Finds every endpoint with the given identity.
    #[must_use]
    pub fn find_endpoints(&self, key: &EndpointKey) -> Vec<&Endpoint> {
        self.endpoints.iter().filter(|e| e.is(key)).collect()
    }

    /// Finds a component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// The document title, or an empty string.
    #[must_use]
    pub fn title(&self) -> &str {
        self.frontmatter.as_ref().map_or("", |f| f.title.as_str())
    }

    /// Whether two documents have the same structure and errors.
    ///
    /// The creation timestamp is ignored.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.frontmatter == other.frontmatter
            && self.endpoints == other.endpoints
            && self.components == other.components
            && self.errors == other.errors
    }

    /// A copy of this document with a fresh timestamp.
    #[must_use]
    pub(crate) fn revision(&self) -> Self {
        Self {
            created: Utc::now(),
            ..self.clone()
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_with_fatal_error_is_err() {
        let outcome = Outcome::new(
            (),
            vec![
                ParseError::recoverable("minor", 1, 1),
                ParseError::fatal("major", 2, 1),
            ],
        );
        assert!(outcome.is_fatal());
        assert_eq!(outcome.into_result().unwrap_err().len(), 2);
    }

    #[test]
    fn outcome_with_recoverable_errors_is_ok() {
        let outcome = Outcome::new(7, vec![ParseError::recoverable("minor", 1, 1)]);
        let (value, warnings) = outcome.into_result().unwrap();
        assert_eq!(value, 7);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn parse_error_display_includes_context() {
        let error = ParseError::recoverable("bad heading", 3, 4).with_context("## FETCH /x  ");
        assert_eq!(error.to_string(), "3:4: bad heading (near `## FETCH /x`)");
        assert!(ParseError::recoverable("x", 1, 1).with_context("   ").context.is_none());
    }
}
