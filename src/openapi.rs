use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::ParseError;

mod convert;
pub use convert::{
    DefinitionKind, parameter_from_object, parse_definition, response_from_object,
    schema_from_object,
};

mod load;
pub use load::load;

mod render;
pub use render::{render, to_openapi};

pub mod wire;

/// An output serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// YAML.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// The lowercase name of the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = SerializeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(SerializeError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// The syntax of a specification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// The Markdown dialect.
    Markdown,
    /// OpenAPI as YAML.
    Yaml,
    /// OpenAPI as JSON.
    Json,
}

impl SourceFormat {
    /// Guesses the syntax of `text`.
    ///
    /// JSON starts with `{`. YAML has a top-level `openapi:` or `swagger:`
    /// key. Everything else is Markdown.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') {
            return Self::Json;
        }
        let is_openapi = text.lines().any(|line| {
            line.starts_with("openapi:") || line.starts_with("swagger:")
        });
        if is_openapi { Self::Yaml } else { Self::Markdown }
    }
}

/// Errors raised while rendering a document.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The requested format is not supported.
    #[error("unsupported output format '{0}' (expected yaml or json)")]
    UnsupportedFormat(String),
    /// YAML encoding failed.
    #[error("failed to write YAML")]
    Yaml(#[from] serde_yaml::Error),
    /// JSON encoding failed.
    #[error("failed to write JSON")]
    Json(#[from] serde_json::Error),
}

/// Errors raised when an OpenAPI source cannot be read at all.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The source is not valid YAML, or not shaped like OpenAPI.
    #[error("invalid OpenAPI YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The source is not valid JSON, or not shaped like OpenAPI.
    #[error("invalid OpenAPI JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoadError {
    /// The 1-based line and column of the error, where known.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        match self {
            Self::Yaml(error) => error
                .location()
                .map_or((1, 1), |location| (location.line(), location.column())),
            Self::Json(error) => (error.line().max(1), error.column().max(1)),
        }
    }
}

impl From<LoadError> for ParseError {
    fn from(error: LoadError) -> Self {
        let (line, column) = error.position();
        Self::fatal(error.to_string(), line, column)
    }
}
