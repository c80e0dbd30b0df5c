use std::fmt;

use super::{Parameter, Response, Schema};

/// A named, reusable definition registered at document scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Unique component name.
    pub name: String,
    /// The definition.
    pub kind: ComponentKind,
    /// 1-based source line, or 0 when not parsed from text.
    pub line: usize,
}

/// The definition held by a [`Component`].
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    /// A reusable schema.
    Schema(Schema),
    /// A reusable parameter.
    Parameter(Parameter),
    /// A reusable response.
    Response(Response),
}

impl ComponentKind {
    /// The section name this kind is registered under.
    #[must_use]
    pub const fn section(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schemas",
            Self::Parameter(_) => "parameters",
            Self::Response(_) => "responses",
        }
    }

    /// The schema, if this is a schema component.
    #[must_use]
    pub const fn as_schema(&self) -> Option<&Schema> {
        match self {
            Self::Schema(schema) => Some(schema),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(schema) => write!(f, "schema {}", schema.summary()),
            Self::Parameter(parameter) => write!(f, "parameter {}", parameter.identity()),
            Self::Response(response) => write!(f, "response {}", response.status),
        }
    }
}
