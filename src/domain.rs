//! Domain model for API specifications.
//!
//! This module contains the document graph (endpoints, parameters,
//! responses, schemas, components), the builders used to assemble it, and
//! the partial entities used to describe amendments.

/// Incremental, invariant-preserving builders.
pub mod builder;
pub use builder::{
    BuildError, DocumentBuilder, EndpointBuilder, ParameterBuilder, RequestBodyBuilder,
    ResponseBuilder, SchemaBuilder,
};

mod component;
pub use component::{Component, ComponentKind};

mod document;
pub use document::{Document, Frontmatter, Outcome, ParseError};

mod endpoint;
pub use endpoint::{
    Endpoint, EndpointKey, Header, InvalidLocationError, InvalidMethodError, Location, Method,
    Parameter, RequestBody, Response, path_template_names,
};

pub mod patch;
pub use patch::{EndpointPatch, ParameterPatch, ResponsePatch};

mod schema;
pub use schema::{InlineSchema, SCHEMA_REF_PREFIX, Schema};
