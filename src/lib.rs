//! Markdown to OpenAPI conversion and amendment
//!
//! API descriptions are written in a constrained Markdown dialect and parsed
//! into a [`Document`]. Existing documents can be amended with a change
//! description; conflicts are reported rather than silently overwritten.

pub mod domain;
pub use domain::{Component, Document, Endpoint, Outcome, ParseError, Schema};

/// Markdown parsing.
pub mod parser;
pub use parser::parse;

/// Merging change descriptions into existing documents.
pub mod amend;
pub use amend::{AmendError, AmendOptions, Amender, AmendmentResult, ChangeSet, ConflictPolicy};

/// OpenAPI serialization and loading.
pub mod openapi;
pub use openapi::{Format, SourceFormat};

pub mod config;
pub use config::Config;

pub mod diff;
pub mod validate;
