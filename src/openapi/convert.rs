//! Conversion from OpenAPI objects into the document model.
//!
//! Problems that only affect part of an object are pushed onto an `issues`
//! list, prefixed with a JSON pointer to the offending node, and the rest of
//! the object is kept.

use std::{fmt, str::FromStr};

use serde::de::DeserializeOwned;

use super::wire::{HeaderObject, MediaTypeObject, ParameterObject, ResponseObject, SchemaObject};
use crate::domain::{
    ComponentKind, Header, Location, Parameter, ParameterBuilder, Response, ResponseBuilder,
    Schema, SchemaBuilder,
};

/// The kind of a component definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefinitionKind {
    /// A schema.
    #[default]
    Schema,
    /// A parameter.
    Parameter,
    /// A response.
    Response,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Schema => "schema",
            Self::Parameter => "parameter",
            Self::Response => "response",
        })
    }
}

impl FromStr for DefinitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schema" | "schemas" => Ok(Self::Schema),
            "parameter" | "parameters" => Ok(Self::Parameter),
            "response" | "responses" => Ok(Self::Response),
            other => Err(format!(
                "unknown component kind '{other}' (expected schema, parameter or response)"
            )),
        }
    }
}

/// Converts a schema object.
///
/// A `$ref` combined with inline fields is reported and the reference wins.
pub fn schema_from_object(object: &SchemaObject, pointer: &str, issues: &mut Vec<String>) -> Schema {
    let mut builder = SchemaBuilder::new();
    builder
        .ty(object.ty.as_deref().unwrap_or_default())
        .format(object.format.as_deref().unwrap_or_default())
        .description(object.description.as_deref().unwrap_or_default())
        .example(object.example.clone());
    for (name, property) in &object.properties {
        let pointer = format!("{pointer}/properties/{name}");
        builder.property(name, schema_from_object(property, &pointer, issues));
    }
    for name in &object.required {
        builder.required(name);
    }
    builder.items(
        object
            .items
            .as_deref()
            .map(|items| schema_from_object(items, &format!("{pointer}/items"), issues)),
    );
    for value in &object.enumeration {
        builder.enum_value(value.clone());
    }
    if let Some(reference) = &object.reference {
        builder.reference(reference);
    }

    builder.build().unwrap_or_else(|error| {
        issues.push(format!("{pointer}: {error}"));
        Schema::reference(object.reference.as_deref().unwrap_or_default())
    })
}

/// Converts a parameter object. Returns `None` if it has no usable identity.
pub fn parameter_from_object(
    object: &ParameterObject,
    pointer: &str,
    issues: &mut Vec<String>,
) -> Option<Parameter> {
    let location = match object.location.parse::<Location>() {
        Ok(location) => location,
        Err(error) => {
            issues.push(format!("{pointer}: {error}"));
            return None;
        }
    };
    let mut builder = match ParameterBuilder::new(object.name.as_str(), location) {
        Ok(builder) => builder,
        Err(error) => {
            issues.push(format!("{pointer}: {error}"));
            return None;
        }
    };

    builder
        .required(object.required)
        .description(&object.description)
        .example(object.example.clone());
    if let Some(schema) = &object.schema {
        let schema = schema_from_object(schema, &format!("{pointer}/schema"), issues);
        match primitive_type(&schema) {
            Some(ty) => {
                builder.ty(ty);
            }
            None => {
                if let Some(ty) = schema.as_inline().and_then(|s| s.ty.as_deref()) {
                    builder.ty(ty);
                }
                builder.schema(schema);
            }
        }
    }
    Some(builder.build())
}

/// The type of a schema that carries nothing but a type.
fn primitive_type(schema: &Schema) -> Option<&str> {
    let inline = schema.as_inline()?;
    let bare = inline.format.is_none()
        && inline.description.is_none()
        && inline.example.is_none()
        && inline.properties.is_empty()
        && inline.items.is_none()
        && inline.enumeration.is_empty();
    if bare { inline.ty.as_deref() } else { None }
}

/// Converts a response object. Returns `None` if the status is empty.
pub fn response_from_object(
    status: &str,
    object: &ResponseObject,
    pointer: &str,
    issues: &mut Vec<String>,
) -> Option<Response> {
    let mut builder = match ResponseBuilder::new(status) {
        Ok(builder) => builder,
        Err(error) => {
            issues.push(format!("{pointer}: {error}"));
            return None;
        }
    };
    if !object.description.trim().is_empty() {
        builder.description(object.description.trim());
    }
    for (name, header) in &object.headers {
        builder.header(name, header_from_object(header, &format!("{pointer}/headers/{name}"), issues));
    }
    for (media, content) in &object.content {
        builder.content(
            media,
            content_schema(content, &format!("{pointer}/content/{media}"), issues),
        );
    }
    Some(builder.build())
}

fn header_from_object(object: &HeaderObject, pointer: &str, issues: &mut Vec<String>) -> Header {
    Header {
        description: object.description.clone(),
        schema: object
            .schema
            .as_ref()
            .map(|schema| schema_from_object(schema, &format!("{pointer}/schema"), issues)),
    }
}

/// The schema of a media type, with a media-level example folded in.
pub(super) fn content_schema(
    content: &MediaTypeObject,
    pointer: &str,
    issues: &mut Vec<String>,
) -> Option<Schema> {
    let mut schema = content
        .schema
        .as_ref()
        .map(|schema| schema_from_object(schema, &format!("{pointer}/schema"), issues));
    if let Some(example) = &content.example {
        match &mut schema {
            Some(Schema::Inline(inline)) if inline.example.is_none() => {
                inline.example = Some(example.clone());
            }
            None => {
                let mut builder = SchemaBuilder::new();
                builder.example(example.clone());
                schema = builder.build().ok();
            }
            _ => {}
        }
    }
    schema
}

/// Parses the body of a fenced component definition.
///
/// `info` selects JSON (`json`) or YAML (anything else, which also accepts
/// JSON). Returns the definition and any partial problems, or an error
/// message if the definition is unusable.
///
/// # Errors
///
/// Returns a message if the text does not parse as the requested object, or
/// the object has no usable identity.
pub fn parse_definition(
    kind: DefinitionKind,
    name: &str,
    info: &str,
    body: &str,
) -> Result<(ComponentKind, Vec<String>), String> {
    let mut issues = Vec::new();
    let pointer = format!("#/components/{kind}s/{name}");
    let definition = match kind {
        DefinitionKind::Schema => {
            let object: SchemaObject = from_text(info, body)?;
            ComponentKind::Schema(schema_from_object(&object, &pointer, &mut issues))
        }
        DefinitionKind::Parameter => {
            let mut object: ParameterObject = from_text(info, body)?;
            if object.name.trim().is_empty() {
                object.name = name.to_string();
            }
            if object.location.trim().is_empty() {
                object.location = Location::Query.to_string();
            }
            parameter_from_object(&object, &pointer, &mut issues)
                .map(ComponentKind::Parameter)
                .ok_or_else(|| issues.join("; "))?
        }
        DefinitionKind::Response => {
            let object: ResponseObject = from_text(info, body)?;
            response_from_object(name, &object, &pointer, &mut issues)
                .map(ComponentKind::Response)
                .ok_or_else(|| issues.join("; "))?
        }
    };
    Ok((definition, issues))
}

fn from_text<T: DeserializeOwned>(info: &str, body: &str) -> Result<T, String> {
    let language = info.split_whitespace().next().unwrap_or_default();
    if body.trim().is_empty() {
        return Err("component definition is empty".to_string());
    }
    if language.eq_ignore_ascii_case("json") {
        serde_json::from_str(body).map_err(|error| format!("invalid JSON definition: {error}"))
    } else {
        serde_yaml::from_str(body).map_err(|error| format!("invalid YAML definition: {error}"))
    }
}
