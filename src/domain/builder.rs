//! Incremental builders for the document model.
//!
//! Every builder starts from a valid, fully initialised value. Adding a child
//! with an empty name, or a `None` child, leaves the builder untouched, so
//! optional fields can be passed straight through. `build` borrows the
//! builder and can be called any number of times.

use std::collections::BTreeMap;

use chrono::Utc;
use non_empty_string::NonEmptyString;
use serde_json::Value;

use super::{
    Component, ComponentKind, Document, Endpoint, Frontmatter, Header, InlineSchema, Location,
    Method, Parameter, ParseError, RequestBody, Response, Schema, patch::reason_phrase,
};

/// Errors raised when a builder cannot produce a valid value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// An identifying field was empty.
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
    /// A schema was given both a reference and inline fields.
    #[error("schema reference '{0}' cannot be combined with inline fields")]
    MixedReference(String),
}

fn identifier(value: impl Into<String>, what: &'static str) -> Result<NonEmptyString, BuildError> {
    let value = value.into().trim().to_string();
    NonEmptyString::new(value).map_err(|_| BuildError::EmptyIdentifier(what))
}

/// Builds a [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    reference: Option<String>,
    inline: InlineSchema,
}

impl SchemaBuilder {
    /// An empty inline schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An inline schema of type `object`.
    #[must_use]
    pub fn object() -> Self {
        let mut builder = Self::new();
        builder.ty("object");
        builder
    }

    /// Sets the type.
    pub fn ty(&mut self, ty: &str) -> &mut Self {
        if !ty.is_empty() {
            self.inline.ty = Some(ty.to_string());
        }
        self
    }

    /// Sets the format.
    pub fn format(&mut self, format: &str) -> &mut Self {
        if !format.is_empty() {
            self.inline.format = Some(format.to_string());
        }
        self
    }

    /// Sets the description.
    pub fn description(&mut self, description: &str) -> &mut Self {
        if !description.is_empty() {
            self.inline.description = Some(description.to_string());
        }
        self
    }

    /// Sets the example.
    pub fn example(&mut self, example: impl Into<Option<Value>>) -> &mut Self {
        if let Some(example) = example.into() {
            self.inline.example = Some(example);
        }
        self
    }

    /// Adds a property.
    pub fn property(&mut self, name: &str, schema: impl Into<Option<Schema>>) -> &mut Self {
        if let Some(schema) = schema.into() {
            if !name.is_empty() {
                self.inline.properties.insert(name.to_string(), schema);
            }
        }
        self
    }

    /// Marks a property as required.
    pub fn required(&mut self, name: &str) -> &mut Self {
        if !name.is_empty() && !self.inline.required.iter().any(|r| r == name) {
            self.inline.required.push(name.to_string());
        }
        self
    }

    /// Sets the schema of array items.
    pub fn items(&mut self, items: impl Into<Option<Schema>>) -> &mut Self {
        if let Some(items) = items.into() {
            self.inline.items = Some(Box::new(items));
        }
        self
    }

    /// Adds an allowed value.
    pub fn enum_value(&mut self, value: Value) -> &mut Self {
        if !self.inline.enumeration.contains(&value) {
            self.inline.enumeration.push(value);
        }
        self
    }

    /// Turns the schema into a reference to the named component.
    pub fn reference(&mut self, target: &str) -> &mut Self {
        if !target.is_empty() {
            self.reference = Schema::reference(target).reference_name().map(str::to_string);
        }
        self
    }

    /// Builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MixedReference`] if a reference was combined
    /// with inline fields.
    pub fn build(&self) -> Result<Schema, BuildError> {
        match &self.reference {
            Some(name) if self.inline != InlineSchema::default() => {
                Err(BuildError::MixedReference(name.clone()))
            }
            Some(name) => Ok(Schema::Reference(name.clone())),
            None => Ok(Schema::Inline(self.inline.clone())),
        }
    }
}

/// Builds a [`Parameter`].
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    name: NonEmptyString,
    parameter: Parameter,
}

impl ParameterBuilder {
    /// Starts a parameter with the given identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty.
    pub fn new(name: impl Into<String>, location: Location) -> Result<Self, BuildError> {
        let name = identifier(name, "parameter name")?;
        Ok(Self {
            parameter: Parameter {
                name: name.as_str().to_string(),
                location,
                ty: "string".to_string(),
                required: location == Location::Path,
                description: String::new(),
                example: None,
                schema: None,
                line: 0,
            },
            name,
        })
    }

    /// Sets the primitive type.
    pub fn ty(&mut self, ty: &str) -> &mut Self {
        if !ty.is_empty() {
            self.parameter.ty = ty.to_string();
        }
        self
    }

    /// Sets the required flag. Path parameters stay required.
    pub fn required(&mut self, required: bool) -> &mut Self {
        self.parameter.required = required || self.parameter.location == Location::Path;
        self
    }

    /// Sets the description.
    pub fn description(&mut self, description: &str) -> &mut Self {
        self.parameter.description = description.to_string();
        self
    }

    /// Sets the example.
    pub fn example(&mut self, example: impl Into<Option<Value>>) -> &mut Self {
        if let Some(example) = example.into() {
            self.parameter.example = Some(example);
        }
        self
    }

    /// Sets the full schema.
    pub fn schema(&mut self, schema: impl Into<Option<Schema>>) -> &mut Self {
        if let Some(schema) = schema.into() {
            self.parameter.schema = Some(schema);
        }
        self
    }

    /// Sets the source line.
    pub const fn line(&mut self, line: usize) -> &mut Self {
        self.parameter.line = line;
        self
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Builds the parameter.
    #[must_use]
    pub fn build(&self) -> Parameter {
        self.parameter.clone()
    }
}

/// Builds a [`RequestBody`].
#[derive(Debug, Clone, Default)]
pub struct RequestBodyBuilder {
    body: RequestBody,
}

impl RequestBodyBuilder {
    /// An empty, optional request body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    pub fn description(&mut self, description: &str) -> &mut Self {
        self.body.description = description.to_string();
        self
    }

    /// Sets the required flag.
    pub const fn required(&mut self, required: bool) -> &mut Self {
        self.body.required = required;
        self
    }

    /// Adds a schema for a media type.
    pub fn content(&mut self, media_type: &str, schema: impl Into<Option<Schema>>) -> &mut Self {
        if let Some(schema) = schema.into() {
            if !media_type.is_empty() {
                self.body.content.insert(media_type.to_string(), schema);
            }
        }
        self
    }

    /// Builds the request body.
    #[must_use]
    pub fn build(&self) -> RequestBody {
        self.body.clone()
    }
}

/// Builds a [`Response`].
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    /// Starts a response for the given status code.
    ///
    /// The description defaults to the reason phrase of the status code.
    ///
    /// # Errors
    ///
    /// Returns an error if the status code is empty.
    pub fn new(status: impl Into<String>) -> Result<Self, BuildError> {
        let status = identifier(status, "response status")?;
        Ok(Self {
            response: Response {
                description: reason_phrase(status.as_str()).to_string(),
                status: status.as_str().to_string(),
                headers: BTreeMap::new(),
                content: BTreeMap::new(),
                line: 0,
            },
        })
    }

    /// Sets the description. An empty description keeps the default.
    pub fn description(&mut self, description: &str) -> &mut Self {
        if !description.is_empty() {
            self.response.description = description.to_string();
        }
        self
    }

    /// Adds a header.
    pub fn header(&mut self, name: &str, header: impl Into<Option<Header>>) -> &mut Self {
        if let Some(header) = header.into() {
            if !name.is_empty() {
                self.response.headers.insert(name.to_string(), header);
            }
        }
        self
    }

    /// Adds a schema for a media type.
    pub fn content(&mut self, media_type: &str, schema: impl Into<Option<Schema>>) -> &mut Self {
        if let Some(schema) = schema.into() {
            if !media_type.is_empty() {
                self.response.content.insert(media_type.to_string(), schema);
            }
        }
        self
    }

    /// Sets the source line.
    pub const fn line(&mut self, line: usize) -> &mut Self {
        self.response.line = line;
        self
    }

    /// Builds the response.
    #[must_use]
    pub fn build(&self) -> Response {
        self.response.clone()
    }
}

/// Builds an [`Endpoint`].
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    endpoint: Endpoint,
}

impl EndpointBuilder {
    /// Starts an endpoint with the given identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty.
    pub fn new(method: Method, path: impl Into<String>) -> Result<Self, BuildError> {
        let path = identifier(path, "endpoint path")?;
        Ok(Self {
            endpoint: Endpoint {
                method,
                path: path.as_str().to_string(),
                summary: String::new(),
                description: String::new(),
                parameters: Vec::new(),
                request_body: None,
                responses: Vec::new(),
                tags: Vec::new(),
                line: 0,
            },
        })
    }

    /// Sets the summary.
    pub fn summary(&mut self, summary: &str) -> &mut Self {
        self.endpoint.summary = summary.to_string();
        self
    }

    /// Sets the description.
    pub fn description(&mut self, description: &str) -> &mut Self {
        self.endpoint.description = description.to_string();
        self
    }

    /// Appends a parameter.
    pub fn parameter(&mut self, parameter: impl Into<Option<Parameter>>) -> &mut Self {
        if let Some(parameter) = parameter.into() {
            if !parameter.name.is_empty() {
                self.endpoint.parameters.push(parameter);
            }
        }
        self
    }

    /// Sets the request body.
    pub fn request_body(&mut self, body: impl Into<Option<RequestBody>>) -> &mut Self {
        if let Some(body) = body.into() {
            self.endpoint.request_body = Some(body);
        }
        self
    }

    /// Appends a response.
    pub fn response(&mut self, response: impl Into<Option<Response>>) -> &mut Self {
        if let Some(response) = response.into() {
            if !response.status.is_empty() {
                self.endpoint.responses.push(response);
            }
        }
        self
    }

    /// Adds a tag, unless empty or already present.
    pub fn tag(&mut self, tag: &str) -> &mut Self {
        let tag = tag.trim();
        if !tag.is_empty() && !self.endpoint.tags.iter().any(|t| t == tag) {
            self.endpoint.tags.push(tag.to_string());
        }
        self
    }

    /// Sets the source line.
    pub const fn line(&mut self, line: usize) -> &mut Self {
        self.endpoint.line = line;
        self
    }

    /// Builds the endpoint.
    #[must_use]
    pub fn build(&self) -> Endpoint {
        self.endpoint.clone()
    }
}

/// Builds a [`Document`], accumulating errors alongside its content.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    frontmatter: Option<Frontmatter>,
    endpoints: Vec<Endpoint>,
    components: Vec<Component>,
    errors: Vec<ParseError>,
}

impl DocumentBuilder {
    /// An empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the frontmatter.
    pub fn frontmatter(&mut self, frontmatter: impl Into<Option<Frontmatter>>) -> &mut Self {
        if let Some(frontmatter) = frontmatter.into() {
            self.frontmatter = Some(frontmatter);
        }
        self
    }

    /// The frontmatter set so far, for in-place edits.
    pub fn frontmatter_mut(&mut self) -> &mut Frontmatter {
        self.frontmatter.get_or_insert_with(Frontmatter::default)
    }

    /// Appends an endpoint.
    pub fn endpoint(&mut self, endpoint: impl Into<Option<Endpoint>>) -> &mut Self {
        if let Some(endpoint) = endpoint.into() {
            if !endpoint.path.is_empty() {
                self.endpoints.push(endpoint);
            }
        }
        self
    }

    /// Appends a component.
    pub fn component(&mut self, component: impl Into<Option<Component>>) -> &mut Self {
        if let Some(component) = component.into() {
            if !component.name.is_empty() {
                self.components.push(component);
            }
        }
        self
    }

    /// Records an error.
    pub fn add_error(&mut self, error: ParseError) -> &mut Self {
        self.errors.push(error);
        self
    }

    /// Records several errors, in order.
    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ParseError>) -> &mut Self {
        self.errors.extend(errors);
        self
    }

    /// Whether any error has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether a fatal error has been recorded.
    #[must_use]
    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    /// Builds the document.
    #[must_use]
    pub fn build(&self) -> Document {
        Document {
            frontmatter: self.frontmatter.clone(),
            endpoints: self.endpoints.clone(),
            components: self.components.clone(),
            errors: self.errors.clone(),
            created: Utc::now(),
        }
    }
}

/// Creates a component.
///
/// # Errors
///
/// Returns an error if the name is empty.
pub fn component(
    name: impl Into<String>,
    kind: ComponentKind,
    line: usize,
) -> Result<Component, BuildError> {
    let name = identifier(name, "component name")?;
    Ok(Component {
        name: name.as_str().to_string(),
        kind,
        line,
    })
}
