//! Partial entities.
//!
//! A patch carries only the fields that were actually written down. The
//! parser turns patches into full entities by filling in defaults; the
//! amendment engine overlays them onto existing entities.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{
    BuildError, Endpoint, EndpointBuilder, Header, Location, Method, Parameter, ParameterBuilder,
    RequestBody, Response, ResponseBuilder, Schema,
};

/// Fields of a parameter as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPatch {
    /// Parameter name.
    pub name: String,
    /// Parameter location.
    pub location: Location,
    /// Primitive type, if given.
    pub ty: Option<String>,
    /// Required flag, if given explicitly.
    pub required: Option<bool>,
    /// Description, if given.
    pub description: Option<String>,
    /// Example, if given.
    pub example: Option<Value>,
    /// Full schema, if given.
    pub schema: Option<Schema>,
    /// 1-based source line.
    pub line: usize,
}

impl ParameterPatch {
    /// An empty patch for the given identity.
    #[must_use]
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
            ty: None,
            required: None,
            description: None,
            example: None,
            schema: None,
            line: 0,
        }
    }

    /// Builds the full parameter, filling defaults for missing fields.
    ///
    /// Path parameters are always required.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty.
    pub fn into_parameter(self) -> Result<Parameter, BuildError> {
        let mut builder = ParameterBuilder::new(self.name, self.location)?;
        builder
            .ty(self.ty.as_deref().unwrap_or_default())
            .required(self.required.unwrap_or(false))
            .description(self.description.as_deref().unwrap_or_default())
            .example(self.example)
            .schema(self.schema)
            .line(self.line);
        Ok(builder.build())
    }

    /// Overlays the given fields onto an existing parameter.
    ///
    /// Returns the names of the fields that changed.
    pub fn apply_to(&self, parameter: &mut Parameter) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if let Some(ty) = &self.ty {
            if *ty != parameter.ty {
                parameter.ty.clone_from(ty);
                changed.push("type");
            }
        }
        if let Some(required) = self.required {
            if required != parameter.required && parameter.location != Location::Path {
                parameter.required = required;
                changed.push("required");
            }
        }
        if let Some(description) = non_empty(self.description.as_ref()) {
            if *description != parameter.description {
                parameter.description.clone_from(description);
                changed.push("description");
            }
        }
        if self.example.is_some() && self.example != parameter.example {
            parameter.example.clone_from(&self.example);
            changed.push("example");
        }
        if let Some(schema) = &self.schema {
            let before = parameter.schema.clone();
            match &mut parameter.schema {
                Some(existing) => existing.overlay(schema),
                None => parameter.schema = Some(schema.clone()),
            }
            if parameter.schema != before {
                changed.push("schema");
            }
        }
        changed
    }
}

/// Fields of a response as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePatch {
    /// Status code.
    pub status: String,
    /// Description, if given.
    pub description: Option<String>,
    /// Headers keyed by name.
    pub headers: BTreeMap<String, Header>,
    /// Schema per media type.
    pub content: BTreeMap<String, Schema>,
    /// 1-based source line.
    pub line: usize,
}

impl ResponsePatch {
    /// An empty patch for the given status code.
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            description: None,
            headers: BTreeMap::new(),
            content: BTreeMap::new(),
            line: 0,
        }
    }

    /// Builds the full response. A missing description falls back to the
    /// standard reason phrase of the status code.
    ///
    /// # Errors
    ///
    /// Returns an error if the status code is empty.
    pub fn into_response(self) -> Result<Response, BuildError> {
        let mut builder = ResponseBuilder::new(self.status)?;
        if let Some(description) = non_empty(self.description.as_ref()) {
            builder.description(description.trim());
        }
        for (name, header) in self.headers {
            builder.header(&name, header);
        }
        for (media, schema) in self.content {
            builder.content(&media, schema);
        }
        builder.line(self.line);
        Ok(builder.build())
    }

    /// Overlays the given fields onto an existing response.
    ///
    /// Returns the names of the fields that changed.
    pub fn apply_to(&self, response: &mut Response) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if let Some(description) = non_empty(self.description.as_ref()) {
            if *description != response.description {
                response.description.clone_from(description);
                changed.push("description");
            }
        }
        let headers = response.headers.clone();
        for (name, header) in &self.headers {
            response.headers.insert(name.clone(), header.clone());
        }
        if response.headers != headers {
            changed.push("headers");
        }
        let content = response.content.clone();
        overlay_content(&mut response.content, &self.content);
        if response.content != content {
            changed.push("content");
        }
        changed
    }
}

/// Fields of an endpoint as written in the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointPatch {
    /// Summary, if given.
    pub summary: Option<String>,
    /// Description, if given.
    pub description: Option<String>,
    /// Tags to add.
    pub tags: Vec<String>,
    /// Parameters to add or overlay.
    pub parameters: Vec<ParameterPatch>,
    /// Request body, if given.
    pub request_body: Option<RequestBody>,
    /// Responses to add or overlay.
    pub responses: Vec<ResponsePatch>,
}

impl EndpointPatch {
    /// Builds the full endpoint for the given identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the path, or the identity of a nested parameter
    /// or response, is empty.
    pub fn into_endpoint(
        self,
        method: Method,
        path: &str,
        line: usize,
    ) -> Result<Endpoint, BuildError> {
        let mut builder = EndpointBuilder::new(method, path)?;
        builder
            .summary(self.summary.as_deref().unwrap_or_default())
            .description(self.description.as_deref().unwrap_or_default())
            .request_body(self.request_body)
            .line(line);
        for tag in &self.tags {
            builder.tag(tag);
        }
        for parameter in self.parameters {
            builder.parameter(parameter.into_parameter()?);
        }
        for response in self.responses {
            builder.response(response.into_response()?);
        }
        Ok(builder.build())
    }

    /// Overlays the given fields onto an existing endpoint.
    ///
    /// Parameters and responses are matched by identity and overlaid, or
    /// appended when new. Returns a description of each change made.
    ///
    /// # Errors
    ///
    /// Returns an error if a new parameter or response has an empty
    /// identity.
    pub fn apply_to(&self, endpoint: &mut Endpoint) -> Result<Vec<String>, BuildError> {
        let mut changed = Vec::new();
        if let Some(summary) = non_empty(self.summary.as_ref()) {
            if *summary != endpoint.summary {
                endpoint.summary.clone_from(summary);
                changed.push("summary".to_string());
            }
        }
        if let Some(description) = non_empty(self.description.as_ref()) {
            if *description != endpoint.description {
                endpoint.description.clone_from(description);
                changed.push("description".to_string());
            }
        }
        for tag in &self.tags {
            if !tag.is_empty() && !endpoint.tags.contains(tag) {
                endpoint.tags.push(tag.clone());
                changed.push(format!("tag {tag}"));
            }
        }
        for patch in &self.parameters {
            let existing = endpoint
                .parameters
                .iter_mut()
                .find(|p| p.is(&patch.name, patch.location));
            match existing {
                Some(parameter) => {
                    for field in patch.apply_to(parameter) {
                        changed.push(format!("parameter {} {field}", parameter.identity()));
                    }
                }
                None => {
                    let parameter = patch.clone().into_parameter()?;
                    changed.push(format!("added parameter {}", parameter.identity()));
                    endpoint.parameters.push(parameter);
                }
            }
        }
        if let Some(body) = &self.request_body {
            let before = endpoint.request_body.clone();
            match &mut endpoint.request_body {
                Some(existing) => {
                    if !body.description.is_empty() {
                        existing.description.clone_from(&body.description);
                    }
                    existing.required = body.required;
                    overlay_content(&mut existing.content, &body.content);
                }
                None => endpoint.request_body = Some(body.clone()),
            }
            if endpoint.request_body != before {
                changed.push("request body".to_string());
            }
        }
        for patch in &self.responses {
            match endpoint.responses.iter_mut().find(|r| r.status == patch.status) {
                Some(response) => {
                    for field in patch.apply_to(response) {
                        changed.push(format!("response {} {field}", response.status));
                    }
                }
                None => {
                    changed.push(format!("added response {}", patch.status));
                    endpoint.responses.push(patch.clone().into_response()?);
                }
            }
        }
        Ok(changed)
    }
}

/// Overlays schemas per media type, inserting media types that are new.
fn overlay_content(content: &mut BTreeMap<String, Schema>, overlay: &BTreeMap<String, Schema>) {
    for (media, schema) in overlay {
        match content.get_mut(media) {
            Some(existing) => existing.overlay(schema),
            None => {
                content.insert(media.clone(), schema.clone());
            }
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|s| !s.trim().is_empty())
}

/// The standard reason phrase for a status code.
#[must_use]
pub fn reason_phrase(status: &str) -> &'static str {
    match status {
        "200" => "OK",
        "201" => "Created",
        "202" => "Accepted",
        "204" => "No Content",
        "301" => "Moved Permanently",
        "302" => "Found",
        "304" => "Not Modified",
        "400" => "Bad Request",
        "401" => "Unauthorized",
        "403" => "Forbidden",
        "404" => "Not Found",
        "405" => "Method Not Allowed",
        "409" => "Conflict",
        "410" => "Gone",
        "412" => "Precondition Failed",
        "415" => "Unsupported Media Type",
        "422" => "Unprocessable Entity",
        "429" => "Too Many Requests",
        "500" => "Internal Server Error",
        "501" => "Not Implemented",
        "502" => "Bad Gateway",
        "503" => "Service Unavailable",
        "504" => "Gateway Timeout",
        "default" => "Unexpected error",
        _ => "Response",
    }
}
