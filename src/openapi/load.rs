use tracing::instrument;

use super::{
    LoadError, SourceFormat,
    convert::{content_schema, parameter_from_object, response_from_object, schema_from_object},
    render::operation_slot,
    wire::{OpenApi, Operation},
};
use crate::domain::{
    BuildError, ComponentKind, Document, DocumentBuilder, EndpointBuilder, Frontmatter, Method,
    ParseError, RequestBody, builder::component,
};

/// Path item fields that are not operations but are valid OpenAPI.
const PATH_ITEM_FIELDS: [&str; 5] = ["summary", "description", "servers", "parameters", "$ref"];

/// Loads an OpenAPI 3 document from YAML or JSON.
///
/// Problems confined to a single element (an unsupported method, a schema
/// mixing `$ref` with inline fields, a parameter without a name) are kept on
/// the returned document as recoverable errors at line 1, with a JSON
/// pointer to the element as context.
///
/// # Errors
///
/// Returns an error if the text is not valid YAML or JSON, or is not shaped
/// like an OpenAPI document.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn load(text: &str) -> Result<Document, LoadError> {
    let api: OpenApi = match SourceFormat::detect(text) {
        SourceFormat::Json => serde_json::from_str(text)?,
        SourceFormat::Yaml | SourceFormat::Markdown => serde_yaml::from_str(text)?,
    };

    let mut issues = Vec::new();
    let mut builder = DocumentBuilder::new();

    if api.openapi.is_empty() {
        issues.push(("missing 'openapi' version".to_string(), "#/openapi".to_string()));
    } else if !api.openapi.starts_with("3.") {
        issues.push((
            format!("unsupported OpenAPI version '{}'", api.openapi),
            "#/openapi".to_string(),
        ));
    }

    let info = api.info;
    let mut frontmatter = Frontmatter {
        title: info.title,
        version: info.version,
        description: info.description,
        ..Frontmatter::default()
    };
    for (key, value) in info.extensions {
        let key = key.strip_prefix("x-").map_or_else(|| key.clone(), str::to_string);
        frontmatter.metadata.insert(key, value);
    }
    builder.frontmatter(frontmatter);

    for (path, mut item) in api.paths {
        for key in item.other.keys() {
            if !PATH_ITEM_FIELDS.contains(&key.as_str()) && !key.starts_with("x-") {
                issues.push((
                    format!("unsupported operation '{key}' on {path}"),
                    pointer(&["paths", &path, key]),
                ));
            }
        }
        for method in Method::ALL {
            let Some(operation) = operation_slot(&mut item, method).take() else {
                continue;
            };
            let base = pointer(&["paths", &path, &method.as_str().to_ascii_lowercase()]);
            let mut messages = Vec::new();
            match endpoint(method, &path, &operation, &base, &mut messages) {
                Ok(endpoint) => {
                    builder.endpoint(endpoint);
                }
                Err(error) => messages.push(format!("{base}: {error}")),
            }
            issues.extend(messages.into_iter().map(|message| (message, base.clone())));
        }
    }

    let components = api.components;
    let schemas = components.schemas.iter().map(|(name, object)| {
        let base = pointer(&["components", "schemas", name]);
        let mut messages = Vec::new();
        let kind = ComponentKind::Schema(schema_from_object(object, &base, &mut messages));
        (name, Some(kind), messages, base)
    });
    let parameters = components.parameters.iter().map(|(name, object)| {
        let base = pointer(&["components", "parameters", name]);
        let mut messages = Vec::new();
        let kind = parameter_from_object(object, &base, &mut messages).map(ComponentKind::Parameter);
        (name, kind, messages, base)
    });
    let responses = components.responses.iter().map(|(name, object)| {
        let base = pointer(&["components", "responses", name]);
        let mut messages = Vec::new();
        let kind =
            response_from_object(name, object, &base, &mut messages).map(ComponentKind::Response);
        (name, kind, messages, base)
    });
    for (name, kind, mut messages, base) in schemas.chain(parameters).chain(responses) {
        if let Some(kind) = kind {
            match component(name.as_str(), kind, 0) {
                Ok(component) => {
                    builder.component(component);
                }
                Err(error) => messages.push(format!("{base}: {error}")),
            }
        }
        issues.extend(messages.into_iter().map(|message| (message, base.clone())));
    }

    builder.add_errors(
        issues
            .into_iter()
            .map(|(message, context)| ParseError::recoverable(message, 1, 1).with_context(&context)),
    );
    let document = builder.build();
    tracing::debug!(
        endpoints = document.endpoints().len(),
        components = document.components().len(),
        errors = document.errors().len(),
        "loaded OpenAPI document"
    );
    Ok(document)
}

fn endpoint(
    method: Method,
    path: &str,
    operation: &Operation,
    base: &str,
    issues: &mut Vec<String>,
) -> Result<crate::domain::Endpoint, BuildError> {
    let mut builder = EndpointBuilder::new(method, path)?;
    builder
        .summary(&operation.summary)
        .description(&operation.description);
    for tag in &operation.tags {
        builder.tag(tag);
    }
    for (index, parameter) in operation.parameters.iter().enumerate() {
        let pointer = format!("{base}/parameters/{index}");
        builder.parameter(parameter_from_object(parameter, &pointer, issues));
    }
    if let Some(body) = &operation.request_body {
        let mut request = RequestBody {
            description: body.description.clone(),
            required: body.required,
            ..RequestBody::default()
        };
        for (media, content) in &body.content {
            let pointer = format!("{base}/requestBody/content/{media}");
            if let Some(schema) = content_schema(content, &pointer, issues) {
                request.content.insert(media.clone(), schema);
            }
        }
        builder.request_body(request);
    }
    for (status, response) in &operation.responses {
        let pointer = format!("{base}/responses/{status}");
        builder.response(response_from_object(status, response, &pointer, issues));
    }
    Ok(builder.build())
}

/// A JSON pointer with `~` and `/` escaped in each segment.
fn pointer(segments: &[&str]) -> String {
    let mut pointer = String::from("#");
    for segment in segments {
        pointer.push('/');
        pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
    }
    pointer
}
