use std::collections::BTreeMap;

use tracing::instrument;

use super::{
    Format, SerializeError,
    wire::{
        Components, HeaderObject, Info, MediaTypeObject, OPENAPI_VERSION, OpenApi, Operation,
        ParameterObject, PathItem, RequestBodyObject, ResponseObject, SchemaObject,
    },
};
use crate::domain::{
    ComponentKind, Document, Endpoint, Header, Method, Parameter, RequestBody, Response, Schema,
    SCHEMA_REF_PREFIX,
};

/// Renders a document as OpenAPI 3.0.
///
/// Paths appear in the order their first endpoint appears in the document.
/// Frontmatter metadata is written as `x-` extensions on the info object.
///
/// # Errors
///
/// Returns an error if encoding fails.
#[instrument(level = "debug", skip(document), fields(endpoints = document.endpoints().len()))]
pub fn render(document: &Document, format: Format) -> Result<String, SerializeError> {
    let api = to_openapi(document);
    let output = match format {
        Format::Yaml => serde_yaml::to_string(&api)?,
        Format::Json => {
            let mut json = serde_json::to_string_pretty(&api)?;
            json.push('\n');
            json
        }
    };
    tracing::debug!(bytes = output.len(), "rendered document");
    Ok(output)
}

/// Converts a document into its OpenAPI object tree.
#[must_use]
pub fn to_openapi(document: &Document) -> OpenApi {
    let info = document
        .frontmatter()
        .map(|frontmatter| Info {
            title: frontmatter.title.clone(),
            version: frontmatter.version.clone(),
            description: frontmatter.description.clone(),
            extensions: frontmatter
                .metadata
                .iter()
                .map(|(key, value)| {
                    let key = if key.starts_with("x-") {
                        key.clone()
                    } else {
                        format!("x-{key}")
                    };
                    (key, value.clone())
                })
                .collect(),
        })
        .unwrap_or_default();

    let mut paths: Vec<(String, PathItem)> = Vec::new();
    for endpoint in document.endpoints() {
        let existing = paths.iter().position(|(path, _)| *path == endpoint.path);
        let index = if let Some(index) = existing {
            index
        } else {
            paths.push((endpoint.path.clone(), PathItem::default()));
            paths.len() - 1
        };
        *operation_slot(&mut paths[index].1, endpoint.method) = Some(Operation::from(endpoint));
    }

    let mut components = Components::default();
    for component in document.components() {
        match &component.kind {
            ComponentKind::Schema(schema) => {
                components
                    .schemas
                    .insert(component.name.clone(), SchemaObject::from(schema));
            }
            ComponentKind::Parameter(parameter) => {
                components
                    .parameters
                    .insert(component.name.clone(), ParameterObject::from(parameter));
            }
            ComponentKind::Response(response) => {
                components
                    .responses
                    .insert(component.name.clone(), ResponseObject::from(response));
            }
        }
    }

    OpenApi {
        openapi: OPENAPI_VERSION.to_string(),
        info,
        paths,
        components,
    }
}

/// The field of a path item that holds the operation for `method`.
pub(super) const fn operation_slot(item: &mut PathItem, method: Method) -> &mut Option<Operation> {
    match method {
        Method::Get => &mut item.get,
        Method::Put => &mut item.put,
        Method::Post => &mut item.post,
        Method::Delete => &mut item.delete,
        Method::Options => &mut item.options,
        Method::Head => &mut item.head,
        Method::Patch => &mut item.patch,
        Method::Trace => &mut item.trace,
    }
}

impl From<&Endpoint> for Operation {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            summary: endpoint.summary.clone(),
            description: endpoint.description.clone(),
            tags: endpoint.tags.clone(),
            parameters: endpoint.parameters.iter().map(ParameterObject::from).collect(),
            request_body: endpoint.request_body.as_ref().map(RequestBodyObject::from),
            responses: endpoint
                .responses
                .iter()
                .map(|response| (response.status.clone(), ResponseObject::from(response)))
                .collect(),
        }
    }
}

impl From<&Parameter> for ParameterObject {
    fn from(parameter: &Parameter) -> Self {
        let schema = parameter.schema.as_ref().map_or_else(
            || SchemaObject {
                ty: Some(parameter.ty.clone()),
                ..SchemaObject::default()
            },
            SchemaObject::from,
        );
        Self {
            name: parameter.name.clone(),
            location: parameter.location.to_string(),
            description: parameter.description.clone(),
            required: parameter.required,
            schema: Some(schema),
            example: parameter.example.clone(),
        }
    }
}

impl From<&RequestBody> for RequestBodyObject {
    fn from(body: &RequestBody) -> Self {
        Self {
            description: body.description.clone(),
            required: body.required,
            content: media_types(&body.content),
        }
    }
}

impl From<&Response> for ResponseObject {
    fn from(response: &Response) -> Self {
        Self {
            description: response.description.clone(),
            headers: response
                .headers
                .iter()
                .map(|(name, header)| (name.clone(), HeaderObject::from(header)))
                .collect(),
            content: media_types(&response.content),
        }
    }
}

impl From<&Header> for HeaderObject {
    fn from(header: &Header) -> Self {
        Self {
            description: header.description.clone(),
            schema: header.schema.as_ref().map(SchemaObject::from),
        }
    }
}

impl From<&Schema> for SchemaObject {
    fn from(schema: &Schema) -> Self {
        match schema {
            Schema::Reference(name) => Self {
                reference: Some(format!("{SCHEMA_REF_PREFIX}{name}")),
                ..Self::default()
            },
            Schema::Inline(inline) => Self {
                reference: None,
                ty: inline.ty.clone(),
                format: inline.format.clone(),
                description: inline.description.clone(),
                example: inline.example.clone(),
                properties: inline
                    .properties
                    .iter()
                    .map(|(name, property)| (name.clone(), Self::from(property)))
                    .collect(),
                required: inline.required.clone(),
                items: inline.items.as_deref().map(|items| Box::new(Self::from(items))),
                enumeration: inline.enumeration.clone(),
            },
        }
    }
}

fn media_types(content: &BTreeMap<String, Schema>) -> BTreeMap<String, MediaTypeObject> {
    content
        .iter()
        .map(|(media, schema)| {
            (
                media.clone(),
                MediaTypeObject {
                    schema: Some(SchemaObject::from(schema)),
                    example: None,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::parse;

    const TASKS: &str = "---\ntitle: Tasks\nversion: 1.0.0\nowner: platform\n---\n\n## POST /tasks Create a task\n\n**Request Body:** New task\n```json\n{\"title\": \"Write\"}\n```\n\n**Response (201):** Created `#/components/schemas/Task`\n\n## GET /tasks List tasks\n\n**Parameters:**\n- `limit` (integer)\n\n**Response (200):**\n\n## Components\n\n### Task\n```json\n{\"type\": \"object\"}\n```\n";

    #[test]
    fn renders_json_structure() {
        let document = parse(TASKS);
        assert!(document.errors().is_empty(), "{:?}", document.errors());
        let json: serde_json::Value =
            serde_json::from_str(&render(&document, Format::Json).unwrap()).unwrap();

        assert_eq!(json["openapi"], "3.0.3");
        assert_eq!(json["info"]["title"], "Tasks");
        assert_eq!(json["info"]["x-owner"], "platform");

        let post = &json["paths"]["/tasks"]["post"];
        assert_eq!(post["summary"], "Create a task");
        assert_eq!(
            post["requestBody"]["content"]["application/json"]["schema"]["example"],
            json!({"title": "Write"})
        );
        assert_eq!(
            post["responses"]["201"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Task"
        );

        let get = &json["paths"]["/tasks"]["get"];
        assert_eq!(get["parameters"][0]["schema"]["type"], "integer");
        assert_eq!(get["responses"]["200"]["description"], "OK");
        assert_eq!(json["components"]["schemas"]["Task"]["type"], "object");
    }

    #[test]
    fn yaml_keeps_path_order() {
        let document = parse("## GET /b\n## GET /a\n## POST /b\n");
        let yaml = render(&document, Format::Yaml).unwrap();
        let b = yaml.find("/b:").unwrap();
        let a = yaml.find("/a:").unwrap();
        assert!(b < a);
        assert!(!yaml.contains("components"));
    }
}
