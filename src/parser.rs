use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use crate::{
    domain::{
        Document, DocumentBuilder, Method, ParseError, builder::component, path_template_names,
    },
    openapi::{DefinitionKind, parse_definition},
};

mod frontmatter;
mod infer;
pub(crate) mod scanner;
pub(crate) mod section;

pub use infer::{infer, infer_with_example};
use scanner::Block;
use section::Section;

static COMPONENT_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^`?(?P<name>[A-Za-z0-9_.-]+)`?\s*(?:\((?P<kind>[^)]*)\))?$").expect("valid regex")
});

/// Where the parser is in the document.
enum State<'a> {
    /// Before the first `##` heading.
    Preamble,
    /// Inside an endpoint section.
    Endpoint {
        method: Method,
        path: &'a str,
        summary: &'a str,
        line: usize,
        section: Section,
    },
    /// Inside the components section.
    Components(Option<PendingComponent<'a>>),
    /// Inside a section that could not be read.
    Skip,
}

/// A `### Name` heading waiting for its fenced definition.
struct PendingComponent<'a> {
    name: &'a str,
    kind: DefinitionKind,
    line: usize,
    defined: bool,
}

/// A `## METHOD /path [summary]` heading.
#[derive(Debug)]
pub(crate) struct EndpointHeading<'a> {
    pub method: Method,
    pub path: &'a str,
    pub summary: &'a str,
}

/// Parses an endpoint heading.
///
/// On failure returns the message and the offset within `text` of the
/// offending token.
pub(crate) fn endpoint_heading(text: &str) -> Result<EndpointHeading<'_>, (String, usize)> {
    let (method_token, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let method = method_token
        .parse::<Method>()
        .map_err(|error| (format!("expected `METHOD /path`: {error}"), 0))?;

    let rest = rest.trim_start();
    let path_offset = text.len() - rest.len();
    let (path, summary) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if !path.starts_with('/') {
        let message = if path.is_empty() {
            format!("missing path after {method}")
        } else {
            format!("path '{path}' must start with '/'")
        };
        return Err((message, path_offset));
    }

    Ok(EndpointHeading {
        method,
        path,
        summary: summary.trim(),
    })
}

/// Parses a Markdown API description.
///
/// Parsing never fails outright. Recoverable problems are recorded on the
/// returned document and the affected element is skipped. An unterminated
/// fenced block stops parsing; the document then holds everything completed
/// before it, and the fatal error is the last error.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn parse(text: &str) -> Document {
    let lines: Vec<&str> = text.lines().collect();
    let mut errors = Vec::new();
    let mut builder = DocumentBuilder::new();

    let (frontmatter, body_start) = frontmatter::extract(&lines, &mut errors);
    builder.frontmatter(frontmatter);

    let (blocks, fatal) = scanner::scan(&lines, body_start);

    let mut state = State::Preamble;
    let mut title = None;
    let mut preamble = Vec::new();

    for block in blocks {
        match block {
            Block::Heading {
                level: 1,
                text,
                line,
                ..
            } => {
                if !matches!(state, State::Preamble) {
                    finish(state, &mut builder, &mut errors);
                    tracing::debug!(line, "top-level heading closes the current section");
                    state = State::Skip;
                } else if title.is_none() {
                    title = Some(text);
                }
            }
            Block::Heading {
                level: 2,
                text,
                line,
                column,
            } => {
                finish(state, &mut builder, &mut errors);
                state = open_section(text, line, column, &lines, &mut errors);
            }
            Block::Heading {
                level,
                text,
                line,
                column,
            } => {
                if let State::Components(pending) = &mut state {
                    if level == 3 {
                        close_component(pending.take(), &mut errors);
                        *pending = component_heading(text, line, column, lines[line - 1], &mut errors);
                    }
                }
            }
            Block::Text { text, line } => match &mut state {
                State::Preamble => preamble.push(text),
                State::Endpoint { section, .. } => {
                    section.text(lines[line - 1], text, line, &mut errors);
                }
                State::Components(_) | State::Skip => {}
            },
            Block::Fence { info, body, line } => match &mut state {
                State::Endpoint { section, .. } => section.fence(info, &body, line, &mut errors),
                State::Components(Some(pending)) if !pending.defined => {
                    pending.defined = true;
                    define_component(pending, info, &body, line, &mut builder, &mut errors);
                }
                _ => tracing::debug!(line, "ignoring fenced block outside an endpoint"),
            },
        }
    }

    match fatal {
        None => finish(state, &mut builder, &mut errors),
        Some(fatal) => {
            tracing::debug!(line = fatal.line, "stopping at fatal error");
            errors.push(fatal);
        }
    }

    if title.is_some() || !preamble.is_empty() {
        let frontmatter = builder.frontmatter_mut();
        if frontmatter.title.is_empty() {
            if let Some(title) = title {
                frontmatter.title = title.to_string();
            }
        }
        if frontmatter.description.is_empty() {
            frontmatter.description = preamble.join("\n");
        }
    }

    builder.add_errors(errors);
    let document = builder.build();
    tracing::debug!(
        endpoints = document.endpoints().len(),
        components = document.components().len(),
        errors = document.errors().len(),
        "parsed document"
    );
    document
}

fn open_section<'a>(
    text: &'a str,
    line: usize,
    column: usize,
    lines: &[&str],
    errors: &mut Vec<ParseError>,
) -> State<'a> {
    if ["components", "schemas"]
        .iter()
        .any(|name| text.eq_ignore_ascii_case(name))
    {
        return State::Components(None);
    }

    match endpoint_heading(text) {
        Ok(EndpointHeading {
            method,
            path,
            summary,
        }) => State::Endpoint {
            method,
            path,
            summary,
            line,
            section: Section::new(&path_template_names(path)),
        },
        Err((message, offset)) => {
            errors.push(
                ParseError::recoverable(message, line, column + offset).with_context(lines[line - 1]),
            );
            State::Skip
        }
    }
}

/// Completes the element being built in `state`.
fn finish(state: State<'_>, builder: &mut DocumentBuilder, errors: &mut Vec<ParseError>) {
    match state {
        State::Endpoint {
            method,
            path,
            summary,
            line,
            section,
        } => {
            let patch = section.finish(Some(summary), errors);
            match patch.into_endpoint(method, path, line) {
                Ok(endpoint) => {
                    tracing::debug!(endpoint = %endpoint.key(), line, "parsed endpoint");
                    builder.endpoint(endpoint);
                }
                Err(error) => errors.push(ParseError::recoverable(error.to_string(), line, 1)),
            }
        }
        State::Components(pending) => close_component(pending, errors),
        State::Preamble | State::Skip => {}
    }
}

fn component_heading<'a>(
    text: &'a str,
    line: usize,
    column: usize,
    raw: &str,
    errors: &mut Vec<ParseError>,
) -> Option<PendingComponent<'a>> {
    let Some(captures) = COMPONENT_HEADING.captures(text) else {
        errors.push(
            ParseError::recoverable(
                "expected a component name, optionally followed by (schema|parameter|response)",
                line,
                column,
            )
            .with_context(raw),
        );
        return None;
    };

    let kind = match captures.name("kind").map(|kind| kind.as_str().parse()) {
        None => DefinitionKind::Schema,
        Some(Ok(kind)) => kind,
        Some(Err(message)) => {
            errors.push(ParseError::recoverable(message, line, column).with_context(raw));
            return None;
        }
    };
    captures.name("name").map(|name| PendingComponent {
        name: name.as_str(),
        kind,
        line,
        defined: false,
    })
}

fn close_component(pending: Option<PendingComponent<'_>>, errors: &mut Vec<ParseError>) {
    if let Some(pending) = pending.filter(|pending| !pending.defined) {
        errors.push(ParseError::recoverable(
            format!("component '{}' has no fenced definition", pending.name),
            pending.line,
            1,
        ));
    }
}

fn define_component(
    pending: &PendingComponent<'_>,
    info: &str,
    body: &str,
    line: usize,
    builder: &mut DocumentBuilder,
    errors: &mut Vec<ParseError>,
) {
    let (kind, issues) = match parse_definition(pending.kind, pending.name, info, body) {
        Ok(definition) => definition,
        Err(message) => {
            errors.push(ParseError::recoverable(message, line, 1));
            return;
        }
    };
    errors.extend(
        issues
            .into_iter()
            .map(|issue| ParseError::recoverable(issue, line, 1)),
    );
    match component(pending.name, kind, pending.line) {
        Ok(component) => {
            tracing::debug!(name = pending.name, kind = %pending.kind, "parsed component");
            builder.component(component);
        }
        Err(error) => errors.push(ParseError::recoverable(error.to_string(), pending.line, 1)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{ComponentKind, Location, Schema};

    const TASKS: &str = r#"---
title: Task API
version: 1.0.0
owner: platform
---

# Ignored because frontmatter has a title

Manage tasks.

## GET /tasks/{id} Fetch a task

Returns one task.

**Tags:** tasks, read

**Parameters:**
- `verbose` (query, boolean, optional, example=true): Include history

**Response (200):** Task found `#/components/schemas/Task`
- `X-Rate-Limit` (header, integer): Remaining requests

**Response (404):**

## POST /tasks

Create a task

**Request Body (application/json):** New task
```json
{"title": "Write spec", "done": false}
```

**Response (201):**
```json
{"id": 7}
```

## Components

### Task
```json
{"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]}
```

### PageSize (parameter)
```yaml
name: size
in: query
schema: { type: integer }
```
"#;

    #[test]
    fn parses_a_complete_document() {
        let document = parse(TASKS);
        assert!(document.errors().is_empty(), "{:?}", document.errors());

        let frontmatter = document.frontmatter().unwrap();
        assert_eq!(frontmatter.title, "Task API");
        assert_eq!(frontmatter.description, "Manage tasks.");
        assert_eq!(frontmatter.metadata["owner"], json!("platform"));

        let [get, post] = document.endpoints() else {
            panic!("expected two endpoints");
        };
        assert_eq!(get.method, Method::Get);
        assert_eq!(get.path, "/tasks/{id}");
        assert_eq!(get.summary, "Fetch a task");
        assert_eq!(get.description, "Returns one task.");
        assert_eq!(get.tags, vec!["tasks", "read"]);
        assert_eq!(get.line, 11);

        let id = get.parameter("id", Location::Path).unwrap();
        assert!(id.required);
        assert_eq!(id.ty, "string");
        let verbose = get.parameter("verbose", Location::Query).unwrap();
        assert_eq!(verbose.ty, "boolean");
        assert_eq!(verbose.example, Some(json!(true)));
        assert_eq!(verbose.line, 18);

        let ok = get.response("200").unwrap();
        assert_eq!(ok.description, "Task found");
        assert_eq!(ok.content["application/json"], Schema::reference("Task"));
        assert!(ok.headers.contains_key("X-Rate-Limit"));
        assert_eq!(get.response("404").unwrap().description, "Not Found");

        assert_eq!(post.summary, "Create a task");
        let body = post.request_body.as_ref().unwrap();
        let schema = body.content["application/json"].as_inline().unwrap();
        assert_eq!(schema.properties["done"].type_name(), "boolean");
        assert_eq!(schema.example, Some(json!({"title": "Write spec", "done": false})));

        let names: Vec<_> = document.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Task", "PageSize"]);
        assert!(matches!(
            document.component("PageSize").unwrap().kind,
            ComponentKind::Parameter(ref p) if p.name == "size" && p.ty == "integer"
        ));
    }

    #[test]
    fn invalid_heading_is_recoverable_and_skipped() {
        let document = parse("## FETCH /tasks\n**Response (200):**\n## GET tasks\n## GET /ok\n");
        assert_eq!(document.endpoints().len(), 1);
        assert_eq!(document.endpoints()[0].path, "/ok");

        let errors = document.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!((errors[0].line, errors[0].column), (1, 4));
        assert_eq!((errors[1].line, errors[1].column), (3, 8));
        assert!(errors.iter().all(|e| !e.fatal));
        assert_eq!(errors[1].context.as_deref(), Some("## GET tasks"));
    }

    #[test]
    fn unterminated_fence_is_fatal_and_last() {
        let text = "## GET /a\n**Response (2000):**\n## GET /b\n**Response (200):**\n```json\n{\"id\": 1}\n";
        let document = parse(text);

        assert_eq!(document.endpoints().len(), 1);
        assert_eq!(document.endpoints()[0].path, "/a");

        let errors = document.errors();
        assert_eq!(errors.len(), 2);
        assert!(!errors[0].fatal);
        assert!(errors[1].fatal);
        assert_eq!(errors[1].line, 5);
        assert!(document.has_fatal_errors());
    }

    #[test]
    fn h1_is_title_fallback() {
        let document = parse("# Pets\n\nAll the pets.\n\n## GET /pets\n");
        assert_eq!(document.title(), "Pets");
        assert_eq!(document.frontmatter().unwrap().description, "All the pets.");
    }

    #[test]
    fn empty_input_is_an_empty_document() {
        let document = parse("");
        assert!(document.endpoints().is_empty());
        assert!(document.errors().is_empty());
        assert!(document.frontmatter().is_none());
    }

    #[test]
    fn component_problems_are_recoverable() {
        let text = "## Components\n### Missing\n### Bad (widget)\n```json\n{}\n```\n### Broken\n```json\n{nope\n```\n### Good\n```yaml\ntype: string\n```\n";
        let document = parse(text);

        let names: Vec<_> = document.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Good"]);
        let lines: Vec<_> = document.errors().iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 8]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let first = parse(TASKS);
        let second = parse(TASKS);
        assert_eq!(first, second);
        assert_eq!(first.errors(), second.errors());
    }

    #[test]
    fn endpoint_headings() {
        let heading = endpoint_heading("delete /tasks/{id}   Remove it ").unwrap();
        assert_eq!(heading.method, Method::Delete);
        assert_eq!(heading.path, "/tasks/{id}");
        assert_eq!(heading.summary, "Remove it");

        assert_eq!(endpoint_heading("GET").unwrap_err().1, 3);
        assert_eq!(endpoint_heading("Overview").unwrap_err().1, 0);
    }
}
