//! Change descriptions.
//!
//! A change description is Markdown with one `## OPERATION TARGET` heading
//! per change:
//!
//! ```text
//! ## ADD GET /tasks/{id}
//! ## MODIFY GET /tasks PARAMETER limit query
//! ## MODIFY GET /tasks RESPONSE 200
//! ## REMOVE COMPONENT Task
//! ```
//!
//! The body under each heading uses the same grammar as an endpoint section
//! of an API description.

use std::{fmt, str::FromStr};

use tracing::instrument;

use crate::{
    domain::{
        ComponentKind, EndpointKey, EndpointPatch, Location, Outcome, ParameterPatch, ParseError,
        ResponsePatch, path_template_names,
    },
    openapi::{DefinitionKind, parse_definition},
    parser::{
        endpoint_heading, infer_with_example,
        scanner::{self, Block},
        section::{LooseFence, Mode, Section, parse_example, response_status},
    },
};

/// What a change does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Insert a new element.
    Add,
    /// Overlay fields onto an existing element.
    Modify,
    /// Delete an existing element.
    Remove,
}

impl Operation {
    /// The lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "modify" | "update" => Ok(Self::Modify),
            "remove" | "delete" => Ok(Self::Remove),
            _ => Err(format!(
                "unknown operation '{s}' (expected ADD, MODIFY or REMOVE)"
            )),
        }
    }
}

/// The element a change addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An endpoint.
    Endpoint(EndpointKey),
    /// A parameter of an endpoint.
    Parameter {
        /// The owning endpoint.
        endpoint: EndpointKey,
        /// Parameter name.
        name: String,
        /// Parameter location.
        location: Location,
    },
    /// A response of an endpoint.
    Response {
        /// The owning endpoint.
        endpoint: EndpointKey,
        /// Status code.
        status: String,
    },
    /// A component.
    Component {
        /// Component name.
        name: String,
        /// Component kind.
        kind: DefinitionKind,
    },
}

impl Target {
    /// The element kind, e.g. `endpoint`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Endpoint(_) => "endpoint",
            Self::Parameter { .. } => "parameter",
            Self::Response { .. } => "response",
            Self::Component { .. } => "component",
        }
    }

    /// The identity of the element, e.g. `200 on GET /tasks`.
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::Endpoint(key) => key.to_string(),
            Self::Parameter {
                endpoint,
                name,
                location,
            } => format!("{name} ({location}) on {endpoint}"),
            Self::Response { endpoint, status } => format!("{status} on {endpoint}"),
            Self::Component { name, .. } => name.clone(),
        }
    }

    /// The endpoint that owns the element, if it is nested.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&EndpointKey> {
        match self {
            Self::Endpoint(key)
            | Self::Parameter { endpoint: key, .. }
            | Self::Response { endpoint: key, .. } => Some(key),
            Self::Component { .. } => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.identity())
    }
}

/// The partial entity carried by a change.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No payload, as for a removal.
    Empty,
    /// Endpoint fields.
    Endpoint(EndpointPatch),
    /// Parameter fields.
    Parameter(ParameterPatch),
    /// Response fields.
    Response(ResponsePatch),
    /// A component definition.
    Component(ComponentKind),
}

/// A single amendment.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// What to do.
    pub operation: Operation,
    /// What to do it to.
    pub target: Target,
    /// The fields to apply.
    pub payload: Payload,
    /// 1-based line of the change heading, or 0.
    pub line: usize,
}

impl Change {
    /// Creates a change with no source line.
    #[must_use]
    pub const fn new(operation: Operation, target: Target, payload: Payload) -> Self {
        Self {
            operation,
            target,
            payload,
            line: 0,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.target)
    }
}

/// An ordered list of changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// An empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// The changes in order.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Whether there are no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Parses a change description.
    ///
    /// Changes that cannot be read are skipped with a recoverable error. An
    /// unterminated fenced block is fatal; the changes read before it are
    /// kept.
    #[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
    pub fn parse(text: &str) -> Outcome<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let (blocks, fatal) = scanner::scan(&lines, 0);
        let mut errors = Vec::new();
        let mut changes = Self::new();
        let mut current: Option<Pending<'_>> = None;

        for block in blocks {
            match block {
                Block::Heading {
                    level: 2,
                    text,
                    line,
                    column,
                } => {
                    if let Some(pending) = current.take() {
                        pending.finish(&mut changes, &mut errors);
                    }
                    current = Pending::open(text, line, column, lines[line - 1], &mut errors);
                }
                Block::Heading { level: 1, .. } => {
                    if let Some(pending) = current.take() {
                        pending.finish(&mut changes, &mut errors);
                    }
                }
                Block::Heading { .. } => {}
                Block::Text { text, line } => {
                    if let Some(pending) = &mut current {
                        pending.section.text(lines[line - 1], text, line, &mut errors);
                    }
                }
                Block::Fence { info, body, line } => {
                    if let Some(pending) = &mut current {
                        pending.section.fence(info, &body, line, &mut errors);
                    }
                }
            }
        }

        match fatal {
            None => {
                if let Some(pending) = current {
                    pending.finish(&mut changes, &mut errors);
                }
            }
            Some(fatal) => errors.push(fatal),
        }

        tracing::debug!(changes = changes.len(), errors = errors.len(), "parsed change description");
        Outcome::new(changes, errors)
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// A change heading whose body is still being read.
struct Pending<'a> {
    operation: Operation,
    target: Target,
    line: usize,
    heading: &'a str,
    summary: &'a str,
    section: Section,
}

impl<'a> Pending<'a> {
    fn open(
        text: &'a str,
        line: usize,
        column: usize,
        raw: &'a str,
        errors: &mut Vec<ParseError>,
    ) -> Option<Self> {
        let (operation_token, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let operation = match operation_token.parse::<Operation>() {
            Ok(operation) => operation,
            Err(message) => {
                errors.push(ParseError::recoverable(message, line, column).with_context(raw));
                return None;
            }
        };
        let rest = rest.trim_start();
        let offset = column + text.len() - rest.len();

        let (target, summary) = match parse_target(rest) {
            Ok(parsed) => parsed,
            Err((message, within)) => {
                errors.push(
                    ParseError::recoverable(message, line, offset + within).with_context(raw),
                );
                return None;
            }
        };

        let template = target
            .endpoint()
            .map(|key| path_template_names(&key.path))
            .unwrap_or_default();
        let mut section = Section::new(&template);
        if matches!(target, Target::Parameter { .. }) {
            section = section.with_mode(Mode::Parameters);
        }

        Some(Self {
            operation,
            target,
            line,
            heading: raw,
            summary,
            section,
        })
    }

    fn finish(self, changes: &mut ChangeSet, errors: &mut Vec<ParseError>) {
        let Self {
            operation,
            target,
            line,
            heading,
            summary,
            section,
        } = self;

        let payload = if operation == Operation::Remove {
            Payload::Empty
        } else {
            match payload(&target, summary, section, line, errors) {
                Ok(payload) => payload,
                Err(message) => {
                    errors.push(ParseError::recoverable(message, line, 1).with_context(heading));
                    return;
                }
            }
        };

        tracing::debug!(line, %operation, %target, "read change");
        changes.push(Change {
            operation,
            target,
            payload,
            line,
        });
    }
}

/// Parses the target after the operation keyword, along with the summary
/// that may follow an endpoint target.
///
/// On failure returns the message and the offset within `text` of the
/// offending token.
fn parse_target(text: &str) -> Result<(Target, &str), (String, usize)> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let offset_of = |index: usize| {
        tokens
            .get(index)
            .map_or(text.len(), |token| token.as_ptr() as usize - text.as_ptr() as usize)
    };

    if tokens
        .first()
        .is_some_and(|token| token.eq_ignore_ascii_case("component"))
    {
        let name = tokens
            .get(1)
            .ok_or_else(|| ("missing component name".to_string(), offset_of(1)))?;
        let kind = match tokens.get(2) {
            None => DefinitionKind::default(),
            Some(kind) => kind
                .trim_matches(|c| c == '(' || c == ')')
                .parse()
                .map_err(|message| (message, offset_of(2)))?,
        };
        if tokens.len() > 3 {
            return Err(("unexpected text after component kind".to_string(), offset_of(3)));
        }
        let target = Target::Component {
            name: name.trim_matches('`').to_string(),
            kind,
        };
        return Ok((target, ""));
    }

    let heading = endpoint_heading(text)?;
    let endpoint = EndpointKey::new(heading.method, heading.path);
    let nested: Vec<&str> = heading.summary.split_whitespace().collect();
    let keyword = nested.first().copied().unwrap_or_default();

    if keyword == "PARAMETER" {
        let name = nested
            .get(1)
            .map(|name| name.trim_matches('`'))
            .ok_or_else(|| ("missing parameter name".to_string(), offset_of(3)))?;
        let location = match nested.get(2) {
            Some(location) => location
                .trim_matches(|c| c == '(' || c == ')')
                .parse::<Location>()
                .map_err(|error| (error.to_string(), offset_of(4)))?,
            None if path_template_names(&endpoint.path).contains(&name) => Location::Path,
            None => Location::Query,
        };
        let target = Target::Parameter {
            endpoint,
            name: name.to_string(),
            location,
        };
        Ok((target, ""))
    } else if keyword == "RESPONSE" {
        let token = nested
            .get(1)
            .ok_or_else(|| ("missing response status".to_string(), offset_of(3)))?;
        let status = response_status(token)
            .ok_or_else(|| (format!("invalid response status '{token}'"), offset_of(3)))?;
        let target = Target::Response { endpoint, status };
        Ok((target, ""))
    } else {
        Ok((Target::Endpoint(endpoint), heading.summary))
    }
}

/// Builds the payload of an add or modify change from its body.
fn payload(
    target: &Target,
    summary: &str,
    section: Section,
    line: usize,
    errors: &mut Vec<ParseError>,
) -> Result<Payload, String> {
    match target {
        Target::Endpoint(_) => Ok(Payload::Endpoint(section.finish(Some(summary), errors))),
        Target::Parameter { name, location, .. } => {
            let prose = section.prose().join("\n");
            let patch = section.finish(None, &mut Vec::new());
            let mut parameter = patch
                .parameters
                .into_iter()
                .find(|p| p.name == *name && (p.location == *location || p.line > 0))
                .unwrap_or_else(|| ParameterPatch::new(name.clone(), *location));
            parameter.location = *location;
            if parameter.line == 0 {
                parameter.line = line;
            }
            if parameter.description.is_none() && !prose.is_empty() {
                parameter.description = Some(prose);
            }
            Ok(Payload::Parameter(parameter))
        }
        Target::Response { status, .. } => {
            let prose = section.prose().join("\n");
            let loose = section.loose_fences().first().cloned();
            let patch = section.finish(None, &mut Vec::new());
            if let Some(response) = patch.responses.into_iter().find(|r| r.status == *status) {
                return Ok(Payload::Response(response));
            }
            let mut response = ResponsePatch::new(status.clone());
            response.line = line;
            if !prose.is_empty() {
                response.description = Some(prose);
            }
            if let Some(LooseFence { info, body, line }) = loose {
                if let Some(example) = parse_example(&info, &body, line, errors) {
                    response
                        .content
                        .insert("application/json".to_string(), infer_with_example(example));
                }
            }
            Ok(Payload::Response(response))
        }
        Target::Component { name, kind } => {
            let Some(fence) = section.loose_fences().first() else {
                return Err(format!("component '{name}' needs a fenced definition"));
            };
            let (definition, issues) = parse_definition(*kind, name, &fence.info, &fence.body)?;
            errors.extend(
                issues
                    .into_iter()
                    .map(|issue| ParseError::recoverable(issue, fence.line, 1)),
            );
            Ok(Payload::Component(definition))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::Method;

    fn parse(text: &str) -> (ChangeSet, Vec<ParseError>) {
        let outcome = ChangeSet::parse(text);
        (outcome.value, outcome.diagnostics)
    }

    #[test]
    fn reads_every_target_kind() {
        let text = "# Release 2\n\nIntro prose.\n\n## ADD GET /tasks/{id} Fetch a task\n**Response (200):** Found\n\n## MODIFY GET /tasks PARAMETER limit query\n- `limit` (integer, example=20): Page size\n\n## MODIFY GET /tasks RESPONSE 200\nUpdated\n\n## REMOVE COMPONENT Task\n\n## ADD COMPONENT Page (parameter)\n```yaml\nname: page\nin: query\n```\n";
        let (changes, errors) = parse(text);
        assert!(errors.is_empty(), "{errors:?}");

        let summary: Vec<_> = changes.into_iter().map(ToString::to_string).collect();
        assert_eq!(
            summary,
            vec![
                "add endpoint GET /tasks/{id}",
                "modify parameter limit (query) on GET /tasks",
                "modify response 200 on GET /tasks",
                "remove component Task",
                "add component Page",
            ]
        );

        let Payload::Endpoint(endpoint) = &changes.changes()[0].payload else {
            panic!("expected an endpoint payload");
        };
        assert_eq!(endpoint.responses[0].description.as_deref(), Some("Found"));
        assert_eq!(changes.changes()[0].line, 5);

        let Payload::Parameter(limit) = &changes.changes()[1].payload else {
            panic!("expected a parameter payload");
        };
        assert_eq!(limit.ty.as_deref(), Some("integer"));
        assert_eq!(limit.example, Some(json!(20)));
        assert_eq!(limit.description.as_deref(), Some("Page size"));

        let Payload::Response(ok) = &changes.changes()[2].payload else {
            panic!("expected a response payload");
        };
        assert_eq!(ok.description.as_deref(), Some("Updated"));
        assert!(ok.content.is_empty());

        assert_eq!(changes.changes()[3].payload, Payload::Empty);
        assert!(matches!(
            &changes.changes()[4].payload,
            Payload::Component(ComponentKind::Parameter(p)) if p.name == "page"
        ));
    }

    #[test]
    fn response_prose_and_example() {
        let (changes, _) = parse("## MODIFY POST /tasks RESPONSE 201\nCreated it\n```json\n{\"id\": 3}\n```\n");
        let Payload::Response(created) = &changes.changes()[0].payload else {
            panic!("expected a response payload");
        };
        assert_eq!(created.description.as_deref(), Some("Created it"));
        let schema = created.content["application/json"].as_inline().unwrap();
        assert_eq!(schema.example, Some(json!({"id": 3})));
    }

    #[test]
    fn parameter_location_defaults_from_template() {
        let (changes, _) = parse("## ADD DELETE /tasks/{id} PARAMETER id\n## ADD GET /tasks PARAMETER q\nSearch text\n");
        assert_eq!(
            changes.changes()[0].target,
            Target::Parameter {
                endpoint: EndpointKey::new(Method::Delete, "/tasks/{id}"),
                name: "id".to_string(),
                location: Location::Path,
            }
        );
        let Payload::Parameter(q) = &changes.changes()[1].payload else {
            panic!("expected a parameter payload");
        };
        assert_eq!(q.location, Location::Query);
        assert_eq!(q.description.as_deref(), Some("Search text"));
    }

    #[test]
    fn unreadable_changes_are_skipped() {
        let text = "## RENAME GET /x\n## ADD FETCH /x\n## ADD GET /x PARAMETER\n## ADD COMPONENT Task\nno fence\n## REMOVE GET /ok\n";
        let (changes, errors) = parse(text);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes.changes()[0].to_string(), "remove endpoint GET /ok");
        let positions: Vec<_> = errors.iter().map(|e| (e.line, e.column)).collect();
        assert_eq!(positions, vec![(1, 4), (2, 8), (3, 24), (4, 1)]);
        assert!(errors.iter().all(|e| !e.fatal));
    }

    #[test]
    fn response_status_is_checked_and_normalised() {
        let (changes, errors) =
            parse("## ADD GET /tasks RESPONSE banana\n## MODIFY GET /tasks RESPONSE 4xx\n## REMOVE GET /tasks RESPONSE DEFAULT\n");

        assert_eq!(errors.len(), 1);
        assert_eq!((errors[0].line, errors[0].column), (1, 28));
        assert!(!errors[0].fatal);
        assert!(errors[0].message.contains("banana"), "{}", errors[0].message);

        let statuses: Vec<_> = changes
            .changes()
            .iter()
            .map(|change| match &change.target {
                Target::Response { status, .. } => status.as_str(),
                other => panic!("expected a response target, got {other}"),
            })
            .collect();
        assert_eq!(statuses, vec!["4XX", "default"]);
    }

    #[test]
    fn lowercase_keywords_are_summary_text() {
        let (changes, errors) = parse("## ADD GET /x Response codes\n## ADD GET /y parameter docs\n");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(
            changes.changes()[0].target,
            Target::Endpoint(EndpointKey::new(Method::Get, "/x"))
        );
        let Payload::Endpoint(endpoint) = &changes.changes()[1].payload else {
            panic!("expected an endpoint payload");
        };
        assert_eq!(endpoint.summary.as_deref(), Some("parameter docs"));
    }

    #[test]
    fn unterminated_fence_is_fatal() {
        let outcome = ChangeSet::parse("## REMOVE GET /a\n## ADD COMPONENT A\n```json\n{");
        assert!(outcome.is_fatal());
        assert_eq!(outcome.value.len(), 1);
    }

    #[test]
    fn empty_description_is_an_empty_change_set() {
        let outcome = ChangeSet::parse("");
        assert!(outcome.value.is_empty());
        assert!(!outcome.has_errors());
    }
}
