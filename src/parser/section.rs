//! The grammar of an endpoint section body.
//!
//! A section collects everything between one `##` heading and the next:
//! prose, `**Marker:**` lines, parameter bullets and fenced examples. It is
//! shared by the document parser and the change description parser.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::infer::infer_with_example;
use crate::domain::{
    EndpointPatch, Header, Location, ParameterPatch, ParseError, RequestBody, ResponsePatch,
    Schema,
};

const DEFAULT_MEDIA_TYPE: &str = "application/json";

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*(?P<name>[A-Za-z][A-Za-z ]*?)\s*(?:\((?P<arg>[^)]*)\))?\s*:?\*\*\s*:?\s*(?P<rest>.*)$")
        .expect("valid regex")
});
static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-*+]\s+`?(?P<name>[A-Za-z0-9_.\[\]-]+)`?\s*(?:\((?P<attrs>[^)]*)\))?\s*(?:(?::|-|–|—)\s*(?P<desc>.*))?$")
        .expect("valid regex")
});
static SCHEMA_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`(?P<target>#/components/schemas/[^`]+)`").expect("valid regex")
});
static STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:[1-5][0-9]{2}|[1-5]xx|default)$").expect("valid regex"));

/// The canonical form of a response status (`200`, `4XX` or `default`), or
/// `None` if `status` is not one.
pub fn response_status(status: &str) -> Option<String> {
    STATUS
        .is_match(status)
        .then(|| status.to_ascii_uppercase().replace("DEFAULT", "default"))
}

/// What the next bullet line means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Bullets are prose.
    Prose,
    /// Bullets declare parameters.
    Parameters,
    /// Bullets declare headers of the response at this index.
    ResponseHeaders(usize),
}

/// What the next fenced block belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Request(String),
    Response(usize, String),
}

/// A fenced block that did not follow a request or response marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LooseFence {
    /// The info string.
    pub info: String,
    /// The block body.
    pub body: String,
    /// 1-based line of the opening fence.
    pub line: usize,
}

/// Accumulates one section body.
#[derive(Debug)]
pub struct Section {
    template: Vec<String>,
    prose: Vec<String>,
    patch: EndpointPatch,
    mode: Mode,
    pending: Option<Pending>,
    loose_fences: Vec<LooseFence>,
}

impl Section {
    /// A section for an endpoint with the given path template names.
    pub fn new(template: &[&str]) -> Self {
        Self {
            template: template.iter().map(ToString::to_string).collect(),
            prose: Vec::new(),
            patch: EndpointPatch::default(),
            mode: Mode::Prose,
            pending: None,
            loose_fences: Vec::new(),
        }
    }

    /// Starts the section in the given bullet mode.
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Feeds a text line.
    pub fn text(&mut self, raw: &str, text: &str, line: usize, errors: &mut Vec<ParseError>) {
        if let Some(captures) = MARKER.captures(text) {
            let name = captures["name"].trim().to_ascii_lowercase();
            let arg = captures.name("arg").map_or("", |m| m.as_str().trim());
            let rest = captures.name("rest").map_or("", |m| m.as_str().trim());
            if self.marker(&name, arg, rest, raw, line, errors) {
                return;
            }
        }

        if is_bullet(text) {
            match self.mode {
                Mode::Parameters => {
                    if let Some(parameter) = self.parameter(raw, text, line, errors) {
                        self.patch.parameters.push(parameter);
                    }
                    return;
                }
                Mode::ResponseHeaders(index) => {
                    self.header(index, raw, text, line, errors);
                    return;
                }
                Mode::Prose => {}
            }
        } else if let Mode::ResponseHeaders(index) = self.mode {
            let response = &mut self.patch.responses[index];
            match &mut response.description {
                Some(description) => {
                    description.push('\n');
                    description.push_str(text);
                }
                None => response.description = Some(text.to_string()),
            }
            return;
        } else {
            self.mode = Mode::Prose;
        }

        self.prose.push(text.to_string());
    }

    /// Feeds a fenced block.
    pub fn fence(&mut self, info: &str, body: &str, line: usize, errors: &mut Vec<ParseError>) {
        let Some(pending) = self.pending.take() else {
            self.loose_fences.push(LooseFence {
                info: info.to_string(),
                body: body.to_string(),
                line,
            });
            return;
        };

        let Some(example) = parse_example(info, body, line, errors) else {
            return;
        };
        let content = match pending {
            Pending::Request(media) => self
                .patch
                .request_body
                .as_mut()
                .map(|body| (&mut body.content, media)),
            Pending::Response(index, media) => self
                .patch
                .responses
                .get_mut(index)
                .map(|response| (&mut response.content, media)),
        };
        if let Some((content, media)) = content {
            if !matches!(content.get(&media), Some(Schema::Reference(_))) {
                content.insert(media, infer_with_example(example));
            }
        }
    }

    /// Prose lines in order.
    pub fn prose(&self) -> &[String] {
        &self.prose
    }

    /// Fenced blocks that were not claimed by a marker.
    pub fn loose_fences(&self) -> &[LooseFence] {
        &self.loose_fences
    }

    /// Finishes the section.
    ///
    /// The summary is `heading_summary` when given, otherwise the first prose
    /// line; remaining prose forms the description. Undeclared path template
    /// parameters are added as required string path parameters.
    pub fn finish(
        self,
        heading_summary: Option<&str>,
        errors: &mut Vec<ParseError>,
    ) -> EndpointPatch {
        let mut patch = self.patch;
        let mut prose = self.prose.into_iter();

        patch.summary = match heading_summary.filter(|s| !s.is_empty()) {
            Some(summary) => Some(summary.to_string()),
            None => prose.next(),
        };
        let description = prose.collect::<Vec<_>>().join("\n");
        if !description.is_empty() {
            patch.description = Some(description);
        }

        for parameter in &patch.parameters {
            if parameter.location == Location::Path && !self.template.contains(&parameter.name) {
                errors.push(ParseError::recoverable(
                    format!(
                        "path parameter '{}' does not appear in the path template",
                        parameter.name
                    ),
                    parameter.line,
                    1,
                ));
            }
        }
        for name in &self.template {
            let declared = patch
                .parameters
                .iter()
                .any(|p| p.location == Location::Path && p.name == *name);
            if !declared {
                let mut parameter = ParameterPatch::new(name.clone(), Location::Path);
                parameter.required = Some(true);
                patch.parameters.push(parameter);
            }
        }

        patch
    }

    /// Handles a `**Marker:**` line. Returns `false` if the marker is not
    /// recognised, in which case the line is prose.
    fn marker(
        &mut self,
        name: &str,
        arg: &str,
        rest: &str,
        raw: &str,
        line: usize,
        errors: &mut Vec<ParseError>,
    ) -> bool {
        match name {
            "tags" => {
                self.mode = Mode::Prose;
                self.patch.tags.extend(
                    rest.split(',')
                        .map(|tag| tag.trim().trim_matches('`').to_string())
                        .filter(|tag| !tag.is_empty()),
                );
            }
            "parameters" => self.mode = Mode::Parameters,
            "request" | "request body" => {
                self.mode = Mode::Prose;
                self.request(arg, rest);
            }
            "response" => {
                self.mode = Mode::Prose;
                self.response(arg, rest, raw, line, errors);
            }
            _ => return false,
        }
        true
    }

    fn request(&mut self, arg: &str, rest: &str) {
        let mut media = DEFAULT_MEDIA_TYPE.to_string();
        let mut required = true;
        for token in arg.split(',').map(str::trim) {
            if token.contains('/') {
                media = token.to_string();
            } else if token.eq_ignore_ascii_case("optional") {
                required = false;
            }
        }

        let (description, reference) = split_reference(rest);
        let body = self.patch.request_body.get_or_insert_with(RequestBody::default);
        body.required = required;
        if !description.is_empty() {
            body.description = description;
        }
        if let Some(reference) = reference {
            body.content.insert(media.clone(), reference);
        }
        self.pending = Some(Pending::Request(media));
    }

    fn response(
        &mut self,
        arg: &str,
        rest: &str,
        raw: &str,
        line: usize,
        errors: &mut Vec<ParseError>,
    ) {
        let mut tokens = arg.split(',').map(str::trim);
        let status = tokens.next().unwrap_or_default();
        let media = tokens
            .find(|token| token.contains('/'))
            .unwrap_or(DEFAULT_MEDIA_TYPE)
            .to_string();
        let column = raw.find('(').map_or(1, |offset| offset + 2);

        let Some(status) = response_status(status) else {
            errors.push(
                ParseError::recoverable(
                    format!("invalid response status '{status}'"),
                    line,
                    column,
                )
                .with_context(raw),
            );
            return;
        };
        if self.patch.responses.iter().any(|r| r.status == status) {
            errors.push(
                ParseError::recoverable(format!("duplicate response '{status}'"), line, column)
                    .with_context(raw),
            );
            return;
        }

        let (description, reference) = split_reference(rest);
        let mut response = ResponsePatch::new(status);
        response.line = line;
        if !description.is_empty() {
            response.description = Some(description);
        }
        if let Some(reference) = reference {
            response.content.insert(media.clone(), reference);
        }
        let index = self.patch.responses.len();
        self.patch.responses.push(response);
        self.pending = Some(Pending::Response(index, media));
        self.mode = Mode::ResponseHeaders(index);
    }

    fn parameter(
        &self,
        raw: &str,
        text: &str,
        line: usize,
        errors: &mut Vec<ParseError>,
    ) -> Option<ParameterPatch> {
        let bullet = parse_bullet(raw, text, line, errors)?;
        let location = bullet.location.unwrap_or_else(|| {
            if self.template.contains(&bullet.patch.name) {
                Location::Path
            } else {
                Location::Query
            }
        });
        let mut parameter = bullet.patch;
        parameter.location = location;

        if self
            .patch
            .parameters
            .iter()
            .any(|p| p.name == parameter.name && p.location == location)
        {
            errors.push(
                ParseError::recoverable(
                    format!("duplicate parameter '{}' ({location})", parameter.name),
                    line,
                    bullet.column,
                )
                .with_context(raw),
            );
            return None;
        }
        Some(parameter)
    }

    fn header(
        &mut self,
        index: usize,
        raw: &str,
        text: &str,
        line: usize,
        errors: &mut Vec<ParseError>,
    ) {
        let Some(bullet) = parse_bullet(raw, text, line, errors) else {
            return;
        };
        if bullet.location.is_some_and(|l| l != Location::Header) {
            errors.push(
                ParseError::recoverable(
                    format!(
                        "only headers can be declared under a response, found '{}'",
                        bullet.patch.name
                    ),
                    line,
                    bullet.column,
                )
                .with_context(raw),
            );
            return;
        }
        let header = Header {
            description: bullet.patch.description.unwrap_or_default(),
            schema: Some(Schema::of_type(
                bullet.patch.ty.as_deref().unwrap_or("string"),
            )),
        };
        if let Some(response) = self.patch.responses.get_mut(index) {
            response.headers.insert(bullet.patch.name, header);
        }
    }
}

/// A parsed parameter bullet.
struct Bullet {
    patch: ParameterPatch,
    location: Option<Location>,
    column: usize,
}

fn is_bullet(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some('-' | '*' | '+')) && chars.next().is_some_and(char::is_whitespace)
}

/// Parses `` - `name` (attrs): description ``.
///
/// The location is left to the caller when the bullet does not name one.
fn parse_bullet(
    raw: &str,
    text: &str,
    line: usize,
    errors: &mut Vec<ParseError>,
) -> Option<Bullet> {
    let Some(captures) = BULLET.captures(text) else {
        errors.push(
            ParseError::recoverable(
                "malformed parameter; expected `- `name` (location, type): description`",
                line,
                column_of(raw, text),
            )
            .with_context(raw),
        );
        return None;
    };

    let name = &captures["name"];
    let column = column_of(raw, name);
    let mut patch = ParameterPatch::new(name, Location::Query);
    patch.line = line;
    patch.description = captures
        .name("desc")
        .map(|m| m.as_str().trim().to_string())
        .filter(|d| !d.is_empty());

    let mut location = None;
    let attrs = captures.name("attrs").map_or("", |m| m.as_str());
    for attr in attrs.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        let lowered = attr.to_ascii_lowercase();
        if let Ok(parsed) = attr.parse::<Location>() {
            location = Some(parsed);
        } else if lowered == "required" {
            patch.required = Some(true);
        } else if lowered == "optional" {
            patch.required = Some(false);
        } else if let Some(example) = attr
            .strip_prefix("example=")
            .or_else(|| attr.strip_prefix("example:"))
        {
            let example = example.trim();
            patch.example = Some(
                serde_json::from_str(example).unwrap_or_else(|_| Value::String(example.to_string())),
            );
        } else if patch.ty.is_none() {
            patch.ty = Some(lowered);
        } else {
            errors.push(
                ParseError::recoverable(
                    format!("unrecognised parameter attribute '{attr}'"),
                    line,
                    column_of(raw, attr),
                )
                .with_context(raw),
            );
        }
    }

    Some(Bullet {
        patch,
        location,
        column,
    })
}

/// Parses the body of a fenced example.
///
/// Unparseable JSON or YAML is reported and kept as a string example.
/// Fences in other languages are kept verbatim.
pub fn parse_example(
    info: &str,
    body: &str,
    line: usize,
    errors: &mut Vec<ParseError>,
) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    let language = info
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parsed = match language.as_str() {
        "yaml" | "yml" => serde_yaml::from_str::<Value>(body).map_err(|e| e.to_string()),
        "json" | "" => serde_json::from_str::<Value>(body).map_err(|e| e.to_string()),
        _ => return Some(Value::String(body.to_string())),
    };
    Some(parsed.unwrap_or_else(|error| {
        errors.push(ParseError::recoverable(
            format!("invalid {} example: {error}", if language.is_empty() { "json" } else { &language }),
            line,
            1,
        ));
        Value::String(body.to_string())
    }))
}

/// Splits a backticked schema reference out of marker text.
fn split_reference(rest: &str) -> (String, Option<Schema>) {
    SCHEMA_REF.captures(rest).map_or_else(
        || (rest.to_string(), None),
        |captures| {
            let reference = Schema::reference(&captures["target"]);
            let description = SCHEMA_REF.replace(rest, "").trim().to_string();
            (description, Some(reference))
        },
    )
}

/// The 1-based byte column of `needle` within `raw`, or 1.
pub fn column_of(raw: &str, needle: &str) -> usize {
    raw.find(needle).map_or(1, |offset| offset + 1)
}
