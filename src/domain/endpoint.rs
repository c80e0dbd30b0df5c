use std::{collections::BTreeMap, fmt, str::FromStr};

use serde_json::Value;

use super::Schema;

/// An HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
}

impl Method {
    /// All supported methods, in the order they are rendered within a path.
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    /// The uppercase verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a supported HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method '{0}'")]
pub struct InvalidMethodError(String);

impl FromStr for Method {
    type Err = InvalidMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InvalidMethodError(s.to_string()))
    }
}

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    /// Templated path segment.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Cookie.
    Cookie,
}

impl Location {
    /// The lowercase name used in documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a parameter location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter location '{0}' (expected path, query, header or cookie)")]
pub struct InvalidLocationError(String);

impl FromStr for Location {
    type Err = InvalidLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "query" => Ok(Self::Query),
            "header" => Ok(Self::Header),
            "cookie" => Ok(Self::Cookie),
            _ => Err(InvalidLocationError(s.to_string())),
        }
    }
}

/// The identity of an endpoint: its method and path template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    /// HTTP method.
    pub method: Method,
    /// Literal path template, e.g. `/users/{id}`.
    pub path: String,
}

impl EndpointKey {
    /// Creates a key.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A single request parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Where the parameter is carried.
    pub location: Location,
    /// Primitive type name. Defaults to `string`.
    pub ty: String,
    /// Whether the parameter must be supplied.
    pub required: bool,
    /// Human readable description.
    pub description: String,
    /// Example value.
    pub example: Option<Value>,
    /// Full schema, when the primitive type is not enough.
    pub schema: Option<Schema>,
    /// 1-based source line, or 0 when not parsed from text.
    pub line: usize,
}

impl Parameter {
    /// Whether this parameter has the given identity.
    #[must_use]
    pub fn is(&self, name: &str, location: Location) -> bool {
        self.name == name && self.location == location
    }

    /// `name (location)` rendering used in reports.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{} ({})", self.name, self.location)
    }
}

/// The body of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    /// Human readable description.
    pub description: String,
    /// Whether a body must be supplied.
    pub required: bool,
    /// Schema per media type.
    pub content: BTreeMap<String, Schema>,
}

/// A response header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// Human readable description.
    pub description: String,
    /// Schema of the header value.
    pub schema: Option<Schema>,
}

/// One response of an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code (`200`, `4XX`, `default`).
    pub status: String,
    /// Human readable description.
    pub description: String,
    /// Headers keyed by name.
    pub headers: BTreeMap<String, Header>,
    /// Schema per media type.
    pub content: BTreeMap<String, Schema>,
    /// 1-based source line, or 0 when not parsed from text.
    pub line: usize,
}

/// A single HTTP operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Uppercase HTTP method.
    pub method: Method,
    /// Literal path template.
    pub path: String,
    /// One-line summary.
    pub summary: String,
    /// Longer description.
    pub description: String,
    /// Parameters in declaration order.
    pub parameters: Vec<Parameter>,
    /// Optional request body.
    pub request_body: Option<RequestBody>,
    /// Responses in declaration order.
    pub responses: Vec<Response>,
    /// Tags in insertion order, without duplicates.
    pub tags: Vec<String>,
    /// 1-based source line, or 0 when not parsed from text.
    pub line: usize,
}

impl Endpoint {
    /// The identity of this endpoint.
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.method, self.path.clone())
    }

    /// Whether this endpoint has the given identity.
    #[must_use]
    pub fn is(&self, key: &EndpointKey) -> bool {
        self.method == key.method && self.path == key.path
    }

    /// Looks up a response by status code.
    #[must_use]
    pub fn response(&self, status: &str) -> Option<&Response> {
        self.responses.iter().find(|r| r.status == status)
    }

    /// Looks up a parameter by identity.
    #[must_use]
    pub fn parameter(&self, name: &str, location: Location) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.is(name, location))
    }

    /// Names of the `{templated}` segments of the path, in order.
    #[must_use]
    pub fn path_template_names(&self) -> Vec<&str> {
        path_template_names(&self.path)
    }
}

/// Names of the `{templated}` segments of a path, in order.
#[must_use]
pub fn path_template_names(path: &str) -> Vec<&str> {
    path.split('{')
        .skip(1)
        .filter_map(|rest| rest.split_once('}').map(|(name, _)| name.trim()))
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("get", Method::Get; "lowercase")]
    #[test_case("DELETE", Method::Delete; "uppercase")]
    #[test_case("Patch", Method::Patch; "mixed case")]
    fn method_parses_case_insensitively(input: &str, expected: Method) {
        assert_eq!(input.parse::<Method>().unwrap(), expected);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn location_round_trips_through_display() {
        for location in [
            Location::Path,
            Location::Query,
            Location::Header,
            Location::Cookie,
        ] {
            assert_eq!(location.to_string().parse::<Location>().unwrap(), location);
        }
        assert!("body".parse::<Location>().is_err());
    }

    #[test_case("/tasks", &[]; "no template")]
    #[test_case("/tasks/{id}", &["id"]; "single")]
    #[test_case("/users/{user_id}/tasks/{ task }", &["user_id", "task"]; "multiple with spaces")]
    #[test_case("/broken/{", &[]; "unterminated")]
    fn template_names(path: &str, expected: &[&str]) {
        assert_eq!(path_template_names(path), expected);
    }

    #[test]
    fn endpoint_key_display() {
        let key = EndpointKey::new(Method::Get, "/tasks/{id}");
        assert_eq!(key.to_string(), "GET /tasks/{id}");
    }
}
