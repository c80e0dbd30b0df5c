//! Structural comparison of two documents.

use std::fmt;

use serde::Serialize;

use crate::domain::{Component, ComponentKind, Document, Endpoint, Parameter, Response, Schema};

/// How an element differs between two documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceKind {
    /// Present only in the target.
    Added,
    /// Present only in the base.
    Removed,
    /// Present in both, with different content.
    Modified,
}

impl fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        })
    }
}

/// A single difference between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    /// Element kind, e.g. `endpoint`.
    pub element: &'static str,
    /// Element identity, e.g. `GET /tasks`.
    pub identity: String,
    /// What changed.
    pub kind: DifferenceKind,
    /// Human readable detail.
    pub detail: String,
    /// Whether existing clients may break.
    pub breaking: bool,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.element, self.identity)?;
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        if self.breaking {
            f.write_str(" (breaking)")?;
        }
        Ok(())
    }
}

/// Lists the differences that turn `base` into `target`.
///
/// Endpoints and components are matched by identity; nested parameters and
/// responses are compared within matching endpoints.
#[must_use]
pub fn compare(base: &Document, target: &Document) -> Vec<Difference> {
    let mut differences = Vec::new();

    for endpoint in base.endpoints() {
        let key = endpoint.key();
        match target.endpoints().iter().find(|e| e.is(&key)) {
            Some(other) => compare_endpoints(endpoint, other, &mut differences),
            None => differences.push(Difference {
                element: "endpoint",
                identity: key.to_string(),
                kind: DifferenceKind::Removed,
                detail: String::new(),
                breaking: true,
            }),
        }
    }
    for endpoint in target.endpoints() {
        let key = endpoint.key();
        if !base.endpoints().iter().any(|e| e.is(&key)) {
            differences.push(Difference {
                element: "endpoint",
                identity: key.to_string(),
                kind: DifferenceKind::Added,
                detail: String::new(),
                breaking: false,
            });
        }
    }

    for component in base.components() {
        match target.component(&component.name) {
            Some(other) => compare_components(component, other, &mut differences),
            None => differences.push(Difference {
                element: "component",
                identity: component.name.clone(),
                kind: DifferenceKind::Removed,
                detail: String::new(),
                breaking: true,
            }),
        }
    }
    for component in target.components() {
        if base.component(&component.name).is_none() {
            differences.push(Difference {
                element: "component",
                identity: component.name.clone(),
                kind: DifferenceKind::Added,
                detail: String::new(),
                breaking: false,
            });
        }
    }

    tracing::debug!(differences = differences.len(), "compared documents");
    differences
}

fn compare_endpoints(base: &Endpoint, target: &Endpoint, out: &mut Vec<Difference>) {
    let key = base.key();
    let mut fields = Vec::new();
    if base.summary != target.summary {
        fields.push("summary");
    }
    if base.description != target.description {
        fields.push("description");
    }
    if base.tags != target.tags {
        fields.push("tags");
    }
    if base.request_body != target.request_body {
        fields.push("request body");
    }
    if !fields.is_empty() {
        let breaking = match (&base.request_body, &target.request_body) {
            (None, Some(body)) => body.required,
            (Some(old), Some(new)) => !old.required && new.required,
            _ => false,
        };
        out.push(Difference {
            element: "endpoint",
            identity: key.to_string(),
            kind: DifferenceKind::Modified,
            detail: fields.join(", "),
            breaking,
        });
    }

    for parameter in &base.parameters {
        let identity = format!("{} on {key}", parameter.identity());
        match target.parameter(&parameter.name, parameter.location) {
            Some(other) => {
                if let Some(difference) = compare_parameters(parameter, other, identity) {
                    out.push(difference);
                }
            }
            None => out.push(Difference {
                element: "parameter",
                identity,
                kind: DifferenceKind::Removed,
                detail: String::new(),
                breaking: true,
            }),
        }
    }
    for parameter in &target.parameters {
        if base.parameter(&parameter.name, parameter.location).is_none() {
            out.push(Difference {
                element: "parameter",
                identity: format!("{} on {key}", parameter.identity()),
                kind: DifferenceKind::Added,
                detail: if parameter.required {
                    "required".to_string()
                } else {
                    String::new()
                },
                breaking: parameter.required,
            });
        }
    }

    for response in &base.responses {
        let identity = format!("{} on {key}", response.status);
        match target.response(&response.status) {
            Some(other) => {
                if let Some(difference) = compare_responses(response, other, identity) {
                    out.push(difference);
                }
            }
            None => out.push(Difference {
                element: "response",
                identity,
                kind: DifferenceKind::Removed,
                detail: String::new(),
                breaking: true,
            }),
        }
    }
    for response in &target.responses {
        if base.response(&response.status).is_none() {
            out.push(Difference {
                element: "response",
                identity: format!("{} on {key}", response.status),
                kind: DifferenceKind::Added,
                detail: String::new(),
                breaking: false,
            });
        }
    }
}

fn compare_parameters(base: &Parameter, target: &Parameter, identity: String) -> Option<Difference> {
    let mut details = Vec::new();
    let mut breaking = false;
    if base.ty != target.ty {
        details.push(format!("type {} -> {}", base.ty, target.ty));
        breaking = true;
    }
    if base.required != target.required {
        if target.required {
            details.push("optional -> required".to_string());
            breaking = true;
        } else {
            details.push("required -> optional".to_string());
        }
    }
    if base.description != target.description {
        details.push("description".to_string());
    }
    if base.example != target.example {
        details.push("example".to_string());
    }
    if base.schema != target.schema {
        details.push("schema".to_string());
        breaking |= type_changed(base.schema.as_ref(), target.schema.as_ref());
    }
    (!details.is_empty()).then(|| Difference {
        element: "parameter",
        identity,
        kind: DifferenceKind::Modified,
        detail: details.join(", "),
        breaking,
    })
}

fn compare_responses(base: &Response, target: &Response, identity: String) -> Option<Difference> {
    let mut details = Vec::new();
    let mut breaking = false;
    if base.description != target.description {
        details.push("description".to_string());
    }
    if base.headers != target.headers {
        details.push("headers".to_string());
    }
    if base.content != target.content {
        details.push("content".to_string());
        breaking = base.content.iter().any(|(media, schema)| {
            target
                .content
                .get(media)
                .is_none_or(|other| other.type_name() != schema.type_name())
        });
    }
    (!details.is_empty()).then(|| Difference {
        element: "response",
        identity,
        kind: DifferenceKind::Modified,
        detail: details.join(", "),
        breaking,
    })
}

fn compare_components(base: &Component, target: &Component, out: &mut Vec<Difference>) {
    let unchanged = match (&base.kind, &target.kind) {
        (ComponentKind::Parameter(old), ComponentKind::Parameter(new)) => {
            compare_parameters(old, new, String::new()).is_none()
        }
        (ComponentKind::Response(old), ComponentKind::Response(new)) => {
            compare_responses(old, new, String::new()).is_none()
        }
        (old, new) => old == new,
    };
    if unchanged {
        return;
    }
    let breaking = base.kind.section() != target.kind.section()
        || type_changed(base.kind.as_schema(), target.kind.as_schema());
    out.push(Difference {
        element: "component",
        identity: base.name.clone(),
        kind: DifferenceKind::Modified,
        detail: format!("{} -> {}", base.kind, target.kind),
        breaking,
    });
}

fn type_changed(base: Option<&Schema>, target: Option<&Schema>) -> bool {
    match (base, target) {
        (Some(base), Some(target)) => base.type_name() != target.type_name(),
        _ => false,
    }
}
