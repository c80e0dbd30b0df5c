//! Structural validation of API documents.
//!
//! The [`Validator`] trait is the seam for plugging in other validators;
//! [`StructuralValidator`] is the built-in implementation.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::{
    domain::{ComponentKind, Document, Endpoint, Location, Schema, path_template_names},
    openapi::{self, SourceFormat},
    parser,
};

/// Switches that control what a validator checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationConfig {
    /// Treat warnings as errors.
    #[serde(default)]
    pub strict: bool,
    /// Report missing summaries and tags as suggestions.
    #[serde(default)]
    pub check_best_practices: bool,
    /// Accept `x-` extension keys without a warning.
    #[serde(default)]
    pub allow_extensions: bool,
    /// Check examples against the type of their schema.
    #[serde(default)]
    pub validate_examples: bool,
}

/// The findings of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Whether no errors were found.
    pub valid: bool,
    /// Problems that make the document invalid.
    pub errors: Vec<String>,
    /// Problems that do not, unless validating strictly.
    pub warnings: Vec<String>,
    /// Optional improvements.
    pub suggestions: Vec<String>,
}

/// Validates the text of an API description.
pub trait Validator {
    /// Validates `spec`, which may be Markdown or OpenAPI YAML or JSON.
    fn validate(&self, spec: &str, config: &ValidationConfig) -> ValidationReport;
}

/// Checks that a document is internally consistent.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    #[instrument(level = "debug", skip_all, fields(bytes = spec.len()))]
    fn validate(&self, spec: &str, config: &ValidationConfig) -> ValidationReport {
        let mut findings = Findings::default();
        let format = SourceFormat::detect(spec);
        let document = match format {
            SourceFormat::Markdown => parser::parse(spec),
            SourceFormat::Yaml | SourceFormat::Json => match openapi::load(spec) {
                Ok(document) => document,
                Err(error) => {
                    findings.errors.push(format!("cannot load document: {error}"));
                    return findings.into_report(config);
                }
            },
        };

        for error in document.errors() {
            if error.fatal {
                findings.errors.push(error.to_string());
            } else {
                findings.warnings.push(error.to_string());
            }
        }
        if document.has_fatal_errors() {
            return findings.into_report(config);
        }

        if !config.allow_extensions {
            let keys = match format {
                SourceFormat::Markdown => document
                    .frontmatter()
                    .map(|f| f.metadata.keys().map(|key| format!("x-{key}")).collect())
                    .unwrap_or_default(),
                SourceFormat::Yaml | SourceFormat::Json => extension_keys(spec),
            };
            for key in keys {
                findings
                    .warnings
                    .push(format!("extension key '{key}' is not allowed"));
            }
        }

        findings.check(&document, config);
        findings.into_report(config)
    }
}

impl StructuralValidator {
    /// Validates an already loaded document.
    #[must_use]
    pub fn check(document: &Document, config: &ValidationConfig) -> ValidationReport {
        let mut findings = Findings::default();
        findings.check(document, config);
        findings.into_report(config)
    }
}

#[derive(Debug, Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
}

impl Findings {
    fn check(&mut self, document: &Document, config: &ValidationConfig) {
        let components: BTreeSet<&str> =
            document.components().iter().map(|c| c.name.as_str()).collect();

        let mut seen = BTreeMap::new();
        for endpoint in document.endpoints() {
            let key = endpoint.key();
            *seen.entry(key.to_string()).or_insert(0_usize) += 1;
            self.endpoint(endpoint, &components, config);
        }
        for (key, count) in seen {
            if count > 1 {
                self.errors.push(format!("endpoint {key} is defined {count} times"));
            }
        }

        let mut names = BTreeMap::new();
        for component in document.components() {
            *names.entry(component.name.as_str()).or_insert(0_usize) += 1;
            let schemas = component_schemas(&component.kind);
            for schema in schemas {
                self.references(schema, &components, &format!("component {}", component.name));
                if config.validate_examples {
                    self.example_types(schema, &format!("component {}", component.name));
                }
            }
        }
        for (name, count) in names {
            if count > 1 {
                self.errors
                    .push(format!("component {name} is defined {count} times"));
            }
        }

        for cycle in reference_cycles(document) {
            self.warnings
                .push(format!("schema references form a cycle: {}", cycle.join(" -> ")));
        }

        if config.check_best_practices && document.title().is_empty() {
            self.suggestions.push("document has no title".to_string());
        }
    }

    fn endpoint(&mut self, endpoint: &Endpoint, components: &BTreeSet<&str>, config: &ValidationConfig) {
        let key = endpoint.key();

        let mut parameters = BTreeSet::new();
        for parameter in &endpoint.parameters {
            if !parameters.insert((parameter.name.as_str(), parameter.location)) {
                self.errors
                    .push(format!("parameter {} is declared twice on {key}", parameter.identity()));
            }
            let context = format!("parameter {} on {key}", parameter.identity());
            if let Some(schema) = &parameter.schema {
                self.references(schema, components, &context);
            }
            if config.validate_examples {
                if let Some(example) = &parameter.example {
                    if !matches_type(&parameter.ty, example) {
                        self.errors.push(format!(
                            "example of {context} is not of type {}",
                            parameter.ty
                        ));
                    }
                }
            }
        }

        let template = path_template_names(&endpoint.path);
        for name in &template {
            if !parameters.contains(&(*name, Location::Path)) {
                self.errors
                    .push(format!("path parameter '{name}' of {key} is not declared"));
            }
        }
        for parameter in &endpoint.parameters {
            if parameter.location == Location::Path && !template.contains(&parameter.name.as_str()) {
                self.warnings.push(format!(
                    "path parameter '{}' of {key} is not in the path",
                    parameter.name
                ));
            }
        }

        if let Some(body) = &endpoint.request_body {
            for (media, schema) in &body.content {
                let context = format!("request body {media} of {key}");
                self.references(schema, components, &context);
                if config.validate_examples {
                    self.example_types(schema, &context);
                }
            }
        }

        if endpoint.responses.is_empty() {
            self.warnings.push(format!("endpoint {key} has no responses"));
        }
        let mut statuses = BTreeSet::new();
        for response in &endpoint.responses {
            if !statuses.insert(response.status.as_str()) {
                self.errors
                    .push(format!("response {} is declared twice on {key}", response.status));
            }
            let schemas = response
                .content
                .values()
                .chain(response.headers.values().filter_map(|h| h.schema.as_ref()));
            for schema in schemas {
                let context = format!("response {} of {key}", response.status);
                self.references(schema, components, &context);
                if config.validate_examples {
                    self.example_types(schema, &context);
                }
            }
        }

        if config.check_best_practices {
            if endpoint.summary.is_empty() {
                self.suggestions.push(format!("endpoint {key} has no summary"));
            }
            if endpoint.tags.is_empty() {
                self.suggestions.push(format!("endpoint {key} has no tags"));
            }
        }
    }

    fn references(&mut self, schema: &Schema, components: &BTreeSet<&str>, context: &str) {
        let mut names = Vec::new();
        schema.references(&mut names);
        for name in names {
            if !components.contains(name) {
                self.errors
                    .push(format!("unresolved reference '{name}' in {context}"));
            }
        }
    }

    fn example_types(&mut self, schema: &Schema, context: &str) {
        let Some(inline) = schema.as_inline() else {
            return;
        };
        if let (Some(ty), Some(example)) = (&inline.ty, &inline.example) {
            if !matches_type(ty, example) {
                self.errors
                    .push(format!("example of {context} is not of type {ty}"));
            }
        }
        for (name, property) in &inline.properties {
            self.example_types(property, &format!("{context}, property {name}"));
        }
        if let Some(items) = &inline.items {
            self.example_types(items, &format!("{context}, items"));
        }
    }

    fn into_report(self, config: &ValidationConfig) -> ValidationReport {
        let Self {
            mut errors,
            mut warnings,
            suggestions,
        } = self;
        if config.strict {
            errors.append(&mut warnings);
        }
        tracing::debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            suggestions = suggestions.len(),
            "validated document"
        );
        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }
}

fn component_schemas(kind: &ComponentKind) -> Vec<&Schema> {
    match kind {
        ComponentKind::Schema(schema) => vec![schema],
        ComponentKind::Parameter(parameter) => parameter.schema.iter().collect(),
        ComponentKind::Response(response) => response
            .content
            .values()
            .chain(response.headers.values().filter_map(|h| h.schema.as_ref()))
            .collect(),
    }
}

/// Cycles among components, as lists of component names.
fn reference_cycles(document: &Document) -> Vec<Vec<String>> {
    let mut graph = DiGraphMap::<&str, ()>::new();
    for component in document.components() {
        graph.add_node(component.name.as_str());
        for schema in component_schemas(&component.kind) {
            let mut names = Vec::new();
            schema.references(&mut names);
            for name in names {
                if document.component(name).is_some() {
                    graph.add_edge(component.name.as_str(), name, ());
                }
            }
        }
    }

    let mut cycles = Vec::new();
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|node| graph.contains_edge(*node, *node));
        if is_cycle {
            let mut names: Vec<String> = component.iter().map(ToString::to_string).collect();
            names.sort();
            cycles.push(names);
        }
    }
    cycles.sort();
    cycles
}

fn matches_type(ty: &str, value: &Value) -> bool {
    match ty {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// JSON pointers of every `x-` key in an OpenAPI text.
fn extension_keys(text: &str) -> Vec<String> {
    fn walk(value: &Value, pointer: &str, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, value) in map {
                    let child = format!("{pointer}/{}", key.replace('~', "~0").replace('/', "~1"));
                    if key.starts_with("x-") {
                        out.push(child.clone());
                    }
                    walk(value, &child, out);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    walk(item, &format!("{pointer}/{index}"), out);
                }
            }
            _ => {}
        }
    }

    let value: Option<Value> = serde_yaml::from_str(text).ok();
    let mut keys = Vec::new();
    if let Some(value) = value {
        walk(&value, "#", &mut keys);
    }
    keys
}
