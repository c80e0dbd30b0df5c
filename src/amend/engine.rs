use std::{
    fmt::{self, Write as _},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::changeset::{Change, ChangeSet, Operation, Payload, Target};
use crate::{
    domain::{
        BuildError, Component, ComponentKind, Document, Endpoint, EndpointBuilder, EndpointKey,
        ParseError, builder::component,
    },
    openapi::{self, Format, LoadError, SerializeError, SourceFormat},
    parser,
};

/// How conflicting changes are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Conflicting changes are not applied and are reported as conflicts.
    #[default]
    #[serde(rename = "strict")]
    Strict,
    /// Conflicting changes are applied, replacing what was there, and
    /// reported as warnings.
    #[serde(rename = "auto", alias = "allow-breaking-changes")]
    AllowBreakingChanges,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::AllowBreakingChanges => "auto",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "auto" | "allow-breaking-changes" => Ok(Self::AllowBreakingChanges),
            _ => Err(format!("unknown conflict policy '{s}' (expected strict or auto)")),
        }
    }
}

/// Options for an amendment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmendOptions {
    /// Conflict resolution.
    pub policy: ConflictPolicy,
    /// Compute the report without rendering output.
    pub dry_run: bool,
    /// Output format.
    pub format: Format,
}

/// Why a change conflicts with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// An element with the same identity already exists.
    AlreadyExists,
    /// The element to modify does not exist.
    Missing,
    /// The endpoint that should own the element does not exist.
    MissingEndpoint,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyExists => "already exists",
            Self::Missing => "does not exist",
            Self::MissingEndpoint => "belongs to an endpoint that does not exist",
        })
    }
}

/// A change that could not be applied as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Element kind, e.g. `endpoint`.
    pub kind: &'static str,
    /// Element identity, e.g. `GET /tasks`.
    pub identity: String,
    /// What went wrong.
    pub reason: ConflictReason,
    /// Summary of the element in the document, if any.
    pub existing: Option<String>,
    /// Summary of the element in the change.
    pub incoming: Option<String>,
    /// 1-based line of the change, or 0.
    pub line: usize,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.identity, self.reason)?;
        if let Some(existing) = &self.existing {
            write!(f, "; existing: {existing}")?;
        }
        if let Some(incoming) = &self.incoming {
            write!(f, "; incoming: {incoming}")?;
        }
        Ok(())
    }
}

/// The outcome of an amendment.
#[derive(Debug, Clone)]
pub struct AmendmentResult {
    /// The merged document.
    pub document: Document,
    /// Descriptions of the changes that were applied, in order.
    pub changes: Vec<String>,
    /// Changes that were not applied because they conflict.
    pub conflicts: Vec<Conflict>,
    /// Non-fatal problems, including recoverable parse errors.
    pub warnings: Vec<String>,
    /// Changes that could not be applied for other reasons.
    pub errors: Vec<String>,
    /// The rendered document, unless this was a dry run.
    pub output: Option<String>,
    /// Size of `output` in bytes; zero on a dry run.
    pub output_size: usize,
}

impl AmendmentResult {
    /// Whether every change was applied without conflicts or errors.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.errors.is_empty()
    }
}

/// Errors that abort an amendment.
#[derive(Debug, thiserror::Error)]
pub enum AmendError {
    /// The base document has a fatal error.
    #[error("failed to read the base document: {}", first_fatal(.0))]
    Base(Vec<ParseError>),
    /// The change description has a fatal error.
    #[error("failed to read the change description: {}", first_fatal(.0))]
    Changes(Vec<ParseError>),
    /// The merged document could not be rendered.
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

impl AmendError {
    /// The parse errors behind a read failure.
    #[must_use]
    pub fn parse_errors(&self) -> &[ParseError] {
        match self {
            Self::Base(errors) | Self::Changes(errors) => errors,
            Self::Serialize(_) => &[],
        }
    }
}

impl From<LoadError> for AmendError {
    fn from(error: LoadError) -> Self {
        Self::Base(vec![error.into()])
    }
}

fn first_fatal(errors: &[ParseError]) -> String {
    errors
        .iter()
        .find(|e| e.fatal)
        .or_else(|| errors.first())
        .map_or_else(|| "unknown error".to_string(), ToString::to_string)
}

/// Merges change descriptions into documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Amender {
    options: AmendOptions,
}

impl Amender {
    /// An amender with the given options.
    #[must_use]
    pub const fn new(options: AmendOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    #[must_use]
    pub const fn options(&self) -> &AmendOptions {
        &self.options
    }

    /// Reads a base document and a change description, and merges them.
    ///
    /// The base may be Markdown or OpenAPI YAML or JSON. Recoverable errors in
    /// either input are reported as warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if either input has a fatal error, or the merged
    /// document cannot be rendered.
    #[instrument(level = "debug", skip_all, fields(policy = %self.options.policy, dry_run = self.options.dry_run))]
    pub fn amend(&self, base: &str, changes: &str) -> Result<AmendmentResult, AmendError> {
        let base = match SourceFormat::detect(base) {
            SourceFormat::Markdown => parser::parse(base),
            SourceFormat::Yaml | SourceFormat::Json => openapi::load(base)?,
        };
        if base.has_fatal_errors() {
            return Err(AmendError::Base(base.errors().to_vec()));
        }

        let (changes, change_errors) = ChangeSet::parse(changes)
            .into_result()
            .map_err(AmendError::Changes)?;

        let mut warnings: Vec<String> = base
            .errors()
            .iter()
            .map(|error| format!("base document {error}"))
            .collect();
        warnings.extend(
            change_errors
                .iter()
                .map(|error| format!("change description {error}")),
        );

        let mut result = self.amend_document(&base, &changes)?;
        warnings.append(&mut result.warnings);
        result.warnings = warnings;
        Ok(result)
    }

    /// Merges a change set into a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged document cannot be rendered.
    pub fn amend_document(
        &self,
        base: &Document,
        changes: &ChangeSet,
    ) -> Result<AmendmentResult, AmendError> {
        let Merge {
            document,
            changes,
            conflicts,
            warnings,
            errors,
            ..
        } = apply(base, changes, self.options.policy);

        let output = if self.options.dry_run {
            None
        } else {
            Some(openapi::render(&document, self.options.format)?)
        };
        let output_size = output.as_ref().map_or(0, String::len);

        tracing::info!(
            changes = changes.len(),
            conflicts = conflicts.len(),
            warnings = warnings.len(),
            errors = errors.len(),
            output_size,
            "amended document"
        );

        Ok(AmendmentResult {
            document,
            changes,
            conflicts,
            warnings,
            errors,
            output,
            output_size,
        })
    }
}

/// The working state of a merge.
#[derive(Debug)]
pub struct Merge {
    /// The document being amended.
    pub document: Document,
    /// Applied change descriptions.
    pub changes: Vec<String>,
    /// Unapplied conflicting changes.
    pub conflicts: Vec<Conflict>,
    /// Warnings.
    pub warnings: Vec<String>,
    /// Errors.
    pub errors: Vec<String>,
    policy: ConflictPolicy,
}

/// Applies a change set to a copy of `base`.
///
/// Changes are applied in order; each sees the result of the ones before.
#[must_use]
pub fn apply(base: &Document, changes: &ChangeSet, policy: ConflictPolicy) -> Merge {
    let mut merge = Merge {
        document: base.revision(),
        changes: Vec::new(),
        conflicts: Vec::new(),
        warnings: Vec::new(),
        errors: Vec::new(),
        policy,
    };
    for change in changes {
        merge.apply(change);
    }
    merge
}

/// The name and place of the element a change addresses.
struct Subject {
    kind: &'static str,
    identity: String,
    line: usize,
}

impl Subject {
    fn of(change: &Change) -> Self {
        Self {
            kind: change.target.kind(),
            identity: change.target.identity(),
            line: change.line,
        }
    }
}

impl Merge {
    fn apply(&mut self, change: &Change) {
        tracing::debug!(%change, line = change.line, "applying change");
        match (&change.target, &change.payload) {
            (Target::Endpoint(key), payload) => self.endpoint(change, key, payload),
            (
                Target::Parameter {
                    name, location, ..
                },
                payload,
            ) => {
                let patch = match payload {
                    Payload::Parameter(patch) => Some(patch),
                    _ => None,
                };
                let Some((index, operation)) = self.owner(change) else {
                    return;
                };
                let subject = Subject::of(change);
                let endpoint = &mut self.document.endpoints[index];
                let position = endpoint
                    .parameters
                    .iter()
                    .position(|p| p.is(name, *location));
                let mut parameters = std::mem::take(&mut endpoint.parameters);
                self.merge(
                    &subject,
                    &mut parameters,
                    operation,
                    position,
                    || required(patch)?.clone().into_parameter().map_err(Into::into),
                    |parameter| {
                        let fields = required(patch)?.apply_to(parameter);
                        Ok(fields.into_iter().map(str::to_string).collect())
                    },
                    |parameter| {
                        format!("{} {}", parameter.identity(), parameter.ty)
                    },
                );
                self.document.endpoints[index].parameters = parameters;
            }
            (Target::Response { status, .. }, payload) => {
                let patch = match payload {
                    Payload::Response(patch) => Some(patch),
                    _ => None,
                };
                let Some((index, operation)) = self.owner(change) else {
                    return;
                };
                let subject = Subject::of(change);
                let endpoint = &mut self.document.endpoints[index];
                let position = endpoint.responses.iter().position(|r| r.status == *status);
                let mut responses = std::mem::take(&mut endpoint.responses);
                self.merge(
                    &subject,
                    &mut responses,
                    operation,
                    position,
                    || required(patch)?.clone().into_response().map_err(Into::into),
                    |response| {
                        let fields = required(patch)?.apply_to(response);
                        Ok(fields.into_iter().map(str::to_string).collect())
                    },
                    |response| format!("{} {}", response.status, response.description),
                );
                self.document.endpoints[index].responses = responses;
            }
            (Target::Component { name, .. }, payload) => {
                let definition = match payload {
                    Payload::Component(kind) => Some(kind),
                    _ => None,
                };
                let positions: Vec<usize> = self
                    .document
                    .components
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.name == *name)
                    .map(|(index, _)| index)
                    .collect();
                if positions.len() > 1 {
                    self.ambiguous(change, positions.len());
                    return;
                }
                let subject = Subject::of(change);
                let mut components = std::mem::take(&mut self.document.components);
                self.merge(
                    &subject,
                    &mut components,
                    change.operation,
                    positions.first().copied(),
                    || component(name.as_str(), required(definition)?.clone(), change.line)
                        .map_err(Into::into),
                    |existing: &mut Component| {
                        let incoming = required(definition)?;
                        let before = existing.kind.clone();
                        match (&mut existing.kind, incoming) {
                            (ComponentKind::Schema(schema), ComponentKind::Schema(overlay)) => {
                                schema.overlay(overlay);
                            }
                            (kind, incoming) => *kind = incoming.clone(),
                        }
                        Ok(if existing.kind == before {
                            Vec::new()
                        } else {
                            vec!["definition".to_string()]
                        })
                    },
                    |component| component.kind.to_string(),
                );
                self.document.components = components;
            }
        }
    }

    fn endpoint(&mut self, change: &Change, key: &EndpointKey, payload: &Payload) {
        let patch = match payload {
            Payload::Endpoint(patch) => Some(patch),
            _ => None,
        };
        let positions = self.endpoint_positions(key);
        if positions.len() > 1 {
            self.ambiguous(change, positions.len());
            return;
        }
        let subject = Subject::of(change);
        let mut endpoints = std::mem::take(&mut self.document.endpoints);
        self.merge(
            &subject,
            &mut endpoints,
            change.operation,
            positions.first().copied(),
            || {
                required(patch)?
                    .clone()
                    .into_endpoint(key.method, &key.path, change.line)
                    .map_err(Into::into)
            },
            |endpoint| required(patch)?.apply_to(endpoint).map_err(Into::into),
            endpoint_summary,
        );
        self.document.endpoints = endpoints;
    }

    /// Finds the single endpoint that owns a nested target.
    ///
    /// A missing owner is a warning for removals and a conflict otherwise;
    /// under the permissive policy an empty owner is created and the change
    /// is applied to it as an add.
    fn owner(&mut self, change: &Change) -> Option<(usize, Operation)> {
        let key = change.target.endpoint()?;
        let positions = self.endpoint_positions(key);
        match positions.as_slice() {
            [index] => Some((*index, change.operation)),
            [] if change.operation == Operation::Remove => {
                self.warnings.push(format!(
                    "{} {} was not removed: endpoint {key} does not exist",
                    change.target.kind(),
                    change.target.identity()
                ));
                None
            }
            [] => {
                let conflict = Conflict {
                    kind: change.target.kind(),
                    identity: change.target.identity(),
                    reason: ConflictReason::MissingEndpoint,
                    existing: None,
                    incoming: Some(key.to_string()),
                    line: change.line,
                };
                if !self.resolve(conflict) {
                    return None;
                }
                match EndpointBuilder::new(key.method, key.path.as_str()) {
                    Ok(mut builder) => {
                        builder.line(change.line);
                        self.document.endpoints.push(builder.build());
                        Some((self.document.endpoints.len() - 1, Operation::Add))
                    }
                    Err(error) => {
                        self.errors.push(format!("{change}: {error}"));
                        None
                    }
                }
            }
            _ => {
                self.ambiguous(change, positions.len());
                None
            }
        }
    }

    fn endpoint_positions(&self, key: &EndpointKey) -> Vec<usize> {
        self.document
            .endpoints
            .iter()
            .enumerate()
            .filter(|(_, endpoint)| endpoint.is(key))
            .map(|(index, _)| index)
            .collect()
    }

    fn ambiguous(&mut self, change: &Change, count: usize) {
        let target = change.target.endpoint().map_or_else(
            || format!("component {}", change.target.identity()),
            |key| format!("endpoint {key}"),
        );
        self.errors.push(format!(
            "{change} was not applied: ambiguous target, {count} elements match {target}"
        ));
    }

    /// Records a conflict. Returns whether the incoming change should be
    /// applied anyway.
    fn resolve(&mut self, conflict: Conflict) -> bool {
        match self.policy {
            ConflictPolicy::Strict => {
                tracing::warn!(%conflict, "conflict");
                self.conflicts.push(conflict);
                false
            }
            ConflictPolicy::AllowBreakingChanges => {
                tracing::debug!(%conflict, "accepting incoming change");
                self.warnings
                    .push(format!("accepted incoming change despite conflict: {conflict}"));
                true
            }
        }
    }

    /// Applies one operation to a list of elements.
    #[allow(clippy::too_many_arguments)]
    fn merge<T>(
        &mut self,
        subject: &Subject,
        items: &mut Vec<T>,
        operation: Operation,
        position: Option<usize>,
        build: impl FnOnce() -> Result<T, MergeError>,
        modify: impl FnOnce(&mut T) -> Result<Vec<String>, MergeError>,
        summarize: impl Fn(&T) -> String,
    ) {
        let Subject {
            kind,
            identity,
            line,
        } = subject;

        match (operation, position) {
            (Operation::Add, None) => match build() {
                Ok(item) => {
                    items.push(item);
                    self.changes.push(format!("Added {kind} {identity}"));
                }
                Err(error) => self.failed(operation, subject, &error),
            },
            (Operation::Add, Some(index)) => {
                let incoming = match build() {
                    Ok(item) => item,
                    Err(error) => return self.failed(operation, subject, &error),
                };
                let conflict = Conflict {
                    kind,
                    identity: identity.clone(),
                    reason: ConflictReason::AlreadyExists,
                    existing: Some(summarize(&items[index])),
                    incoming: Some(summarize(&incoming)),
                    line: *line,
                };
                if self.resolve(conflict) {
                    items[index] = incoming;
                    self.changes.push(format!("Replaced {kind} {identity}"));
                }
            }
            (Operation::Modify, Some(index)) => match modify(&mut items[index]) {
                Ok(fields) if fields.is_empty() => self
                    .warnings
                    .push(format!("modify {kind} {identity} changed nothing")),
                Ok(fields) => self.changes.push(format!(
                    "Modified {kind} {identity}: {}",
                    fields.join(", ")
                )),
                Err(error) => self.failed(operation, subject, &error),
            },
            (Operation::Modify, None) => {
                let incoming = match build() {
                    Ok(item) => item,
                    Err(error) => return self.failed(operation, subject, &error),
                };
                let conflict = Conflict {
                    kind,
                    identity: identity.clone(),
                    reason: ConflictReason::Missing,
                    existing: None,
                    incoming: Some(summarize(&incoming)),
                    line: *line,
                };
                if self.resolve(conflict) {
                    items.push(incoming);
                    self.changes.push(format!("Added {kind} {identity}"));
                }
            }
            (Operation::Remove, Some(index)) => {
                items.remove(index);
                self.changes.push(format!("Removed {kind} {identity}"));
            }
            (Operation::Remove, None) => self.warnings.push(format!(
                "{kind} {identity} does not exist; nothing was removed"
            )),
        }
    }

    fn failed(&mut self, operation: Operation, subject: &Subject, error: &MergeError) {
        self.errors.push(format!(
            "{operation} {} {} was not applied: {error}",
            subject.kind, subject.identity
        ));
    }
}

/// Why a single change could not be applied.
#[derive(Debug, thiserror::Error)]
enum MergeError {
    #[error("the change has no payload for its target")]
    MissingPayload,
    #[error(transparent)]
    Build(#[from] BuildError),
}

fn required<T>(payload: Option<&T>) -> Result<&T, MergeError> {
    payload.ok_or(MergeError::MissingPayload)
}

fn endpoint_summary(endpoint: &Endpoint) -> String {
    let mut summary = endpoint.key().to_string();
    if !endpoint.summary.is_empty() {
        let _ = write!(summary, " \"{}\"", endpoint.summary);
    }
    let statuses: Vec<&str> = endpoint.responses.iter().map(|r| r.status.as_str()).collect();
    if !statuses.is_empty() {
        let _ = write!(summary, " responses [{}]", statuses.join(", "));
    }
    summary
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{EndpointPatch, Location, Method, ParameterPatch, ResponsePatch},
        parse,
    };

    fn endpoint_patch(summary: &str) -> EndpointPatch {
        EndpointPatch {
            summary: Some(summary.to_string()),
            ..EndpointPatch::default()
        }
    }

    const BASE: &str = "---\ntitle: Tasks\nversion: 1.0.0\n---\n## GET /tasks List tasks\n**Parameters:**\n- `limit` (integer)\n**Response (200):** OK\n## DELETE /tasks/{id}\n**Response (204):**\n## Components\n### Task\n```yaml\ntype: object\n```\n";

    fn amender(policy: ConflictPolicy, dry_run: bool) -> Amender {
        Amender::new(AmendOptions {
            policy,
            dry_run,
            format: Format::Yaml,
        })
    }

    #[test]
    fn empty_change_set_is_idempotent() {
        let base = parse(BASE);
        let result = amender(ConflictPolicy::Strict, false)
            .amend_document(&base, &ChangeSet::new())
            .unwrap();
        assert_eq!(result.document, base);
        assert!(result.changes.is_empty());
        assert!(result.conflicts.is_empty());
        assert!(result.output_size > 0);
    }

    #[test]
    fn strict_add_of_existing_endpoint_conflicts() {
        let result = amender(ConflictPolicy::Strict, false)
            .amend(BASE, "## ADD GET /tasks Other\n")
            .unwrap();
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.identity, "GET /tasks");
        assert_eq!(conflict.reason, ConflictReason::AlreadyExists);
        assert_eq!(conflict.line, 1);
        assert!(conflict.existing.as_deref().unwrap().contains("List tasks"));
        assert!(result.changes.is_empty());
        assert_eq!(result.document.endpoints()[0].summary, "List tasks");
    }

    #[test]
    fn permissive_add_of_existing_endpoint_overwrites() {
        let result = amender(ConflictPolicy::AllowBreakingChanges, false)
            .amend(BASE, "## ADD GET /tasks Other\n")
            .unwrap();
        assert!(result.conflicts.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.changes, vec!["Replaced endpoint GET /tasks"]);
        assert_eq!(result.document.endpoints()[0].summary, "Other");
        assert_eq!(result.document.endpoints().len(), 2);
    }

    #[test]
    fn removing_a_missing_endpoint_warns() {
        let base = parse(BASE);
        let result = amender(ConflictPolicy::Strict, false)
            .amend(BASE, "## REMOVE GET /missing\n")
            .unwrap();
        assert!(result.conflicts.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.document, base);
    }

    #[test]
    fn modify_response_description() {
        let result = amender(ConflictPolicy::Strict, false)
            .amend(BASE, "## MODIFY GET /tasks RESPONSE 200\nUpdated\n")
            .unwrap();
        assert_eq!(
            result.changes,
            vec!["Modified response 200 on GET /tasks: description"]
        );
        assert!(result.conflicts.is_empty());
        let key = EndpointKey::new(Method::Get, "/tasks");
        let endpoint = result.document.find_endpoints(&key)[0];
        assert_eq!(endpoint.response("200").unwrap().description, "Updated");
    }

    #[test_case(ConflictPolicy::Strict; "strict")]
    #[test_case(ConflictPolicy::AllowBreakingChanges; "permissive")]
    fn dry_run_matches_real_run(policy: ConflictPolicy) {
        let changes = "## ADD GET /tasks\n## ADD POST /tasks\n**Response (201):**\n## MODIFY GET /tasks PARAMETER limit query\n- `limit` (query, number)\n## REMOVE DELETE /tasks/{id}\n## REMOVE GET /nope\n## MODIFY PUT /nope RESPONSE 200\nx\n";
        let real = amender(policy, false).amend(BASE, changes).unwrap();
        let dry = amender(policy, true).amend(BASE, changes).unwrap();

        assert_eq!(real.changes, dry.changes);
        assert_eq!(real.conflicts, dry.conflicts);
        assert_eq!(real.warnings, dry.warnings);
        assert_eq!(real.errors, dry.errors);
        assert_eq!(real.document, dry.document);
        assert!(dry.output.is_none());
        assert_eq!(dry.output_size, 0);
        assert_eq!(real.output_size, real.output.as_ref().unwrap().len());
        assert!(real.output_size > 0);
    }

    #[test]
    fn nested_targets_on_missing_endpoints() {
        let strict = amender(ConflictPolicy::Strict, true)
            .amend(
                BASE,
                "## ADD PUT /tasks PARAMETER x\n## REMOVE PUT /tasks RESPONSE 200\n",
            )
            .unwrap();
        assert_eq!(strict.conflicts.len(), 1);
        assert_eq!(strict.conflicts[0].reason, ConflictReason::MissingEndpoint);
        assert_eq!(strict.warnings.len(), 1);

        let permissive = amender(ConflictPolicy::AllowBreakingChanges, true)
            .amend(BASE, "## ADD PUT /tasks PARAMETER x\n")
            .unwrap();
        assert!(permissive.conflicts.is_empty());
        assert_eq!(permissive.warnings.len(), 1);
        let key = EndpointKey::new(Method::Put, "/tasks");
        let created = permissive.document.find_endpoints(&key)[0];
        assert!(created.parameter("x", Location::Query).is_some());
    }

    #[test]
    fn modify_of_missing_element_conflicts_or_inserts() {
        let changes = "## MODIFY GET /tasks RESPONSE 404\nGone\n";
        let strict = amender(ConflictPolicy::Strict, true).amend(BASE, changes).unwrap();
        assert_eq!(strict.conflicts[0].reason, ConflictReason::Missing);

        let permissive = amender(ConflictPolicy::AllowBreakingChanges, true)
            .amend(BASE, changes)
            .unwrap();
        assert_eq!(permissive.changes, vec!["Added response 404 on GET /tasks"]);
        assert_eq!(permissive.warnings.len(), 1);
    }

    #[test_case("## MODIFY PUT /tasks PARAMETER q query\n", "q (query) on PUT /tasks"; "parameter")]
    #[test_case("## MODIFY PUT /tasks RESPONSE 200\nDone\n", "200 on PUT /tasks"; "response")]
    fn permissive_modify_under_missing_endpoint_warns_once(changes: &str, identity: &str) {
        let result = amender(ConflictPolicy::AllowBreakingChanges, true)
            .amend(BASE, changes)
            .unwrap();
        assert!(result.conflicts.is_empty());
        assert_eq!(result.warnings.len(), 1, "{:?}", result.warnings);
        assert!(result.warnings[0].contains("endpoint"));
        assert_eq!(result.changes.len(), 1);
        assert!(result.changes[0].ends_with(identity), "{:?}", result.changes);
        let key = EndpointKey::new(Method::Put, "/tasks");
        assert_eq!(result.document.find_endpoints(&key).len(), 1);
    }

    #[test]
    fn reapplying_an_identical_example_changes_nothing() {
        let base = "## GET /tasks\n**Response (200):** OK\n```json\n{\"id\": 1}\n```\n";
        let changes = "## MODIFY GET /tasks RESPONSE 200\n```json\n{\"id\": 1}\n```\n";
        let result = amender(ConflictPolicy::Strict, true).amend(base, changes).unwrap();

        assert!(result.changes.is_empty(), "{:?}", result.changes);
        assert_eq!(
            result.warnings,
            vec!["modify response 200 on GET /tasks changed nothing"]
        );
        assert_eq!(result.document, parse(base));
    }

    #[test]
    fn duplicate_endpoints_are_ambiguous() {
        let base = parse("## GET /x\n## GET /x\n");
        let mut changes = ChangeSet::new();
        changes.push(Change::new(
            Operation::Remove,
            Target::Endpoint(EndpointKey::new(Method::Get, "/x")),
            Payload::Empty,
        ));
        let merge = apply(&base, &changes, ConflictPolicy::AllowBreakingChanges);
        assert_eq!(merge.errors.len(), 1);
        assert!(merge.errors[0].contains("ambiguous"));
        assert_eq!(merge.document.endpoints().len(), 2);
    }

    #[test]
    fn components_are_added_modified_and_removed() {
        let changes = "## MODIFY COMPONENT Task\n```yaml\ndescription: A task\n```\n## ADD COMPONENT Error\n```json\n{\"type\": \"object\"}\n```\n## REMOVE COMPONENT Task\n";
        let result = amender(ConflictPolicy::Strict, true).amend(BASE, changes).unwrap();
        assert_eq!(
            result.changes,
            vec![
                "Modified component Task: definition",
                "Added component Error",
                "Removed component Task",
            ]
        );
        let names: Vec<_> = result.document.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Error"]);

        let unchanged = amender(ConflictPolicy::Strict, true)
            .amend(BASE, "## MODIFY COMPONENT Task\n```yaml\ntype: object\n```\n")
            .unwrap();
        assert!(unchanged.changes.is_empty());
        assert_eq!(
            unchanged.warnings,
            vec!["modify component Task changed nothing"]
        );
    }

    #[test]
    fn library_changes_without_payload_are_errors() {
        let base = parse(BASE);
        let mut changes = ChangeSet::new();
        changes.push(Change::new(
            Operation::Add,
            Target::Endpoint(EndpointKey::new(Method::Post, "/tasks")),
            Payload::Empty,
        ));
        changes.push(Change::new(
            Operation::Add,
            Target::Endpoint(EndpointKey::new(Method::Post, "/tasks")),
            Payload::Endpoint(endpoint_patch("Create")),
        ));
        changes.push(Change::new(
            Operation::Modify,
            Target::Parameter {
                endpoint: EndpointKey::new(Method::Get, "/tasks"),
                name: "limit".to_string(),
                location: Location::Query,
            },
            Payload::Parameter(ParameterPatch {
                required: Some(true),
                ..ParameterPatch::new("limit", Location::Query)
            }),
        ));
        changes.push(Change::new(
            Operation::Modify,
            Target::Response {
                endpoint: EndpointKey::new(Method::Get, "/tasks"),
                status: "200".to_string(),
            },
            Payload::Response(ResponsePatch::new("200")),
        ));

        let merge = apply(&base, &changes, ConflictPolicy::Strict);
        assert_eq!(merge.errors.len(), 1);
        assert!(merge.errors[0].contains("no payload"));
        assert_eq!(
            merge.changes,
            vec![
                "Added endpoint POST /tasks",
                "Modified parameter limit (query) on GET /tasks: required",
            ]
        );
        assert_eq!(merge.warnings, vec!["modify response 200 on GET /tasks changed nothing"]);
    }

    #[test]
    fn fatal_inputs_abort() {
        let amender = amender(ConflictPolicy::Strict, false);
        let error = amender.amend("## GET /x\n```json\n", "").unwrap_err();
        assert!(matches!(error, AmendError::Base(_)));
        assert!(error.parse_errors()[0].fatal);

        let error = amender.amend(BASE, "## ADD GET /y\n~~~\n").unwrap_err();
        assert!(matches!(error, AmendError::Changes(_)));

        let error = amender.amend("{\"openapi\": ", "").unwrap_err();
        assert!(matches!(error, AmendError::Base(_)));
    }

    #[test]
    fn recoverable_input_errors_become_warnings() {
        let result = amender(ConflictPolicy::Strict, true)
            .amend("## GET /x\n## Overview\n", "## RENAME GET /x\n")
            .unwrap();
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].starts_with("base document 2:4"));
        assert!(result.warnings[1].starts_with("change description 1:4"));
    }

    #[test]
    fn policy_names() {
        assert_eq!("auto".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::AllowBreakingChanges);
        assert_eq!(ConflictPolicy::Strict.to_string(), "strict");
        assert!("merge".parse::<ConflictPolicy>().is_err());
    }
}
