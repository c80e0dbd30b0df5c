//! End-to-end properties of parsing, amending and rendering.

#![allow(missing_docs)]

use specforge::{
    AmendOptions, Amender, ChangeSet, ConflictPolicy, Format,
    amend::{Change, Operation, Payload, Target},
    diff,
    domain::{EndpointKey, Method, ResponsePatch},
    openapi, parse,
    validate::{StructuralValidator, ValidationConfig, Validator},
};
use test_case::test_case;

const TASKS: &str = "---
title: Tasks
version: 1.0.0
---

# Task API

Manage tasks.

## GET /tasks List tasks

**Tags:** tasks

**Parameters:**
- `limit` (integer, optional): Page size
- `cursor` (string)

**Response (200):** The tasks
```json
[{\"id\": 1, \"title\": \"Write\"}]
```

## POST /tasks Create a task

**Request Body:**
```json
{\"title\": \"Write\"}
```

**Response (201):** Created `#/components/schemas/Task`

## GET /tasks/{id} Fetch a task

**Response (200):** `#/components/schemas/Task`
**Response (404):**

## DELETE /tasks/{id}

**Response (204):**

## Components

### Task
```yaml
type: object
required: [id]
properties:
  id:
    type: integer
  title:
    type: string
```
";

fn amender(policy: ConflictPolicy, dry_run: bool) -> Amender {
    Amender::new(AmendOptions {
        policy,
        dry_run,
        format: Format::Yaml,
    })
}

#[test]
fn endpoints_are_parsed_in_source_order() {
    let document = parse(TASKS);
    assert!(document.errors().is_empty(), "{:?}", document.errors());
    let keys: Vec<String> = document
        .endpoints()
        .iter()
        .map(|e| e.key().to_string())
        .collect();
    assert_eq!(
        keys,
        vec![
            "GET /tasks",
            "POST /tasks",
            "GET /tasks/{id}",
            "DELETE /tasks/{id}"
        ]
    );
}

#[test_case(TASKS; "valid")]
#[test_case("## GET /a\n## FETCH /b\n**Response (999):**\n## Components\n### X\n"; "with errors")]
#[test_case("## GET /a\n```json\n{"; "fatal")]
fn parsing_is_deterministic(text: &str) {
    let first = parse(text);
    let second = parse(text);
    assert_eq!(first, second);
    assert_eq!(first.errors(), second.errors());
}

#[test]
fn empty_change_set_leaves_the_document_unchanged() {
    let base = parse(TASKS);
    let result = amender(ConflictPolicy::Strict, false)
        .amend_document(&base, &ChangeSet::new())
        .unwrap();
    assert_eq!(result.document, base);
    assert!(result.changes.is_empty());
    assert!(result.conflicts.is_empty());
}

#[test]
fn adding_an_existing_endpoint() {
    let changes = "## ADD GET /tasks\n**Response (200):**\n";

    let strict = amender(ConflictPolicy::Strict, false)
        .amend(TASKS, changes)
        .unwrap();
    assert_eq!(strict.conflicts.len(), 1);
    assert!(strict.conflicts[0].to_string().contains("GET /tasks"));

    let permissive = amender(ConflictPolicy::AllowBreakingChanges, false)
        .amend(TASKS, changes)
        .unwrap();
    assert!(permissive.conflicts.is_empty());
    assert_eq!(permissive.warnings.len(), 1);
}

#[test]
fn removing_a_missing_endpoint() {
    let base = parse(TASKS);
    let mut changes = ChangeSet::new();
    changes.push(Change::new(
        Operation::Remove,
        Target::Endpoint(EndpointKey::new(Method::Get, "/missing")),
        Payload::Empty,
    ));

    let result = amender(ConflictPolicy::Strict, false)
        .amend_document(&base, &changes)
        .unwrap();
    assert!(result.conflicts.is_empty());
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.document, base);
}

#[test_case(ConflictPolicy::Strict; "strict")]
#[test_case(ConflictPolicy::AllowBreakingChanges; "permissive")]
fn dry_run_reports_the_same_merge(policy: ConflictPolicy) {
    let changes = "\
## ADD GET /tasks
## MODIFY GET /tasks PARAMETER limit query
- `limit` (query, integer, required)
## ADD PATCH /tasks/{id} Update a task
**Response (200):**
## REMOVE DELETE /tasks/{id}
## REMOVE GET /nothing
## MODIFY GET /tasks/{id} RESPONSE 500
Server error
## ADD COMPONENT Task
```yaml
type: string
```
";
    let real = amender(policy, false).amend(TASKS, changes).unwrap();
    let dry = amender(policy, true).amend(TASKS, changes).unwrap();

    assert_eq!(real.changes, dry.changes);
    assert_eq!(real.conflicts, dry.conflicts);
    assert_eq!(real.warnings, dry.warnings);
    assert_eq!(real.errors, dry.errors);
    assert_eq!(dry.output, None);
    assert_eq!(dry.output_size, 0);
    assert_ne!(real.output_size, 0);
}

#[test]
fn modifying_a_response_description() {
    let base = parse("## GET /tasks\n**Response (200):** OK\n");
    let mut changes = ChangeSet::new();
    changes.push(Change::new(
        Operation::Modify,
        Target::Response {
            endpoint: EndpointKey::new(Method::Get, "/tasks"),
            status: "200".to_string(),
        },
        Payload::Response(ResponsePatch {
            description: Some("Updated".to_string()),
            ..ResponsePatch::new("200")
        }),
    ));

    let result = amender(ConflictPolicy::Strict, false)
        .amend_document(&base, &changes)
        .unwrap();

    assert_eq!(result.changes.len(), 1);
    assert!(result.changes[0].contains("GET /tasks"));
    assert!(result.changes[0].contains("200"));
    assert!(result.conflicts.is_empty());
    let endpoint = &result.document.endpoints()[0];
    assert_eq!(endpoint.response("200").unwrap().description, "Updated");
}

#[test_case(Format::Yaml; "yaml")]
#[test_case(Format::Json; "json")]
fn rendered_documents_load_back(format: Format) {
    let parsed = parse(TASKS);
    let loaded = openapi::load(&openapi::render(&parsed, format).unwrap()).unwrap();

    assert!(loaded.errors().is_empty(), "{:?}", loaded.errors());
    assert_eq!(loaded.title(), "Tasks");
    assert!(diff::compare(&parsed, &loaded).is_empty());
}

#[test]
fn amended_openapi_can_be_amended_again() {
    let first = amender(ConflictPolicy::Strict, false)
        .amend(TASKS, "## ADD PUT /tasks/{id} Replace a task\n**Response (200):**\n")
        .unwrap();
    let yaml = first.output.unwrap();

    let second = amender(ConflictPolicy::Strict, false)
        .amend(&yaml, "## REMOVE PUT /tasks/{id}\n")
        .unwrap();
    assert_eq!(second.changes, vec!["Removed endpoint PUT /tasks/{id}"]);
    assert!(diff::compare(&parse(TASKS), &second.document).is_empty());
}

#[test]
fn validator_reports_unresolved_references_and_path_parameters() {
    let yaml = "\
openapi: 3.0.3
info:
  title: Broken
  version: '1'
paths:
  /tasks/{id}:
    get:
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Task'
";
    let report = StructuralValidator.validate(yaml, &ValidationConfig::default());
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
    assert!(report.errors.iter().any(|e| e.contains("unresolved reference 'Task'")));
    assert!(report.errors.iter().any(|e| e.contains("'id'")));
}

#[test]
fn removing_an_endpoint_is_a_breaking_difference() {
    let base = parse(TASKS);
    let result = amender(ConflictPolicy::Strict, true)
        .amend(TASKS, "## REMOVE DELETE /tasks/{id}\n")
        .unwrap();

    let differences = diff::compare(&base, &result.document);
    assert_eq!(differences.len(), 1);
    assert!(differences[0].breaking);
    assert!(diff::compare(&base, &base).is_empty());
}
