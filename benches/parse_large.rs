//! This bench test parses, amends and renders a large generated API
//! description.

#![allow(missing_docs)]

use std::fmt::Write;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use specforge::{AmendOptions, Amender, ChangeSet, ConflictPolicy, Format, openapi, parse};

/// Generates a document with `count` resources, each with two endpoints and a
/// schema component.
fn generate_document(count: usize) -> String {
    let mut text = String::from("---\ntitle: Generated\nversion: 1.0.0\n---\n\n");
    for i in 0..count {
        write!(
            text,
            "## GET /resources{i}/{{id}} Fetch resource {i}\n\n\
             **Tags:** resources\n\n\
             **Parameters:**\n\
             - `verbose` (boolean, optional): Include everything\n\
             - `fields` (string): Fields to return\n\n\
             **Response (200):** Found `#/components/schemas/Resource{i}`\n\
             - `ETag` (header): Version tag\n\n\
             **Response (404):** Not found\n\n\
             ## POST /resources{i} Create resource {i}\n\n\
             **Request Body:**\n\
             ```json\n{{\"name\": \"resource\", \"size\": {i}, \"tags\": [\"a\", \"b\"]}}\n```\n\n\
             **Response (201):** Created\n\n"
        )
        .unwrap();
    }
    text.push_str("## Components\n\n");
    for i in 0..count {
        write!(
            text,
            "### Resource{i}\n```yaml\ntype: object\nrequired: [id]\nproperties:\n  id:\n    type: integer\n  name:\n    type: string\n```\n\n"
        )
        .unwrap();
    }
    text
}

fn generate_changes(count: usize) -> String {
    let mut text = String::new();
    for i in (0..count).step_by(2) {
        write!(
            text,
            "## MODIFY GET /resources{i}/{{id}} RESPONSE 200\nUpdated description\n\n\
             ## ADD DELETE /resources{i}/{{id}} Delete resource {i}\n**Response (204):**\n\n"
        )
        .unwrap();
    }
    text
}

fn parse_large(c: &mut Criterion) {
    let text = generate_document(500);
    c.bench_function("parse 1000 endpoints", |b| b.iter(|| parse(&text)));
}

fn render_large(c: &mut Criterion) {
    let document = parse(&generate_document(500));
    c.bench_function("render 1000 endpoints as yaml", |b| {
        b.iter(|| openapi::render(&document, Format::Yaml).unwrap());
    });
}

fn amend_large(c: &mut Criterion) {
    let document = parse(&generate_document(500));
    let (changes, _) = ChangeSet::parse(&generate_changes(500))
        .into_result()
        .unwrap();
    let amender = Amender::new(AmendOptions {
        policy: ConflictPolicy::Strict,
        dry_run: true,
        format: Format::Yaml,
    });
    c.bench_function("amend 500 changes", |b| {
        b.iter_batched(
            || document.clone(),
            |document| amender.amend_document(&document, &changes).unwrap(),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, parse_large, render_large, amend_large);
criterion_main!(benches);
