use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::domain::{Schema, SchemaBuilder};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid regex")
});

/// Infers a schema from an example value.
///
/// Object keys are all treated as required. Array items are inferred from
/// the first element.
pub fn infer(value: &Value) -> Schema {
    let mut builder = SchemaBuilder::new();
    match value {
        Value::Null => {}
        Value::Bool(_) => {
            builder.ty("boolean");
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            builder.ty("integer");
        }
        Value::Number(_) => {
            builder.ty("number");
        }
        Value::String(s) => {
            builder.ty("string").format(string_format(s));
        }
        Value::Array(items) => {
            builder.ty("array").items(items.first().map(infer));
        }
        Value::Object(fields) => {
            builder.ty("object");
            for (name, field) in fields {
                builder.property(name, infer(field)).required(name);
            }
        }
    }
    // An inline builder without a reference cannot fail.
    builder.build().unwrap_or_else(|_| Schema::of_type("object"))
}

/// Infers a schema and attaches the value as its example.
pub fn infer_with_example(value: Value) -> Schema {
    match infer(&value) {
        Schema::Inline(mut inline) => {
            inline.example = Some(value);
            Schema::Inline(inline)
        }
        reference @ Schema::Reference(_) => reference,
    }
}

fn string_format(s: &str) -> &'static str {
    if DateTime::parse_from_rfc3339(s).is_ok() {
        "date-time"
    } else if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        "date"
    } else if UUID.is_match(s) {
        "uuid"
    } else if EMAIL.is_match(s) {
        "email"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(json!(true), "boolean"; "boolean")]
    #[test_case(json!(3), "integer"; "integer")]
    #[test_case(json!(3.5), "number"; "number")]
    #[test_case(json!("x"), "string"; "string")]
    #[test_case(json!([]), "array"; "empty array")]
    #[test_case(json!({}), "object"; "empty object")]
    fn primitive_types(value: Value, expected: &str) {
        assert_eq!(infer(&value).type_name(), expected);
    }

    #[test_case("2025-07-14T07:15:00Z", Some("date-time"); "date time")]
    #[test_case("2025-07-14", Some("date"); "date")]
    #[test_case("12b3f5c5-b1a8-4aa8-a882-20ff1c2aab53", Some("uuid"); "uuid")]
    #[test_case("dev@example.com", Some("email"); "email")]
    #[test_case("hello", None; "plain")]
    fn string_formats(value: &str, expected: Option<&str>) {
        let schema = infer(&json!(value));
        assert_eq!(schema.as_inline().unwrap().format.as_deref(), expected);
    }

    #[test]
    fn nested_objects_and_arrays() {
        let schema = infer(&json!({
            "id": 1,
            "tags": ["a", "b"],
            "owner": {"email": "a@b.io"}
        }));
        let inline = schema.as_inline().unwrap();
        assert_eq!(inline.required, vec!["id", "owner", "tags"]);

        let tags = inline.properties["tags"].as_inline().unwrap();
        assert_eq!(tags.items.as_deref().unwrap().type_name(), "string");

        let owner = inline.properties["owner"].as_inline().unwrap();
        assert_eq!(
            owner.properties["email"].as_inline().unwrap().format.as_deref(),
            Some("email")
        );
    }

    #[test]
    fn example_is_attached_to_root_only() {
        let schema = infer_with_example(json!({"id": 1}));
        let inline = schema.as_inline().unwrap();
        assert_eq!(inline.example, Some(json!({"id": 1})));
        assert!(inline.properties["id"].as_inline().unwrap().example.is_none());
    }
}
