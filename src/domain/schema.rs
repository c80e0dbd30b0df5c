use std::collections::BTreeMap;

use serde_json::Value;

/// Prefix used when a schema reference is written out as a JSON pointer.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// A node in a schema tree.
///
/// A schema is either a reference to a named component, or an inline
/// definition. The two are mutually exclusive: a reference never carries
/// structural fields of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// A reference to a schema component, by component name.
    Reference(String),
    /// An inline schema definition.
    Inline(InlineSchema),
}

/// The structural fields of an inline schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineSchema {
    /// The JSON type (`object`, `array`, `string`, ...).
    pub ty: Option<String>,
    /// Format hint for the type (`date-time`, `int64`, ...).
    pub format: Option<String>,
    /// Human readable description.
    pub description: Option<String>,
    /// Example value.
    pub example: Option<Value>,
    /// Nested property schemas, keyed by property name.
    pub properties: BTreeMap<String, Schema>,
    /// Names of required properties, in declaration order.
    pub required: Vec<String>,
    /// Schema of array items.
    pub items: Option<Box<Schema>>,
    /// Allowed values.
    pub enumeration: Vec<Value>,
}

impl Schema {
    /// Creates a reference node.
    ///
    /// Accepts either a bare component name (`Task`) or a full pointer
    /// (`#/components/schemas/Task`).
    #[must_use]
    pub fn reference(target: &str) -> Self {
        Self::Reference(
            target
                .strip_prefix(SCHEMA_REF_PREFIX)
                .unwrap_or(target)
                .to_string(),
        )
    }

    /// Creates an inline node of the given type with no other fields set.
    #[must_use]
    pub fn of_type(ty: &str) -> Self {
        Self::Inline(InlineSchema {
            ty: Some(ty.to_string()),
            ..InlineSchema::default()
        })
    }

    /// The referenced component name, if this is a reference node.
    #[must_use]
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            Self::Reference(name) => Some(name),
            Self::Inline(_) => None,
        }
    }

    /// The inline definition, if this is an inline node.
    #[must_use]
    pub const fn as_inline(&self) -> Option<&InlineSchema> {
        match self {
            Self::Reference(_) => None,
            Self::Inline(inline) => Some(inline),
        }
    }

    /// The type name of this node, or `$ref` for a reference.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Reference(_) => "$ref",
            Self::Inline(inline) => inline.ty.as_deref().unwrap_or("any"),
        }
    }

    /// Collects the names of every component referenced anywhere in this
    /// tree, in depth-first order.
    pub fn references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Reference(name) => out.push(name),
            Self::Inline(inline) => {
                for property in inline.properties.values() {
                    property.references(out);
                }
                if let Some(items) = &inline.items {
                    items.references(out);
                }
            }
        }
    }

    /// Overlays `incoming` on top of this schema.
    ///
    /// A reference on either side replaces wholesale. Between two inline
    /// schemas, set fields replace, properties merge recursively and the
    /// required lists are unioned.
    pub fn overlay(&mut self, incoming: &Self) {
        match (self, incoming) {
            (Self::Inline(existing), Self::Inline(incoming)) => existing.overlay(incoming),
            (this, incoming) => *this = incoming.clone(),
        }
    }

    /// Short one-line rendering used in reports.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Reference(name) => format!("{SCHEMA_REF_PREFIX}{name}"),
            Self::Inline(inline) if inline.properties.is_empty() => self.type_name().to_string(),
            Self::Inline(inline) => format!(
                "{} {{{}}}",
                self.type_name(),
                inline.properties.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

impl InlineSchema {
    fn overlay(&mut self, incoming: &Self) {
        overlay_option(&mut self.ty, &incoming.ty);
        overlay_option(&mut self.format, &incoming.format);
        overlay_option(&mut self.description, &incoming.description);
        overlay_option(&mut self.example, &incoming.example);

        for (name, schema) in &incoming.properties {
            match self.properties.get_mut(name) {
                Some(existing) => existing.overlay(schema),
                None => {
                    self.properties.insert(name.clone(), schema.clone());
                }
            }
        }

        for name in &incoming.required {
            if !self.required.contains(name) {
                self.required.push(name.clone());
            }
        }

        match (&mut self.items, &incoming.items) {
            (Some(existing), Some(items)) => existing.overlay(items),
            (None, Some(items)) => self.items = Some(items.clone()),
            _ => {}
        }

        if !incoming.enumeration.is_empty() {
            self.enumeration.clone_from(&incoming.enumeration);
        }
    }
}

fn overlay_option<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if incoming.is_some() {
        target.clone_from(incoming);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(properties: &[(&str, Schema)], required: &[&str]) -> Schema {
        Schema::Inline(InlineSchema {
            ty: Some("object".to_string()),
            properties: properties
                .iter()
                .map(|(name, schema)| ((*name).to_string(), schema.clone()))
                .collect(),
            required: required.iter().map(ToString::to_string).collect(),
            ..InlineSchema::default()
        })
    }

    #[test]
    fn reference_strips_pointer_prefix() {
        assert_eq!(
            Schema::reference("#/components/schemas/Task"),
            Schema::Reference("Task".to_string())
        );
        assert_eq!(Schema::reference("Task").reference_name(), Some("Task"));
    }

    #[test]
    fn overlay_merges_properties_and_required() {
        let mut existing = object(&[("id", Schema::of_type("integer"))], &["id"]);
        let incoming = object(
            &[
                ("id", Schema::of_type("string")),
                ("title", Schema::of_type("string")),
            ],
            &["title", "id"],
        );

        existing.overlay(&incoming);

        let inline = existing.as_inline().unwrap();
        assert_eq!(inline.properties["id"].type_name(), "string");
        assert!(inline.properties.contains_key("title"));
        assert_eq!(inline.required, vec!["id", "title"]);
    }

    #[test]
    fn reference_replaces_inline_wholesale() {
        let mut existing = object(&[("id", Schema::of_type("integer"))], &[]);
        existing.overlay(&Schema::reference("Task"));
        assert_eq!(existing, Schema::reference("Task"));

        existing.overlay(&Schema::of_type("string"));
        assert_eq!(existing, Schema::of_type("string"));
    }

    #[test]
    fn overlay_keeps_unset_fields() {
        let mut existing = Schema::Inline(InlineSchema {
            ty: Some("string".to_string()),
            description: Some("old".to_string()),
            example: Some(json!("a")),
            ..InlineSchema::default()
        });
        let incoming = Schema::Inline(InlineSchema {
            description: Some("new".to_string()),
            ..InlineSchema::default()
        });

        existing.overlay(&incoming);

        let inline = existing.as_inline().unwrap();
        assert_eq!(inline.ty.as_deref(), Some("string"));
        assert_eq!(inline.description.as_deref(), Some("new"));
        assert_eq!(inline.example, Some(json!("a")));
    }

    #[test]
    fn references_are_collected_depth_first() {
        let schema = object(
            &[
                ("owner", Schema::reference("User")),
                (
                    "tags",
                    Schema::Inline(InlineSchema {
                        ty: Some("array".to_string()),
                        items: Some(Box::new(Schema::reference("Tag"))),
                        ..InlineSchema::default()
                    }),
                ),
            ],
            &[],
        );
        let mut refs = Vec::new();
        schema.references(&mut refs);
        assert_eq!(refs, vec!["User", "Tag"]);
    }
}
