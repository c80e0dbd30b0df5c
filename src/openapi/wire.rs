//! Serialized OpenAPI 3.0 objects.
//!
//! Only the subset of OpenAPI that the document model can express is
//! represented. Map-valued fields whose order matters to readers are kept as
//! ordered `(key, value)` lists.

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use serde_json::Value;

/// The OpenAPI version written by the renderer.
pub const OPENAPI_VERSION: &str = "3.0.3";

/// The root object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenApi {
    /// OpenAPI version string.
    #[serde(default)]
    pub openapi: String,
    /// API metadata.
    #[serde(default)]
    pub info: Info,
    /// Path items in document order.
    #[serde(default, with = "ordered")]
    pub paths: Vec<(String, PathItem)>,
    /// Reusable definitions.
    #[serde(default, skip_serializing_if = "Components::is_empty")]
    pub components: Components,
}

/// API metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    /// Title.
    #[serde(default)]
    pub title: String,
    /// API version.
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Any other fields, including `x-` extensions.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

/// The operations available on a single path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    /// `GET`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    /// `PUT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    /// `POST`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    /// `DELETE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    /// `OPTIONS`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    /// `HEAD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    /// `PATCH`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    /// `TRACE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
    /// Fields that are not operations.
    #[serde(flatten, skip_serializing)]
    pub other: BTreeMap<String, Value>,
}

/// A single operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterObject>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyObject>,
    /// Responses in document order.
    #[serde(default, with = "ordered")]
    pub responses: Vec<(String, ResponseObject)>,
}

/// A parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterObject {
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Location.
    #[serde(rename = "in", default)]
    pub location: String,
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Required flag.
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    /// Value schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaObject>,
    /// Example value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// A request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBodyObject {
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Required flag.
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    /// Content per media type.
    #[serde(default)]
    pub content: BTreeMap<String, MediaTypeObject>,
}

/// The content of one media type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTypeObject {
    /// Schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaObject>,
    /// Example attached to the media type rather than the schema.
    #[serde(default, skip_serializing)]
    pub example: Option<Value>,
}

/// A response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseObject {
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, HeaderObject>,
    /// Content per media type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaTypeObject>,
}

/// A response header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderObject {
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaObject>,
}

/// A schema, possibly a `$ref`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    /// Reference pointer.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    /// Format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Example.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Object properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaObject>,
    /// Required property names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Array items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaObject>>,
    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<Value>,
}

/// Reusable definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    /// Schemas.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, SchemaObject>,
    /// Parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterObject>,
    /// Responses.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, ResponseObject>,
}

impl Components {
    /// Whether there are no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.parameters.is_empty() && self.responses.is_empty()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Accepts `version: 1.0` as well as `version: "1.0"`.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// (De)serializes an ordered list of pairs as a map.
mod ordered {
    use super::{
        Deserialize, Deserializer, MapAccess, PhantomData, Serialize, SerializeMap, Serializer,
        Visitor, fmt,
    };

    pub fn serialize<S, T>(entries: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }

    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for OrderedVisitor<T>
    where
        T: Deserialize<'de>,
    {
        type Value = Vec<(String, T)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or_default());
            while let Some((key, value)) = access.next_entry::<KeyString, T>()? {
                entries.push((key.0, value));
            }
            Ok(entries)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    /// A map key that may be written unquoted as a number (`200:`).
    struct KeyString(String);

    impl<'de> Deserialize<'de> for KeyString {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            super::scalar_string(deserializer).map(KeyString)
        }
    }
}
