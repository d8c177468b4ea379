//! Template value tree with tagged cross-resource references.
//!
//! Resource properties and action configuration are expressed as
//! [`TemplateValue`]s. References to other logical names are kept as
//! [`Reference`] values until render time, which makes dangling-reference
//! detection a mechanical walk over the tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

const REF_KEY: &str = "Ref";
const GET_ATT_KEY: &str = "Fn::GetAtt";
const JOIN_KEY: &str = "Fn::Join";

/// A reference to another logical name in the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reference {
    /// The resource or parameter itself.
    ByName(String),
    /// A generated attribute of a resource (e.g. its ARN).
    ByAttribute {
        /// Logical resource name.
        name: String,
        /// Attribute name.
        attribute: String,
    },
}

impl Reference {
    /// Creates a by-name reference.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self::ByName(name.into())
    }

    /// Creates a by-attribute reference.
    #[must_use]
    pub fn by_attribute(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::ByAttribute {
            name: name.into(),
            attribute: attribute.into(),
        }
    }

    /// Returns the logical name this reference points at.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::ByName(name) | Self::ByAttribute { name, .. } => name,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::ByName(name) => json!({ REF_KEY: name }),
            Self::ByAttribute { name, attribute } => json!({ GET_ATT_KEY: [name, attribute] }),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName(name) => write!(f, "{name}"),
            Self::ByAttribute { name, attribute } => write!(f, "{name}.{attribute}"),
        }
    }
}

/// A node in a template property tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    /// A literal string.
    Str(String),
    /// A literal boolean.
    Bool(bool),
    /// A literal integer.
    Int(i64),
    /// An ordered list.
    List(Vec<TemplateValue>),
    /// An ordered map.
    Map(IndexMap<String, TemplateValue>),
    /// A reference resolved by the backend.
    Ref(Reference),
    /// Concatenation of parts, resolved by the backend.
    Join {
        /// Separator placed between parts.
        separator: String,
        /// The parts.
        parts: Vec<TemplateValue>,
    },
}

impl TemplateValue {
    /// Creates a map from key/value pairs, keeping their order.
    #[must_use]
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Creates a list.
    #[must_use]
    pub fn list<V: Into<Self>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Creates a join with the given separator.
    #[must_use]
    pub fn join<V: Into<Self>>(separator: impl Into<String>, parts: impl IntoIterator<Item = V>) -> Self {
        Self::Join {
            separator: separator.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the string if this is a literal string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a key if this is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Collects every reference in the tree, in document order.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a Reference>) {
        match self {
            Self::Ref(reference) => found.push(reference),
            Self::List(items) | Self::Join { parts: items, .. } => {
                for item in items {
                    item.collect_references(found);
                }
            }
            Self::Map(map) => {
                for value in map.values() {
                    value.collect_references(found);
                }
            }
            Self::Str(_) | Self::Bool(_) | Self::Int(_) => {}
        }
    }

    /// Renders the value as JSON using the intrinsic-function encoding.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => json!(i),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Ref(reference) => reference.to_json(),
            Self::Join { separator, parts } => {
                let parts: Vec<Value> = parts.iter().map(Self::to_json).collect();
                json!({ JOIN_KEY: [separator, parts] })
            }
        }
    }

    /// Reads a value back from its JSON encoding.
    ///
    /// Single-key objects using the intrinsic-function keys are decoded as
    /// references or joins; everything else maps structurally.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Str(String::new()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Str(n.to_string()), Self::Int),
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(intrinsic) = decode_intrinsic(map) {
                        return intrinsic;
                    }
                }
                Self::Map(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Self::from_json(v)))
                        .collect(),
                )
            }
        }
    }
}

fn decode_intrinsic(map: &serde_json::Map<String, Value>) -> Option<TemplateValue> {
    if let Some(Value::String(name)) = map.get(REF_KEY) {
        return Some(TemplateValue::Ref(Reference::by_name(name.clone())));
    }
    if let Some(Value::Array(args)) = map.get(GET_ATT_KEY) {
        if let [Value::String(name), Value::String(attribute)] = args.as_slice() {
            return Some(TemplateValue::Ref(Reference::by_attribute(
                name.clone(),
                attribute.clone(),
            )));
        }
    }
    if let Some(Value::Array(args)) = map.get(JOIN_KEY) {
        if let [Value::String(separator), Value::Array(parts)] = args.as_slice() {
            return Some(TemplateValue::Join {
                separator: separator.clone(),
                parts: parts.iter().map(TemplateValue::from_json).collect(),
            });
        }
    }
    None
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for TemplateValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Reference> for TemplateValue {
    fn from(value: Reference) -> Self {
        Self::Ref(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reference_encoding() {
        let by_name = TemplateValue::from(Reference::by_name("S3ArtifactBucket"));
        let by_attr = TemplateValue::from(Reference::by_attribute("CodeBuildRole", "Arn"));

        assert_eq!(by_name.to_json(), json!({"Ref": "S3ArtifactBucket"}));
        assert_eq!(by_attr.to_json(), json!({"Fn::GetAtt": ["CodeBuildRole", "Arn"]}));
    }

    #[test]
    fn test_join_encoding_and_decoding() {
        let join = TemplateValue::join(
            "",
            [
                TemplateValue::from("Template::"),
                Reference::by_name("TestStackConfig").into(),
            ],
        );
        let encoded = join.to_json();
        assert_eq!(
            encoded,
            json!({"Fn::Join": ["", ["Template::", {"Ref": "TestStackConfig"}]]})
        );
        assert_eq!(TemplateValue::from_json(&encoded), join);
    }

    #[test]
    fn test_references_are_collected_in_order() {
        let value = TemplateValue::map([
            ("Role", TemplateValue::from(Reference::by_attribute("RoleA", "Arn"))),
            (
                "Nested",
                TemplateValue::list([
                    TemplateValue::from("literal"),
                    Reference::by_name("ParamB").into(),
                ]),
            ),
        ]);

        let targets: Vec<&str> = value.references().iter().map(|r| r.target()).collect();
        assert_eq!(targets, vec!["RoleA", "ParamB"]);
    }

    #[test]
    fn test_multi_key_object_is_a_map() {
        let raw = json!({"Ref": "A", "Other": 1});
        let decoded = TemplateValue::from_json(&raw);
        assert!(matches!(decoded, TemplateValue::Map(_)));
        assert!(decoded.references().is_empty());
    }

    #[test]
    fn test_reference_display() {
        assert_eq!(Reference::by_attribute("Role", "Arn").to_string(), "Role.Arn");
        assert_eq!(Reference::by_name("Bucket").to_string(), "Bucket");
    }
}
