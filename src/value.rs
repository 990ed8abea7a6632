//! Attribute values carried by entities.
//!
//! Extraction jobs report loosely typed fields, so values cover primitives,
//! entity references and arbitrary structured JSON. Values serialize as plain
//! JSON, without a type tag.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name to value mapping for an entity or observation.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value.
///
/// # Examples
///
/// ```
/// use entity_ledger::AttributeValue;
///
/// let name = AttributeValue::from("Ada Lovelace");
/// let age = AttributeValue::from(36);
///
/// assert!(name.is_string());
/// assert!(age.same_as(&AttributeValue::Float(36.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Field present without content
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays, objects and numbers that fit neither `Int` nor `Float`
    Structured(serde_json::Value),
}

impl AttributeValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Exact equality as used by deduplication and attribute filters.
    ///
    /// Integers and floats compare numerically; everything else must match
    /// variant and content.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(_), Self::Float(_)) | (Self::Float(_), Self::Int(_)) => {
                self.as_float() == other.as_float()
            }
            _ => self == other,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Structured(_) => "structured",
        }
    }
}

impl Default for AttributeValue {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;

        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) => Self::String(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Structured(Value::Number(n)), Self::Float),
            },
            other => Self::Structured(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_string() {
        let val = AttributeValue::from("hello");
        assert!(val.is_string());
        assert_eq!(val.as_str(), Some("hello"));
        assert_eq!(val.type_name(), "string");
    }

    #[test]
    fn test_value_int_reads_as_float() {
        let val = AttributeValue::Int(42);
        assert_eq!(val.as_float(), Some(42.0));
        assert_eq!(val.type_name(), "int");
    }

    #[test]
    fn test_same_as_numeric_cross_compare() {
        assert!(AttributeValue::Int(3).same_as(&AttributeValue::Float(3.0)));
        assert!(AttributeValue::Float(3.0).same_as(&AttributeValue::Int(3)));
        assert!(!AttributeValue::Int(3).same_as(&AttributeValue::Float(3.5)));
    }

    #[test]
    fn test_same_as_is_strict_across_kinds() {
        assert!(!AttributeValue::from("1").same_as(&AttributeValue::Int(1)));
        assert!(!AttributeValue::Bool(true).same_as(&AttributeValue::Int(1)));
        assert!(AttributeValue::from("Acme").same_as(&AttributeValue::from("Acme")));
        assert!(!AttributeValue::from("Acme").same_as(&AttributeValue::from("acme")));
    }

    #[test]
    fn test_untagged_deserialization() {
        let attrs: Attributes = serde_json::from_str(
            r#"{"name":"Ada","age":36,"score":0.5,"active":true,"gone":null,"tags":["a"]}"#,
        )
        .unwrap();
        assert_eq!(attrs["name"], AttributeValue::from("Ada"));
        assert_eq!(attrs["age"], AttributeValue::Int(36));
        assert_eq!(attrs["score"], AttributeValue::Float(0.5));
        assert_eq!(attrs["active"], AttributeValue::Bool(true));
        assert!(attrs["gone"].is_null());
        assert_eq!(
            attrs["tags"],
            AttributeValue::Structured(serde_json::json!(["a"]))
        );
    }

    #[test]
    fn test_from_json_value() {
        assert_eq!(
            AttributeValue::from(serde_json::json!(7)),
            AttributeValue::Int(7)
        );
        assert_eq!(
            AttributeValue::from(serde_json::json!(2.5)),
            AttributeValue::Float(2.5)
        );
        assert_eq!(
            AttributeValue::from(serde_json::json!({"k": 1})),
            AttributeValue::Structured(serde_json::json!({"k": 1}))
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", AttributeValue::Bool(true)), "true");
        assert_eq!(format!("{}", AttributeValue::Int(42)), "42");
        assert_eq!(format!("{}", AttributeValue::from("hi")), "\"hi\"");
        assert_eq!(format!("{}", AttributeValue::Null), "null");
    }
}
