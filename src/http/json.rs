//! Closed JSON value type for structured response bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A JSON document as a closed union. Serializes to plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    Array(Vec<JsonValue>),
    Object(BTreeMap<String, JsonValue>),
}

impl Default for JsonValue {
    fn default() -> Self {
        JsonValue::Object(BTreeMap::new())
    }
}

impl JsonValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            JsonValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            JsonValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            JsonValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, JsonValue>> {
        match self {
            JsonValue::Object(members) => Some(members),
            _ => None,
        }
    }

    /// Member of an object; `None` for missing members and non-objects.
    pub fn member(&self, name: &str) -> Option<&JsonValue> {
        self.as_object().and_then(|members| members.get(name))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.member(name).and_then(JsonValue::as_int)
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        self.member(name).and_then(JsonValue::as_double)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.member(name).and_then(JsonValue::as_bool)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.member(name).and_then(JsonValue::as_str)
    }

    /// Set a member. Has no effect unless `self` is an object.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        if let JsonValue::Object(members) = self {
            members.insert(name.into(), value.into());
        }
    }
}

impl From<i64> for JsonValue {
    fn from(value: i64) -> Self {
        JsonValue::Int(value)
    }
}

impl From<f64> for JsonValue {
    fn from(value: f64) -> Self {
        JsonValue::Double(value)
    }
}

impl From<bool> for JsonValue {
    fn from(value: bool) -> Self {
        JsonValue::Bool(value)
    }
}

impl From<&str> for JsonValue {
    fn from(value: &str) -> Self {
        JsonValue::String(value.to_string())
    }
}

impl From<String> for JsonValue {
    fn from(value: String) -> Self {
        JsonValue::String(value)
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(values: Vec<JsonValue>) -> Self {
        JsonValue::Array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_accessors() {
        let mut value = JsonValue::default();
        value.set("count", 3i64);
        value.set("ratio", 0.5f64);
        value.set("ok", true);
        value.set("name", "apple");

        assert_eq!(value.int("count"), Some(3));
        assert_eq!(value.double("ratio"), Some(0.5));
        assert_eq!(value.bool("ok"), Some(true));
        assert_eq!(value.string("name"), Some("apple"));
        // wrong variant reads as absent
        assert_eq!(value.int("name"), None);
    }

    #[test]
    fn test_set_on_non_object_is_ignored() {
        let mut value = JsonValue::Int(1);
        value.set("x", 2i64);
        assert_eq!(value, JsonValue::Int(1));
    }

    #[test]
    fn test_serialization() {
        let mut value = JsonValue::default();
        value.set("list", vec![JsonValue::Int(1), JsonValue::from("two")]);
        value.set("pi", 3.5f64);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"list":[1,"two"],"pi":3.5}"#
        );

        let parsed: JsonValue = serde_json::from_str(r#"{"a":1,"b":1.5}"#).unwrap();
        assert_eq!(parsed.int("a"), Some(1));
        assert_eq!(parsed.double("b"), Some(1.5));
    }
}
