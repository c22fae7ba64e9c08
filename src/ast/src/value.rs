//! JSON-shaped output of the translator
//!
//! [`AstValue`] is a small recursive value type that keeps the translator's
//! output contract independent of any particular serializer. Objects keep their
//! keys in insertion order so the encoded JSON always lists `type` first.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A JSON-like value produced by [`translate`](crate::translate)
#[derive(Debug, Clone, PartialEq)]
pub enum AstValue {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<AstValue>),
    Object(Vec<(&'static str, AstValue)>),
}

impl AstValue {
    /// Look up a key on an object value
    pub fn get(&self, key: &str) -> Option<&AstValue> {
        match self {
            Self::Object(fields) => fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The `type` tag of a translated node, if this is one
    pub fn node_type(&self) -> Option<&str> {
        self.get("type").and_then(AstValue::as_str)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AstValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for AstValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AstValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for AstValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for AstValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl<T: Into<AstValue>> From<Vec<T>> for AstValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AstValue>> From<Option<T>> for AstValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl Serialize for AstValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
