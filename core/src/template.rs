//! `{{placeholder}}` substitution for request URL, body and header templates.
//!
//! Matching is literal. Placeholder names are not interpreted as patterns and
//! values are inserted verbatim.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

/// Placeholder the server fills with the session's instance URL.
pub const INSTANCE_URL: &str = "instance_url";
/// Placeholder the server fills with the session's access token.
pub const ACCESS_TOKEN: &str = "access_token";

/// `{{name}}`
pub fn placeholder(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

/// Replace every occurrence of `{{name}}` in `template`.
pub fn replace_all(template: &str, name: &str, value: &str) -> String {
    template.replace(&placeholder(name), value)
}

/// Replace only the first occurrence of `{{name}}` in `template`.
pub fn replace_first(template: &str, name: &str, value: &str) -> String {
    template.replacen(&placeholder(name), value, 1)
}

/// Caller-supplied placeholder values, kept in insertion order.
///
/// Entries are applied one after another. When one name is a substring of
/// another's replacement the outcome depends on that order; callers that
/// need determinism should avoid overlapping names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    entries: Vec<(String, String)>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts of an existing key overwrite the value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply every entry to `template`, replacing all occurrences of each.
    pub fn apply(&self, template: &str) -> String {
        self.iter()
            .fold(template.to_string(), |acc, (name, value)| {
                replace_all(&acc, name, value)
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = VariableMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

// Strings pass through; number and bool scalars are rendered as their JSON text.
impl<'de> Deserialize<'de> for VariableMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VariableMapVisitor;

        impl<'de> Visitor<'de> for VariableMapVisitor {
            type Value = VariableMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping placeholder names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<VariableMap, A::Error> {
                let mut map = VariableMap::new();
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    let rendered = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => {
                            return Err(de::Error::custom(format!(
                                "variable '{key}' must be a string"
                            )));
                        }
                    };
                    map.insert(key, rendered);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(VariableMapVisitor)
    }
}
