//! Common types used across campus-seed

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One row of a tabular source file: field name to raw string value.
pub type RawRecord = BTreeMap<String, String>;

/// Identifier assigned by a remote entity service.
///
/// Services hand out either numeric or string identifiers. Both serialize as
/// the bare JSON value so they can be embedded in payloads unchanged.
///
/// # Examples
///
/// ```rust
/// use seed_common::types::RemoteId;
/// use serde_json::json;
///
/// assert_eq!(RemoteId::from_json(&json!(7)), Some(RemoteId::Int(7)));
/// assert_eq!(RemoteId::from_json(&json!("abc")), Some(RemoteId::from("abc")));
/// assert_eq!(RemoteId::from_json(&json!(null)), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    /// Numeric identifier
    Int(i64),
    /// Opaque string identifier (UUIDs, slugs, ...)
    Str(String),
}

impl RemoteId {
    /// Extract an identifier from a JSON value.
    ///
    /// Accepts integers and non-empty strings; anything else yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RemoteId::Int),
            Value::String(s) if !s.trim().is_empty() => Some(RemoteId::Str(s.clone())),
            _ => None,
        }
    }

    /// Extract the `id` field of a JSON object.
    pub fn from_entity(entity: &Value) -> Option<Self> {
        entity.get("id").and_then(Self::from_json)
    }

    /// Convert back into a JSON value for payload embedding
    pub fn to_json(&self) -> Value {
        match self {
            RemoteId::Int(n) => Value::from(*n),
            RemoteId::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl From<i64> for RemoteId {
    fn from(value: i64) -> Self {
        RemoteId::Int(value)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        RemoteId::Str(value.to_string())
    }
}

impl From<String> for RemoteId {
    fn from(value: String) -> Self {
        RemoteId::Str(value)
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteId::Int(n) => write!(f, "{}", n),
            RemoteId::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Ordered identifiers of one entity type.
///
/// Filled either as ingestion responses complete or wholesale from a
/// paginated listing. Consumers only read it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierSet(Vec<RemoteId>);

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: RemoteId) {
        self.0.push(id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RemoteId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[RemoteId] {
        &self.0
    }

    pub fn contains(&self, id: &RemoteId) -> bool {
        self.0.contains(id)
    }

    pub fn into_vec(self) -> Vec<RemoteId> {
        self.0
    }
}

impl From<Vec<RemoteId>> for IdentifierSet {
    fn from(ids: Vec<RemoteId>) -> Self {
        Self(ids)
    }
}

impl FromIterator<RemoteId> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = RemoteId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<RemoteId> for IdentifierSet {
    fn extend<I: IntoIterator<Item = RemoteId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for IdentifierSet {
    type Item = RemoteId;
    type IntoIter = std::vec::IntoIter<RemoteId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a IdentifierSet {
    type Item = &'a RemoteId;
    type IntoIter = std::slice::Iter<'a, RemoteId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_id_from_json_rejects_non_identifiers() {
        assert_eq!(RemoteId::from_json(&json!(1.5)), None);
        assert_eq!(RemoteId::from_json(&json!(true)), None);
        assert_eq!(RemoteId::from_json(&json!("  ")), None);
        assert_eq!(RemoteId::from_json(&json!({"id": 1})), None);
    }

    #[test]
    fn test_remote_id_from_entity() {
        let entity = json!({"id": 12, "nombre": "Ana"});
        assert_eq!(RemoteId::from_entity(&entity), Some(RemoteId::Int(12)));
        assert_eq!(RemoteId::from_entity(&json!({"nombre": "Ana"})), None);
    }

    #[test]
    fn test_remote_id_serializes_untagged() {
        let ids = vec![RemoteId::from(3), RemoteId::from("c-9")];
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!([3, "c-9"]));
    }

    #[test]
    fn test_identifier_set_preserves_order() {
        let mut set = IdentifierSet::new();
        set.push(RemoteId::from(3));
        set.push(RemoteId::from(1));
        set.extend([RemoteId::from(2)]);

        let collected: Vec<_> = set.iter().cloned().collect();
        assert_eq!(collected, vec![RemoteId::Int(3), RemoteId::Int(1), RemoteId::Int(2)]);
        assert!(set.contains(&RemoteId::Int(2)));
    }
}
