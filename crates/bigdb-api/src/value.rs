//! Field access on response documents.
//!
//! Responses are plain [`serde_json::Value`]s; with the `preserve_order`
//! feature their objects keep server key order. [`FieldExt::field`] looks a
//! key up by its field-style name (`fabric_role` finds `fabric-role`).

use serde_json::{Map, Value};

use crate::predicate::translate;

pub trait FieldExt {
    /// Look up `key` after translating underscores to hyphens.
    fn field(&self, key: &str) -> Option<&Value>;

    /// [`field`](Self::field) narrowed to a string.
    fn field_str(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }
}

impl FieldExt for Value {
    fn field(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.field(key))
    }
}

impl FieldExt for Map<String, Value> {
    fn field(&self, key: &str) -> Option<&Value> {
        self.get(&translate(key))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    use super::*;

    #[test]
    fn field_translates_underscores() {
        let doc = json!({ "fabric-role": "leaf", "name": "leaf1", "shutdown": false });
        assert_eq!(doc.field_str("fabric_role"), Some("leaf"));
        assert_eq!(doc.field("name"), Some(&json!("leaf1")));
        assert_eq!(doc.field("shutdown"), Some(&json!(false)));
        assert_eq!(doc.field("missing"), None);
    }

    #[test]
    fn field_on_non_object_is_none() {
        assert_eq!(json!([1, 2]).field("a"), None);
        assert_eq!(json!("text").field_str("a"), None);
    }

    #[test]
    fn object_keys_keep_server_order() {
        let doc: Value = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = doc
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
