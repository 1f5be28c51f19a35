use serde::de::DeserializeOwned;
use serde_json::Value;

/// The value and existence state of one node at the moment it was read.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    key: Option<String>,
    value: Option<Value>,
}

impl Snapshot {
    /// `null` is how the store represents an absent node, so it is folded into `None`.
    pub fn new(key: Option<String>, value: Option<Value>) -> Self {
        let value = value.filter(|value| !value.is_null());
        Self { key, value }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn children_count(&self) -> usize {
        match &self.value {
            Some(Value::Object(map)) => map.len(),
            Some(Value::Array(items)) => items.iter().filter(|item| !item.is_null()).count(),
            _ => 0,
        }
    }

    /// Child snapshots in key order. Store-generated keys are time ordered, so
    /// this is also creation order for records added through `child_key`.
    pub fn children(&self) -> Vec<Snapshot> {
        match &self.value {
            Some(Value::Object(map)) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                entries
                    .into_iter()
                    .map(|(key, value)| Snapshot::new(Some(key.clone()), Some(value.clone())))
                    .collect()
            }
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(index, value)| Snapshot::new(Some(index.to_string()), Some(value.clone())))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_absent() {
        let snapshot = Snapshot::new(Some("category".into()), Some(Value::Null));
        assert!(!snapshot.exists());
        assert_eq!(snapshot.children_count(), 0);
        assert!(snapshot.children().is_empty());
    }

    #[test]
    fn children_come_back_in_key_order() {
        let snapshot = Snapshot::new(
            None,
            Some(json!({ "b": { "name": "second" }, "a": { "name": "first" } })),
        );
        let keys: Vec<_> = snapshot
            .children()
            .iter()
            .map(|child| child.key().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(snapshot.children_count(), 2);
    }

    #[test]
    fn sparse_arrays_skip_holes() {
        let snapshot = Snapshot::new(None, Some(json!([null, "x", "y"])));
        assert_eq!(snapshot.children_count(), 2);
        assert_eq!(snapshot.children()[0].key(), Some("1"));
    }
}
