use serde_json::Value;

use crate::Record;

/// Query over the records of one class. Results are always ordered by
/// ascending identifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    pub class_name: String,
    /// Field name and the values it must not hold. A record without the
    /// field always passes.
    pub not_in: Option<(String, Vec<Value>)>,
    pub id_in: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new<S: Into<String>>(class_name: S) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn field_not_in<K: Into<String>>(
        mut self,
        key: K,
        values: Vec<Value>,
    ) -> Self {
        self.not_in = Some((key.into(), values));
        self
    }

    pub fn id_in(mut self, ids: Vec<String>) -> Self {
        self.id_in = Some(ids);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Predicate part of the query (class, field and id filters).
    pub fn matches(&self, record: &Record) -> bool {
        if record.class_name() != self.class_name {
            return false;
        }
        if let Some((key, values)) = &self.not_in {
            if let Some(value) = record.get(key) {
                if values.contains(value) {
                    return false;
                }
            }
        }
        if let Some(ids) = &self.id_in {
            match record.id() {
                Some(id) => ids.iter().any(|i| i == id),
                None => false,
            }
        } else {
            true
        }
    }
}
