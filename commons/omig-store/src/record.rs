use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Field under which the host exposes the record identifier when a record
/// is rendered as JSON.
pub const OBJECT_ID_KEY: &str = "objectId";

/// A schemaless document of a named class, as seen by triggers and jobs.
///
/// The record tracks which fields were changed since it was loaded (the
/// dirty set) and whether it already existed in the store before the
/// current write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    class_name: String,
    id: Option<String>,
    fields: Map<String, Value>,
    dirty: BTreeSet<String>,
    existed: bool,
}

impl Record {
    /// A brand new record; it has no identifier until the host persists it.
    pub fn new<S: Into<String>>(class_name: S) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    /// A clean record as loaded from the store.
    pub fn from_fields<S: Into<String>>(
        class_name: S,
        id: Option<String>,
        fields: Map<String, Value>,
    ) -> Self {
        let existed = id.is_some();
        Self {
            class_name: class_name.into(),
            id,
            fields,
            dirty: BTreeSet::new(),
            existed,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// True while the record has no durable identifier.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Whether the record existed before the write currently in flight.
    #[inline]
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let key = key.into();
        self.dirty.insert(key.clone());
        self.fields.insert(key, value.into());
    }

    pub fn unset(&mut self, key: &str) {
        self.fields.remove(key);
        self.dirty.insert(key.to_string());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.dirty.contains(key)
    }

    /// True when `key` is the one and only field changed by this write.
    pub fn only_dirty(&self, key: &str) -> bool {
        self.dirty.len() == 1 && self.dirty.contains(key)
    }

    /// JSON rendering of the record including its identifier.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        if let Some(id) = &self.id {
            out.insert(OBJECT_ID_KEY.into(), Value::String(id.clone()));
        }
        Value::Object(out)
    }

    /// Used by host implementations once the write is durable: assigns the
    /// identifier and clears the dirty set.
    pub fn mark_persisted(&mut self, id: String) {
        self.id = Some(id);
        self.dirty.clear();
        self.existed = true;
    }

    /// Used by host implementations to describe the write in flight.
    pub fn set_existed(&mut self, existed: bool) {
        self.existed = existed;
    }
}
