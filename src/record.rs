//! Dynamic records and result-stitching helpers.
//!
//! Preloading works over an untyped in-memory object graph: scalar fields by
//! name plus named association slots. Stitching groups fetched rows by a
//! composite key read from their foreign-key fields and assigns each group
//! onto the matching parents.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::value::Value;

/// An association slot on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Association {
    /// A single related record (one-to-one, many-to-one).
    One(Option<Box<Record>>),
    /// A collection of related records (one-to-many, many-to-many).
    Many(Vec<Record>),
}

/// A dynamic in-memory row: ordered scalar fields plus association slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: IndexMap<String, Value>,
    associations: IndexMap<String, Association>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar field, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Get a scalar field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Check whether a scalar field is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate scalar fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Assign a single-record association.
    pub fn set_one(&mut self, name: impl Into<String>, record: Record) {
        self.associations
            .insert(name.into(), Association::One(Some(Box::new(record))));
    }

    /// Assign a collection association, replacing any existing value.
    pub fn set_many(&mut self, name: impl Into<String>, records: Vec<Record>) {
        self.associations
            .insert(name.into(), Association::Many(records));
    }

    /// Get an association slot.
    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    /// Get a mutable association slot.
    pub fn association_mut(&mut self, name: &str) -> Option<&mut Association> {
        self.associations.get_mut(name)
    }

    /// Get the single record of a one-kind association, if assigned.
    pub fn one(&self, name: &str) -> Option<&Record> {
        match self.associations.get(name) {
            Some(Association::One(record)) => record.as_deref(),
            _ => None,
        }
    }

    /// Get the collection of a many-kind association, if assigned.
    pub fn many(&self, name: &str) -> Option<&[Record]> {
        match self.associations.get(name) {
            Some(Association::Many(records)) => Some(records),
            _ => None,
        }
    }
}

/// One canonicalized part of a composite key.
///
/// Floats are keyed by bit pattern so the tuple has a total `Eq`/`Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Json(String),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(v) => Self::Bool(*v),
            Value::Int(v) => Self::Int(*v),
            Value::Float(v) => Self::Float(v.to_bits()),
            Value::String(v) => Self::Str(v.clone()),
            Value::Bytes(v) => Self::Bytes(v.clone()),
            Value::Json(v) => Self::Json(v.to_string()),
        }
    }
}

/// An ordered tuple of key values with structural equality and hashing.
///
/// Two keys are equal iff their value tuples are equal part by part, so
/// distinct tuples never collide the way concatenated display strings can
/// (`("1","2")` vs `("12","")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(SmallVec<[KeyPart; 2]>);

impl CompositeKey {
    /// Build a key directly from an ordered sequence of values.
    ///
    /// Used where key values are read from raw cursor columns rather than
    /// record fields, such as join-table keys during many-to-many loading.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        Self(values.into_iter().map(KeyPart::from).collect())
    }
}

/// Read the named fields of a record, in order, into a composite key.
///
/// Missing fields contribute a null part; the key is always produced so that
/// grouping stays total over partially decoded rows.
pub fn key_of(record: &Record, field_names: &[String]) -> CompositeKey {
    CompositeKey(
        field_names
            .iter()
            .map(|name| record.get(name).map_or(KeyPart::Null, KeyPart::from))
            .collect(),
    )
}

/// Group rows by the composite key read from `field_names`.
///
/// Row order within each group is preserved; no sort is imposed.
pub fn group_by_fields(
    rows: Vec<Record>,
    field_names: &[String],
) -> HashMap<CompositeKey, Vec<Record>> {
    let mut groups: HashMap<CompositeKey, Vec<Record>> = HashMap::new();
    for row in rows {
        let key = key_of(&row, field_names);
        groups.entry(key).or_default().push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_record_fields() {
        let mut record = Record::new().with("id", 1).with("name", "first");
        record.set("name", "second");
        assert_eq!(record.get("id"), Some(&Value::Int(1)));
        assert_eq!(record.get("name"), Some(&Value::String("second".into())));
        assert!(!record.has_field("missing"));
    }

    #[test]
    fn test_record_associations() {
        let mut parent = Record::new().with("id", 10);
        parent.set_many("Items", vec![Record::new().with("id", 1)]);
        assert_eq!(parent.many("Items").map(<[Record]>::len), Some(1));
        assert!(parent.one("Items").is_none());

        parent.set_one("Owner", Record::new().with("id", 5));
        assert_eq!(
            parent.one("Owner").and_then(|r| r.get("id")),
            Some(&Value::Int(5))
        );
    }

    #[test]
    fn test_composite_key_equality() {
        let a = Record::new().with("x", "1").with("y", "2");
        let b = Record::new().with("x", "1").with("y", "2");
        let fields = names(&["x", "y"]);
        assert_eq!(key_of(&a, &fields), key_of(&b, &fields));
    }

    #[test]
    fn test_composite_key_no_concat_collision() {
        let a = Record::new().with("x", "1").with("y", "2");
        let b = Record::new().with("x", "12").with("y", "");
        let fields = names(&["x", "y"]);
        assert_ne!(key_of(&a, &fields), key_of(&b, &fields));
    }

    #[test]
    fn test_composite_key_missing_field_is_null() {
        let a = Record::new().with("x", 1);
        let b = Record::new().with("x", 1).with("y", Value::Null);
        let fields = names(&["x", "y"]);
        assert_eq!(key_of(&a, &fields), key_of(&b, &fields));
    }

    #[test]
    fn test_composite_key_float_bits() {
        let a = Record::new().with("x", 1.5f64);
        let b = Record::new().with("x", 1.5f64);
        let c = Record::new().with("x", 2.5f64);
        let fields = names(&["x"]);
        assert_eq!(key_of(&a, &fields), key_of(&b, &fields));
        assert_ne!(key_of(&a, &fields), key_of(&c, &fields));
    }

    #[test]
    fn test_group_by_fields_preserves_order() {
        let rows = vec![
            Record::new().with("id", 1).with("parent_id", 10),
            Record::new().with("id", 2).with("parent_id", 10),
            Record::new().with("id", 3).with("parent_id", 11),
        ];
        let fields = names(&["parent_id"]);
        let groups = group_by_fields(rows, &fields);

        let key = key_of(&Record::new().with("parent_id", 10), &fields);
        let group = &groups[&key];
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(group[1].get("id"), Some(&Value::Int(2)));
    }
}
