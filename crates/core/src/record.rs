//! Output records and the generic result shapers.
//!
//! Records keep their fields in insertion order so the output matches the order in
//! which properties were requested.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::CallError;

/// One output row: an ordered list of named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used when the field list is known up front.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Appends a field, or replaces the value in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Field value rendered as display text (strings without quotes, null as empty).
    pub fn get_text(&self, name: &str) -> String {
        self.get(name).map(value_to_text).unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of one typed call, before rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallResult {
    Scalar(Value),
    Scalars(Vec<Value>),
    Record(Record),
    Records(Vec<Record>),
}

impl CallResult {
    /// Flattens the result into rows for table rendering.
    ///
    /// Bare scalars become single-field rows named `field`.
    pub fn into_records(self, field: &str) -> Vec<Record> {
        match self {
            CallResult::Scalar(v) => vec![Record::new().with(field, v)],
            CallResult::Scalars(vs) => vs
                .into_iter()
                .map(|v| Record::new().with(field, v))
                .collect(),
            CallResult::Record(r) => vec![r],
            CallResult::Records(rs) => rs,
        }
    }
}

/// Renders a JSON value the way a table cell should show it.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Zips requested property names with the values returned for them.
///
/// The remote API answers property queries with a bare value array in request
/// order, so the only way to label the values is positionally. A length mismatch
/// means the pairing is unknowable and is reported instead of guessed.
/// A name listed twice is rejected.
pub fn zip_properties<V: Into<Value>>(
    operation: &str,
    names: &[String],
    values: Vec<V>,
) -> Result<Record, CallError> {
    if names.len() != values.len() {
        return Err(CallError::shape(
            operation,
            format!("{} values", names.len()),
            format!("{} values", values.len()),
        ));
    }

    let mut record = Record::new();
    for (name, value) in names.iter().zip(values) {
        if record.get(name).is_some() {
            return Err(CallError::validation(
                "properties",
                format!("'{name}' is listed more than once"),
            ));
        }
        record.insert(name.clone(), value);
    }
    Ok(record)
}

/// Wraps every name in a single-field record, e.g. `{"Username": "alice"}`.
pub fn name_records(field: &str, names: Vec<String>) -> Vec<Record> {
    names
        .into_iter()
        .map(|name| Record::new().with(field, name))
        .collect()
}

/// One record per JSON row; objects keep their members, other values land in `field`.
pub fn json_records(field: &str, rows: Vec<Value>) -> Vec<Record> {
    rows.into_iter()
        .map(|row| match row {
            Value::Object(members) => {
                let mut record = Record::new();
                for (name, value) in members {
                    record.insert(name, value);
                }
                record
            }
            other => Record::new().with(field, other),
        })
        .collect()
}
