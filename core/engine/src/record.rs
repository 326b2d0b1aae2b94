//! FILENAME: core/engine/src/record.rs
//! PURPOSE: The row type streamed through pipes.
//! CONTEXT: A record is an ordered mapping of field name to value, optionally
//! carrying a parallel mapping of field name to display string (resolved
//! possible-value labels, formatted dates, ...). The pipeline never interprets
//! record contents except to read named field values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    display_values: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Builder-style setter, handy for fixtures and synthetic rows.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn with_display(mut self, field: impl Into<String>, display: impl Into<String>) -> Self {
        self.set_display_value(field, display);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    /// Returns the field's value; missing fields read as `None`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Returns the field's value, treating a missing field as null.
    pub fn value_or_null(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn set_display_value(&mut self, field: impl Into<String>, display: impl Into<String>) {
        self.display_values.insert(field.into(), display.into());
    }

    pub fn display_value(&self, field: &str) -> Option<&str> {
        self.display_values.get(field).map(String::as_str)
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn display_values(&self) -> &IndexMap<String, String> {
        &self.display_values
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keeps only the named fields, in the order given. Fields the record does
    /// not carry are added as null so every projected row has the same shape.
    pub fn project(&self, fields: &[String]) -> Record {
        let mut projected = Record::new();
        for field in fields {
            projected.set(field.clone(), self.value_or_null(field));
            if let Some(display) = self.display_value(field) {
                projected.set_display_value(field.clone(), display);
            }
        }
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let record = Record::new().with("b", 1).with("a", 2).with("c", 3);
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_project_fills_missing_with_null() {
        let record = Record::new()
            .with("id", 7)
            .with("status", "OPEN")
            .with_display("status", "Open");
        let projected = record.project(&["status".to_string(), "owner".to_string()]);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected.get("owner"), Some(&Value::Null));
        assert_eq!(projected.display_value("status"), Some("Open"));
        assert!(projected.get("id").is_none());
    }
}
