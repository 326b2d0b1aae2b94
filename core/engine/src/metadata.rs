//! FILENAME: core/engine/src/metadata.rs
//! PURPOSE: Minimal description of tables and fields as seen by the pipeline.
//! CONTEXT: The full metadata model lives elsewhere; exports and reports only need
//! field names, labels, types and which fields resolve through a possible-value source.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Decimal,
    Text,
    Boolean,
    Date,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,

    /// Display name (defaults to the field name).
    #[serde(default)]
    pub label: Option<String>,

    pub field_type: FieldType,

    /// Name of the possible-value source that maps raw values to display labels.
    #[serde(default)]
    pub possible_value_source: Option<String>,

    /// Display format hint for writers (e.g. "#,##0.00").
    #[serde(default)]
    pub display_format: Option<String>,
}

impl FieldMetadata {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldMetadata {
            name: name.into(),
            label: None,
            field_type,
            possible_value_source: None,
            display_format: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_possible_values(mut self, source: impl Into<String>) -> Self {
        self.possible_value_source = Some(source.into());
        self
    }

    pub fn with_display_format(mut self, format: impl Into<String>) -> Self {
        self.display_format = Some(format.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn has_possible_values(&self) -> bool {
        self.possible_value_source.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub fields: Vec<FieldMetadata>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        TableMetadata {
            name: name.into(),
            label: None,
            fields: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_field(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}
