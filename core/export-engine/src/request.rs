//! FILENAME: core/export-engine/src/request.rs
//! PURPOSE: What the caller asks to export, and what comes back.

use engine::{JobId, QueryFilter, TableMetadata, TableQuery};
use serde::{Deserialize, Serialize};

use crate::state::ExportState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub table: TableMetadata,

    /// Fields to export, in output order. Empty exports every field of the table.
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub filter: QueryFilter,

    /// Document / section title handed to the writer.
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub limit: Option<u64>,
}

impl ExportRequest {
    pub fn new(table: TableMetadata) -> Self {
        ExportRequest {
            table,
            fields: Vec::new(),
            filter: QueryFilter::default(),
            title: None,
            limit: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Title, falling back to the table label.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| self.table.label())
    }

    /// Requested field names, expanded to the whole table when none were given.
    pub fn requested_fields(&self) -> Vec<String> {
        if self.fields.is_empty() {
            self.table.field_names()
        } else {
            self.fields.clone()
        }
    }

    /// Query the producer runs: real fields only, never the label companions.
    pub fn query(&self) -> TableQuery {
        TableQuery {
            table: self.table.name.clone(),
            filter: self.filter.clone(),
            fields: Some(self.requested_fields()),
            limit: self.limit,
        }
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub job: JobId,
    pub rows_written: u64,
    pub batches_written: u64,
    pub state: ExportState,
}
