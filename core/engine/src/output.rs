//! FILENAME: core/engine/src/output.rs
//! PURPOSE: The output-format collaborator contract.
//! CONTEXT: Exports and pivot reports write through this trait only. Concrete
//! serializations (JSON lines, XLSX) live in the persistence crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::WriteError;
use crate::metadata::FieldMetadata;
use crate::record::Record;

/// Settings shared by every section a writer produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Document title (workbook title, first header line, ...).
    pub title: String,
    /// Emit a header row of field labels at the start of each section.
    pub include_headers: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            title: String::new(),
            include_headers: true,
        }
    }
}

impl OutputConfig {
    pub fn titled(title: impl Into<String>) -> Self {
        OutputConfig {
            title: title.into(),
            ..OutputConfig::default()
        }
    }
}

/// Call order: `set_display_formats`? then (`start`, `add_rows`*, `add_totals_row`?)
/// once per section, then `finish` exactly once. `close` may be called at any
/// point on a failure path and must not fail.
pub trait ReportWriter: Send {
    /// Largest number of data rows per section, if the format has one.
    fn max_rows(&self) -> Option<u64> {
        None
    }

    /// Largest number of columns, if the format has one.
    fn max_columns(&self) -> Option<usize> {
        None
    }

    /// Field name to display-format pattern, applied to the next sections.
    fn set_display_formats(&mut self, _formats: &HashMap<String, String>) {}

    fn start(
        &mut self,
        config: &OutputConfig,
        fields: &[FieldMetadata],
        label: &str,
    ) -> Result<(), WriteError>;

    fn add_rows(&mut self, rows: &[Record]) -> Result<(), WriteError>;

    fn add_totals_row(&mut self, row: &Record) -> Result<(), WriteError>;

    /// Completes the document and flushes it to the destination.
    fn finish(&mut self) -> Result<(), WriteError>;

    /// Best-effort release of partially written resources.
    fn close(&mut self) {}
}

impl<W: ReportWriter + ?Sized> ReportWriter for Box<W> {
    fn max_rows(&self) -> Option<u64> {
        (**self).max_rows()
    }

    fn max_columns(&self) -> Option<usize> {
        (**self).max_columns()
    }

    fn set_display_formats(&mut self, formats: &HashMap<String, String>) {
        (**self).set_display_formats(formats)
    }

    fn start(
        &mut self,
        config: &OutputConfig,
        fields: &[FieldMetadata],
        label: &str,
    ) -> Result<(), WriteError> {
        (**self).start(config, fields, label)
    }

    fn add_rows(&mut self, rows: &[Record]) -> Result<(), WriteError> {
        (**self).add_rows(rows)
    }

    fn add_totals_row(&mut self, row: &Record) -> Result<(), WriteError> {
        (**self).add_totals_row(row)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        (**self).finish()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
