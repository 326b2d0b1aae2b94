//! FILENAME: core/persistence/src/lib.rs
//! Report output formats.
//!
//! Concrete `ReportWriter` implementations used by exports and pivot reports:
//! - `JsonLinesWriter`: one JSON object per line over any `io::Write`
//! - `XlsxReportWriter`: one worksheet per section, saved on `finish`

mod error;
mod json_lines;
mod xlsx_writer;

pub use error::PersistenceError;
pub use json_lines::{value_to_json, JsonLinesWriter};
pub use xlsx_writer::{XlsxReportWriter, XLSX_MAX_COLUMNS, XLSX_MAX_ROWS, XLSX_SHEET_ROWS};
