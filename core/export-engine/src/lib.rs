//! FILENAME: core/export-engine/src/lib.rs
//! Export subsystem.
//!
//! Streams a table query into an output writer: the query runs as a background
//! job feeding a bounded pipe while the caller's thread polls, post-processes
//! and writes batches.
//!
//! Layers:
//! - `request` / `config`: what to export and how patiently
//! - `fields`: field validation and display-label companions
//! - `orchestrator`: the VALIDATING -> RUNNING -> DRAINING -> FINISHED loop

pub mod config;
pub mod error;
pub mod fields;
pub mod orchestrator;
pub mod request;
pub mod state;

pub use config::ExportConfig;
pub use error::ExportError;
pub use fields::{copy_display_labels, label_field_name, prepare_fields, PreparedFields, LABEL_FIELD_SUFFIX};
pub use orchestrator::Exporter;
pub use request::{ExportRequest, ExportSummary};
pub use state::ExportState;
