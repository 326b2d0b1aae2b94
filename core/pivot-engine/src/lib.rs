//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot Report subsystem.
//!
//! This crate turns a streamed query result into grouped report sections.
//! It depends on `engine` for records, pipes and collaborator traits and on
//! `parser` for column formulas.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the report IS)
//! - `aggregate`: Running per-key and grand-total statistics (HOW we accumulate)
//! - `engine`: Report calculation and output (HOW we produce sections)

pub mod aggregate;
pub mod definition;
pub mod engine;
pub mod error;

pub use aggregate::{FieldAccumulator, FieldAccumulators, PivotAggregator, PivotKey, AVERAGE_SCALE};
pub use definition::*;
pub use engine::{
    calculate_report, generate_report, PivotTable, ReportSummary, INPUT_SCOPE, PIVOT_SCOPE,
    TOTAL_LABEL, TOTAL_SCOPE,
};
pub use error::ReportError;
