//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - Turns a record stream into grouped report sections.
//!
//! Algorithm:
//! 1. Substitute caller inputs into the report query's criteria
//! 2. Stream the query synchronously through a lockstep pipe, folding every
//!    batch into one aggregator per view
//! 3. For each view, emit one row per pivot key: key values plus every column
//!    formula evaluated against `input.*`, `pivot.*` and `total.*`
//! 4. Sort rows by the view's order-by fields, then append the optional totals row
//! 5. Hand each section to the output writer through a fresh pipe

use std::collections::HashMap;

use engine::{
    compare_records, FieldMetadata, FieldType, LockstepPipe, OutputConfig, Pipe, Record,
    RecordPipe, RecordSource, ReportWriter, Value, VariableScope,
};
use log::{debug, error, info};
use parser::FormulaEvaluator;

use crate::aggregate::{FieldAccumulators, PivotAggregator};
use crate::definition::{PivotViewDefinition, ReportDefinition};
use crate::error::ReportError;

pub const INPUT_SCOPE: &str = "input";
pub const PIVOT_SCOPE: &str = "pivot";
pub const TOTAL_SCOPE: &str = "total";

/// Text placed in the first pivot field of a totals row.
pub const TOTAL_LABEL: &str = "Total";

// ============================================================================
// OUTPUT STRUCTURES
// ============================================================================

/// A fully computed report section, ready to be written.
#[derive(Debug, Clone)]
pub struct PivotTable {
    pub name: String,
    pub label: String,
    /// Pivot fields followed by computed columns.
    pub fields: Vec<FieldMetadata>,
    pub rows: Vec<Record>,
    pub totals: Option<Record>,
    pub display_formats: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub views: usize,
    /// Rows the query streamed.
    pub source_rows: u64,
    /// Grouped rows handed to the writer, excluding totals rows.
    pub rows_written: u64,
}

// ============================================================================
// CALCULATION
// ============================================================================

/// Runs the report query and computes every view without writing anything.
pub fn calculate_report(
    definition: &ReportDefinition,
    source: &dyn RecordSource,
    inputs: &HashMap<String, Value>,
) -> Result<Vec<PivotTable>, ReportError> {
    run_report(definition, source, inputs).map(|(tables, _)| tables)
}

/// Returns the computed views and the number of rows the query streamed.
fn run_report(
    definition: &ReportDefinition,
    source: &dyn RecordSource,
    inputs: &HashMap<String, Value>,
) -> Result<(Vec<PivotTable>, u64), ReportError> {
    definition.validate()?;

    let input_scope = VariableScope::new().with_scope(INPUT_SCOPE, inputs.clone());
    let mut query = definition.query.clone();
    query.filter = query.filter.interpolate(&input_scope);

    let mut aggregators: Vec<PivotAggregator> = definition
        .views
        .iter()
        .map(|view| PivotAggregator::new(view.pivot_fields.clone()))
        .collect();

    let streamed = {
        let pipe = LockstepPipe::new(|batch: Vec<Record>| {
            for aggregator in aggregators.iter_mut() {
                aggregator.accumulate(&batch);
            }
        });
        source.stream(&query, &pipe)?
    };
    info!(
        "report '{}': {} rows streamed into {} view(s)",
        definition.name,
        streamed,
        definition.views.len()
    );

    let tables = definition
        .views
        .iter()
        .zip(aggregators.iter())
        .map(|(view, aggregator)| build_table(view, aggregator, inputs))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((tables, streamed))
}

fn build_table(
    view: &PivotViewDefinition,
    aggregator: &PivotAggregator,
    inputs: &HashMap<String, Value>,
) -> Result<PivotTable, ReportError> {
    let total_values = aggregator.scope_values(aggregator.totals());

    let mut rows = Vec::with_capacity(aggregator.group_count());
    for key in aggregator.keys() {
        let Some(group) = aggregator.group(key) else {
            continue;
        };
        let mut row = Record::new();
        for (field, value) in &key.values {
            row.set(field.clone(), value.clone());
        }
        let scope = column_scope(inputs, aggregator, group, &total_values);
        evaluate_columns(view, &scope, &mut row)?;
        rows.push(row);
    }

    if !view.order_by.is_empty() {
        rows.sort_by(|a, b| compare_records(a, b, &view.order_by));
    }

    let totals = if view.include_totals {
        let mut row = Record::new();
        for (i, field) in view.pivot_fields.iter().enumerate() {
            let value = if i == 0 { Value::from(TOTAL_LABEL) } else { Value::Null };
            row.set(field.clone(), value);
        }
        let scope = column_scope(inputs, aggregator, aggregator.totals(), &total_values);
        evaluate_columns(view, &scope, &mut row)?;
        Some(row)
    } else {
        None
    };

    debug!(
        "view '{}': {} groups from {} rows",
        view.name,
        rows.len(),
        aggregator.rows()
    );

    Ok(PivotTable {
        name: view.name.clone(),
        label: view.label().to_string(),
        fields: describe_fields(view, &rows),
        rows,
        totals,
        display_formats: view
            .columns
            .iter()
            .filter_map(|c| c.display_format.clone().map(|f| (c.name.clone(), f)))
            .collect(),
    })
}

/// `pivot.*` holds `group`'s aggregates; for the totals row that is the grand total.
fn column_scope(
    inputs: &HashMap<String, Value>,
    aggregator: &PivotAggregator,
    group: &FieldAccumulators,
    total_values: &HashMap<String, Value>,
) -> VariableScope {
    VariableScope::new()
        .with_scope(INPUT_SCOPE, inputs.clone())
        .with_scope(PIVOT_SCOPE, aggregator.scope_values(group))
        .with_scope(TOTAL_SCOPE, total_values.clone())
}

fn evaluate_columns(
    view: &PivotViewDefinition,
    scope: &VariableScope,
    row: &mut Record,
) -> Result<(), ReportError> {
    let evaluator = FormulaEvaluator::new(scope);
    for column in &view.columns {
        let value = evaluator
            .evaluate(&column.formula)
            .map_err(|source| ReportError::Formula {
                view: view.name.clone(),
                column: column.name.clone(),
                source,
            })?;
        row.set(column.name.clone(), value);
    }
    Ok(())
}

fn field_type_of(value: &Value) -> Option<FieldType> {
    match value {
        Value::Null => None,
        Value::Integer(_) => Some(FieldType::Integer),
        Value::Decimal(_) => Some(FieldType::Decimal),
        Value::Text(_) => Some(FieldType::Text),
        Value::Boolean(_) => Some(FieldType::Boolean),
        Value::Date(_) => Some(FieldType::Date),
    }
}

/// Type of the first non-null value in `field`, or `fallback`.
fn infer_type(rows: &[Record], field: &str, fallback: FieldType) -> FieldType {
    rows.iter()
        .find_map(|row| row.get(field).and_then(field_type_of))
        .unwrap_or(fallback)
}

fn describe_fields(view: &PivotViewDefinition, rows: &[Record]) -> Vec<FieldMetadata> {
    let pivot = view
        .pivot_fields
        .iter()
        .map(|name| FieldMetadata::new(name.clone(), infer_type(rows, name, FieldType::Text)));

    let columns = view.columns.iter().map(|column| {
        let mut field = FieldMetadata::new(
            column.name.clone(),
            infer_type(rows, &column.name, FieldType::Decimal),
        )
        .with_label(column.label());
        field.display_format = column.display_format.clone();
        field
    });

    pivot.chain(columns).collect()
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Computes every view and writes them to `writer` as consecutive sections.
///
/// On failure the writer is closed best-effort and the error returned; sections
/// already written stay written.
pub fn generate_report(
    definition: &ReportDefinition,
    source: &dyn RecordSource,
    inputs: &HashMap<String, Value>,
    writer: &mut dyn ReportWriter,
    config: &OutputConfig,
) -> Result<ReportSummary, ReportError> {
    let outcome = run_report(definition, source, inputs).and_then(|(tables, source_rows)| {
        let rows_written = write_tables(tables, writer, config)?;
        Ok(ReportSummary {
            views: definition.views.len(),
            source_rows,
            rows_written,
        })
    });

    match outcome {
        Ok(summary) => {
            info!(
                "report '{}' written: {} rows in {} section(s)",
                definition.name, summary.rows_written, summary.views
            );
            Ok(summary)
        }
        Err(e) => {
            error!("report '{}' failed: {}", definition.name, e);
            writer.close();
            Err(e)
        }
    }
}

fn write_tables(
    tables: Vec<PivotTable>,
    writer: &mut dyn ReportWriter,
    config: &OutputConfig,
) -> Result<u64, ReportError> {
    let mut written = 0u64;
    for table in tables {
        // Always sent, so a section without formats does not inherit the last one's.
        writer.set_display_formats(&table.display_formats);
        writer.start(config, &table.fields, &table.label)?;

        let pipe = Pipe::with_capacity(table.rows.len().max(1));
        pipe.add_batch(table.rows)?;
        let rows = pipe.drain_available();
        writer.add_rows(&rows)?;
        written += rows.len() as u64;

        if let Some(totals) = &table.totals {
            writer.add_totals_row(totals)?;
        }
    }
    writer.finish()?;
    Ok(written)
}

// ============================================================================
// TESTS
// ============================================================================
