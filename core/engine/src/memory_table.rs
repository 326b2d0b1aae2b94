//! FILENAME: core/engine/src/memory_table.rs
//! PURPOSE: The query-engine collaborator and an in-memory implementation of it.
//! CONTEXT: Exports and reports never read storage themselves. They hand a
//! `TableQuery` and a pipe to a `RecordSource`, which streams matching rows into
//! the pipe as it goes. `MemoryTable` is the executor used by tests, benches and
//! small embedded datasets.

use std::collections::HashMap;

use log::debug;

use crate::error::QueryError;
use crate::metadata::TableMetadata;
use crate::pipe::RecordPipe;
use crate::query::{compare_records, TableQuery};
use crate::record::Record;
use crate::value::Value;

/// Rows per `add_batch` call when streaming.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

pub trait RecordSource: Send + Sync {
    /// Streams every matching row into `pipe` and returns how many were sent.
    fn stream(&self, query: &TableQuery, pipe: &dyn RecordPipe) -> Result<u64, QueryError>;

    /// Number of rows `stream` would send for the same query.
    fn count(&self, query: &TableQuery) -> Result<u64, QueryError>;
}

/// Possible-value source: raw value to display label.
pub type PossibleValues = HashMap<Value, String>;

pub struct MemoryTable {
    metadata: TableMetadata,
    records: Vec<Record>,
    possible_values: HashMap<String, PossibleValues>,
    chunk_size: usize,
}

impl MemoryTable {
    pub fn new(metadata: TableMetadata) -> Self {
        MemoryTable {
            metadata,
            records: Vec::new(),
            possible_values: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Registers the labels for a possible-value source named by field metadata.
    pub fn with_possible_values(mut self, source: impl Into<String>, values: PossibleValues) -> Self {
        self.possible_values.insert(source.into(), values);
        self
    }

    pub fn insert(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_table(&self, query: &TableQuery) -> Result<(), QueryError> {
        if query.table != self.metadata.name {
            return Err(QueryError::TableNotFound(query.table.clone()));
        }
        Ok(())
    }

    fn requested_fields(&self, query: &TableQuery) -> Result<Vec<String>, QueryError> {
        let fields = match &query.fields {
            Some(fields) => fields.clone(),
            None => return Ok(self.metadata.field_names()),
        };
        for field in &fields {
            if self.metadata.field(field).is_none() {
                return Err(QueryError::UnknownField {
                    table: self.metadata.name.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(fields)
    }

    /// Filtered, ordered and limited references into the table.
    fn select(&self, query: &TableQuery) -> Result<Vec<&Record>, QueryError> {
        let mut selected = Vec::new();
        for record in &self.records {
            if query.filter.matches(record)? {
                selected.push(record);
            }
        }

        if !query.filter.order_by.is_empty() {
            selected.sort_by(|a, b| compare_records(a, b, &query.filter.order_by));
        }
        if let Some(limit) = query.limit {
            selected.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(selected)
    }

    fn resolve_labels(&self, record: &mut Record, fields: &[String]) {
        for field in fields {
            let source = match self
                .metadata
                .field(field)
                .and_then(|f| f.possible_value_source.as_deref())
            {
                Some(source) => source,
                None => continue,
            };
            let value = record.value_or_null(field);
            if let Some(label) = self.possible_values.get(source).and_then(|m| m.get(&value)) {
                record.set_display_value(field.clone(), label.clone());
            }
        }
    }
}

impl RecordSource for MemoryTable {
    fn stream(&self, query: &TableQuery, pipe: &dyn RecordPipe) -> Result<u64, QueryError> {
        self.check_table(query)?;
        let fields = self.requested_fields(query)?;
        let selected = self.select(query)?;

        let mut sent = 0u64;
        for chunk in selected.chunks(self.chunk_size) {
            if pipe.is_terminated() {
                debug!(
                    "pipe terminated, stopping stream of '{}' after {} rows",
                    query.table, sent
                );
                break;
            }
            let batch: Vec<Record> = chunk
                .iter()
                .map(|record| {
                    let mut projected = record.project(&fields);
                    self.resolve_labels(&mut projected, &fields);
                    projected
                })
                .collect();
            let len = batch.len() as u64;
            pipe.add_batch(batch)?;
            // A pipe terminated during the call accepts and drops the batch.
            if pipe.is_terminated() {
                debug!(
                    "pipe terminated while adding to '{}', {} rows dropped",
                    query.table, len
                );
                break;
            }
            sent += len;
        }

        debug!("streamed {} rows from '{}'", sent, query.table);
        Ok(sent)
    }

    fn count(&self, query: &TableQuery) -> Result<u64, QueryError> {
        self.check_table(query)?;
        self.requested_fields(query)?;
        Ok(self.select(query)?.len() as u64)
    }
}
