//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for export integration tests.

#![allow(dead_code)]

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use engine::{
    BackoffPolicy, BufferedPipe, Clock, FieldMetadata, FieldType, JobError, JobId, JobManager, JobStatus, JobTask, MemoryTable,
    OutputConfig, PossibleValues, QueryError, Record, RecordPipe, RecordSource, ReportWriter,
    TableMetadata, TableQuery, ThreadJobManager, Value, WriteError, PipeConfig,
};
use export_engine::{ExportConfig, ExportRequest, Exporter};

// ============================================================================
// HARNESS
// ============================================================================

/// An exporter wired to a source and job manager, with a small pipe and fast
/// polling so tests exercise backpressure without waiting on real time.
pub struct ExportHarness {
    pub exporter: Exporter,
}

impl ExportHarness {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self::with_jobs(source, Arc::new(ThreadJobManager::new()))
    }

    /// The orders table with `rows` rows.
    pub fn with_orders(rows: usize) -> Self {
        Self::new(Arc::new(OrdersFixture::table(rows)))
    }

    pub fn with_jobs(source: Arc<dyn RecordSource>, jobs: Arc<dyn JobManager>) -> Self {
        ExportHarness {
            exporter: Exporter::new(source, jobs).with_config(Self::fast_config()),
        }
    }

    /// Replaces the clock; the stall threshold drops to 50ms of virtual time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let mut config = self.exporter.config().clone();
        config.backoff.stall_threshold_ms = 50;
        self.exporter = self.exporter.with_config(config).with_clock(clock);
        self
    }

    pub fn fast_config() -> ExportConfig {
        ExportConfig {
            pipe: PipeConfig {
                capacity: 3,
                retry_interval_ms: 1,
                max_wait_ms: 10_000,
            },
            backoff: BackoffPolicy {
                initial_interval_ms: 1,
                multiplier: 2,
                max_interval_ms: 8,
                stall_threshold_ms: 10_000,
            },
            count_rows_when_limited: true,
        }
    }

    pub fn orders_request() -> ExportRequest {
        ExportRequest::new(OrdersFixture::metadata())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub struct OrdersFixture;

impl OrdersFixture {
    pub fn metadata() -> TableMetadata {
        TableMetadata::new("orders")
            .with_label("Orders")
            .with_field(FieldMetadata::new("id", FieldType::Integer))
            .with_field(
                FieldMetadata::new("status", FieldType::Text)
                    .with_label("Status")
                    .with_possible_values("orderStatus"),
            )
            .with_field(FieldMetadata::new("amount", FieldType::Decimal))
    }

    /// Order `i`; statuses alternate between O and C.
    pub fn order(i: usize) -> Record {
        Record::new()
            .with("id", i as i64)
            .with("status", if i % 2 == 0 { "O" } else { "C" })
            .with("amount", (i * 10) as i64)
    }

    /// The first `rows` orders.
    pub fn table(rows: usize) -> MemoryTable {
        let records = (0..rows).map(Self::order).collect();

        let mut labels = PossibleValues::new();
        labels.insert(Value::from("O"), "Open".to_string());
        labels.insert(Value::from("C"), "Closed".to_string());

        MemoryTable::new(Self::metadata())
            .with_records(records)
            .with_possible_values("orderStatus", labels)
            .with_chunk_size(4)
    }
}

// ============================================================================
// WRITER
// ============================================================================

/// Everything a writer saw, shared so tests can inspect it after the export.
#[derive(Debug, Default)]
pub struct WriterLog {
    pub started: Vec<(Vec<String>, String)>,
    pub rows: Vec<Record>,
    pub batches: usize,
    pub finished: bool,
    pub closed: bool,
}

#[derive(Default)]
pub struct RecordingWriter {
    pub log: Arc<Mutex<WriterLog>>,
    pub max_rows: Option<u64>,
    pub max_columns: Option<usize>,
    pub fail_finish: bool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        RecordingWriter::default()
    }

    pub fn with_limits(max_rows: Option<u64>, max_columns: Option<usize>) -> Self {
        RecordingWriter {
            max_rows,
            max_columns,
            ..RecordingWriter::default()
        }
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, WriterLog> {
        self.log.lock().unwrap()
    }
}

impl ReportWriter for RecordingWriter {
    fn max_rows(&self) -> Option<u64> {
        self.max_rows
    }

    fn max_columns(&self) -> Option<usize> {
        self.max_columns
    }

    fn start(
        &mut self,
        _config: &OutputConfig,
        fields: &[FieldMetadata],
        label: &str,
    ) -> Result<(), WriteError> {
        let names = fields.iter().map(|f| f.name.clone()).collect();
        self.log().started.push((names, label.to_string()));
        Ok(())
    }

    fn add_rows(&mut self, rows: &[Record]) -> Result<(), WriteError> {
        let mut log = self.log();
        log.rows.extend_from_slice(rows);
        log.batches += 1;
        Ok(())
    }

    fn add_totals_row(&mut self, row: &Record) -> Result<(), WriteError> {
        self.log().rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        if self.fail_finish {
            return Err(WriteError::Io(std::io::Error::other("stream closed")));
        }
        self.log().finished = true;
        Ok(())
    }

    fn close(&mut self) {
        self.log().closed = true;
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// A source that emits nothing until released, keeping its job RUNNING.
pub struct SilentSource {
    release: Mutex<Receiver<()>>,
}

impl SilentSource {
    pub fn new() -> (Self, Sender<()>) {
        let (tx, rx) = channel();
        (
            SilentSource {
                release: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl RecordSource for SilentSource {
    fn stream(&self, _query: &TableQuery, _pipe: &dyn RecordPipe) -> Result<u64, QueryError> {
        let release = self.release.lock().unwrap();
        let _ = release.recv();
        Ok(0)
    }

    fn count(&self, _query: &TableQuery) -> Result<u64, QueryError> {
        Ok(0)
    }
}

/// A source that sends a few rows and then fails.
pub struct FailingSource;

impl RecordSource for FailingSource {
    fn stream(&self, _query: &TableQuery, pipe: &dyn RecordPipe) -> Result<u64, QueryError> {
        pipe.add(Record::new().with("id", 1))?;
        Err(QueryError::Execution("connection reset".to_string()))
    }

    fn count(&self, _query: &TableQuery) -> Result<u64, QueryError> {
        Ok(1)
    }
}

/// Streams orders one row at a time through a batching buffer over the
/// exporter's pipe, so the final partial batch is only sent on flush.
pub struct BufferedSource {
    pub rows: usize,
    pub batch_size: usize,
}

impl RecordSource for BufferedSource {
    fn stream(&self, _query: &TableQuery, pipe: &dyn RecordPipe) -> Result<u64, QueryError> {
        BufferedPipe::scope(pipe, self.batch_size, |buffered| {
            for i in 0..self.rows {
                buffered.add(OrdersFixture::order(i))?;
            }
            Ok::<u64, QueryError>(self.rows as u64)
        })
    }

    fn count(&self, _query: &TableQuery) -> Result<u64, QueryError> {
        Ok(self.rows as u64)
    }
}

// ============================================================================
// JOB MANAGERS
// ============================================================================

/// Starts jobs normally but can never report on them.
#[derive(Default)]
pub struct AmnesiacJobs {
    inner: ThreadJobManager,
}

impl JobManager for AmnesiacJobs {
    fn start_job(&self, name: &str, task: JobTask) -> JobId {
        self.inner.start_job(name, task)
    }

    fn get_status(&self, id: JobId) -> Result<JobStatus, JobError> {
        Err(JobError::StatusUnavailable {
            id,
            reason: "scheduler restarted".to_string(),
        })
    }
}
