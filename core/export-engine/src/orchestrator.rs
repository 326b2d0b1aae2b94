//! FILENAME: core/export-engine/src/orchestrator.rs
//! PURPOSE: Drives one export from validation to the writer's finish hook.
//! CONTEXT: The producer (a `RecordSource` streaming into a bounded pipe) runs as
//! a job on the `JobManager`. This thread owns the poll loop: it learns about new
//! rows only by polling the pipe and about completion only by polling the job
//! status, backing off while the pipe stays empty.
//!
//! ```text
//!   VALIDATING ──▶ RUNNING ──▶ DRAINING ──▶ FINISHED
//!        │            │            │
//!        └────────────┴────────────┴──▶ FAILED
//! ```

use std::sync::Arc;

use engine::{
    CancelHandle, Clock, JobId, JobManager, JobState, JobStatus, OutputConfig, Pipe, PollTimer, RecordPipe,
    RecordSource, ReportWriter, SystemClock, TimerError,
};
use log::{debug, error, info, warn};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::fields::{copy_display_labels, prepare_fields, PreparedFields};
use crate::request::{ExportRequest, ExportSummary};
use crate::state::ExportState;

pub struct Exporter {
    source: Arc<dyn RecordSource>,
    jobs: Arc<dyn JobManager>,
    clock: Arc<dyn Clock>,
    config: ExportConfig,
}

impl Exporter {
    pub fn new(source: Arc<dyn RecordSource>, jobs: Arc<dyn JobManager>) -> Self {
        Exporter {
            source,
            jobs,
            clock: Arc::new(SystemClock),
            config: ExportConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used by the poll timer and the pipe's full-queue retries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn export(
        &self,
        request: &ExportRequest,
        writer: &mut dyn ReportWriter,
    ) -> Result<ExportSummary, ExportError> {
        self.export_with_cancel(request, writer, &CancelHandle::new())
    }

    /// Like `export`, but an idle poll gives up with `Cancelled` once `cancel`
    /// is triggered. The producer job itself is not stopped; the pipe is
    /// terminated so it stops blocking on a full queue.
    pub fn export_with_cancel(
        &self,
        request: &ExportRequest,
        writer: &mut dyn ReportWriter,
        cancel: &CancelHandle,
    ) -> Result<ExportSummary, ExportError> {
        let mut run = ExportRun {
            title: request.title().to_string(),
            state: ExportState::Validating,
        };
        info!("export '{}' {}", run.title, run.state);

        let prepared = match self.validate(request, writer) {
            Ok(prepared) => prepared,
            Err(e) => {
                run.fail(&e);
                return Err(e);
            }
        };

        let pipe = Arc::new(Pipe::from_config(&self.config.pipe).with_clock(self.clock.clone()));
        match self.run(&mut run, request, &prepared, &pipe, writer, cancel) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                pipe.terminate();
                writer.close();
                run.fail(&e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    fn validate(
        &self,
        request: &ExportRequest,
        writer: &dyn ReportWriter,
    ) -> Result<PreparedFields, ExportError> {
        let prepared = prepare_fields(&request.table, &request.requested_fields())?;

        if let Some(max_columns) = writer.max_columns() {
            if prepared.column_count() > max_columns {
                return Err(ExportError::Validation(format!(
                    "Export has {} columns but the output format allows at most {}",
                    prepared.column_count(),
                    max_columns
                )));
            }
        }

        if let Some(max_rows) = writer.max_rows() {
            let within_limit = request.limit.map_or(false, |limit| limit <= max_rows);
            if !within_limit && self.config.count_rows_when_limited {
                let counted = self.source.count(&request.query())?;
                let rows = request.limit.map_or(counted, |limit| counted.min(limit));
                debug!("export '{}' will produce {} rows", request.title(), rows);
                if rows > max_rows {
                    return Err(ExportError::Validation(format!(
                        "Export has {} rows but the output format allows at most {}",
                        rows, max_rows
                    )));
                }
            }
        }

        Ok(prepared)
    }

    // ========================================================================
    // RUN / POLL / DRAIN
    // ========================================================================

    fn run(
        &self,
        run: &mut ExportRun,
        request: &ExportRequest,
        prepared: &PreparedFields,
        pipe: &Arc<Pipe>,
        writer: &mut dyn ReportWriter,
        cancel: &CancelHandle,
    ) -> Result<ExportSummary, ExportError> {
        run.move_to(ExportState::Running);

        let job = self.start_producer(request, pipe.clone());
        writer.start(&OutputConfig::titled(run.title.clone()), &prepared.fields, &run.title)?;

        let mut progress = Progress::default();
        let mut timer = PollTimer::new(self.config.backoff.clone(), self.clock.clone())
            .with_cancel(cancel.clone());

        let mut status = self.status(job)?;
        while status.is_running() {
            if pipe.count_available() == 0 {
                timer.idle().map_err(|e| match e {
                    TimerError::Stalled { idle, threshold } => {
                        error!(
                            "export '{}' stalled: job {} silent for {:?}",
                            run.title, job, idle
                        );
                        ExportError::Stall { idle, threshold }
                    }
                    TimerError::Cancelled => ExportError::Cancelled,
                })?;
            } else {
                progress.write_available(pipe, prepared, writer)?;
                timer.progress();
            }
            status = self.status(job)?;
        }

        run.move_to(ExportState::Draining);
        if self.jobs.forget(job) {
            debug!("export '{}': released status of job {}", run.title, job);
        }
        if status.state == JobState::Error {
            let message = status
                .message
                .unwrap_or_else(|| "no message reported".to_string());
            return Err(ExportError::ProducerFailed { job, message });
        }

        // The producer may have queued its last rows after our final poll.
        progress.write_available(pipe, prepared, writer)?;

        if let Some(produced) = status.result {
            if produced != progress.rows {
                warn!(
                    "export '{}': job {} produced {} rows but {} were written",
                    run.title, job, produced, progress.rows
                );
            }
        }

        writer.finish()?;
        run.move_to(ExportState::Finished);
        info!(
            "export '{}' wrote {} rows in {} batches",
            run.title, progress.rows, progress.batches
        );

        Ok(ExportSummary {
            job,
            rows_written: progress.rows,
            batches_written: progress.batches,
            state: run.state,
        })
    }

    fn start_producer(&self, request: &ExportRequest, pipe: Arc<Pipe>) -> JobId {
        let source = self.source.clone();
        let query = request.query();
        let name = format!("export-{}", request.table.name);
        self.jobs.start_job(
            &name,
            Box::new(move || source.stream(&query, pipe.as_ref()).map_err(|e| e.to_string())),
        )
    }

    fn status(&self, job: JobId) -> Result<JobStatus, ExportError> {
        self.jobs.get_status(job).map_err(|e| ExportError::JobLost {
            job,
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// BOOKKEEPING
// ============================================================================

struct ExportRun {
    title: String,
    state: ExportState,
}

impl ExportRun {
    fn move_to(&mut self, next: ExportState) {
        if !self.state.can_move_to(next) {
            warn!("export '{}': unexpected transition {} -> {}", self.title, self.state, next);
        }
        info!("export '{}' {} -> {}", self.title, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, e: &ExportError) {
        if e.is_user_facing() {
            info!("export '{}' rejected: {}", self.title, e);
        } else {
            error!("export '{}' failed in {}: {}", self.title, self.state, e);
        }
        self.move_to(ExportState::Failed);
    }
}

#[derive(Debug, Default)]
struct Progress {
    rows: u64,
    batches: u64,
}

impl Progress {
    /// Drains whatever is queued, fills label companions and writes one batch.
    fn write_available(
        &mut self,
        pipe: &Pipe,
        prepared: &PreparedFields,
        writer: &mut dyn ReportWriter,
    ) -> Result<(), ExportError> {
        let mut batch = pipe.drain_available();
        if batch.is_empty() {
            return Ok(());
        }
        copy_display_labels(&mut batch, &prepared.label_pairs);
        writer.add_rows(&batch)?;
        self.rows += batch.len() as u64;
        self.batches += 1;
        debug!("wrote batch {} ({} rows)", self.batches, batch.len());
        Ok(())
    }
}
