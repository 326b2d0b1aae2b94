//! FILENAME: tests/test_export.rs
//! Integration tests for the export loop: a real producer thread, a small
//! bounded pipe and the caller's poll/drain cycle.

mod common;

use std::sync::Arc;

use common::{
    AmnesiacJobs, BufferedSource, ExportHarness, FailingSource, OrdersFixture, RecordingWriter, SilentSource,
};
use engine::{
    CancelHandle, CriteriaOperator, FilterCriteria, JobError, JobManager, ManualClock,
    QueryFilter, ThreadJobManager, Value,
};
use export_engine::{ExportError, ExportState};
use pretty_assertions::assert_eq;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn ids(writer: &RecordingWriter) -> Vec<Value> {
    writer.log().rows.iter().map(|r| r.value_or_null("id")).collect()
}

// ============================================================================
// SUCCESSFUL EXPORTS
// ============================================================================

#[test]
fn test_export_streams_every_row_in_order() {
    let harness = ExportHarness::with_orders(50);
    let mut writer = RecordingWriter::new();

    let summary = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap();

    assert_eq!(summary.state, ExportState::Finished);
    assert_eq!(summary.rows_written, 50);

    let expected: Vec<Value> = (0..50i64).map(Value::from).collect();
    assert_eq!(ids(&writer), expected);

    let log = writer.log();
    assert!(log.finished);
    assert!(!log.closed);
    assert_eq!(summary.batches_written, log.batches as u64);
}

#[test]
fn test_export_from_batching_producer_includes_final_flush() {
    let harness = ExportHarness::new(Arc::new(BufferedSource {
        rows: 20,
        batch_size: 7,
    }));
    let mut writer = RecordingWriter::new();

    let summary = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap();

    assert_eq!(summary.state, ExportState::Finished);
    assert_eq!(summary.rows_written, 20);
    assert_eq!(writer.log().rows.len(), 20);

    let expected: Vec<Value> = (0..20i64).map(Value::from).collect();
    assert_eq!(ids(&writer), expected);
}

#[test]
fn test_finished_job_is_forgotten() {
    let jobs = Arc::new(ThreadJobManager::new());
    let harness = ExportHarness::with_jobs(Arc::new(OrdersFixture::table(6)), jobs.clone());
    let mut writer = RecordingWriter::new();

    let summary = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap();

    assert_eq!(summary.rows_written, 6);
    assert!(matches!(
        jobs.get_status(summary.job),
        Err(JobError::NotFound(_))
    ));
}

#[test]
fn test_export_adds_label_companions() {
    let harness = ExportHarness::with_orders(4);
    let mut writer = RecordingWriter::new();
    let request = ExportHarness::orders_request()
        .with_fields(vec!["status".to_string(), "id".to_string()])
        .with_title("Open orders");

    harness.exporter.export(&request, &mut writer).unwrap();

    let log = writer.log();
    assert_eq!(
        log.started,
        vec![(
            vec![
                "status".to_string(),
                "id".to_string(),
                "status:possibleValueLabel".to_string()
            ],
            "Open orders".to_string()
        )]
    );
    let labels: Vec<Value> = log
        .rows
        .iter()
        .map(|r| r.value_or_null("status:possibleValueLabel"))
        .collect();
    assert_eq!(
        labels,
        vec![
            Value::from("Open"),
            Value::from("Closed"),
            Value::from("Open"),
            Value::from("Closed")
        ]
    );
}

#[test]
fn test_export_applies_filter() {
    let harness = ExportHarness::with_orders(10);
    let mut writer = RecordingWriter::new();
    let request = ExportHarness::orders_request().with_filter(QueryFilter::new().with_criteria(
        FilterCriteria::new("status", CriteriaOperator::Equals, vec![Value::from("C")]),
    ));

    let summary = harness.exporter.export(&request, &mut writer).unwrap();

    assert_eq!(summary.rows_written, 5);
    assert_eq!(
        ids(&writer),
        vec![1i64, 3, 5, 7, 9].into_iter().map(Value::from).collect::<Vec<_>>()
    );
}

#[test]
fn test_empty_export_still_finishes() {
    let harness = ExportHarness::with_orders(0);
    let mut writer = RecordingWriter::new();

    let summary = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap();

    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.batches_written, 0);
    assert_eq!(writer.log().started.len(), 1);
    assert!(writer.log().finished);
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_unknown_fields_rejected_before_start() {
    let harness = ExportHarness::with_orders(3);
    let mut writer = RecordingWriter::new();
    let request = ExportHarness::orders_request()
        .with_fields(vec!["id".to_string(), "colour".to_string()]);

    let err = harness.exporter.export(&request, &mut writer).unwrap_err();

    assert!(err.is_user_facing());
    assert_eq!(err.user_message(), "Unknown field(s) for table 'Orders': colour");
    assert!(writer.log().started.is_empty());
}

#[test]
fn test_row_maximum_checked_with_count() {
    let harness = ExportHarness::with_orders(3);
    let mut writer = RecordingWriter::with_limits(Some(2), None);

    let err = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Export has 3 rows but the output format allows at most 2"
    );
    assert!(writer.log().started.is_empty());
}

#[test]
fn test_limit_within_row_maximum_skips_count() {
    let harness = ExportHarness::with_orders(3);
    let mut writer = RecordingWriter::with_limits(Some(2), None);
    let request = ExportHarness::orders_request().with_limit(2);

    let summary = harness.exporter.export(&request, &mut writer).unwrap();

    assert_eq!(summary.rows_written, 2);
}

#[test]
fn test_column_maximum_counts_companions() {
    let harness = ExportHarness::with_orders(3);
    let mut writer = RecordingWriter::with_limits(None, Some(2));
    let request = ExportHarness::orders_request()
        .with_fields(vec!["id".to_string(), "status".to_string()]);

    let err = harness.exporter.export(&request, &mut writer).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Export has 3 columns but the output format allows at most 2"
    );
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_silent_producer_stalls() {
    let (source, release) = SilentSource::new();
    let clock = Arc::new(ManualClock::new());
    let harness = ExportHarness::new(Arc::new(source)).with_clock(clock.clone());
    let mut writer = RecordingWriter::new();

    let err = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap_err();
    release.send(()).unwrap();

    assert!(matches!(err, ExportError::Stall { .. }));
    assert!(!err.is_user_facing());
    assert!(clock.elapsed().as_millis() > 50);

    let log = writer.log();
    assert!(log.closed);
    assert!(!log.finished);
}

#[test]
fn test_cancelled_export() {
    let (source, release) = SilentSource::new();
    let harness = ExportHarness::new(Arc::new(source));
    let mut writer = RecordingWriter::new();
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = harness
        .exporter
        .export_with_cancel(&ExportHarness::orders_request(), &mut writer, &cancel)
        .unwrap_err();
    release.send(()).unwrap();

    assert!(matches!(err, ExportError::Cancelled));
    assert_eq!(err.user_message(), "The export was cancelled.");
    assert!(writer.log().closed);
}

#[test]
fn test_lost_job_fails_export() {
    let harness = ExportHarness::with_jobs(
        Arc::new(OrdersFixture::table(10)),
        Arc::new(AmnesiacJobs::default()),
    );
    let mut writer = RecordingWriter::new();

    let err = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap_err();

    match err {
        ExportError::JobLost { reason, .. } => assert!(reason.contains("scheduler restarted")),
        other => panic!("expected JobLost, got {:?}", other),
    }
    assert!(writer.log().closed);
}

#[test]
fn test_producer_failure_reported() {
    let harness =
        ExportHarness::with_jobs(Arc::new(FailingSource), Arc::new(ThreadJobManager::new()));
    let mut writer = RecordingWriter::new();

    let err = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap_err();

    match &err {
        ExportError::ProducerFailed { message, .. } => {
            assert_eq!(message, "Query failed: connection reset")
        }
        other => panic!("expected ProducerFailed, got {:?}", other),
    }
    assert!(!err.user_message().contains("connection reset"));
    assert!(writer.log().closed);
}

#[test]
fn test_finish_failure_closes_writer() {
    let harness = ExportHarness::with_orders(5);
    let mut writer = RecordingWriter {
        fail_finish: true,
        ..RecordingWriter::new()
    };

    let err = harness
        .exporter
        .export(&ExportHarness::orders_request(), &mut writer)
        .unwrap_err();

    assert!(matches!(err, ExportError::Write(_)));
    let log = writer.log();
    assert_eq!(log.rows.len(), 5);
    assert!(log.closed);
}
