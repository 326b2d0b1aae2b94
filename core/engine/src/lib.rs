//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the record streaming core.
//! CONTEXT: Re-exports public types and modules for use by other crates.

pub mod backoff;
pub mod clock;
pub mod error;
pub mod job;
pub mod memory_table;
pub mod metadata;
pub mod output;
pub mod pipe;
pub mod query;
pub mod record;
pub mod value;
pub mod variables;

// Re-export commonly used types at the crate root
pub use backoff::{BackoffPolicy, CancelHandle, PollTimer, TimerError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{JobError, PipeError, QueryError, WriteError};
pub use job::{JobId, JobManager, JobState, JobStatus, JobTask, ThreadJobManager};
pub use memory_table::{MemoryTable, PossibleValues, RecordSource, DEFAULT_CHUNK_SIZE};
pub use metadata::{FieldMetadata, FieldType, TableMetadata};
pub use output::{OutputConfig, ReportWriter};
pub use pipe::{
    BufferedPipe, DedupPipe, KeyProjection, LockstepPipe, Pipe, PipeConfig, PreAddHook,
    RecordPipe, RetargetingPipe, DEFAULT_BATCH_SIZE,
};
pub use query::{compare_records, CriteriaOperator, FilterCriteria, OrderBy, QueryFilter, TableQuery};
pub use record::Record;
pub use value::Value;
pub use variables::VariableScope;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn it_streams_a_table_through_a_dedup_pipe() {
        let metadata = TableMetadata::new("events")
            .with_field(FieldMetadata::new("user", FieldType::Text))
            .with_field(FieldMetadata::new("day", FieldType::Integer));
        let table = MemoryTable::new(metadata).with_records(vec![
            Record::new().with("user", "ann").with("day", 1),
            Record::new().with("user", "bob").with("day", 1),
            Record::new().with("user", "ann").with("day", 1),
            Record::new().with("user", "ann").with("day", 2),
        ]);

        let pipe = DedupPipe::new(Pipe::new(), vec!["user".to_string(), "day".to_string()]);
        let sent = table.stream(&TableQuery::new("events"), &pipe).unwrap();

        assert_eq!(sent, 4);
        assert_eq!(pipe.count_available(), 3);
        assert_eq!(pipe.seen_count(), 3);
    }

    #[test]
    fn integration_test_producer_thread_with_small_pipe() {
        let pipe = Arc::new(Pipe::with_capacity(4));
        let producer_pipe = pipe.clone();

        let producer = thread::spawn(move || {
            let buffered = BufferedPipe::with_batch_size(producer_pipe, 3);
            for i in 0..20i64 {
                buffered.add(Record::new().with("n", i)).unwrap();
            }
            buffered.final_flush().unwrap();
        });

        let mut received = Vec::new();
        while received.len() < 20 {
            let batch = pipe.drain_available();
            if batch.is_empty() {
                thread::yield_now();
            }
            received.extend(batch);
        }
        producer.join().unwrap();

        let values: Vec<Value> = received.iter().map(|r| r.value_or_null("n")).collect();
        let expected: Vec<Value> = (0..20i64).map(Value::from).collect();
        assert_eq!(values, expected);
    }
}
