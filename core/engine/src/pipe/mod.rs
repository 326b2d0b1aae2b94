//! FILENAME: core/engine/src/pipe/mod.rs
//! PURPOSE: The record pipe capability and its decorators.
//! CONTEXT: A pipe decouples a row producer (query engine, usually on a job thread)
//! from a row consumer (export loop, aggregator). Decorators wrap an inner pipe
//! instead of subclassing it:
//!
//! ```text
//!   producer ──▶ [DedupPipe] ──▶ [BufferedPipe] ──▶ Pipe ──▶ drain_available() ──▶ consumer
//! ```
//!
//! - `bounded`: the bounded FIFO with blocking, stall-limited adds
//! - `buffered`: batches single-row adds before forwarding
//! - `dedup`: drops rows whose unique-key projection was already forwarded
//! - `retarget`: buffered writes flushed into an externally-owned pipe
//! - `lockstep`: hands each add straight to a consumer on the producer's thread

pub mod bounded;
pub mod buffered;
pub mod dedup;
pub mod lockstep;
pub mod retarget;

use std::sync::Arc;

use crate::error::PipeError;
use crate::record::Record;

pub use bounded::{Pipe, PipeConfig, PreAddHook};
pub use buffered::{BufferedPipe, DEFAULT_BATCH_SIZE};
pub use dedup::{DedupPipe, KeyProjection};
pub use lockstep::LockstepPipe;
pub use retarget::RetargetingPipe;

/// Capability shared by the pipe and every decorator.
///
/// Designed for one producer and one consumer per instance; no ordering is
/// promised across several concurrent producers.
pub trait RecordPipe: Send + Sync {
    /// Enqueues one row, blocking while the pipe is full.
    /// A terminated pipe silently accepts and discards the row.
    fn add(&self, record: Record) -> Result<(), PipeError>;

    /// Enqueues a batch with the same blocking semantics as `add`.
    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError>;

    /// Removes and returns everything currently queued. Never blocks.
    fn drain_available(&self) -> Vec<Record>;

    /// Snapshot of the queued row count; 0 once terminated.
    fn count_available(&self) -> usize;

    /// Stops all future hand-off and discards queued rows. Idempotent.
    fn terminate(&self);

    fn is_terminated(&self) -> bool;
}

impl<P: RecordPipe + ?Sized> RecordPipe for Arc<P> {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        (**self).add(record)
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        (**self).add_batch(records)
    }

    fn drain_available(&self) -> Vec<Record> {
        (**self).drain_available()
    }

    fn count_available(&self) -> usize {
        (**self).count_available()
    }

    fn terminate(&self) {
        (**self).terminate()
    }

    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }
}

impl<P: RecordPipe + ?Sized> RecordPipe for Box<P> {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        (**self).add(record)
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        (**self).add_batch(records)
    }

    fn drain_available(&self) -> Vec<Record> {
        (**self).drain_available()
    }

    fn count_available(&self) -> usize {
        (**self).count_available()
    }

    fn terminate(&self) {
        (**self).terminate()
    }

    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }
}

/// Lets a producer handed a borrowed pipe wrap it in a decorator.
impl<P: RecordPipe + ?Sized> RecordPipe for &P {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        (**self).add(record)
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        (**self).add_batch(records)
    }

    fn drain_available(&self) -> Vec<Record> {
        (**self).drain_available()
    }

    fn count_available(&self) -> usize {
        (**self).count_available()
    }

    fn terminate(&self) {
        (**self).terminate()
    }

    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }
}
