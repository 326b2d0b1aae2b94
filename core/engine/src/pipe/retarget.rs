//! FILENAME: core/engine/src/pipe/retarget.rs
//! PURPOSE: Buffered writes flushed into a pipe somebody else already owns.
//! CONTEXT: Used when a consumer already holds the consumer-facing pipe and a
//! producer wants batched writes into it. Only the buffer and the target
//! reference live here; reads and termination go straight to the target.

use std::sync::Arc;

use crate::error::PipeError;
use crate::pipe::buffered::BufferedPipe;
use crate::pipe::RecordPipe;
use crate::record::Record;

pub struct RetargetingPipe {
    buffer: BufferedPipe<Arc<dyn RecordPipe>>,
}

impl RetargetingPipe {
    pub fn new(target: Arc<dyn RecordPipe>, batch_size: usize) -> Self {
        RetargetingPipe {
            buffer: BufferedPipe::with_batch_size(target, batch_size),
        }
    }

    pub fn target(&self) -> &Arc<dyn RecordPipe> {
        self.buffer.inner()
    }

    pub fn pending(&self) -> usize {
        self.buffer.pending()
    }

    pub fn final_flush(&self) -> Result<(), PipeError> {
        self.buffer.final_flush()
    }
}

impl RecordPipe for RetargetingPipe {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        self.buffer.add(record)
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        self.buffer.add_batch(records)
    }

    fn drain_available(&self) -> Vec<Record> {
        self.target().drain_available()
    }

    fn count_available(&self) -> usize {
        self.target().count_available()
    }

    fn terminate(&self) {
        self.buffer.terminate()
    }

    fn is_terminated(&self) -> bool {
        self.target().is_terminated()
    }
}
