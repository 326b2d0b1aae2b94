//! FILENAME: core/engine/src/pipe/lockstep.rs
//! PURPOSE: Pipe that hands every add straight to a consumer on the producer's thread.
//! CONTEXT: Drive-to-completion mode. Producer and consumer run in lockstep on
//! one thread, so nothing is ever queued: `drain_available` is always empty and
//! there is no backpressure to wait on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::PipeError;
use crate::pipe::RecordPipe;
use crate::record::Record;

pub struct LockstepPipe<F>
where
    F: FnMut(Vec<Record>) + Send,
{
    consumer: Mutex<F>,
    terminated: AtomicBool,
    delivered: AtomicU64,
}

impl<F> LockstepPipe<F>
where
    F: FnMut(Vec<Record>) + Send,
{
    pub fn new(consumer: F) -> Self {
        LockstepPipe {
            consumer: Mutex::new(consumer),
            terminated: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
        }
    }

    /// Rows handed to the consumer so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    fn deliver(&self, records: Vec<Record>) {
        if records.is_empty() || self.is_terminated() {
            return;
        }
        let count = records.len() as u64;
        let mut consumer = self.consumer.lock().unwrap_or_else(|e| e.into_inner());
        (*consumer)(records);
        self.delivered.fetch_add(count, Ordering::AcqRel);
    }
}

impl<F> RecordPipe for LockstepPipe<F>
where
    F: FnMut(Vec<Record>) + Send,
{
    fn add(&self, record: Record) -> Result<(), PipeError> {
        self.deliver(vec![record]);
        Ok(())
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        self.deliver(records);
        Ok(())
    }

    fn drain_available(&self) -> Vec<Record> {
        Vec::new()
    }

    fn count_available(&self) -> usize {
        0
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}
