//! FILENAME: core/engine/src/pipe/buffered.rs
//! PURPOSE: Decorator that batches single-row adds before forwarding them.
//! CONTEXT: Producers that emit one row at a time pay the inner pipe's lock and
//! hook cost once per batch instead of once per row.
//!
//! Rows sitting in the buffer are NOT visible to the consumer until a flush.
//! `final_flush()` after the last row is the caller's job; a buffer dropped
//! unflushed loses its contents. `BufferedPipe::scope` flushes on every exit path.

use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};

use crate::error::PipeError;
use crate::pipe::RecordPipe;
use crate::record::Record;

pub const DEFAULT_BATCH_SIZE: usize = 100;

pub struct BufferedPipe<P: RecordPipe> {
    inner: P,
    buffer: Mutex<Vec<Record>>,
    batch_size: usize,
}

impl<P: RecordPipe> BufferedPipe<P> {
    pub fn new(inner: P) -> Self {
        BufferedPipe::with_batch_size(inner, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(inner: P, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BufferedPipe {
            inner,
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size,
        }
    }

    /// Runs `body` against a buffered wrapper of `inner` and flushes whatever is
    /// left when it returns, whether it succeeded or not. A flush failure is
    /// reported only when the body itself succeeded.
    pub fn scope<R, E>(
        inner: P,
        batch_size: usize,
        body: impl FnOnce(&BufferedPipe<P>) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<PipeError>,
    {
        let pipe = BufferedPipe::with_batch_size(inner, batch_size);
        let outcome = body(&pipe);
        let flushed = pipe.final_flush();
        match (outcome, flushed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(E::from(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(flush_err)) => {
                warn!("final flush after failed producer also failed: {}", flush_err);
                Err(e)
            }
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Rows accepted but not yet forwarded.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Forwards any buffered remainder to the inner pipe.
    pub fn final_flush(&self) -> Result<(), PipeError> {
        let remainder = std::mem::take(&mut *self.lock());
        if remainder.is_empty() {
            return Ok(());
        }
        debug!("final flush of {} buffered rows", remainder.len());
        self.inner.add_batch(remainder)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<P: RecordPipe> RecordPipe for BufferedPipe<P> {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        let full = {
            let mut buffer = self.lock();
            buffer.push(record);
            if buffer.len() >= self.batch_size {
                Some(std::mem::replace(
                    &mut *buffer,
                    Vec::with_capacity(self.batch_size),
                ))
            } else {
                None
            }
        };
        // Forward outside our lock; the inner add may block on backpressure.
        match full {
            Some(batch) => self.inner.add_batch(batch),
            None => Ok(()),
        }
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        // Anything already buffered goes first so row order is preserved.
        let mut batch = std::mem::take(&mut *self.lock());
        batch.extend(records);
        if batch.is_empty() {
            return Ok(());
        }
        self.inner.add_batch(batch)
    }

    fn drain_available(&self) -> Vec<Record> {
        self.inner.drain_available()
    }

    fn count_available(&self) -> usize {
        self.inner.count_available()
    }

    fn terminate(&self) {
        self.lock().clear();
        self.inner.terminate();
    }

    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl<P: RecordPipe> Drop for BufferedPipe<P> {
    fn drop(&mut self) {
        let pending = self.lock().len();
        if pending > 0 && !self.inner.is_terminated() {
            warn!(
                "buffered pipe dropped with {} unflushed rows; they are discarded",
                pending
            );
        }
    }
}
