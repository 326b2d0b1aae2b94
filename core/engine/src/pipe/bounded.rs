//! FILENAME: core/engine/src/pipe/bounded.rs
//! PURPOSE: Bounded, thread-safe FIFO of records.
//! CONTEXT: The producer side blocks (by retrying on a fixed interval) while the
//! queue is full, which bounds memory regardless of producer speed. The consumer
//! side never blocks: `drain_available` returns whatever is queued right now and
//! the caller supplies its own polling cadence.
//!
//! The lock is held only for `VecDeque` operations. The terminated flag is atomic
//! so a blocked producer observes termination without taking the lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::PipeError;
use crate::pipe::RecordPipe;
use crate::record::Record;

/// Default number of rows a pipe holds before producers block.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// Callback run over rows right before they are enqueued. Invoked once per
/// `add` (with a one-row slice) and once per `add_batch` (with the whole batch).
pub type PreAddHook = Box<dyn Fn(&mut [Record]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    pub capacity: usize,
    /// Sleep between attempts while the pipe is full.
    pub retry_interval_ms: u64,
    /// Cumulative wait for a single row before the add fails as stalled.
    pub max_wait_ms: u64,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig {
            capacity: DEFAULT_CAPACITY,
            retry_interval_ms: 100,
            max_wait_ms: 5 * 60 * 1_000,
        }
    }
}

pub struct Pipe {
    queue: Mutex<VecDeque<Record>>,
    capacity: usize,
    terminated: AtomicBool,
    retry_interval: Duration,
    max_wait: Duration,
    clock: Arc<dyn Clock>,
    pre_add_hook: Option<PreAddHook>,
}

impl Pipe {
    pub fn new() -> Self {
        Pipe::from_config(&PipeConfig::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Pipe::from_config(&PipeConfig {
            capacity,
            ..PipeConfig::default()
        })
    }

    pub fn from_config(config: &PipeConfig) -> Self {
        let capacity = config.capacity.max(1);
        Pipe {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(8_192))),
            capacity,
            terminated: AtomicBool::new(false),
            retry_interval: Duration::from_millis(config.retry_interval_ms.max(1)),
            max_wait: Duration::from_millis(config.max_wait_ms),
            clock: Arc::new(SystemClock),
            pre_add_hook: None,
        }
    }

    /// Replaces the clock used for the full-pipe retry sleeps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_pre_add_hook(mut self, hook: PreAddHook) -> Self {
        self.pre_add_hook = Some(hook);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Record>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueues one row, retrying while the queue is full.
    fn enqueue_blocking(&self, record: Record) -> Result<(), PipeError> {
        let mut waited = Duration::ZERO;

        loop {
            if self.is_terminated() {
                return Ok(());
            }

            {
                let mut queue = self.lock();
                // Re-check under the lock: terminate() may have raced with us.
                if self.is_terminated() {
                    return Ok(());
                }
                if queue.len() < self.capacity {
                    queue.push_back(record);
                    return Ok(());
                }
            }

            if waited >= self.max_wait {
                warn!(
                    "pipe full for {:?} (capacity {}), giving up on add",
                    waited, self.capacity
                );
                return Err(PipeError::Stalled {
                    waited,
                    capacity: self.capacity,
                });
            }

            self.clock.sleep(self.retry_interval);
            waited += self.retry_interval;
        }
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordPipe for Pipe {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        if self.is_terminated() {
            return Ok(());
        }
        let record = match &self.pre_add_hook {
            Some(hook) => {
                let mut one = [record];
                hook(&mut one);
                let [record] = one;
                record
            }
            None => record,
        };
        self.enqueue_blocking(record)
    }

    fn add_batch(&self, mut records: Vec<Record>) -> Result<(), PipeError> {
        if self.is_terminated() || records.is_empty() {
            return Ok(());
        }
        if let Some(hook) = &self.pre_add_hook {
            hook(&mut records);
        }
        for record in records {
            self.enqueue_blocking(record)?;
        }
        Ok(())
    }

    fn drain_available(&self) -> Vec<Record> {
        if self.is_terminated() {
            return Vec::new();
        }
        let mut queue = self.lock();
        queue.drain(..).collect()
    }

    fn count_available(&self) -> usize {
        if self.is_terminated() {
            return 0;
        }
        self.lock().len()
    }

    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut queue = self.lock();
        let discarded = queue.len();
        queue.clear();
        debug!("pipe terminated, discarded {} queued rows", discarded);
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}
