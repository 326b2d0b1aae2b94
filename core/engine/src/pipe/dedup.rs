//! FILENAME: core/engine/src/pipe/dedup.rs
//! PURPOSE: Decorator that forwards each unique-key projection at most once.
//! CONTEXT: The seen-set lives as long as the decorator and grows without bound;
//! it is scoped to one pipeline run, never shared.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use log::trace;

use crate::error::PipeError;
use crate::pipe::RecordPipe;
use crate::record::Record;
use crate::value::Value;

/// A record's values for the unique-key fields.
///
/// A single-field key projects to the raw value; wider keys project to an
/// ordered tuple. Missing fields project as null, and two nulls compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyProjection {
    Single(Value),
    Tuple(Vec<Value>),
}

impl KeyProjection {
    pub fn of(record: &Record, key: &[String]) -> KeyProjection {
        match key {
            [single] => KeyProjection::Single(record.value_or_null(single)),
            fields => KeyProjection::Tuple(fields.iter().map(|f| record.value_or_null(f)).collect()),
        }
    }
}

pub struct DedupPipe<P: RecordPipe> {
    inner: P,
    unique_key: Vec<String>,
    seen: Mutex<HashSet<KeyProjection>>,
}

impl<P: RecordPipe> DedupPipe<P> {
    pub fn new(inner: P, unique_key: Vec<String>) -> Self {
        DedupPipe {
            inner,
            unique_key,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn unique_key(&self) -> &[String] {
        &self.unique_key
    }

    /// Number of distinct projections forwarded so far.
    pub fn seen_count(&self) -> usize {
        self.lock().len()
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<KeyProjection>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Keeps rows whose projection is new, with their projections. Duplicates
    /// inside the same batch are filtered too. Nothing is marked seen here.
    fn retain_unseen(&self, records: Vec<Record>) -> (Vec<Record>, HashSet<KeyProjection>) {
        let seen = self.lock();
        let before = records.len();
        let mut fresh = HashSet::new();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|record| {
                let projection = KeyProjection::of(record, &self.unique_key);
                !seen.contains(&projection) && fresh.insert(projection)
            })
            .collect();
        if kept.len() < before {
            trace!("dedup dropped {} of {} rows", before - kept.len(), before);
        }
        (kept, fresh)
    }
}

impl<P: RecordPipe> RecordPipe for DedupPipe<P> {
    fn add(&self, record: Record) -> Result<(), PipeError> {
        let projection = KeyProjection::of(&record, &self.unique_key);
        if self.lock().contains(&projection) {
            return Ok(());
        }
        // Only a row the inner pipe accepted counts as forwarded.
        self.inner.add(record)?;
        self.lock().insert(projection);
        Ok(())
    }

    fn add_batch(&self, records: Vec<Record>) -> Result<(), PipeError> {
        let (kept, fresh) = self.retain_unseen(records);
        if kept.is_empty() {
            return Ok(());
        }
        self.inner.add_batch(kept)?;
        self.lock().extend(fresh);
        Ok(())
    }

    fn drain_available(&self) -> Vec<Record> {
        self.inner.drain_available()
    }

    fn count_available(&self) -> usize {
        self.inner.count_available()
    }

    fn terminate(&self) {
        self.inner.terminate()
    }

    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}
