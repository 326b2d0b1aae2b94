//! FILENAME: core/pivot-engine/src/aggregate.rs
//! Pivot Aggregates - Running statistics keyed by pivot key.
//!
//! Rows are folded in as they stream past; nothing but the accumulators is
//! kept. Each view owns one `PivotAggregator`, which holds:
//! - one `FieldAccumulator` per (pivot key, numeric field)
//! - a parallel grand-total accumulator per numeric field that ignores the key
//!
//! Keys are remembered in first-encountered order so output is deterministic
//! before any sorting is applied.

use std::collections::HashMap;

use bigdecimal::{BigDecimal, RoundingMode};
use engine::{Record, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Scale of the `avg` aggregate.
pub const AVERAGE_SCALE: i64 = 4;

// ============================================================================
// PIVOT KEY
// ============================================================================

/// Ordered (field, value) pairs identifying one group.
/// Two keys are equal iff their pairs are equal position by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PivotKey {
    pub values: SmallVec<[(String, Value); 4]>,
}

impl PivotKey {
    pub fn of(record: &Record, pivot_fields: &[String]) -> Self {
        PivotKey {
            values: pivot_fields
                .iter()
                .map(|field| (field.clone(), record.value_or_null(field)))
                .collect(),
        }
    }

    pub fn value(&self, field: &str) -> Value {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null)
    }
}

// ============================================================================
// FIELD ACCUMULATOR
// ============================================================================

/// Running sum/count/min/max of the numeric values of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAccumulator {
    pub sum: BigDecimal,
    pub count: u64,
    pub min: Option<BigDecimal>,
    pub max: Option<BigDecimal>,
}

impl FieldAccumulator {
    pub fn add(&mut self, value: &BigDecimal) {
        self.sum += value;
        self.count += 1;
        if self.min.as_ref().map_or(true, |m| value < m) {
            self.min = Some(value.clone());
        }
        if self.max.as_ref().map_or(true, |m| value > m) {
            self.max = Some(value.clone());
        }
    }

    /// Sum divided by count, half-up to `AVERAGE_SCALE` places; null when empty.
    pub fn average(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        let avg = &self.sum / BigDecimal::from(self.count);
        Value::Decimal(avg.with_scale_round(AVERAGE_SCALE, RoundingMode::HalfUp))
    }

    /// Writes `sum.f`, `count.f`, `min.f`, `max.f` and `avg.f` into `out`.
    pub fn expose(&self, field: &str, out: &mut HashMap<String, Value>) {
        out.insert(format!("sum.{}", field), Value::Decimal(self.sum.clone()));
        out.insert(format!("count.{}", field), Value::Integer(self.count as i64));
        out.insert(format!("min.{}", field), Value::from(self.min.clone()));
        out.insert(format!("max.{}", field), Value::from(self.max.clone()));
        out.insert(format!("avg.{}", field), self.average());
    }
}

pub type FieldAccumulators = FxHashMap<String, FieldAccumulator>;

// ============================================================================
// AGGREGATOR
// ============================================================================

#[derive(Debug, Default)]
pub struct PivotAggregator {
    pivot_fields: Vec<String>,
    groups: FxHashMap<PivotKey, FieldAccumulators>,
    /// Keys in first-encountered order.
    order: Vec<PivotKey>,
    totals: FieldAccumulators,
    /// Every field that carried a numeric value, in first-seen order.
    numeric_fields: Vec<String>,
    rows: u64,
}

impl PivotAggregator {
    pub fn new(pivot_fields: Vec<String>) -> Self {
        PivotAggregator {
            pivot_fields,
            ..PivotAggregator::default()
        }
    }

    pub fn pivot_fields(&self) -> &[String] {
        &self.pivot_fields
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn group_count(&self) -> usize {
        self.order.len()
    }

    /// Keys in the order they were first seen.
    pub fn keys(&self) -> &[PivotKey] {
        &self.order
    }

    pub fn accumulate(&mut self, batch: &[Record]) {
        for record in batch {
            self.accumulate_one(record);
        }
    }

    fn accumulate_one(&mut self, record: &Record) {
        self.rows += 1;
        let key = PivotKey::of(record, &self.pivot_fields);
        if !self.groups.contains_key(&key) {
            self.order.push(key.clone());
        }
        let group = self.groups.entry(key).or_default();

        for (field, value) in record.values() {
            let number = match value.as_decimal() {
                Some(number) => number,
                None => continue,
            };
            if !self.totals.contains_key(field) {
                self.numeric_fields.push(field.clone());
            }
            group.entry(field.clone()).or_default().add(&number);
            self.totals.entry(field.clone()).or_default().add(&number);
        }
    }

    pub fn group(&self, key: &PivotKey) -> Option<&FieldAccumulators> {
        self.groups.get(key)
    }

    pub fn totals(&self) -> &FieldAccumulators {
        &self.totals
    }

    /// Scope values for one group. Fields the group never saw a number for
    /// still appear, with a zero sum and count.
    pub fn scope_values(&self, accumulators: &FieldAccumulators) -> HashMap<String, Value> {
        let mut out = HashMap::with_capacity(self.numeric_fields.len() * 5);
        let empty = FieldAccumulator::default();
        for field in &self.numeric_fields {
            accumulators
                .get(field)
                .unwrap_or(&empty)
                .expose(field, &mut out);
        }
        out
    }
}
