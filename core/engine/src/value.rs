//! FILENAME: core/engine/src/value.rs
//! PURPOSE: Defines the typed value carried by every field of a streamed record.
//! CONTEXT: Values flow unchanged from the query engine through pipes to the
//! output writers. The pipeline only looks inside them to build dedup keys,
//! pivot keys, sort orders and formula operands.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single typed field value.
///
/// Equality and hashing agree with `compare` on numbers: `Integer(2)`,
/// `Decimal(2)` and `Decimal(2.00)` are the same value, so they collapse to one
/// dedup key or pivot group. Values of other differing types are never equal.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Decimal(BigDecimal),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    /// Builds a decimal value from a float via its shortest textual form,
    /// so 0.1 stays 0.1 instead of its binary expansion.
    pub fn from_f64(n: f64) -> Value {
        if !n.is_finite() {
            return Value::Null;
        }
        BigDecimal::from_str(&n.to_string())
            .map(Value::Decimal)
            .unwrap_or(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Decimal(_))
    }

    /// Returns the numeric content of the value, if it has any.
    /// Text is not coerced here; callers that accept numeric text parse it themselves.
    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Integer(i) => Some(BigDecimal::from(*i)),
            Value::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
        }
    }

    /// Total ordering used for report sorting.
    /// Null sorts lowest; integers and decimals compare numerically with each other;
    /// otherwise values of different types order by type rank.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                match (a.as_decimal(), b.as_decimal()) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    _ => Ordering::Equal,
                }
            }

            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),

            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Decimal(_) => 1,
            Value::Text(_) => 2,
            Value::Boolean(_) => 3,
            Value::Date(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Integer(i), Value::Decimal(d)) | (Value::Decimal(d), Value::Integer(i)) => {
                d.is_integer() && d.to_i64() == Some(*i)
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            // Integral decimals hash like the integer they equal.
            Value::Decimal(d) => match d.to_i64().filter(|_| d.is_integer()) {
                Some(i) => i.hash(state),
                None => d.normalized().hash(state),
            },
            Value::Text(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Value {
        Value::Decimal(BigDecimal::from_str(s).unwrap())
    }

    #[test]
    fn test_null_sorts_before_everything() {
        assert_eq!(Value::Null.compare(&Value::Integer(-5)), Ordering::Less);
        assert_eq!(Value::Text("a".into()).compare(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn test_integer_and_decimal_compare_numerically() {
        assert_eq!(Value::Integer(2).compare(&dec("1.5")), Ordering::Greater);
        assert_eq!(dec("2.00").compare(&Value::Integer(2)), Ordering::Equal);
    }

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        assert_eq!(Value::Integer(2), dec("2.00"));
        assert_eq!(dec("2"), dec("2.000"));
        assert_eq!(hash_of(&Value::Integer(2)), hash_of(&dec("2.00")));
        assert_eq!(hash_of(&dec("1.50")), hash_of(&dec("1.5")));

        assert!(Value::Integer(2) != dec("2.5"));
        assert!(Value::Integer(1) != Value::Boolean(true));
        assert!(Value::Text("2".into()) != Value::Integer(2));
    }

    #[test]
    fn test_numeric_keys_share_a_slot() {
        let mut labels = std::collections::HashMap::new();
        labels.insert(Value::Integer(7), "seven");
        assert_eq!(labels.get(&dec("7.0")), Some(&"seven"));
        assert_eq!(labels.get(&dec("7.1")), None);
    }

    #[test]
    fn test_from_f64_uses_shortest_form() {
        assert_eq!(Value::from_f64(0.1), dec("0.1"));
        assert_eq!(Value::from_f64(f64::NAN), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(dec("3.50").to_string(), "3.50");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-03-09");
    }
}
