//! FILENAME: core/engine/src/query.rs
//! PURPOSE: Query description handed to the query-engine collaborator.
//! CONTEXT: A `TableQuery` names a table, a filter (criteria + ordering), an
//! optional field projection and an optional row limit. Criteria values may
//! hold `${scope.name}` placeholders that are substituted before execution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::record::Record;
use crate::value::Value;
use crate::variables::VariableScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriteriaOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    Between,
    IsBlank,
    IsNotBlank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub field: String,
    pub operator: CriteriaOperator,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl FilterCriteria {
    pub fn new(field: impl Into<String>, operator: CriteriaOperator, values: Vec<Value>) -> Self {
        FilterCriteria {
            field: field.into(),
            operator,
            values,
        }
    }

    fn operand(&self, index: usize) -> Result<&Value, QueryError> {
        self.values.get(index).ok_or_else(|| QueryError::InvalidCriteria {
            field: self.field.clone(),
            message: format!(
                "{:?} needs at least {} value(s), got {}",
                self.operator,
                index + 1,
                self.values.len()
            ),
        })
    }

    /// Tests one record. Comparisons against null never match.
    pub fn matches(&self, record: &Record) -> Result<bool, QueryError> {
        let actual = record.value_or_null(&self.field);
        let blank = match &actual {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        };

        let cmp = |expected: &Value| -> Option<Ordering> {
            if actual.is_null() || expected.is_null() {
                None
            } else {
                Some(actual.compare(expected))
            }
        };

        let matched = match self.operator {
            CriteriaOperator::IsBlank => blank,
            CriteriaOperator::IsNotBlank => !blank,
            CriteriaOperator::Equals => cmp(self.operand(0)?) == Some(Ordering::Equal),
            CriteriaOperator::NotEquals => {
                matches!(cmp(self.operand(0)?), Some(Ordering::Less | Ordering::Greater))
            }
            CriteriaOperator::In => self.values.iter().any(|v| cmp(v) == Some(Ordering::Equal)),
            CriteriaOperator::NotIn => {
                !actual.is_null() && !self.values.iter().any(|v| cmp(v) == Some(Ordering::Equal))
            }
            CriteriaOperator::GreaterThan => cmp(self.operand(0)?) == Some(Ordering::Greater),
            CriteriaOperator::GreaterThanOrEquals => {
                matches!(cmp(self.operand(0)?), Some(Ordering::Greater | Ordering::Equal))
            }
            CriteriaOperator::LessThan => cmp(self.operand(0)?) == Some(Ordering::Less),
            CriteriaOperator::LessThanOrEquals => {
                matches!(cmp(self.operand(0)?), Some(Ordering::Less | Ordering::Equal))
            }
            CriteriaOperator::Between => {
                let low = cmp(self.operand(0)?);
                let high = cmp(self.operand(1)?);
                matches!(low, Some(Ordering::Greater | Ordering::Equal))
                    && matches!(high, Some(Ordering::Less | Ordering::Equal))
            }
        };
        Ok(matched)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            ascending: false,
        }
    }
}

/// Compares two records field by field. Within a field, nulls sort first when
/// ascending and last when descending; ties fall through to the next field.
pub fn compare_records(a: &Record, b: &Record, order_by: &[OrderBy]) -> Ordering {
    for order in order_by {
        let left = a.value_or_null(&order.field);
        let right = b.value_or_null(&order.field);
        let ordering = left.compare(&right);
        let ordering = if order.ascending { ordering } else { ordering.reverse() };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub criteria: Vec<FilterCriteria>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl QueryFilter {
    pub fn new() -> Self {
        QueryFilter::default()
    }

    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria.push(criteria);
        self
    }

    pub fn with_order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// All criteria must match.
    pub fn matches(&self, record: &Record) -> Result<bool, QueryError> {
        for criteria in &self.criteria {
            if !criteria.matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Copy of this filter with every criteria value run through `scope`.
    pub fn interpolate(&self, scope: &VariableScope) -> QueryFilter {
        let criteria = self
            .criteria
            .iter()
            .map(|c| FilterCriteria {
                field: c.field.clone(),
                operator: c.operator,
                values: c.values.iter().map(|v| scope.interpolate_value(v)).collect(),
            })
            .collect();
        QueryFilter {
            criteria,
            order_by: self.order_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    #[serde(default)]
    pub filter: QueryFilter,
    /// Fields to return; `None` returns every field of the table.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        TableQuery {
            table: table.into(),
            filter: QueryFilter::default(),
            fields: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
