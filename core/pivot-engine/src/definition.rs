//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Report Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot report.
//! These structures are designed to be:
//! - Serializable (report definitions are stored as JSON)
//! - Immutable snapshots of user intent

use serde::{Deserialize, Serialize};
use engine::{OrderBy, TableQuery};

use crate::error::ReportError;

// ============================================================================
// REPORT
// ============================================================================

/// A report: one query whose rows feed one or more pivot views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub name: String,

    /// Query run once per report. Criteria values may reference `${input.*}`.
    pub query: TableQuery,

    pub views: Vec<PivotViewDefinition>,
}

impl ReportDefinition {
    pub fn new(name: impl Into<String>, query: TableQuery) -> Self {
        ReportDefinition {
            name: name.into(),
            query,
            views: Vec::new(),
        }
    }

    pub fn with_view(mut self, view: PivotViewDefinition) -> Self {
        self.views.push(view);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let definition: ReportDefinition = serde_json::from_str(json)
            .map_err(|e| ReportError::Definition(format!("invalid report JSON: {}", e)))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Rejects views whose output columns would collide.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.views.is_empty() {
            return Err(ReportError::Definition(format!(
                "report '{}' has no views",
                self.name
            )));
        }
        for view in &self.views {
            let mut names: Vec<&str> = view.pivot_fields.iter().map(String::as_str).collect();
            for column in &view.columns {
                if names.contains(&column.name.as_str()) {
                    return Err(ReportError::Definition(format!(
                        "view '{}' defines '{}' more than once",
                        view.name, column.name
                    )));
                }
                names.push(&column.name);
            }
        }
        Ok(())
    }
}

// ============================================================================
// VIEWS
// ============================================================================

/// One grouped section of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotViewDefinition {
    pub name: String,

    /// Section title (defaults to the view name).
    #[serde(default)]
    pub label: Option<String>,

    /// Fields whose values form the pivot key, in order.
    pub pivot_fields: Vec<String>,

    /// Computed columns, one formula each.
    #[serde(default)]
    pub columns: Vec<ReportColumn>,

    /// Output row ordering. Empty keeps first-encountered key order.
    #[serde(default)]
    pub order_by: Vec<OrderBy>,

    /// Append a grand-total row after the grouped rows.
    #[serde(default)]
    pub include_totals: bool,
}

impl PivotViewDefinition {
    pub fn new(name: impl Into<String>, pivot_fields: Vec<String>) -> Self {
        PivotViewDefinition {
            name: name.into(),
            label: None,
            pivot_fields,
            columns: Vec::new(),
            order_by: Vec::new(),
            include_totals: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_column(mut self, column: ReportColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_totals(mut self) -> Self {
        self.include_totals = true;
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

/// A computed report column.
///
/// The formula sees `input.*`, `pivot.{sum,count,min,max,avg}.<field>` for the
/// row's key and `total.{sum,count,min,max,avg}.<field>` for the whole result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportColumn {
    pub name: String,

    #[serde(default)]
    pub label: Option<String>,

    pub formula: String,

    /// Display format pattern handed to the writer (e.g. "#,##0.00").
    #[serde(default)]
    pub display_format: Option<String>,
}

impl ReportColumn {
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> Self {
        ReportColumn {
            name: name.into(),
            label: None,
            formula: formula.into(),
            display_format: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_display_format(mut self, format: impl Into<String>) -> Self {
        self.display_format = Some(format.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json_with_defaults() {
        let json = r#"{
            "name": "sales",
            "query": { "table": "orders" },
            "views": [{
                "name": "byRegion",
                "pivot_fields": ["region"],
                "columns": [{ "name": "total", "formula": "pivot.sum.amount" }],
                "order_by": [{ "field": "region" }]
            }]
        }"#;

        let definition = ReportDefinition::from_json(json).unwrap();
        let view = &definition.views[0];
        assert_eq!(definition.query.table, "orders");
        assert_eq!(view.label(), "byRegion");
        assert!(!view.include_totals);
        assert!(view.order_by[0].ascending);
        assert_eq!(view.columns[0].label(), "total");
    }

    #[test]
    fn test_duplicate_output_column_is_rejected() {
        let definition = ReportDefinition::new("r", TableQuery::new("t")).with_view(
            PivotViewDefinition::new("v", vec!["a".to_string()])
                .with_column(ReportColumn::new("a", "pivot.sum.b")),
        );
        assert!(matches!(
            definition.validate(),
            Err(ReportError::Definition(_))
        ));
    }
}
