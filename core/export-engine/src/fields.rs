//! FILENAME: core/export-engine/src/fields.rs
//! PURPOSE: Resolves the exported field list and its display-label companions.
//! CONTEXT: A field backed by a possible-value source exports its raw value, and
//! a synthetic text column next in the list carries the resolved label. The
//! query engine puts labels in each record's display map; `copy_display_labels`
//! moves them into the companion columns before rows reach the writer.

use engine::{FieldMetadata, FieldType, Record, TableMetadata, Value};

use crate::error::ExportError;

pub const LABEL_FIELD_SUFFIX: &str = ":possibleValueLabel";

pub fn label_field_name(field: &str) -> String {
    format!("{}{}", field, LABEL_FIELD_SUFFIX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFields {
    /// Output columns: requested fields, then one companion per possible-value field.
    pub fields: Vec<FieldMetadata>,
    /// (source field, companion field) pairs.
    pub label_pairs: Vec<(String, String)>,
}

impl PreparedFields {
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }
}

/// Checks every requested name against the table and appends label companions.
/// All unknown names are reported together.
pub fn prepare_fields(
    table: &TableMetadata,
    requested: &[String],
) -> Result<PreparedFields, ExportError> {
    let unknown: Vec<&str> = requested
        .iter()
        .filter(|name| table.field(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(ExportError::Validation(format!(
            "Unknown field(s) for table '{}': {}",
            table.label(),
            unknown.join(", ")
        )));
    }

    let mut fields = Vec::with_capacity(requested.len());
    let mut companions = Vec::new();
    let mut label_pairs = Vec::new();

    for name in requested {
        let Some(field) = table.field(name) else {
            continue;
        };
        fields.push(field.clone());
        if field.has_possible_values() {
            let companion = label_field_name(&field.name);
            companions.push(
                FieldMetadata::new(companion.clone(), FieldType::Text)
                    .with_label(format!("{} (label)", field.label())),
            );
            label_pairs.push((field.name.clone(), companion));
        }
    }
    fields.extend(companions);

    Ok(PreparedFields {
        fields,
        label_pairs,
    })
}

/// Fills each companion column from its source field's display value (null when
/// the source has none).
pub fn copy_display_labels(rows: &mut [Record], label_pairs: &[(String, String)]) {
    if label_pairs.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        for (source, companion) in label_pairs {
            let label = row
                .display_value(source)
                .map(|s| Value::Text(s.to_string()))
                .unwrap_or(Value::Null);
            row.set(companion.clone(), label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> TableMetadata {
        TableMetadata::new("orders")
            .with_label("Orders")
            .with_field(FieldMetadata::new("id", FieldType::Integer))
            .with_field(
                FieldMetadata::new("status", FieldType::Text)
                    .with_label("Status")
                    .with_possible_values("orderStatus"),
            )
    }

    #[test]
    fn test_companion_fields_are_appended() {
        let prepared =
            prepare_fields(&table(), &["status".to_string(), "id".to_string()]).unwrap();
        let names: Vec<&str> = prepared.fields.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(names, vec!["status", "id", "status:possibleValueLabel"]);
        assert_eq!(prepared.fields[2].label(), "Status (label)");
        assert_eq!(prepared.fields[2].field_type, FieldType::Text);
        assert_eq!(
            prepared.label_pairs,
            vec![("status".to_string(), "status:possibleValueLabel".to_string())]
        );
    }

    #[test]
    fn test_unknown_fields_are_named() {
        let err = prepare_fields(
            &table(),
            &["id".to_string(), "colour".to_string(), "size".to_string()],
        )
        .unwrap_err();
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "Unknown field(s) for table 'Orders': colour, size");
    }

    #[test]
    fn test_copy_display_labels() {
        let mut rows = vec![
            Record::new().with("status", "O").with_display("status", "Open"),
            Record::new().with("status", "X"),
        ];
        let pairs = vec![("status".to_string(), label_field_name("status"))];
        copy_display_labels(&mut rows, &pairs);

        assert_eq!(
            rows[0].value_or_null("status:possibleValueLabel"),
            Value::from("Open")
        );
        assert_eq!(rows[1].value_or_null("status:possibleValueLabel"), Value::Null);
    }
}
