//! FILENAME: core/persistence/src/json_lines.rs
//! PURPOSE: Newline-delimited JSON output for exports and pivot reports.
//! CONTEXT: Every line is one JSON object. A section opens with a header object
//! (`"section"`, plus `"title"` and `"fields"` when headers are on), rows follow
//! as flat field-name to value objects, and a totals row is wrapped as
//! `{"totals": {...}}`. Decimals are written as JSON numbers, dates as
//! `YYYY-MM-DD` strings.

use std::io::Write;

use engine::{FieldMetadata, OutputConfig, Record, ReportWriter, Value, WriteError};
use log::debug;
use serde_json::{json, Map, Number};

use crate::error::PersistenceError;

pub struct JsonLinesWriter<W: Write + Send> {
    out: W,
    fields: Vec<String>,
    sections: usize,
    rows: u64,
    finished: bool,
}

impl<W: Write + Send> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        JsonLinesWriter {
            out,
            fields: Vec::new(),
            sections: 0,
            rows: 0,
            finished: false,
        }
    }

    /// Rows written so far across all sections, totals excluded.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, object: &serde_json::Value) -> Result<(), PersistenceError> {
        serde_json::to_writer(&mut self.out, object)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn check_open(&self, operation: &str) -> Result<(), PersistenceError> {
        if self.finished {
            return Err(PersistenceError::OutOfOrder(format!(
                "{} after finish",
                operation
            )));
        }
        if self.sections == 0 {
            return Err(PersistenceError::OutOfOrder(format!(
                "{} before start",
                operation
            )));
        }
        Ok(())
    }

    fn row_object(&self, row: &Record) -> serde_json::Value {
        let mut object = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = row.get(field).map(value_to_json).unwrap_or(serde_json::Value::Null);
            object.insert(field.clone(), value);
        }
        serde_json::Value::Object(object)
    }
}

/// JSON rendering of a field value.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => json!(i),
        Value::Decimal(d) => d
            .to_string()
            .parse::<Number>()
            .map(serde_json::Value::Number)
            .unwrap_or_else(|_| serde_json::Value::String(d.to_string())),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Date(_) => serde_json::Value::String(value.to_string()),
    }
}

impl<W: Write + Send> ReportWriter for JsonLinesWriter<W> {
    fn start(
        &mut self,
        config: &OutputConfig,
        fields: &[FieldMetadata],
        label: &str,
    ) -> Result<(), WriteError> {
        if self.finished {
            return Err(PersistenceError::OutOfOrder("start after finish".to_string()).into());
        }
        self.fields = fields.iter().map(|f| f.name.clone()).collect();
        self.sections += 1;

        let header = if config.include_headers {
            let columns: Vec<serde_json::Value> = fields
                .iter()
                .map(|f| json!({ "name": f.name, "label": f.label(), "type": f.field_type }))
                .collect();
            json!({ "section": label, "title": config.title, "fields": columns })
        } else {
            json!({ "section": label })
        };
        self.line(&header)?;
        Ok(())
    }

    fn add_rows(&mut self, rows: &[Record]) -> Result<(), WriteError> {
        self.check_open("add_rows")?;
        for row in rows {
            let object = self.row_object(row);
            self.line(&object)?;
        }
        self.rows += rows.len() as u64;
        Ok(())
    }

    fn add_totals_row(&mut self, row: &Record) -> Result<(), WriteError> {
        self.check_open("add_totals_row")?;
        let object = json!({ "totals": self.row_object(row) });
        self.line(&object)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        if self.finished {
            return Err(PersistenceError::OutOfOrder("finish called twice".to_string()).into());
        }
        self.out.flush().map_err(PersistenceError::from)?;
        self.finished = true;
        debug!(
            "json lines output finished: {} sections, {} rows",
            self.sections, self.rows
        );
        Ok(())
    }

    fn close(&mut self) {
        if !self.finished {
            let _ = self.out.flush();
            self.finished = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use engine::FieldType;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn fields() -> Vec<FieldMetadata> {
        vec![
            FieldMetadata::new("region", FieldType::Text).with_label("Region"),
            FieldMetadata::new("amount", FieldType::Decimal),
        ]
    }

    fn lines(writer: JsonLinesWriter<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8(writer.into_inner())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_section_rows_and_totals() {
        let mut writer = JsonLinesWriter::new(Vec::new());
        writer
            .start(&OutputConfig::titled("Sales"), &fields(), "By region")
            .unwrap();
        writer
            .add_rows(&[
                Record::new()
                    .with("region", "North")
                    .with("amount", BigDecimal::from_str("12.50").unwrap()),
                Record::new().with("region", "South"),
            ])
            .unwrap();
        writer
            .add_totals_row(&Record::new().with("region", "Total").with("amount", 20))
            .unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.rows_written(), 2);

        let lines = lines(writer);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["section"], json!("By region"));
        assert_eq!(lines[0]["title"], json!("Sales"));
        assert_eq!(lines[0]["fields"][0]["label"], json!("Region"));
        assert_eq!(lines[1], json!({ "region": "North", "amount": 12.5 }));
        assert_eq!(lines[2], json!({ "region": "South", "amount": null }));
        assert_eq!(lines[3], json!({ "totals": { "region": "Total", "amount": 20 } }));
    }

    #[test]
    fn test_header_without_fields() {
        let mut writer = JsonLinesWriter::new(Vec::new());
        let config = OutputConfig {
            include_headers: false,
            ..OutputConfig::default()
        };
        writer.start(&config, &fields(), "Plain").unwrap();
        writer.finish().unwrap();

        assert_eq!(lines(writer), vec![json!({ "section": "Plain" })]);
    }

    #[test]
    fn test_value_rendering() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(value_to_json(&Value::Date(date)), json!("2024-02-29"));
        assert_eq!(value_to_json(&Value::Boolean(true)), json!(true));
        assert_eq!(value_to_json(&Value::Null), serde_json::Value::Null);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut writer = JsonLinesWriter::new(Vec::new());
        let err = writer.add_rows(&[Record::new()]).unwrap_err();
        assert!(matches!(err, WriteError::State(_)));

        writer.start(&OutputConfig::default(), &fields(), "A").unwrap();
        writer.finish().unwrap();
        assert!(writer.finish().is_err());
        assert!(writer
            .start(&OutputConfig::default(), &fields(), "B")
            .is_err());
    }
}
