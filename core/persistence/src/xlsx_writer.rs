//! FILENAME: core/persistence/src/xlsx_writer.rs
//! PURPOSE: XLSX output for exports and pivot reports.
//! CONTEXT: Each `start` opens a new worksheet named after the section label.
//! Worksheets are built in memory and pushed into the workbook on `finish`,
//! which is the only point the file is written. Display formats (from
//! `set_display_formats`, falling back to the field's own hint) become Excel
//! number formats on their column.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use bigdecimal::ToPrimitive;
use chrono::Datelike;
use engine::{FieldMetadata, OutputConfig, Record, ReportWriter, Value, WriteError};
use log::{debug, warn};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet};

use crate::error::PersistenceError;

/// Physical rows in a worksheet, header included.
pub const XLSX_SHEET_ROWS: u64 = 1_048_576;
/// Data rows per section once the header row is taken.
pub const XLSX_MAX_ROWS: u64 = XLSX_SHEET_ROWS - 1;
pub const XLSX_MAX_COLUMNS: usize = 16_384;

const SHEET_NAME_MAX: usize = 31;
const DATE_FORMAT: &str = "yyyy-mm-dd";

pub struct XlsxReportWriter {
    path: PathBuf,
    sheets: Vec<Worksheet>,
    sheet_names: HashSet<String>,
    section: Option<Section>,
    display_formats: HashMap<String, String>,
    title: Option<String>,
    finished: bool,
}

/// Per-worksheet write state.
struct Section {
    fields: Vec<String>,
    formats: Vec<Format>,
    totals_formats: Vec<Format>,
    date_format: Format,
    next_row: u32,
}

impl XlsxReportWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        XlsxReportWriter {
            path: path.as_ref().to_path_buf(),
            sheets: Vec::new(),
            sheet_names: HashSet::new(),
            section: None,
            display_formats: HashMap::new(),
            title: None,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_section(
        &mut self,
        config: &OutputConfig,
        fields: &[FieldMetadata],
        label: &str,
    ) -> Result<(), PersistenceError> {
        if self.finished {
            return Err(PersistenceError::OutOfOrder("start after finish".to_string()));
        }
        if fields.len() > XLSX_MAX_COLUMNS {
            return Err(PersistenceError::LimitExceeded(format!(
                "{} columns, a worksheet holds at most {}",
                fields.len(),
                XLSX_MAX_COLUMNS
            )));
        }
        if self.title.is_none() && !config.title.is_empty() {
            self.title = Some(config.title.clone());
        }

        let name = unique_sheet_name(label, &self.sheet_names, self.sheets.len() + 1);
        self.sheet_names.insert(name.to_lowercase());
        let mut sheet = Worksheet::new();
        sheet.set_name(&name)?;

        let formats: Vec<Format> = fields
            .iter()
            .map(|field| {
                let pattern = self
                    .display_formats
                    .get(&field.name)
                    .or(field.display_format.as_ref());
                match pattern {
                    Some(pattern) => Format::new().set_num_format(pattern),
                    None => Format::new(),
                }
            })
            .collect();
        let totals_formats = formats.iter().map(|f| f.clone().set_bold()).collect();

        let mut next_row = 0;
        if config.include_headers {
            let bold = Format::new().set_bold();
            for (col, field) in fields.iter().enumerate() {
                sheet.write_string_with_format(0, column(col), field.label(), &bold)?;
            }
            sheet.set_freeze_panes(1, 0)?;
            next_row = 1;
        }

        debug!("xlsx: opened worksheet '{}' with {} columns", name, fields.len());
        self.sheets.push(sheet);
        self.section = Some(Section {
            fields: fields.iter().map(|f| f.name.clone()).collect(),
            formats,
            totals_formats,
            date_format: Format::new().set_num_format(DATE_FORMAT),
            next_row,
        });
        Ok(())
    }

    fn write_row(&mut self, row: &Record, totals: bool) -> Result<(), PersistenceError> {
        let (Some(section), Some(sheet)) = (self.section.as_mut(), self.sheets.last_mut()) else {
            return Err(PersistenceError::OutOfOrder("row written before start".to_string()));
        };
        if u64::from(section.next_row) >= XLSX_SHEET_ROWS {
            return Err(PersistenceError::LimitExceeded(format!(
                "worksheet is full at {} rows",
                XLSX_SHEET_ROWS
            )));
        }

        let r = section.next_row;
        let formats = if totals {
            &section.totals_formats
        } else {
            &section.formats
        };
        for (col, field) in section.fields.iter().enumerate() {
            let c = column(col);
            let format = &formats[col];
            match row.get(field) {
                None | Some(Value::Null) => {}
                Some(Value::Integer(i)) => {
                    sheet.write_number_with_format(r, c, *i as f64, format)?;
                }
                Some(Value::Decimal(d)) => match d.to_f64() {
                    Some(n) => {
                        sheet.write_number_with_format(r, c, n, format)?;
                    }
                    None => {
                        sheet.write_string_with_format(r, c, d.to_string(), format)?;
                    }
                },
                Some(Value::Text(s)) => {
                    sheet.write_string_with_format(r, c, s, format)?;
                }
                Some(Value::Boolean(b)) => {
                    sheet.write_boolean_with_format(r, c, *b, format)?;
                }
                Some(Value::Date(d)) => {
                    let date = ExcelDateTime::from_ymd(
                        u16::try_from(d.year()).unwrap_or(1900),
                        d.month() as u8,
                        d.day() as u8,
                    )?;
                    let date_format = if totals {
                        section.date_format.clone().set_bold()
                    } else {
                        section.date_format.clone()
                    };
                    sheet.write_datetime_with_format(r, c, &date, &date_format)?;
                }
            }
        }
        section.next_row += 1;
        Ok(())
    }

    fn save(&mut self) -> Result<(), PersistenceError> {
        if self.finished {
            return Err(PersistenceError::OutOfOrder("finish called twice".to_string()));
        }
        let mut workbook = Workbook::new();
        if let Some(title) = &self.title {
            workbook.set_properties(&DocProperties::new().set_title(title));
        }
        if self.sheets.is_empty() {
            workbook.add_worksheet();
        }
        let sheets = std::mem::take(&mut self.sheets);
        let count = sheets.len();
        for sheet in sheets {
            workbook.push_worksheet(sheet);
        }
        workbook.save(&self.path)?;
        self.finished = true;
        self.section = None;
        debug!("xlsx: saved {} worksheets to {}", count, self.path.display());
        Ok(())
    }
}

impl ReportWriter for XlsxReportWriter {
    fn max_rows(&self) -> Option<u64> {
        Some(XLSX_MAX_ROWS)
    }

    fn max_columns(&self) -> Option<usize> {
        Some(XLSX_MAX_COLUMNS)
    }

    fn set_display_formats(&mut self, formats: &HashMap<String, String>) {
        self.display_formats = formats.clone();
    }

    fn start(
        &mut self,
        config: &OutputConfig,
        fields: &[FieldMetadata],
        label: &str,
    ) -> Result<(), WriteError> {
        Ok(self.open_section(config, fields, label)?)
    }

    fn add_rows(&mut self, rows: &[Record]) -> Result<(), WriteError> {
        for row in rows {
            self.write_row(row, false)?;
        }
        Ok(())
    }

    fn add_totals_row(&mut self, row: &Record) -> Result<(), WriteError> {
        Ok(self.write_row(row, true)?)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        Ok(self.save()?)
    }

    fn close(&mut self) {
        if !self.finished {
            warn!(
                "xlsx: discarding {} unsaved worksheets for {}",
                self.sheets.len(),
                self.path.display()
            );
            self.sheets.clear();
            self.section = None;
            self.finished = true;
        }
    }
}

fn column(index: usize) -> u16 {
    // Column counts are checked against XLSX_MAX_COLUMNS in start.
    u16::try_from(index).unwrap_or(u16::MAX)
}

/// A valid, workbook-unique worksheet name derived from a section label.
/// `taken` holds lowercased names already used.
fn unique_sheet_name(label: &str, taken: &HashSet<String>, ordinal: usize) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let base = if cleaned.is_empty() {
        format!("Sheet{}", ordinal)
    } else {
        truncate(cleaned, SHEET_NAME_MAX)
    };

    if !taken.contains(&base.to_lowercase()) {
        return base;
    }
    let mut n = 2;
    loop {
        let suffix = format!(" ({})", n);
        let candidate = format!(
            "{}{}",
            truncate(&base, SHEET_NAME_MAX - suffix.chars().count()),
            suffix
        );
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
