//! Tabular reimbursement data.
//!
//! A `Dataset` is an ordered list of `Record`s sharing one schema. The
//! columns every classifier may rely on are typed fields on `Record`;
//! anything else the source carries is kept verbatim in `extra` so that
//! unique-id columns and report output can still address it by name.

use crate::error::RosieResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

pub const APPLICANT_ID: &str = "applicant_id";
pub const CATEGORY: &str = "category";
pub const IS_PARTY_EXPENSE: &str = "is_party_expense";
pub const ISSUE_DATE: &str = "issue_date";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const DOCUMENT_TYPE: &str = "document_type";
pub const RECIPIENT_ID: &str = "recipient_id";
pub const NET_VALUE: &str = "net_value";

/// Columns backed by typed fields, in schema order.
pub const TYPED_COLUMNS: [&str; 9] = [
    APPLICANT_ID,
    CATEGORY,
    IS_PARTY_EXPENSE,
    ISSUE_DATE,
    LATITUDE,
    LONGITUDE,
    DOCUMENT_TYPE,
    RECIPIENT_ID,
    NET_VALUE,
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One reimbursement row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub applicant_id: String,
    pub category: String,
    pub is_party_expense: bool,
    pub issue_date: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub document_type: Option<String>,
    pub recipient_id: Option<String>,
    pub net_value: Option<f64>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    /// Render the value of `column` as text, `None` when absent or null.
    pub fn value(&self, column: &str) -> Option<String> {
        match column {
            APPLICANT_ID => Some(self.applicant_id.clone()),
            CATEGORY => Some(self.category.clone()),
            IS_PARTY_EXPENSE => Some(self.is_party_expense.to_string()),
            ISSUE_DATE => self.issue_date.map(|d| d.format(DATE_FORMAT).to_string()),
            LATITUDE => self.latitude.map(|v| v.to_string()),
            LONGITUDE => self.longitude.map(|v| v.to_string()),
            DOCUMENT_TYPE => self.document_type.clone(),
            RECIPIENT_ID => self.recipient_id.clone(),
            NET_VALUE => self.net_value.map(|v| v.to_string()),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Parse `raw` into `column`. Unparseable values become null.
    pub fn set(&mut self, column: &str, raw: &str) {
        let raw = raw.trim();
        match column {
            APPLICANT_ID => self.applicant_id = raw.to_string(),
            CATEGORY => self.category = raw.to_string(),
            IS_PARTY_EXPENSE => self.is_party_expense = parse_bool(raw),
            ISSUE_DATE => self.issue_date = parse_date(raw),
            LATITUDE => self.latitude = parse_f64(raw),
            LONGITUDE => self.longitude = parse_f64(raw),
            DOCUMENT_TYPE => self.document_type = non_empty(raw),
            RECIPIENT_ID => self.recipient_id = non_empty(raw),
            NET_VALUE => self.net_value = parse_f64(raw),
            other => {
                self.extra.insert(other.to_string(), raw.to_string());
            }
        }
    }
}

/// Ordered rows sharing one schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Dataset {
    /// An empty dataset with the typed columns plus `extra_columns`.
    pub fn with_extra_columns<I, S>(extra_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = TYPED_COLUMNS.iter().map(|c| c.to_string()).collect();
        for column in extra_columns {
            let column = column.into();
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a dataset whose schema is the typed columns plus every
    /// `extra` key seen in `rows`, in order of first appearance.
    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut extra: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.extra.keys() {
                if !extra.contains(key) {
                    extra.push(key.clone());
                }
            }
        }
        let mut dataset = Self::with_extra_columns(extra);
        dataset.rows = rows;
        dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        for key in record.extra.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(record);
    }

    /// Append every row of `other`, widening the schema if needed.
    pub fn append(&mut self, other: Dataset) {
        for column in other.columns {
            if !self.has_column(&column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(other.rows);
    }

    /// Read a CSV whose header already uses canonical column names.
    pub fn read_csv<R: Read>(reader: R) -> RosieResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut dataset =
            Self::with_extra_columns(headers.iter().filter(|h| !TYPED_COLUMNS.contains(h)));

        for row in csv_reader.records() {
            let row = row?;
            let mut record = Record::default();
            for (column, raw) in headers.iter().zip(row.iter()) {
                record.set(column, raw);
            }
            dataset.rows.push(record);
        }
        Ok(dataset)
    }

    /// Write every column of the schema as CSV, nulls as empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> RosieResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for record in &self.rows {
            csv_writer.write_record(
                self.columns
                    .iter()
                    .map(|c| record.value(c).unwrap_or_default()),
            )?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw, "true" | "True" | "TRUE" | "1")
}

/// Accepts plain dates and ISO timestamps; anything else is null.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

fn parse_f64(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_columns_land_in_extra() {
        let mut record = Record::default();
        record.set("document_id", "42");
        record.set(LATITUDE, "-15.79");
        record.set(ISSUE_DATE, "2016-03-01T00:00:00");

        assert_eq!(record.value("document_id").as_deref(), Some("42"));
        assert_eq!(record.latitude, Some(-15.79));
        assert_eq!(record.issue_date, NaiveDate::from_ymd_opt(2016, 3, 1));
    }

    #[test]
    fn bad_values_become_null() {
        let mut record = Record::default();
        record.set(LONGITUDE, "not a number");
        record.set(ISSUE_DATE, "01/03/2016");
        record.set(RECIPIENT_ID, "");

        assert_eq!(record.longitude, None);
        assert_eq!(record.issue_date, None);
        assert_eq!(record.recipient_id, None);
    }

    #[test]
    fn csv_preserves_schema_and_rows() {
        let input = "document_id,applicant_id,category,latitude\n1,a,Meal,-10.5\n2,b,Taxi,\n";
        let dataset = Dataset::read_csv(input.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert!(dataset.has_column("document_id"));
        assert_eq!(dataset.rows()[1].latitude, None);

        let mut out = Vec::new();
        dataset.write_csv(&mut out).unwrap();
        let reread = Dataset::read_csv(out.as_slice()).unwrap();
        assert_eq!(reread.rows(), dataset.rows());
    }
}
