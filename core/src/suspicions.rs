//! The suspicion matrix and the compressed report.
//!
//! One row per input record, identified by the configured unique-id
//! columns, and one column per classifier in registration order.

use crate::{
    dataset::Dataset,
    error::{RosieError, RosieResult},
    types::{Prediction, INLIER, OUTLIER},
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "suspicions.zst";
const COMPRESSION_LEVEL: i32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionCell {
    /// Translated from the `{-1, +1}` convention; `true` is suspicious.
    Flag(bool),
    /// Any other prediction value, passed through as-is.
    Raw(Prediction),
}

impl SuspicionCell {
    pub fn from_prediction(prediction: Prediction) -> Self {
        match prediction {
            OUTLIER => SuspicionCell::Flag(true),
            INLIER => SuspicionCell::Flag(false),
            other => SuspicionCell::Raw(other),
        }
    }

    pub fn is_suspicious(&self) -> bool {
        matches!(self, SuspicionCell::Flag(true))
    }

    fn render(&self) -> String {
        match self {
            SuspicionCell::Flag(true) => "True".to_string(),
            SuspicionCell::Flag(false) => "False".to_string(),
            SuspicionCell::Raw(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionTable {
    id_columns: Vec<String>,
    ids: Vec<Vec<String>>,
    columns: Vec<(String, Vec<SuspicionCell>)>,
}

impl SuspicionTable {
    /// Start a table from the identity columns of `chunk`. With no
    /// unique ids configured every column of the chunk is copied.
    pub fn for_chunk(chunk: &Dataset, unique_ids: &[String]) -> RosieResult<Self> {
        let id_columns = if unique_ids.is_empty() {
            chunk.columns().to_vec()
        } else {
            if let Some(missing) = unique_ids.iter().find(|c| !chunk.has_column(c)) {
                return Err(RosieError::MissingColumn {
                    column: missing.clone(),
                });
            }
            unique_ids.to_vec()
        };

        let ids = chunk
            .rows()
            .iter()
            .map(|record| {
                id_columns
                    .iter()
                    .map(|c| record.value(c).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self {
            id_columns,
            ids,
            columns: Vec::new(),
        })
    }

    /// Add the predictions of classifier `name` as a new column.
    pub fn add_column(&mut self, name: &str, predictions: &[Prediction]) -> RosieResult<()> {
        if predictions.len() != self.ids.len() {
            return Err(RosieError::RowCountMismatch {
                classifier: name.to_string(),
                expected: self.ids.len(),
                actual: predictions.len(),
            });
        }
        let cells = predictions
            .iter()
            .map(|p| SuspicionCell::from_prediction(*p))
            .collect();
        self.columns.push((name.to_string(), cells));
        Ok(())
    }

    /// Stack yearly tables in the order given.
    ///
    /// Id columns are matched by name. The header is the union of every
    /// table's id columns in order of first appearance; a row whose year
    /// lacks a column gets an empty cell there.
    pub fn concat(tables: Vec<SuspicionTable>) -> Option<SuspicionTable> {
        let mut id_columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.id_columns {
                if !id_columns.contains(column) {
                    id_columns.push(column.clone());
                }
            }
        }

        let mut tables = tables.into_iter();
        let mut combined = tables.next()?;
        combined.reproject(&id_columns);
        for mut table in tables {
            table.reproject(&id_columns);
            combined.ids.extend(table.ids);
            for ((_, cells), (_, more)) in combined.columns.iter_mut().zip(table.columns) {
                cells.extend(more);
            }
        }
        Some(combined)
    }

    fn reproject(&mut self, id_columns: &[String]) {
        if self.id_columns == id_columns {
            return;
        }
        let positions: Vec<Option<usize>> = id_columns
            .iter()
            .map(|c| self.id_columns.iter().position(|own| own == c))
            .collect();
        for ids in &mut self.ids {
            *ids = positions
                .iter()
                .map(|p| p.and_then(|i| ids.get(i).cloned()).unwrap_or_default())
                .collect();
        }
        self.id_columns = id_columns.to_vec();
    }

    /// An empty table with the given header.
    pub fn empty(id_columns: Vec<String>, classifier_names: &[&str]) -> Self {
        Self {
            id_columns,
            ids: Vec::new(),
            columns: classifier_names
                .iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_columns(&self) -> &[String] {
        &self.id_columns
    }

    pub fn ids(&self) -> &[Vec<String>] {
        &self.ids
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[SuspicionCell]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cells)| cells.as_slice())
    }

    /// Header = id columns then classifier columns.
    pub fn write_csv<W: Write>(&self, writer: W) -> RosieResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let header = self
            .id_columns
            .iter()
            .map(String::as_str)
            .chain(self.column_names());
        csv_writer.write_record(header)?;

        for (row, ids) in self.ids.iter().enumerate() {
            let cells = self.columns.iter().map(|(_, cells)| cells[row].render());
            csv_writer.write_record(ids.iter().cloned().chain(cells))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the zstd-compressed CSV report into `dir`. The file only
    /// appears once fully written.
    pub fn write_report(&self, dir: &Path) -> RosieResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut encoder = zstd::Encoder::new(tmp.as_file(), COMPRESSION_LEVEL)?;
            self.write_csv(&mut encoder)?;
            encoder.finish()?;
        }
        tmp.persist(&path).map_err(|e| RosieError::Io(e.error))?;
        Ok(path)
    }
}

/// Decompress a report into its header and rows.
pub fn read_report(path: &Path) -> RosieResult<(Vec<String>, Vec<Vec<String>>)> {
    let decoder = zstd::Decoder::new(File::open(path)?)?;
    let mut reader = csv::Reader::from_reader(decoder);
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.map(|record| record.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((header, rows))
}
