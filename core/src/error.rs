use std::path::PathBuf;
use thiserror::Error;

use crate::types::Year;

#[derive(Error, Debug)]
pub enum RosieError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Classifier '{kind}' used before fit")]
    NotFitted { kind: String },

    #[error("Cannot load model artifact {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Could not refresh data for year {year}: {reason}")]
    DataRefresh { year: Year, reason: String },

    #[error("Classifier '{classifier}' returned {actual} predictions for {expected} rows")]
    RowCountMismatch {
        classifier: String,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{column}' not found in dataset")]
    MissingColumn { column: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RosieResult<T> = Result<T, RosieError>;
