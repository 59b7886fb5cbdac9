//! Shared primitive types used across the entire pipeline.

/// A calendar year of reimbursements. One year = one chunk.
pub type Year = i32;

/// Stable identifier of the person filing an expense.
pub type ApplicantId = String;

/// Raw prediction value emitted by a classifier for one row.
pub type Prediction = i64;

/// Prediction value for a row judged anomalous.
pub const OUTLIER: Prediction = -1;

/// Prediction value for a row judged normal.
pub const INLIER: Prediction = 1;
