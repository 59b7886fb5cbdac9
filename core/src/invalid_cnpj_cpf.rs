//! Invalid CNPJ/CPF classifier.
//!
//! Receipts and bills of sale must name a recipient with a well-formed
//! CPF (11 digits, individuals) or CNPJ (14 digits, companies). A row is
//! flagged when its document is one of those types and the recipient id
//! fails the check-digit test.

use crate::{
    classifier::{Classifier, ClassifierFactory, SerdeFactory},
    dataset::{Dataset, Record},
    error::{RosieError, RosieResult},
    types::{Prediction, INLIER, OUTLIER},
};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "InvalidCnpjCpfClassifier";

/// Document types that must carry a valid recipient id.
const CHECKED_DOCUMENT_TYPES: [&str; 2] = ["bill_of_sale", "simple_receipt"];

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidCnpjCpfClassifier {
    fitted: bool,
}

impl InvalidCnpjCpfClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_invalid(record: &Record) -> bool {
        let checked = record
            .document_type
            .as_deref()
            .is_some_and(|t| CHECKED_DOCUMENT_TYPES.contains(&t));
        checked && !record.recipient_id.as_deref().is_some_and(is_valid_cnpj_cpf)
    }
}

impl Classifier for InvalidCnpjCpfClassifier {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn fit(&mut self, _dataset: &Dataset) -> RosieResult<()> {
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, chunk: &Dataset) -> RosieResult<Vec<Prediction>> {
        if !self.fitted {
            return Err(RosieError::NotFitted {
                kind: KIND.to_string(),
            });
        }
        Ok(chunk
            .rows()
            .iter()
            .map(|r| if Self::is_invalid(r) { OUTLIER } else { INLIER })
            .collect())
    }

    fn to_artifact(&self) -> RosieResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn factory() -> impl ClassifierFactory {
    SerdeFactory::new(KIND, || Ok(InvalidCnpjCpfClassifier::new()))
}

/// Validate a CPF or CNPJ, ignoring punctuation.
pub fn is_valid_cnpj_cpf(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    match digits.len() {
        11 => is_valid_cpf(&digits),
        14 => is_valid_cnpj(&digits),
        _ => false,
    }
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn is_valid_cpf(digits: &[u32]) -> bool {
    if all_same(digits) {
        return false;
    }
    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .zip((2..=len as u32 + 1).rev())
            .map(|(d, w)| d * w)
            .sum();
        (sum * 10 % 11) % 10
    };
    check(9) == digits[9] && check(10) == digits[10]
}

fn cnpj_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    }
}

fn is_valid_cnpj(digits: &[u32]) -> bool {
    !all_same(digits)
        && cnpj_check_digit(digits, &CNPJ_FIRST_WEIGHTS) == digits[12]
        && cnpj_check_digit(digits, &CNPJ_SECOND_WEIGHTS) == digits[13]
}

/// Complete a 12-digit CNPJ base with its two check digits.
pub fn complete_cnpj(base: [u32; 12]) -> String {
    let mut digits = base.to_vec();
    digits.push(cnpj_check_digit(&digits, &CNPJ_FIRST_WEIGHTS));
    digits.push(cnpj_check_digit(&digits, &CNPJ_SECOND_WEIGHTS));
    digits
        .iter()
        .filter_map(|d| char::from_digit(*d, 10))
        .collect()
}
