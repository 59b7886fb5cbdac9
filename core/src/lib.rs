//! Rosie: flags suspicious expense reimbursements filed by public officials.
//!
//! Yearly chunks of reimbursements flow from an adapter through every
//! configured classifier; the per-row verdicts form a suspicion matrix
//! written as a compressed report in the adapter's data directory.

pub mod adapter;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod directory_adapter;
pub mod engine;
pub mod error;
pub mod geo;
pub mod invalid_cnpj_cpf;
pub mod model_store;
pub mod polynomial;
pub mod suspicions;
pub mod synthetic;
pub mod traveled_speeds;
pub mod types;

pub use adapter::{DatasetAdapter, InMemoryAdapter};
pub use classifier::{Classifier, ClassifierFactory, ClassifierRegistry};
pub use config::{Pipeline, PipelineSettings, RosieConfig, RunContext};
pub use dataset::{Dataset, Record};
pub use engine::SuspicionEngine;
pub use error::{RosieError, RosieResult};
pub use suspicions::{SuspicionCell, SuspicionTable};
