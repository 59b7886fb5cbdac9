//! Classifier trait and registry.
//!
//! RULE: Every detector implements Classifier.
//! The engine runs classifiers in registration order for every yearly
//! chunk. Predictions use `OUTLIER` (-1) for anomalous rows and
//! `INLIER` (+1) for normal ones.

use crate::{
    dataset::Dataset,
    error::RosieResult,
    types::Prediction,
};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

/// The contract every classifier must fulfill.
pub trait Classifier {
    /// Stable kind identifier, also used to name the persisted artifact.
    fn kind(&self) -> &'static str;

    /// Learn parameters from the full historical dataset.
    fn fit(&mut self, dataset: &Dataset) -> RosieResult<()>;

    /// Optional pre-prediction hook.
    fn transform(&mut self, _dataset: &Dataset) -> RosieResult<()> {
        Ok(())
    }

    /// One prediction per row of `chunk`, in row order.
    fn predict(&self, chunk: &Dataset) -> RosieResult<Vec<Prediction>>;

    /// Serialized form of the fitted state.
    fn to_artifact(&self) -> RosieResult<String>;
}

/// Builds classifiers of one kind and restores them from artifacts.
pub trait ClassifierFactory {
    fn kind(&self) -> &'static str;

    /// False for kinds whose artifact must never be written to disk;
    /// those are re-fitted in memory on every run.
    fn persistable(&self) -> bool {
        true
    }

    /// A fresh, unfitted classifier.
    fn build(&self) -> RosieResult<Box<dyn Classifier>>;

    /// Rebuild a fitted classifier from `artifact`.
    fn restore(&self, artifact: &str) -> RosieResult<Box<dyn Classifier>>;
}

/// Factory for any serde-backed classifier type.
pub struct SerdeFactory<C, F> {
    kind: &'static str,
    persistable: bool,
    make: F,
    _classifier: PhantomData<fn() -> C>,
}

impl<C, F> SerdeFactory<C, F>
where
    F: Fn() -> RosieResult<C>,
{
    pub fn new(kind: &'static str, make: F) -> Self {
        Self {
            kind,
            persistable: true,
            make,
            _classifier: PhantomData,
        }
    }

    pub fn in_memory_only(mut self) -> Self {
        self.persistable = false;
        self
    }
}

impl<C, F> ClassifierFactory for SerdeFactory<C, F>
where
    C: Classifier + Serialize + DeserializeOwned + 'static,
    F: Fn() -> RosieResult<C>,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn persistable(&self) -> bool {
        self.persistable
    }

    fn build(&self) -> RosieResult<Box<dyn Classifier>> {
        Ok(Box::new((self.make)()?))
    }

    fn restore(&self, artifact: &str) -> RosieResult<Box<dyn Classifier>> {
        let classifier: C = serde_json::from_str(artifact)?;
        Ok(Box::new(classifier))
    }
}

/// Ordered `(column name, factory)` pairs resolved once at startup.
#[derive(Default)]
pub struct ClassifierRegistry {
    entries: Vec<(String, Box<dyn ClassifierFactory>)>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a classifier. Registration order is report column order.
    pub fn register(&mut self, name: impl Into<String>, factory: Box<dyn ClassifierFactory>) {
        self.entries.push((name.into(), factory));
    }

    pub fn with(mut self, name: impl Into<String>, factory: Box<dyn ClassifierFactory>) -> Self {
        self.register(name, factory);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn ClassifierFactory)> {
        self.entries
            .iter()
            .map(|(name, factory)| (name.as_str(), factory.as_ref()))
    }
}
