//! The suspicion engine: Rosie's pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Adapter materialises its datasets.
//!   2. For each year, in ascending order:
//!        for each classifier, in registration order:
//!          load or fit the model, predict the chunk, add its column.
//!   3. Yearly tables are stacked and written as one report.
//!
//! RULES:
//!   - Models are fitted on the full historical dataset, never a chunk.
//!   - Any classifier failure aborts the run; no partial report is written.
//!   - The full dataset is materialised at most once per engine, and only
//!     if some model actually needs fitting.

use crate::{
    adapter::DatasetAdapter,
    classifier::Classifier,
    config::RunContext,
    dataset::Dataset,
    error::RosieResult,
    model_store::ModelStore,
    suspicions::SuspicionTable,
};
use std::path::PathBuf;

pub struct SuspicionEngine<A: DatasetAdapter> {
    ctx: RunContext,
    adapter: A,
    store: ModelStore,
    full_dataset: Option<Dataset>,
    models: Vec<Option<Box<dyn Classifier>>>,
}

impl<A: DatasetAdapter> SuspicionEngine<A> {
    pub fn new(ctx: RunContext, adapter: A) -> Self {
        let store = ModelStore::new(adapter.path());
        let models = ctx.settings.classifiers.iter().map(|_| None).collect();
        Self {
            ctx,
            adapter,
            store,
            full_dataset: None,
            models,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Full run: load datasets, score every year, write the report.
    /// Returns the report path.
    pub fn run(&mut self) -> RosieResult<PathBuf> {
        self.adapter.load_datasets()?;
        let suspicions = self.suspicions()?;
        let path = suspicions.write_report(self.adapter.path())?;
        log::info!(
            "Wrote {} suspicion rows to {}",
            suspicions.len(),
            path.display()
        );
        Ok(path)
    }

    /// Score every yearly chunk and stack the results, year-ascending.
    pub fn suspicions(&mut self) -> RosieResult<SuspicionTable> {
        let Self {
            ctx,
            adapter,
            store,
            full_dataset,
            models,
        } = self;
        let adapter: &A = adapter;
        let total = ctx.settings.classifiers.len();
        let mut by_year = Vec::new();

        for item in adapter.chunks() {
            let (year, chunk) = item?;
            let mut suspicions = SuspicionTable::for_chunk(&chunk, &ctx.settings.unique_ids)?;

            for (index, (name, factory)) in ctx.settings.classifiers.iter().enumerate() {
                log::info!("{year} :: Running classifier {} of {total}: {name}", index + 1);
                let model = match &mut models[index] {
                    Some(model) => model,
                    slot @ None => {
                        let full = &mut *full_dataset;
                        slot.insert(store.load_or_train(factory, move || {
                            materialize(full, adapter)
                        })?)
                    }
                };
                model.transform(&chunk)?;
                let predictions = model.predict(&chunk)?;
                suspicions.add_column(name, &predictions)?;
            }

            log::info!("{year} :: {} rows scored", suspicions.len());
            by_year.push(suspicions);
        }

        Ok(SuspicionTable::concat(by_year).unwrap_or_else(|| {
            SuspicionTable::empty(
                ctx.settings.unique_ids.clone(),
                &ctx.settings.classifiers.names(),
            )
        }))
    }
}

fn materialize<'d, A: DatasetAdapter>(
    full: &'d mut Option<Dataset>,
    adapter: &A,
) -> RosieResult<&'d Dataset> {
    let dataset = match full.take() {
        Some(dataset) => dataset,
        None => {
            log::info!("Loading full dataset for fitting");
            let dataset = adapter.dataset()?;
            log::info!("Full dataset ready: {} rows", dataset.len());
            dataset
        }
    };
    Ok(full.insert(dataset))
}
