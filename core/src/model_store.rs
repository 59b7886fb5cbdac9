//! On-disk cache of fitted classifiers.
//!
//! RULE: One artifact per classifier kind, never per chunk or per year.
//! An artifact found on disk is reused unconditionally. Delete the file
//! to force a re-fit.

use crate::{
    classifier::{Classifier, ClassifierFactory},
    dataset::Dataset,
    error::{RosieError, RosieResult},
};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ARTIFACT_EXTENSION: &str = "model.json";

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<lower-cased kind>.model.json`
    pub fn artifact_path(&self, kind: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{ARTIFACT_EXTENSION}", kind.to_lowercase()))
    }

    /// Return the persisted classifier for the factory's kind, or fit a
    /// new one on the full dataset and persist it.
    ///
    /// `full_dataset` is only called when a fit is needed. Kinds that are
    /// not persistable are always fitted in memory and never written.
    pub fn load_or_train<'d, F>(
        &self,
        factory: &dyn ClassifierFactory,
        full_dataset: F,
    ) -> RosieResult<Box<dyn Classifier>>
    where
        F: FnOnce() -> RosieResult<&'d Dataset>,
    {
        if !factory.persistable() {
            log::info!("{} is not persistable, fitting in memory", factory.kind());
            return Self::train(factory, full_dataset()?);
        }

        let path = self.artifact_path(factory.kind());
        if path.is_file() {
            log::info!("Loading trained {} from {}", factory.kind(), path.display());
            return self.load(factory, &path);
        }

        let model = Self::train(factory, full_dataset()?)?;
        self.save(model.as_ref(), &path)?;
        log::info!("Saved trained {} to {}", factory.kind(), path.display());
        Ok(model)
    }

    fn train(factory: &dyn ClassifierFactory, dataset: &Dataset) -> RosieResult<Box<dyn Classifier>> {
        log::info!("Fitting {} on {} rows", factory.kind(), dataset.len());
        let mut model = factory.build()?;
        model.fit(dataset)?;
        Ok(model)
    }

    fn load(&self, factory: &dyn ClassifierFactory, path: &Path) -> RosieResult<Box<dyn Classifier>> {
        let artifact = std::fs::read_to_string(path).map_err(|e| RosieError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        factory
            .restore(&artifact)
            .map_err(|e| RosieError::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Artifacts appear whole or not at all: written to a temporary
    /// file in the same directory, then renamed.
    fn save(&self, model: &dyn Classifier, path: &Path) -> RosieResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let artifact = model.to_artifact()?;
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)?;
        file.write_all(artifact.as_bytes())?;
        file.persist(path).map_err(|e| RosieError::Io(e.error))?;
        Ok(())
    }
}
