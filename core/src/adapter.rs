//! What the engine needs from a data source.
//!
//! An adapter owns fetching, caching and normalising its raw files. The
//! engine only asks it to materialise its data once, walks the yearly
//! chunks for scoring, and reads the full history for fitting.

use crate::{dataset::Dataset, error::RosieResult, types::Year};
use std::path::{Path, PathBuf};

pub type ChunkIter<'a> = Box<dyn Iterator<Item = RosieResult<(Year, Dataset)>> + 'a>;

pub trait DatasetAdapter {
    /// Make sure the backing files exist locally. Idempotent.
    fn load_datasets(&mut self) -> RosieResult<()>;

    /// `(year, chunk)` pairs in ascending year order, one per year.
    fn chunks(&self) -> ChunkIter<'_>;

    /// Every row across all years. Used only for fitting.
    fn dataset(&self) -> RosieResult<Dataset>;

    /// Directory for model artifacts and the report.
    fn path(&self) -> &Path;
}

/// Adapter over chunks already held in memory.
pub struct InMemoryAdapter {
    path: PathBuf,
    chunks: Vec<(Year, Dataset)>,
}

impl InMemoryAdapter {
    pub fn new(path: impl Into<PathBuf>, mut chunks: Vec<(Year, Dataset)>) -> Self {
        chunks.sort_by_key(|(year, _)| *year);
        Self {
            path: path.into(),
            chunks,
        }
    }
}

impl DatasetAdapter for InMemoryAdapter {
    fn load_datasets(&mut self) -> RosieResult<()> {
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    fn chunks(&self) -> ChunkIter<'_> {
        Box::new(self.chunks.iter().map(|(year, chunk)| Ok((*year, chunk.clone()))))
    }

    fn dataset(&self) -> RosieResult<Dataset> {
        let mut full = Dataset::default();
        for (_, chunk) in &self.chunks {
            full.append(chunk.clone());
        }
        Ok(full)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
