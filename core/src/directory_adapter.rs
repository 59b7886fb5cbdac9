//! Adapter over yearly CSV files in a local data directory.
//!
//! Layout of the data directory:
//!   reimbursements-YYYY.csv   chamber of deputies, one file per year
//!   federal-senate-YYYY.csv   federal senate, one file per year
//!   companies.csv             optional; cnpj, latitude, longitude
//!
//! Raw columns are normalised to the canonical schema while reading.
//! Refreshing files goes through a `SourceFetcher`; a failure for one
//! year is logged and whatever local copy exists is still scored.

use crate::{
    adapter::{ChunkIter, DatasetAdapter},
    config::Pipeline,
    dataset::{self, Dataset, Record, TYPED_COLUMNS},
    error::{RosieError, RosieResult},
    types::Year,
};
use anyhow::Context;
use std::collections::HashMap;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub const COMPANIES_FILE: &str = "companies.csv";

const CHAMBER_RENAMES: [(&str, &str); 4] = [
    ("subquota_description", dataset::CATEGORY),
    ("total_net_value", dataset::NET_VALUE),
    ("cnpj_cpf", dataset::RECIPIENT_ID),
    ("supplier", "recipient"),
];

const SENATE_RENAMES: [(&str, &str); 5] = [
    ("expense_type", dataset::CATEGORY),
    ("reimbursement_value", dataset::NET_VALUE),
    ("cnpj_cpf", dataset::RECIPIENT_ID),
    ("supplier", "recipient"),
    ("date", dataset::ISSUE_DATE),
];

// Codes 3..5 are undocumented and treated as input errors (null).
const DOCUMENT_TYPES: [&str; 3] = ["bill_of_sale", "simple_receipt", "expense_made_abroad"];

// ── Fetchers ─────────────────────────────────────────────────────────────────

/// Brings one raw file into the data directory.
pub trait SourceFetcher {
    fn fetch(&self, file_name: &str, dir: &Path) -> anyhow::Result<()>;
}

/// No remote source: every refresh fails and local files are used as-is.
pub struct OfflineFetcher;

impl SourceFetcher for OfflineFetcher {
    fn fetch(&self, file_name: &str, _dir: &Path) -> anyhow::Result<()> {
        anyhow::bail!("no remote source configured for {file_name}")
    }
}

/// Copies files from a mirror directory.
pub struct MirrorFetcher {
    source: PathBuf,
}

impl MirrorFetcher {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl SourceFetcher for MirrorFetcher {
    fn fetch(&self, file_name: &str, dir: &Path) -> anyhow::Result<()> {
        let from = self.source.join(file_name);
        std::fs::copy(&from, dir.join(file_name))
            .with_context(|| format!("cannot copy {}", from.display()))?;
        Ok(())
    }
}

// ── Adapter ──────────────────────────────────────────────────────────────────

pub struct DirectoryAdapter {
    pipeline: Pipeline,
    path: PathBuf,
    years: Range<Year>,
    skip_loaded_files: bool,
    fetcher: Box<dyn SourceFetcher>,
    locations: HashMap<String, (f64, f64)>,
}

impl DirectoryAdapter {
    /// Years span `starting_year` up to, not including, the current year.
    pub fn new(pipeline: Pipeline, path: impl Into<PathBuf>, starting_year: Year) -> Self {
        use chrono::Datelike;
        let current_year = chrono::Local::now().year();
        Self {
            pipeline,
            path: path.into(),
            years: starting_year..current_year,
            skip_loaded_files: false,
            fetcher: Box::new(OfflineFetcher),
            locations: HashMap::new(),
        }
    }

    pub fn with_years(mut self, years: Range<Year>) -> Self {
        self.years = years;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Do not refresh files already present in the data directory.
    pub fn skip_loaded_files(mut self, skip: bool) -> Self {
        self.skip_loaded_files = skip;
        self
    }

    pub fn file_name(&self, year: Year) -> String {
        match self.pipeline {
            Pipeline::ChamberOfDeputies => format!("reimbursements-{year}.csv"),
            Pipeline::FederalSenate => format!("federal-senate-{year}.csv"),
        }
    }

    fn refresh(&self, file_name: &str) -> anyhow::Result<bool> {
        if self.skip_loaded_files && self.path.join(file_name).is_file() {
            log::info!("Update of {file_name} skipped");
            return Ok(false);
        }
        log::info!("Updating {file_name}");
        self.fetcher.fetch(file_name, &self.path)?;
        Ok(true)
    }

    fn load_locations(&mut self) -> RosieResult<()> {
        let path = self.path.join(COMPANIES_FILE);
        if !path.is_file() {
            log::warn!("{} not found, expenses will have no coordinates", path.display());
            self.locations.clear();
            return Ok(());
        }

        let mut reader = csv::Reader::from_reader(File::open(&path)?);
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| RosieError::MissingColumn {
                    column: format!("{COMPANIES_FILE}:{name}"),
                })
        };
        let (cnpj, latitude, longitude) = (
            position("cnpj")?,
            position(dataset::LATITUDE)?,
            position(dataset::LONGITUDE)?,
        );

        let mut locations = HashMap::new();
        for row in reader.records() {
            let row = row?;
            let parsed = (
                row.get(latitude).and_then(|v| v.trim().parse::<f64>().ok()),
                row.get(longitude).and_then(|v| v.trim().parse::<f64>().ok()),
            );
            if let (Some(key), (Some(lat), Some(lon))) = (row.get(cnpj).map(digits), parsed) {
                locations.insert(key, (lat, lon));
            }
        }
        log::debug!("Loaded {} company locations", locations.len());
        self.locations = locations;
        Ok(())
    }

    fn read_year(&self, path: &Path) -> RosieResult<Dataset> {
        log::debug!("Loading reimbursements from {}", path.display());
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| self.rename(h).to_string())
            .collect();
        let mut chunk = Dataset::with_extra_columns(
            headers
                .iter()
                .filter(|h| !TYPED_COLUMNS.contains(&h.as_str()))
                .cloned(),
        );

        for row in reader.records() {
            let row = row?;
            let mut record = Record::default();
            for (column, raw) in headers.iter().zip(row.iter()) {
                self.normalize(&mut record, column, raw);
            }
            self.finish(&mut record);
            chunk.push(record);
        }
        Ok(chunk)
    }

    fn rename<'a>(&self, column: &'a str) -> &'a str {
        let renames: &[(&str, &str)] = match self.pipeline {
            Pipeline::ChamberOfDeputies => &CHAMBER_RENAMES,
            Pipeline::FederalSenate => &SENATE_RENAMES,
        };
        renames
            .iter()
            .find(|(from, _)| *from == column)
            .map(|(_, to)| *to)
            .unwrap_or(column)
    }

    fn normalize(&self, record: &mut Record, column: &str, raw: &str) {
        let raw = raw.trim();
        match (self.pipeline, column) {
            (Pipeline::ChamberOfDeputies, "congressperson_id") => {
                record.is_party_expense = raw.is_empty();
                record.set(column, raw);
            }
            (Pipeline::ChamberOfDeputies, dataset::CATEGORY) if raw == "Congressperson meal" => {
                record.set(column, "Meal");
            }
            (Pipeline::ChamberOfDeputies, dataset::DOCUMENT_TYPE) => {
                let code = raw.parse::<usize>().ok();
                record.document_type = match code {
                    Some(code) => DOCUMENT_TYPES.get(code).map(|t| t.to_string()),
                    None if raw.is_empty() => None,
                    None => Some(raw.to_string()),
                };
            }
            (Pipeline::FederalSenate, "congressperson_name") => {
                record.set(dataset::APPLICANT_ID, raw);
                record.set(column, raw);
            }
            _ => record.set(column, raw),
        }
    }

    fn finish(&self, record: &mut Record) {
        if self.pipeline == Pipeline::FederalSenate && record.document_type.is_none() {
            record.document_type = Some("simple_receipt".to_string());
        }
        if record.latitude.is_none() && record.longitude.is_none() {
            let location = record
                .recipient_id
                .as_deref()
                .and_then(|id| self.locations.get(&digits(id)));
            if let Some((latitude, longitude)) = location {
                record.latitude = Some(*latitude);
                record.longitude = Some(*longitude);
            }
        }
    }
}

impl DatasetAdapter for DirectoryAdapter {
    fn load_datasets(&mut self) -> RosieResult<()> {
        std::fs::create_dir_all(&self.path)?;

        if let Err(e) = self.refresh(COMPANIES_FILE) {
            log::warn!("Could not update {COMPANIES_FILE}: {e:#}");
        }
        for year in self.years.clone() {
            let file_name = self.file_name(year);
            if let Err(e) = self.refresh(&file_name) {
                let error = RosieError::DataRefresh {
                    year,
                    reason: format!("{e:#}"),
                };
                log::error!("{error}");
            }
        }

        self.load_locations()
    }

    fn chunks(&self) -> ChunkIter<'_> {
        Box::new(self.years.clone().filter_map(move |year| {
            let path = self.path.join(self.file_name(year));
            if !path.is_file() {
                log::warn!("No data for {year}: {} not found", path.display());
                return None;
            }
            Some(self.read_year(&path).map(|chunk| (year, chunk)))
        }))
    }

    fn dataset(&self) -> RosieResult<Dataset> {
        let mut full = Dataset::default();
        for item in self.chunks() {
            let (_, chunk) = item?;
            full.append(chunk);
        }
        log::info!("Full dataset ready!");
        Ok(full)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
