//! Run configuration and pipeline settings.
//!
//! Tunables live in an optional `rosie.json` inside the data directory;
//! a missing file means defaults. Each pipeline resolves, once, to its
//! unique-id columns and its ordered classifier registry.

use crate::{
    classifier::ClassifierRegistry,
    invalid_cnpj_cpf,
    traveled_speeds::{self, TravelSpeedParams},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const CONFIG_FILE: &str = "rosie.json";
pub const STARTING_YEAR: i32 = 2009;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosieConfig {
    pub starting_year: i32,
    pub traveled_speeds: TravelSpeedParams,
}

impl Default for RosieConfig {
    fn default() -> Self {
        Self {
            starting_year: STARTING_YEAR,
            traveled_speeds: TravelSpeedParams::default(),
        }
    }
}

impl RosieConfig {
    /// Load `<data_dir>/rosie.json`, or defaults when it does not exist.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.is_file() {
            log::debug!("No {} found, using default configuration", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: RosieConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        Ok(config)
    }
}

/// The two bodies whose reimbursements are analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    ChamberOfDeputies,
    FederalSenate,
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Pipeline::ChamberOfDeputies => "chamber_of_deputies",
            Pipeline::FederalSenate => "federal_senate",
        }
    }

    pub fn settings(&self, config: &RosieConfig) -> PipelineSettings {
        match self {
            Pipeline::ChamberOfDeputies => PipelineSettings {
                unique_ids: vec!["document_id".to_string()],
                classifiers: ClassifierRegistry::new()
                    .with(
                        "suspicious_traveled_speed_day",
                        Box::new(traveled_speeds::factory(config.traveled_speeds.clone())),
                    )
                    .with("invalid_cnpj_cpf", Box::new(invalid_cnpj_cpf::factory())),
            },
            Pipeline::FederalSenate => PipelineSettings {
                unique_ids: vec!["year".to_string(), "document_id".to_string()],
                classifiers: ClassifierRegistry::new()
                    .with("invalid_cnpj_cpf", Box::new(invalid_cnpj_cpf::factory())),
            },
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pipeline {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chamber_of_deputies" => Ok(Pipeline::ChamberOfDeputies),
            "federal_senate" => Ok(Pipeline::FederalSenate),
            other => Err(anyhow::anyhow!("Unknown pipeline: {other}")),
        }
    }
}

/// What the engine runs for one pipeline.
pub struct PipelineSettings {
    /// Columns identifying a row in the report. Empty = every column.
    pub unique_ids: Vec<String>,
    pub classifiers: ClassifierRegistry,
}

/// Everything a run needs, passed explicitly into the engine. The data
/// directory itself is owned by the adapter.
pub struct RunContext {
    pub config: RosieConfig,
    pub settings: PipelineSettings,
}

impl RunContext {
    pub fn new(config: RosieConfig, settings: PipelineSettings) -> Self {
        Self { config, settings }
    }

    /// Load configuration from `data_dir` and resolve `pipeline`.
    pub fn for_pipeline(pipeline: Pipeline, data_dir: &Path) -> anyhow::Result<Self> {
        let config = RosieConfig::load(data_dir)?;
        let settings = pipeline.settings(&config);
        Ok(Self::new(config, settings))
    }
}
