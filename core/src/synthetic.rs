//! Deterministic synthetic reimbursement data.
//!
//! RULE: Nothing here may call a platform RNG. Every draw flows through
//! one `SyntheticRng` seeded from the generator's seed, so the same seed
//! always produces the same rows.
//!
//! Applicants file meals near their home capital. A small share of days
//! are "teleport" days with meals filed in two distant capitals, and a
//! small share of receipts carry a malformed recipient CNPJ.

use crate::{
    dataset::{Dataset, Record},
    error::RosieResult,
    invalid_cnpj_cpf,
    types::Year,
};
use chrono::NaiveDate;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::ops::Range;
use std::path::Path;

const CAPITALS: [(&str, f64, f64); 8] = [
    ("Brasilia", -15.7939, -47.8828),
    ("Sao Paulo", -23.5505, -46.6333),
    ("Rio de Janeiro", -22.9068, -43.1729),
    ("Salvador", -12.9777, -38.5016),
    ("Manaus", -3.1190, -60.0217),
    ("Porto Alegre", -30.0346, -51.2177),
    ("Recife", -8.0476, -34.8770),
    ("Belo Horizonte", -19.9167, -43.9345),
];
const SUPPLIERS_PER_CAPITAL: usize = 4;
const SUPPLIER_JITTER_DEGREES: f64 = 0.05;
const INVALID_RECIPIENT: &str = "00.000.000/0000-00";

/// A seeded RNG with the handful of draws the generator needs.
pub struct SyntheticRng {
    inner: Pcg64Mcg,
}

impl SyntheticRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a usize in [0, n).
    pub fn below(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform float in [-spread, spread).
    pub fn jitter(&mut self, spread: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * spread
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub years: Range<Year>,
    pub applicants: usize,
    /// Days with expenses per applicant per year.
    pub active_days: usize,
    pub teleport_rate: f64,
    pub party_expense_rate: f64,
    pub invalid_recipient_rate: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            years: 2016..2019,
            applicants: 20,
            active_days: 30,
            teleport_rate: 0.02,
            party_expense_rate: 0.05,
            invalid_recipient_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub cnpj: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub chunks: Vec<(Year, Dataset)>,
    pub companies: Vec<Company>,
}

pub fn generate(config: &SyntheticConfig) -> SyntheticData {
    let mut rng = SyntheticRng::new(config.seed);
    let companies = generate_companies(&mut rng);
    let mut next_document_id = 1u64;

    let chunks = config
        .years
        .clone()
        .map(|year| {
            let mut rows = Vec::new();
            for applicant in 0..config.applicants {
                let home = applicant % CAPITALS.len();
                for _ in 0..config.active_days {
                    let day = 1 + rng.below(365) as u32;
                    let Some(date) = NaiveDate::from_yo_opt(year, day) else {
                        continue;
                    };
                    let teleport = rng.chance(config.teleport_rate);
                    let meals = 1 + rng.below(3);
                    for meal in 0..meals {
                        let capital = if teleport && meal % 2 == 1 {
                            (home + 1 + rng.below(CAPITALS.len() - 1)) % CAPITALS.len()
                        } else {
                            home
                        };
                        let company = &companies[capital * SUPPLIERS_PER_CAPITAL
                            + rng.below(SUPPLIERS_PER_CAPITAL)];
                        rows.push(meal_record(
                            &mut rng,
                            config,
                            next_document_id,
                            applicant,
                            year,
                            date,
                            company,
                        ));
                        next_document_id += 1;
                    }
                }
            }
            (year, Dataset::from_records(rows))
        })
        .collect();

    SyntheticData { chunks, companies }
}

fn generate_companies(rng: &mut SyntheticRng) -> Vec<Company> {
    let mut companies = Vec::with_capacity(CAPITALS.len() * SUPPLIERS_PER_CAPITAL);
    for (city, latitude, longitude) in CAPITALS {
        for index in 0..SUPPLIERS_PER_CAPITAL {
            let mut base = [0u32; 12];
            for digit in base.iter_mut().take(8) {
                *digit = rng.below(10) as u32;
            }
            base[11] = 1;
            companies.push(Company {
                cnpj: invalid_cnpj_cpf::complete_cnpj(base),
                name: format!("Restaurant {index} of {city}"),
                latitude: latitude + rng.jitter(SUPPLIER_JITTER_DEGREES),
                longitude: longitude + rng.jitter(SUPPLIER_JITTER_DEGREES),
            });
        }
    }
    companies
}

fn meal_record(
    rng: &mut SyntheticRng,
    config: &SyntheticConfig,
    document_id: u64,
    applicant: usize,
    year: Year,
    date: NaiveDate,
    company: &Company,
) -> Record {
    let is_party_expense = rng.chance(config.party_expense_rate);
    let recipient_id = if rng.chance(config.invalid_recipient_rate) {
        INVALID_RECIPIENT.to_string()
    } else {
        company.cnpj.clone()
    };
    let mut record = Record {
        applicant_id: format!("{}", 1000 + applicant),
        category: "Meal".to_string(),
        is_party_expense,
        issue_date: Some(date),
        latitude: Some(company.latitude),
        longitude: Some(company.longitude),
        document_type: Some("simple_receipt".to_string()),
        recipient_id: Some(recipient_id),
        net_value: Some(20.0 + (rng.next_f64() * 80.0).round()),
        ..Record::default()
    };
    record.extra.insert("document_id".to_string(), document_id.to_string());
    record.extra.insert("year".to_string(), year.to_string());
    record.extra.insert("recipient".to_string(), company.name.clone());
    let congressperson_id = if is_party_expense {
        String::new()
    } else {
        record.applicant_id.clone()
    };
    record.extra.insert("congressperson_id".to_string(), congressperson_id);
    record
}

/// Write `data` into `dir` in the raw chamber-of-deputies layout:
/// one `reimbursements-YYYY.csv` per year plus `companies.csv`.
/// Coordinates are only carried by the companies file.
pub fn write_chamber_files(data: &SyntheticData, dir: &Path) -> RosieResult<()> {
    std::fs::create_dir_all(dir)?;

    let mut companies = csv::Writer::from_path(dir.join("companies.csv"))?;
    companies.write_record(["cnpj", "name", "latitude", "longitude"])?;
    for company in &data.companies {
        companies.write_record([
            company.cnpj.clone(),
            company.name.clone(),
            company.latitude.to_string(),
            company.longitude.to_string(),
        ])?;
    }
    companies.flush()?;

    for (year, chunk) in &data.chunks {
        let mut writer = csv::Writer::from_path(dir.join(format!("reimbursements-{year}.csv")))?;
        writer.write_record([
            "document_id",
            "applicant_id",
            "congressperson_id",
            "year",
            "subquota_description",
            "document_type",
            "cnpj_cpf",
            "supplier",
            "issue_date",
            "total_net_value",
        ])?;
        for record in chunk {
            let field = |column: &str| record.value(column).unwrap_or_default();
            let category = if record.category == "Meal" {
                "Congressperson meal".to_string()
            } else {
                record.category.clone()
            };
            let document_type = match record.document_type.as_deref() {
                Some("bill_of_sale") => "0",
                Some("simple_receipt") => "1",
                Some("expense_made_abroad") => "2",
                _ => "",
            };
            writer.write_record([
                field("document_id"),
                field("applicant_id"),
                field("congressperson_id"),
                field("year"),
                category,
                document_type.to_string(),
                field("recipient_id"),
                field("recipient"),
                field("issue_date"),
                field("net_value"),
            ])?;
        }
        writer.flush()?;
    }
    Ok(())
}
