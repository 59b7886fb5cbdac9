//! Traveled-speeds classifier.
//!
//! Flags a person who, on a single day, filed meal expenses at places too
//! far apart for the number of meals filed. Applicable rows are grouped
//! by `(applicant_id, issue_date)`; each group gets an expense count and
//! the sum of pairwise geodesic distances between its filing locations.
//!
//! `fit` regresses distance against expense count with a cubic, giving
//! the expected distance for a day with N meals. `predict` flags a group
//! when it has more than `expense_count_cutoff` meals, or when its
//! distance deviates from the expected one by more than a threshold
//! chosen so that the flagged share of the batch approaches the
//! configured contamination rate.

use crate::{
    classifier::{Classifier, ClassifierFactory, SerdeFactory},
    dataset::{Dataset, Record},
    error::{RosieError, RosieResult},
    geo::{self, Point},
    polynomial::Polynomial,
    types::{ApplicantId, Prediction, INLIER, OUTLIER},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ── Constants ────────────────────────────────────────────────────────────────

pub const KIND: &str = "TraveledSpeedsClassifier";

const MEAL_CATEGORY: &str = "Meal";
const POLYNOMIAL_DEGREE: usize = 3;

/// More same-day meals than this is suspicious on its own.
pub const EXPENSE_COUNT_CUTOFF: usize = 8;
/// Spacing, in km, between candidate distance thresholds.
pub const THRESHOLD_STEP: usize = 50;
pub const DEFAULT_CONTAMINATION: f64 = 0.001;
/// Groups larger than this are logged; pairwise distances grow as n².
pub const DEFAULT_GROUP_SIZE_WARNING: usize = 50;

// ── Parameters ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelSpeedParams {
    pub contamination: f64,
    pub expense_count_cutoff: usize,
    pub threshold_step: usize,
    pub group_size_warning: usize,
}

impl Default for TravelSpeedParams {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            expense_count_cutoff: EXPENSE_COUNT_CUTOFF,
            threshold_step: THRESHOLD_STEP,
            group_size_warning: DEFAULT_GROUP_SIZE_WARNING,
        }
    }
}

impl TravelSpeedParams {
    pub fn validate(&self) -> RosieResult<()> {
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(RosieError::InvalidParameter {
                name: "contamination",
                reason: format!(
                    "must be greater than 0 and less than 1, got {}",
                    self.contamination
                ),
            });
        }
        if self.threshold_step == 0 {
            return Err(RosieError::InvalidParameter {
                name: "threshold_step",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────────

/// One applicant's applicable expenses on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub applicant_id: ApplicantId,
    pub issue_date: NaiveDate,
    pub expenses: usize,
    pub distance_traveled: f64,
}

/// A group measured against the fitted curve.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGroup {
    pub group: Group,
    pub expected_distance: f64,
    pub diff_distance: f64,
    pub expense_outlier: bool,
}

/// Non-party meal with coordinates inside the national territory.
pub fn is_applicable(record: &Record) -> bool {
    match (record.latitude, record.longitude) {
        (Some(latitude), Some(longitude)) => {
            record.category == MEAL_CATEGORY
                && !record.is_party_expense
                && geo::in_national_territory(latitude, longitude)
        }
        _ => false,
    }
}

/// Group applicable rows by `(applicant_id, issue_date)`, ordered by key.
/// Rows without an issue date cannot form a key and are left out.
pub fn aggregate(dataset: &Dataset, group_size_warning: usize) -> Vec<Group> {
    let mut points: BTreeMap<(&str, NaiveDate), Vec<Point>> = BTreeMap::new();
    for record in dataset.rows().iter().filter(|r| is_applicable(r)) {
        let (Some(issue_date), Some(latitude), Some(longitude)) =
            (record.issue_date, record.latitude, record.longitude)
        else {
            continue;
        };
        points
            .entry((record.applicant_id.as_str(), issue_date))
            .or_default()
            .push(Point::new(latitude, longitude));
    }

    points
        .into_iter()
        .map(|((applicant_id, issue_date), points)| {
            if points.len() > group_size_warning {
                log::warn!(
                    "Applicant {applicant_id} has {} meal expenses on {issue_date}; \
                     summing {} pairwise distances",
                    points.len(),
                    points.len() * (points.len() - 1) / 2
                );
            }
            Group {
                applicant_id: applicant_id.to_string(),
                issue_date,
                expenses: points.len(),
                distance_traveled: geo::sum_pairwise_km(&points),
            }
        })
        .collect()
}

// ── Threshold search ─────────────────────────────────────────────────────────

/// Pick the candidate threshold in `[1, max(expected_distance))`, stepping
/// by `step`, whose contamination is closest to `target`. Ties keep the
/// smallest threshold. `None` when there are no candidates.
///
/// Contamination for threshold `t` is the number of groups with
/// `diff_distance > t` over the number of groups not already flagged by
/// the expense-count rule.
pub fn threshold_for_contamination(groups: &[ScoredGroup], target: f64, step: usize) -> Option<u64> {
    let max_expected = groups
        .iter()
        .map(|g| g.expected_distance)
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_expected.is_finite() || max_expected.trunc() <= 1.0 {
        return None;
    }
    let upper = max_expected.trunc() as u64;

    let mut diffs: Vec<f64> = groups.iter().map(|g| g.diff_distance).collect();
    diffs.sort_by(|a, b| a.total_cmp(b));
    let eligible = groups.iter().filter(|g| !g.expense_outlier).count();

    let mut best: Option<(f64, u64)> = None;
    for threshold in (1..upper).step_by(step.max(1)) {
        let above = diffs.len() - diffs.partition_point(|d| *d <= threshold as f64);
        let contamination = if eligible == 0 {
            0.0
        } else {
            above as f64 / eligible as f64
        };
        let gap = (contamination - target).abs();
        if best.map_or(true, |(best_gap, _)| gap < best_gap) {
            best = Some((gap, threshold));
        }
    }
    best.map(|(_, threshold)| threshold)
}

// ── Classifier ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraveledSpeedsClassifier {
    params: TravelSpeedParams,
    polynomial: Option<Polynomial>,
}

impl TraveledSpeedsClassifier {
    pub fn new(params: TravelSpeedParams) -> RosieResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            polynomial: None,
        })
    }

    pub fn with_contamination(contamination: f64) -> RosieResult<Self> {
        Self::new(TravelSpeedParams {
            contamination,
            ..TravelSpeedParams::default()
        })
    }

    /// Aggregate `chunk` and measure every group against the fitted curve.
    pub fn score(&self, chunk: &Dataset) -> RosieResult<Vec<ScoredGroup>> {
        let polynomial = self.fitted()?;
        Ok(aggregate(chunk, self.params.group_size_warning)
            .into_iter()
            .map(|group| {
                let expected_distance = polynomial.eval(group.expenses as f64);
                ScoredGroup {
                    diff_distance: (expected_distance - group.distance_traveled).abs(),
                    expense_outlier: group.expenses > self.params.expense_count_cutoff,
                    expected_distance,
                    group,
                }
            })
            .collect())
    }

    fn fitted(&self) -> RosieResult<&Polynomial> {
        self.polynomial.as_ref().ok_or_else(|| RosieError::NotFitted {
            kind: KIND.to_string(),
        })
    }
}

impl Classifier for TraveledSpeedsClassifier {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn fit(&mut self, dataset: &Dataset) -> RosieResult<()> {
        self.params.validate()?;
        let groups = aggregate(dataset, self.params.group_size_warning);
        let expenses: Vec<f64> = groups.iter().map(|g| g.expenses as f64).collect();
        let distances: Vec<f64> = groups.iter().map(|g| g.distance_traveled).collect();
        let polynomial = Polynomial::fit(&expenses, &distances, POLYNOMIAL_DEGREE);
        log::debug!(
            "{KIND} fitted over {} groups: coefficients {:?}",
            groups.len(),
            polynomial.coefficients
        );
        self.polynomial = Some(polynomial);
        Ok(())
    }

    fn predict(&self, chunk: &Dataset) -> RosieResult<Vec<Prediction>> {
        let scored = self.score(chunk)?;
        let threshold = threshold_for_contamination(
            &scored,
            self.params.contamination,
            self.params.threshold_step,
        );
        log::debug!(
            "{KIND}: {} groups, distance threshold {:?}",
            scored.len(),
            threshold
        );

        let outliers: HashMap<(&str, NaiveDate), bool> = scored
            .iter()
            .map(|s| {
                let speed_outlier = threshold.is_some_and(|t| s.diff_distance > t as f64);
                (
                    (s.group.applicant_id.as_str(), s.group.issue_date),
                    s.expense_outlier || speed_outlier,
                )
            })
            .collect();

        Ok(chunk
            .rows()
            .iter()
            .map(|record| {
                let flagged = is_applicable(record)
                    && record.issue_date.is_some_and(|date| {
                        outliers
                            .get(&(record.applicant_id.as_str(), date))
                            .copied()
                            .unwrap_or(false)
                    });
                if flagged {
                    OUTLIER
                } else {
                    INLIER
                }
            })
            .collect())
    }

    fn to_artifact(&self) -> RosieResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Registry factory building classifiers with `params`.
pub fn factory(params: TravelSpeedParams) -> impl ClassifierFactory {
    SerdeFactory::new(KIND, move || TraveledSpeedsClassifier::new(params.clone()))
}
