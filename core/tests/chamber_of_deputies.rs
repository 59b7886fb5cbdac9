//! Chamber of deputies: traveled-speeds and CNPJ/CPF classifiers, and
//! the directory adapter over raw yearly files.

use chrono::NaiveDate;
use rosie_core::{
    adapter::DatasetAdapter,
    classifier::{Classifier, ClassifierFactory},
    dataset::{Dataset, Record},
    directory_adapter::{DirectoryAdapter, MirrorFetcher},
    invalid_cnpj_cpf::{self, InvalidCnpjCpfClassifier},
    synthetic::{self, SyntheticConfig},
    traveled_speeds::{
        self, threshold_for_contamination, Group, ScoredGroup, TravelSpeedParams,
        TraveledSpeedsClassifier,
    },
    types::{INLIER, OUTLIER},
    Pipeline, RosieError,
};

const BRASILIA: (f64, f64) = (-15.7939, -47.8828);

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 3, d).expect("valid date")
}

fn meal(applicant: &str, date: NaiveDate, (latitude, longitude): (f64, f64)) -> Record {
    Record {
        applicant_id: applicant.to_string(),
        category: "Meal".to_string(),
        issue_date: Some(date),
        latitude: Some(latitude),
        longitude: Some(longitude),
        ..Record::default()
    }
}

fn fitted(dataset: &Dataset) -> TraveledSpeedsClassifier {
    let mut classifier = TraveledSpeedsClassifier::with_contamination(0.1).expect("valid params");
    classifier.fit(dataset).expect("fit");
    classifier
}

/// Applicant A: two meals ~5.5 km apart. Applicant B: ten meals at one spot.
fn two_applicants() -> Dataset {
    let mut rows = vec![
        meal("A", day(1), BRASILIA),
        meal("A", day(1), (BRASILIA.0 + 0.05, BRASILIA.1)),
    ];
    rows.extend((0..10).map(|_| meal("B", day(1), BRASILIA)));
    Dataset::from_records(rows)
}

// ── Construction ─────────────────────────────────────────────────────────────

#[test]
fn contamination_inside_unit_interval_is_accepted() {
    for c in [0.001, 0.1, 0.5, 0.999] {
        assert!(TraveledSpeedsClassifier::with_contamination(c).is_ok(), "{c}");
    }
}

#[test]
fn contamination_at_or_beyond_bounds_is_rejected() {
    for c in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
        let result = TraveledSpeedsClassifier::with_contamination(c);
        assert!(
            matches!(result, Err(RosieError::InvalidParameter { name: "contamination", .. })),
            "contamination {c} should be rejected"
        );
    }
}

#[test]
fn predict_before_fit_fails() {
    let classifier = TraveledSpeedsClassifier::new(TravelSpeedParams::default()).unwrap();
    let result = classifier.predict(&two_applicants());
    assert!(matches!(result, Err(RosieError::NotFitted { .. })));
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[test]
fn non_applicable_rows_do_not_form_groups() {
    let mut party = meal("A", day(1), BRASILIA);
    party.is_party_expense = true;
    let mut taxi = meal("A", day(1), BRASILIA);
    taxi.category = "Taxi".to_string();
    let paris = meal("A", day(1), (48.8566, 2.3522));
    let mut no_coordinates = meal("A", day(1), BRASILIA);
    no_coordinates.latitude = None;
    let mut no_date = meal("A", day(1), BRASILIA);
    no_date.issue_date = None;

    let dataset = Dataset::from_records(vec![party, taxi, paris, no_coordinates, no_date]);
    assert!(traveled_speeds::aggregate(&dataset, 50).is_empty());
}

#[test]
fn groups_count_expenses_and_sum_pairwise_distances() {
    let groups = traveled_speeds::aggregate(&two_applicants(), 50);

    assert_eq!(groups.len(), 2);
    let a = &groups[0];
    assert_eq!((a.applicant_id.as_str(), a.expenses), ("A", 2));
    assert!((a.distance_traveled - 5.53).abs() < 0.05, "got {}", a.distance_traveled);
    let b = &groups[1];
    assert_eq!((b.applicant_id.as_str(), b.expenses), ("B", 10));
    assert_eq!(b.distance_traveled, 0.0);
}

// ── Prediction ───────────────────────────────────────────────────────────────

#[test]
fn dataset_without_applicable_rows_fits_and_flags_nothing() {
    let mut taxi = meal("A", day(1), BRASILIA);
    taxi.category = "Taxi".to_string();
    let dataset = Dataset::from_records(vec![taxi.clone(), taxi]);

    let classifier = fitted(&dataset);
    let predictions = classifier.predict(&dataset).unwrap();
    assert_eq!(predictions, vec![INLIER, INLIER]);
}

#[test]
fn single_expense_group_is_never_flagged() {
    let dataset = Dataset::from_records(vec![
        meal("A", day(1), BRASILIA),
        meal("B", day(2), (-3.1190, -60.0217)),
        meal("C", day(3), (-30.0346, -51.2177)),
    ]);
    let classifier = fitted(&dataset);

    let groups = classifier.score(&dataset).unwrap();
    assert!(groups.iter().all(|g| g.group.distance_traveled == 0.0));
    assert!(classifier.predict(&dataset).unwrap().iter().all(|p| *p == INLIER));
}

#[test]
fn more_than_eight_meals_a_day_is_flagged_even_without_travel() {
    let dataset = Dataset::from_records((0..9).map(|_| meal("B", day(1), BRASILIA)).collect());
    let classifier = fitted(&dataset);
    assert!(classifier.predict(&dataset).unwrap().iter().all(|p| *p == OUTLIER));
}

#[test]
fn eight_meals_a_day_is_not_flagged_by_count() {
    let dataset = Dataset::from_records((0..8).map(|_| meal("B", day(1), BRASILIA)).collect());
    let classifier = fitted(&dataset);
    assert!(classifier.predict(&dataset).unwrap().iter().all(|p| *p == INLIER));
}

#[test]
fn expense_count_rule_flags_b_but_not_a() {
    let dataset = two_applicants();
    let classifier = fitted(&dataset);
    let predictions = classifier.predict(&dataset).unwrap();

    assert_eq!(&predictions[..2], &[INLIER, INLIER], "A should not be flagged");
    assert!(predictions[2..].iter().all(|p| *p == OUTLIER), "B should be flagged");
}

#[test]
fn flag_is_broadcast_only_to_applicable_rows_of_the_group() {
    let mut dataset = two_applicants();
    let mut taxi = meal("B", day(1), BRASILIA);
    taxi.category = "Taxi".to_string();
    let mut party = meal("B", day(1), BRASILIA);
    party.is_party_expense = true;
    dataset.push(taxi);
    dataset.push(party);
    dataset.push(meal("B", day(2), BRASILIA));

    let classifier = fitted(&dataset);
    let predictions = classifier.predict(&dataset).unwrap();

    assert_eq!(predictions.len(), dataset.len());
    assert_eq!(&predictions[12..], &[INLIER, INLIER, INLIER]);
}

#[test]
fn distant_same_day_meals_are_flagged_by_distance() {
    // Two hundred ordinary days with two meals ~1 km apart, one day with
    // six meals spread over ~2000 km of road, and one day with two meals
    // at opposite ends of the country.
    let mut rows = Vec::new();
    for applicant in 0..10 {
        for d in 1..=20u32 {
            let date = NaiveDate::from_ymd_opt(2017, 4, d).unwrap();
            let id = format!("A{applicant}");
            rows.push(meal(&id, date, BRASILIA));
            rows.push(meal(&id, date, (BRASILIA.0 + 0.01, BRASILIA.1)));
        }
    }
    for i in 0..6 {
        rows.push(meal("C", day(2), (BRASILIA.0 + 0.5 * i as f64, BRASILIA.1)));
    }
    rows.push(meal("T", day(1), (-3.1190, -60.0217)));
    rows.push(meal("T", day(1), (-30.0346, -51.2177)));
    let dataset = Dataset::from_records(rows);

    let mut classifier = TraveledSpeedsClassifier::with_contamination(0.01).unwrap();
    classifier.fit(&dataset).unwrap();
    let predictions = classifier.predict(&dataset).unwrap();

    let flagged: Vec<&str> = dataset
        .rows()
        .iter()
        .zip(&predictions)
        .filter(|(_, p)| **p == OUTLIER)
        .map(|(r, _)| r.applicant_id.as_str())
        .collect();
    assert_eq!(flagged, vec!["T", "T"]);
}

#[test]
fn restored_artifact_predicts_identically_twice() {
    let dataset = two_applicants();
    let classifier = fitted(&dataset);
    let artifact = classifier.to_artifact().unwrap();

    let factory = traveled_speeds::factory(TravelSpeedParams::default());
    let restored = factory.restore(&artifact).unwrap();

    let first = restored.predict(&dataset).unwrap();
    let second = restored.predict(&dataset).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, classifier.predict(&dataset).unwrap());
}

// ── Threshold search ─────────────────────────────────────────────────────────

fn scored(diff_distance: f64, expected_distance: f64, expenses: usize) -> ScoredGroup {
    ScoredGroup {
        group: Group {
            applicant_id: "X".to_string(),
            issue_date: day(1),
            expenses,
            distance_traveled: 0.0,
        },
        expected_distance,
        diff_distance,
        expense_outlier: expenses > traveled_speeds::EXPENSE_COUNT_CUTOFF,
    }
}

#[test]
fn threshold_search_matches_brute_force() {
    // Nine ordinary groups and one that exceeds every candidate threshold.
    let mut groups: Vec<ScoredGroup> = (0..9).map(|i| scored(100.0 * i as f64, 1000.0, 2)).collect();
    groups.push(scored(10_000.0, 1000.0, 2));
    let target = 0.3;

    let selected = threshold_for_contamination(&groups, target, traveled_speeds::THRESHOLD_STEP);

    let mut best: Option<(f64, u64)> = None;
    for t in (1..1000u64).step_by(50) {
        let above = groups.iter().filter(|g| g.diff_distance > t as f64).count();
        let gap = (above as f64 / groups.len() as f64 - target).abs();
        if best.map_or(true, |(g, _)| gap < g) {
            best = Some((gap, t));
        }
    }
    assert_eq!(selected, best.map(|(_, t)| t));
    assert_eq!(selected, Some(601));
}

#[test]
fn threshold_search_ties_keep_the_smallest_candidate() {
    let mut groups: Vec<ScoredGroup> = (0..9).map(|_| scored(0.0, 500.0, 2)).collect();
    groups.push(scored(10_000.0, 500.0, 2));

    assert_eq!(threshold_for_contamination(&groups, 0.1, 50), Some(1));
}

#[test]
fn expense_outliers_are_left_out_of_the_denominator() {
    // Two of four groups are already flagged by count; one of the other
    // two exceeds the threshold, so contamination is 1/2, not 1/4.
    let groups = vec![
        scored(0.0, 200.0, 2),
        scored(1_000.0, 200.0, 2),
        scored(0.0, 200.0, 9),
        scored(0.0, 200.0, 12),
    ];
    assert_eq!(threshold_for_contamination(&groups, 0.5, 50), Some(1));
}

#[test]
fn no_candidates_means_no_threshold() {
    assert_eq!(threshold_for_contamination(&[], 0.1, 50), None);
    assert_eq!(threshold_for_contamination(&[scored(3.0, 1.5, 2)], 0.1, 50), None);
}

// ── CNPJ/CPF ─────────────────────────────────────────────────────────────────

#[test]
fn invalid_recipient_on_receipt_is_flagged() {
    let receipt = |recipient: &str| Record {
        document_type: Some("simple_receipt".to_string()),
        recipient_id: Some(recipient.to_string()),
        ..Record::default()
    };
    let dataset = Dataset::from_records(vec![
        receipt("11.222.333/0001-81"),
        receipt("11.222.333/0001-80"),
        receipt("529.982.247-25"),
    ]);

    let mut classifier = InvalidCnpjCpfClassifier::new();
    assert!(matches!(classifier.predict(&dataset), Err(RosieError::NotFitted { .. })));
    classifier.fit(&dataset).unwrap();
    assert_eq!(classifier.predict(&dataset).unwrap(), vec![INLIER, OUTLIER, INLIER]);
}

#[test]
fn invalid_cnpj_cpf_factory_restores_fitted_state() {
    let factory = invalid_cnpj_cpf::factory();
    let mut classifier = factory.build().unwrap();
    classifier.fit(&Dataset::default()).unwrap();

    let restored = factory.restore(&classifier.to_artifact().unwrap()).unwrap();
    assert!(restored.predict(&Dataset::default()).unwrap().is_empty());
}

// ── Directory adapter ────────────────────────────────────────────────────────

fn small_synthetic() -> synthetic::SyntheticData {
    synthetic::generate(&SyntheticConfig {
        seed: 7,
        years: 2016..2018,
        applicants: 6,
        active_days: 10,
        ..SyntheticConfig::default()
    })
}

#[test]
fn directory_adapter_reads_and_normalises_raw_files() {
    let dir = tempfile::tempdir().unwrap();
    let data = small_synthetic();
    synthetic::write_chamber_files(&data, dir.path()).unwrap();

    let mut adapter =
        DirectoryAdapter::new(Pipeline::ChamberOfDeputies, dir.path(), 2016).with_years(2016..2018);
    adapter.load_datasets().unwrap();

    let chunks: Vec<_> = adapter.chunks().collect::<Result<_, _>>().unwrap();
    assert_eq!(chunks.len(), 2);
    for ((year, chunk), (expected_year, expected)) in chunks.iter().zip(&data.chunks) {
        assert_eq!(year, expected_year);
        assert_eq!(chunk.len(), expected.len());
        for (read, original) in chunk.rows().iter().zip(expected.rows()) {
            assert_eq!(read.category, "Meal");
            assert_eq!(read.document_type.as_deref(), Some("simple_receipt"));
            assert_eq!(read.is_party_expense, original.is_party_expense);
            assert_eq!(read.issue_date, original.issue_date);
            assert_eq!(read.recipient_id, original.recipient_id);
            if original.recipient_id.as_deref().map(invalid_cnpj_cpf::is_valid_cnpj_cpf) == Some(true) {
                let (lat, lon) = (read.latitude.unwrap(), read.longitude.unwrap());
                assert!((lat - original.latitude.unwrap()).abs() < 1e-9);
                assert!((lon - original.longitude.unwrap()).abs() < 1e-9);
            }
        }
    }

    let full = adapter.dataset().unwrap();
    assert_eq!(full.len(), chunks.iter().map(|(_, c)| c.len()).sum::<usize>());
}

#[test]
fn missing_years_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    synthetic::write_chamber_files(&small_synthetic(), dir.path()).unwrap();

    let mut adapter =
        DirectoryAdapter::new(Pipeline::ChamberOfDeputies, dir.path(), 2014).with_years(2014..2018);
    adapter.load_datasets().unwrap();

    let years: Vec<i32> = adapter.chunks().map(|c| c.unwrap().0).collect();
    assert_eq!(years, vec![2016, 2017]);
}

#[test]
fn mirror_fetcher_refreshes_and_skip_keeps_local_files() {
    let mirror = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    synthetic::write_chamber_files(&small_synthetic(), mirror.path()).unwrap();

    let mut adapter = DirectoryAdapter::new(Pipeline::ChamberOfDeputies, target.path(), 2016)
        .with_years(2016..2019)
        .with_fetcher(Box::new(MirrorFetcher::new(mirror.path())));
    // 2018 is missing from the mirror: logged, not fatal.
    adapter.load_datasets().unwrap();
    assert!(target.path().join("reimbursements-2016.csv").is_file());
    assert!(target.path().join("companies.csv").is_file());

    std::fs::write(target.path().join("reimbursements-2017.csv"), "document_id\n").unwrap();
    let mut adapter = DirectoryAdapter::new(Pipeline::ChamberOfDeputies, target.path(), 2016)
        .with_years(2016..2019)
        .with_fetcher(Box::new(MirrorFetcher::new(mirror.path())))
        .skip_loaded_files(true);
    adapter.load_datasets().unwrap();

    let local = std::fs::read_to_string(target.path().join("reimbursements-2017.csv")).unwrap();
    assert_eq!(local, "document_id\n");
}

#[test]
fn document_type_codes_are_mapped_and_unknown_codes_become_null() {
    let dir = tempfile::tempdir().unwrap();
    let mut raw = String::from(
        "document_id,applicant_id,congressperson_id,subquota_description,document_type,cnpj_cpf,issue_date\n",
    );
    for (id, code) in ["0", "1", "2", "3", "4", "5", "", "foreign"].iter().enumerate() {
        raw.push_str(&format!("{id},1000,1000,Congressperson meal,{code},123,2016-05-01\n"));
    }
    std::fs::write(dir.path().join("reimbursements-2016.csv"), raw).unwrap();

    let mut adapter =
        DirectoryAdapter::new(Pipeline::ChamberOfDeputies, dir.path(), 2016).with_years(2016..2017);
    adapter.load_datasets().unwrap();
    let chunk = adapter.dataset().unwrap();

    let types: Vec<Option<&str>> = chunk.rows().iter().map(|r| r.document_type.as_deref()).collect();
    assert_eq!(
        types,
        vec![
            Some("bill_of_sale"),
            Some("simple_receipt"),
            Some("expense_made_abroad"),
            None,
            None,
            None,
            None,
            Some("foreign"),
        ]
    );

    // Only receipts and bills of sale are held to a valid recipient id.
    let mut classifier = InvalidCnpjCpfClassifier::new();
    classifier.fit(&chunk).unwrap();
    assert_eq!(
        classifier.predict(&chunk).unwrap(),
        vec![OUTLIER, OUTLIER, INLIER, INLIER, INLIER, INLIER, INLIER, INLIER]
    );
}
