//! Appointment generator tests: per-row financial rules, recall gating,
//! treatment plan accrual and visit structure.

use chrono::Months;
use dental_synth_core::{
    appointment_generator::{AppointmentGenerator, AppointmentRecord, AppointmentStatus, ClaimStatus},
    config::PipelineConfig,
    patient::{self, Patient},
    rng::{RngBank, StageSlot},
    visit_state::VisitState,
};
use std::collections::{BTreeMap, HashMap};

fn generate_with_patients(config: &PipelineConfig) -> (Vec<Patient>, Vec<AppointmentRecord>) {
    let bank = RngBank::new(config.generation.seed);
    let patients = patient::generate_population(config, &mut bank.for_stage(StageSlot::Population));
    let mut state = VisitState::new();
    let rows = AppointmentGenerator::new(config)
        .generate(&patients, &mut state, &mut bank.for_stage(StageSlot::Appointments))
        .unwrap();
    (patients, rows)
}

fn generate(config: &PipelineConfig) -> Vec<AppointmentRecord> {
    generate_with_patients(config).1
}

fn large(config: &mut PipelineConfig) {
    config.generation.num_patients = 600;
    config.generation.num_records = 10_000;
}

/// Completed rows: Out_of_Pocket = Responsibility − Discount, and the
/// patient either paid all of it or nothing.
#[test]
fn completed_rows_balance() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    let completed: Vec<_> = rows.iter().filter(|r| r.is_completed()).collect();
    assert!(!completed.is_empty());
    for r in completed {
        let expected = r.patient_responsibility - r.discount_applied;
        assert!(
            (r.out_of_pocket - expected).abs() < 0.011,
            "{}: out_of_pocket {} != {} - {}",
            r.visit_id,
            r.out_of_pocket,
            r.patient_responsibility,
            r.discount_applied
        );
        assert!(
            r.amount_paid == 0.0 || r.amount_paid == r.out_of_pocket,
            "{}: amount_paid {} is neither 0 nor out_of_pocket {}",
            r.visit_id,
            r.amount_paid,
            r.out_of_pocket
        );
        assert!(r.charged_amount > 0.0);
        assert!(r.payment_status.is_some());
    }
}

/// No-Show, Canceled and Rescheduled rows carry no money, plan or claim data.
#[test]
fn non_completed_rows_are_zeroed() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    let others: Vec<_> = rows.iter().filter(|r| !r.is_completed()).collect();
    assert!(!others.is_empty(), "expected some non-completed visits in 800");
    for r in others {
        assert_eq!(r.charged_amount, 0.0);
        assert_eq!(r.insurance_covered_amount, 0.0);
        assert_eq!(r.patient_responsibility, 0.0);
        assert_eq!(r.discount_applied, 0.0);
        assert_eq!(r.out_of_pocket, 0.0);
        assert_eq!(r.amount_paid, 0.0);
        assert!(r.payment_status.is_none());
        assert!(r.payment_method.is_none());
        assert!(r.treatment_plan_id.is_none());
        assert!(r.treatment_plan_completion_rate.is_none());
        assert!(r.insurance_claim_id.is_none());
        assert!(r.insurance_claim_status.is_none());
    }
}

/// Claims exist only for insured, completed rows, and status dates
/// follow the documented offsets from the date of service.
#[test]
fn claims_follow_insurance_and_status_rules() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    for r in rows.iter().filter(|r| r.insurance_claim_id.is_some()) {
        assert!(r.is_completed());
        assert_ne!(r.insurance_provider, "Self-Pay");
        let submitted = r.insurance_claim_submission_date.unwrap();
        let lag = (submitted - r.date_of_service).num_days();
        assert!((0..=3).contains(&lag), "submission lag {lag}");

        let status_lag = (r.insurance_claim_status_date.unwrap() - r.date_of_service).num_days();
        match r.insurance_claim_status.unwrap() {
            ClaimStatus::Paid => assert!((15..=45).contains(&status_lag)),
            ClaimStatus::Denied => assert!((10..=30).contains(&status_lag)),
            ClaimStatus::Pending => assert_eq!(r.insurance_claim_status_date, Some(submitted)),
        }
    }
    for r in rows.iter().filter(|r| r.insurance_provider == "Self-Pay") {
        assert_eq!(r.insurance_covered_amount, 0.0);
        assert!(r.insurance_claim_id.is_none());
    }
}

/// Two cleanings for the same patient are never closer than 5 months.
#[test]
fn cleanings_respect_recall_interval() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    let cleaning_codes: Vec<&str> = config
        .procedures
        .iter()
        .filter(|p| p.is_cleaning)
        .map(|p| p.code.as_str())
        .collect();

    let mut last: HashMap<&str, chrono::NaiveDate> = HashMap::new();
    let mut cleanings = 0;
    for r in rows.iter().filter(|r| cleaning_codes.contains(&r.procedure_code.as_str())) {
        cleanings += 1;
        if let Some(prev) = last.get(r.patient_id.as_str()) {
            let due = prev.checked_add_months(Months::new(5)).unwrap();
            assert!(
                r.date_of_service >= due,
                "{} cleaned on {} and again on {}",
                r.patient_id,
                prev,
                r.date_of_service
            );
        }
        last.insert(r.patient_id.as_str(), r.date_of_service);
    }
    assert!(cleanings > 0, "expected at least one cleaning");
}

/// Within a plan the completion rate never decreases, and it reaches
/// exactly 100 only on the row that closes the plan.
#[test]
fn plan_completion_rate_is_monotonic() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    let mut plans: BTreeMap<&str, Vec<&AppointmentRecord>> = BTreeMap::new();
    for r in rows.iter().filter(|r| r.treatment_plan_id.is_some()) {
        plans.entry(r.treatment_plan_id.as_deref().unwrap()).or_default().push(r);
    }
    assert!(!plans.is_empty(), "expected some treatment plans");

    for (plan_id, plan_rows) in plans {
        let rates: Vec<f64> = plan_rows
            .iter()
            .map(|r| r.treatment_plan_completion_rate.unwrap())
            .collect();
        assert!(rates.windows(2).all(|w| w[0] <= w[1]), "{plan_id}: {rates:?}");
        for (i, r) in plan_rows.iter().enumerate() {
            let is_last = i + 1 == plan_rows.len();
            let rate = r.treatment_plan_completion_rate.unwrap();
            if rate == 100.0 {
                assert!(is_last, "{plan_id}: 100% before the final row");
                assert_eq!(r.treatment_plan_status.as_deref(), Some("Completed"));
                assert_eq!(r.treatment_plan_completion_date, Some(r.date_of_service));
            } else {
                assert_eq!(r.treatment_plan_status.as_deref(), Some("In Progress"));
                assert!(r.treatment_plan_completion_date.is_none());
            }
        }
    }
}

/// Rows come out ordered by (date, time).
#[test]
fn rows_sorted_by_date_and_time() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);
    assert!(rows
        .windows(2)
        .all(|w| (w[0].date_of_service, w[0].appointment_time) <= (w[1].date_of_service, w[1].appointment_time)));
}

/// Each patient's first visit in the run is flagged as new, and only that one.
#[test]
fn new_patient_flag_marks_first_visit_only() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    let mut first_visit: HashMap<&str, &str> = HashMap::new();
    for r in &rows {
        first_visit.entry(r.patient_id.as_str()).or_insert(r.visit_id.as_str());
    }
    for r in &rows {
        let expected = u8::from(first_visit[r.patient_id.as_str()] == r.visit_id);
        assert_eq!(r.is_new_patient, expected, "{} {}", r.patient_id, r.visit_id);
    }
}

/// 600 patients / 10 000 visits: every row has a Visit_ID, each visit
/// has 1 to 3 rows with distinct codes and a single status.
#[test]
fn full_scale_visit_structure() {
    let mut config = PipelineConfig::default_test();
    large(&mut config);
    let rows = generate(&config);

    assert!(rows.len() >= 10_000 && rows.len() <= 30_000, "rows: {}", rows.len());

    let mut visits: HashMap<&str, Vec<&AppointmentRecord>> = HashMap::new();
    for r in &rows {
        assert!(r.visit_id.starts_with('V') && r.visit_id.len() == 8, "bad id {}", r.visit_id);
        visits.entry(r.visit_id.as_str()).or_default().push(r);
    }
    assert_eq!(visits.len(), 10_000);
    for (id, group) in &visits {
        assert!((1..=3).contains(&group.len()), "{id} has {} rows", group.len());
        let mut codes: Vec<&str> = group.iter().map(|r| r.procedure_code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), group.len(), "{id} repeats a procedure");
        let status = group[0].appointment_status;
        assert!(group.iter().all(|r| r.appointment_status == status));
        assert!(group.iter().all(|r| r.date_of_service >= config.generation.start_date
            && r.date_of_service <= config.generation.end_date));
    }

    let completed_share = visits
        .values()
        .filter(|g| g[0].appointment_status == AppointmentStatus::Completed)
        .count() as f64
        / visits.len() as f64;
    assert!((0.80..0.90).contains(&completed_share), "completed share {completed_share}");
}

/// Children draw mostly from the pediatric list and seniors from the
/// senior list; adults draw from either far less often.
#[test]
fn procedure_choice_follows_age_band() {
    let mut config = PipelineConfig::default_test();
    large(&mut config);
    let rows = generate(&config);

    let share = |codes: &[String], band: &dyn Fn(u32) -> bool| -> f64 {
        let in_band: Vec<_> = rows.iter().filter(|r| band(r.patient_age)).collect();
        assert!(in_band.len() > 200, "only {} rows in band", in_band.len());
        let hits = in_band.iter().filter(|r| codes.contains(&r.procedure_code)).count();
        hits as f64 / in_band.len() as f64
    };
    let child = |age: u32| age < 18;
    let adult = |age: u32| (18..=55).contains(&age);
    let senior = |age: u32| age > 55;

    let child_pediatric = share(&config.pediatric_codes, &child);
    let adult_pediatric = share(&config.pediatric_codes, &adult);
    assert!(child_pediatric > 0.5, "children: {child_pediatric:.3}");
    assert!(child_pediatric > adult_pediatric + 0.25, "{child_pediatric:.3} vs adults {adult_pediatric:.3}");

    let senior_share = share(&config.senior_codes, &senior);
    let adult_senior = share(&config.senior_codes, &adult);
    assert!(senior_share > 0.55, "seniors: {senior_share:.3}");
    assert!(senior_share > adult_senior + 0.2, "{senior_share:.3} vs adults {adult_senior:.3}");
}

/// Patient choice is skewed toward the start of the population:
/// P(index < N/2) = 0.5^(2/3) ≈ 0.63 and P(index < N/10) ≈ 0.215.
#[test]
fn visits_favor_low_index_patients() {
    let mut config = PipelineConfig::default_test();
    large(&mut config);
    let n = config.generation.num_patients;
    let rows = generate(&config);

    let mut visit_patient: HashMap<&str, usize> = HashMap::new();
    for r in &rows {
        let index: usize = r.patient_id[1..].parse::<usize>().unwrap() - 1;
        visit_patient.insert(r.visit_id.as_str(), index);
    }
    let visits = visit_patient.len() as f64;
    let below = |cut: usize| visit_patient.values().filter(|&&i| i < cut).count() as f64 / visits;

    let half = below(n / 2);
    let tenth = below(n / 10);
    assert!((0.59..0.67).contains(&half), "first half share {half:.3}");
    assert!((0.18..0.25).contains(&tenth), "first tenth share {tenth:.3}");
}

/// A visit is assigned a provider based at its location whenever the
/// location has one.
#[test]
fn providers_are_based_at_the_visit_location() {
    let config = PipelineConfig::default_test();
    let rows = generate(&config);

    let primary: HashMap<&str, &str> = config
        .providers
        .iter()
        .map(|p| (p.provider_id.as_str(), p.primary_location.as_str()))
        .collect();
    let mut checked = 0;
    for r in &rows {
        if config.providers.iter().any(|p| p.primary_location == r.location_id) {
            checked += 1;
            assert_eq!(primary[r.provider_id.as_str()], r.location_id, "{} at {}", r.provider_id, r.location_id);
        }
    }
    assert!(checked > 0);
}

/// No visit predates the patient's registration or the run window.
#[test]
fn visits_start_after_registration() {
    let config = PipelineConfig::default_test();
    let (patients, rows) = generate_with_patients(&config);
    let registered: HashMap<&str, chrono::NaiveDate> =
        patients.iter().map(|p| (p.patient_id.as_str(), p.registration_date)).collect();

    let mut after_window_start = 0;
    for r in &rows {
        let floor = registered[r.patient_id.as_str()].max(config.generation.start_date);
        assert!(r.date_of_service >= floor, "{} on {} before {}", r.visit_id, r.date_of_service, floor);
        if registered[r.patient_id.as_str()] > config.generation.start_date {
            after_window_start += 1;
        }
    }
    assert!(after_window_start > 0, "some patients register inside the window");
}
