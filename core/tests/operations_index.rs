//! Operations generator tests: day index rebuild, per-metric
//! derive-or-synthesize, calendar coverage and side tables.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use dental_synth_core::{
    appointment_generator::{AppointmentRecord, AppointmentStatus, ClaimStatus, PaymentStatus},
    config::{PipelineConfig, ProcedureCategory},
    index::{build_day_index, Source},
    operations_generator::OperationsGenerator,
    rng::{RngBank, StageSlot},
    stage,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// One completed filling at LOC001 on 2024-03-05, charged 200.
fn fixture_row() -> AppointmentRecord {
    AppointmentRecord {
        visit_id: "V0000001".into(),
        patient_id: "P00001".into(),
        patient_name: "Jordan Reyes".into(),
        patient_age: 41,
        age_segment: "35-54".into(),
        patient_gender: "Female".into(),
        insurance_provider: "Delta Dental".into(),
        is_new_patient: 1,
        location_id: "LOC001".into(),
        location_name: "Downtown Dental Center".into(),
        google_rating: 4.7,
        provider_id: "PRV001".into(),
        provider_name: "Dr. Alice Morgan".into(),
        provider_specialty: "General Dentistry".into(),
        date_of_service: d(2024, 3, 5),
        appointment_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        day_of_week: "Tuesday".into(),
        appointment_status: AppointmentStatus::Completed,
        procedure_code: "D2391".into(),
        procedure_description: "Resin Composite - One Surface Posterior".into(),
        procedure_category: ProcedureCategory::Restorative,
        appointment_duration: 45,
        charged_amount: 200.0,
        insurance_covered_amount: 160.0,
        patient_responsibility: 40.0,
        discount_applied: 0.0,
        out_of_pocket: 40.0,
        amount_paid: 40.0,
        payment_status: Some(PaymentStatus::Paid),
        payment_method: Some("Credit Card".into()),
        treatment_plan_id: None,
        treatment_plan_status: None,
        treatment_plan_creation_date: None,
        treatment_plan_completion_date: None,
        treatment_plan_completion_rate: None,
        estimated_total_cost: None,
        insurance_claim_id: Some("CLM0000001".into()),
        insurance_claim_submission_date: Some(d(2024, 3, 6)),
        insurance_claim_status: Some(ClaimStatus::Paid),
        insurance_claim_status_date: Some(d(2024, 4, 1)),
    }
}

/// The fixture visit, canceled: zeroed money and no claim.
fn canceled_row() -> AppointmentRecord {
    let mut row = fixture_row();
    row.appointment_status = AppointmentStatus::Canceled;
    row.charged_amount = 0.0;
    row.insurance_covered_amount = 0.0;
    row.patient_responsibility = 0.0;
    row.out_of_pocket = 0.0;
    row.amount_paid = 0.0;
    row.payment_status = None;
    row.payment_method = None;
    row.insurance_claim_id = None;
    row.insurance_claim_submission_date = None;
    row.insurance_claim_status = None;
    row.insurance_claim_status_date = None;
    row
}

/// The fixture day derives its duration and money metrics from the
/// index; the day after has no entry and synthesizes everything.
#[test]
fn index_entry_drives_derived_metrics() {
    let config = PipelineConfig::default_test();
    let index = build_day_index(&[fixture_row()], &config);
    assert!(index.has_index_entry(&("LOC001".to_string(), d(2024, 3, 5))));
    assert!(!index.has_index_entry(&("LOC001".to_string(), d(2024, 3, 6))));

    let generator = OperationsGenerator::new(&config, &index);
    let location = config.location("LOC001").unwrap();
    let mut rng = RngBank::new(7).for_stage(StageSlot::Operations);

    let day = generator.day_metrics(location, d(2024, 3, 5), &mut rng);
    assert!(day.chair_minutes.is_derived());
    assert_eq!(day.chair_minutes.value, 45.0);
    assert!(day.revenue.is_derived());
    assert_eq!(day.revenue.value, 200.0);
    assert!(day.collections.is_derived());
    assert_eq!(day.collections.value, 200.0, "patient 40 plus paid claim 160");
    assert!(day.volume.is_derived());
    assert_eq!(day.volume.value.scheduled, 1);
    assert_eq!(day.volume.value.completed, 1);
    assert!(day.patients.is_derived());
    assert_eq!(day.patients.value.new, 1);
    assert_eq!(day.claims_submitted.source, Source::Derived);

    let next = generator.day_metrics(location, d(2024, 3, 6), &mut rng);
    assert_eq!(next.chair_minutes.source, Source::Synthetic);
    assert_eq!(next.revenue.source, Source::Synthetic);
    assert_eq!(next.collections.source, Source::Synthetic);
    assert_eq!(next.volume.source, Source::Synthetic);
    assert_eq!(next.patients.source, Source::Synthetic);
    assert_eq!(next.claims_submitted.source, Source::Synthetic);
}

/// An entry holding only a canceled visit keeps volume derived but
/// falls back for metrics whose sums are zero.
#[test]
fn zero_sums_fall_back_per_metric() {
    let config = PipelineConfig::default_test();
    let index = build_day_index(&[canceled_row()], &config);
    let generator = OperationsGenerator::new(&config, &index);
    let location = config.location("LOC001").unwrap();
    let mut rng = RngBank::new(7).for_stage(StageSlot::Operations);

    let day = generator.day_metrics(location, d(2024, 3, 5), &mut rng);
    assert!(day.volume.is_derived());
    assert_eq!(day.volume.value.canceled, 1);
    assert_eq!(day.volume.value.completed, 0);
    assert_eq!(day.chair_minutes.source, Source::Synthetic);
    assert_eq!(day.revenue.source, Source::Synthetic);
    assert_eq!(day.patients.source, Source::Synthetic);
}

/// A full run with the fixture reports the fixture's revenue on its day.
#[test]
fn generated_row_uses_fixture_values() {
    let config = PipelineConfig::default_test();
    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Operations);
    let output = stage::generate_operations(&config, &[fixture_row()], &mut rng).unwrap();

    let row = output
        .operations
        .iter()
        .find(|r| r.location_id == "LOC001" && r.date == d(2024, 3, 5))
        .expect("fixture day must have an operations row");
    assert_eq!(row.revenue, 200.0);
    assert_eq!(row.actual_appointments, 1);
    assert_eq!(row.insurance_claims_submitted, 1);
    assert_eq!(row.used_chair_hours, 0.75);
}

/// No operations row on a Sunday, a holiday, or before a location opens.
#[test]
fn rows_only_on_business_days_after_opening() {
    let mut config = PipelineConfig::default_test();
    let late_open = d(2023, 9, 1);
    config.locations[1].opened_date = late_open;

    let mut rng = RngBank::new(1).for_stage(StageSlot::Operations);
    let output = stage::generate_operations(&config, &[], &mut rng).unwrap();
    assert!(!output.operations.is_empty());

    for row in &output.operations {
        assert_ne!(row.date.weekday(), Weekday::Sun, "row on Sunday {}", row.date);
        assert!(!config.is_holiday(row.date), "row on holiday {}", row.date);
        if row.location_id == config.locations[1].location_id {
            assert!(row.date >= late_open);
        }
        assert_eq!(row.is_saturday, u8::from(row.date.weekday() == Weekday::Sat));
        assert!(row.chair_utilization >= 0.0 && row.chair_utilization <= 1.0);
        assert!(row.equipment_utilization <= 0.95);
        assert_eq!(row.returning_patient_count + row.new_patient_count, row.total_patients_seen);
        let plans = row.treatment_plans_not_started
            + row.treatment_plans_in_progress
            + row.treatment_plans_completed
            + row.treatment_plans_delayed;
        assert!(plans > 0);
    }
    let july_4 = output.operations.iter().any(|r| r.date == d(2024, 7, 4));
    assert!(!july_4);
}

/// Staff and equipment side tables line up with the daily rows.
#[test]
fn side_tables_match_daily_rows() {
    let config = PipelineConfig::default_test();
    let mut rng = RngBank::new(3).for_stage(StageSlot::Operations);
    let output = stage::generate_operations(&config, &[], &mut rng).unwrap();

    let staff_total: u32 = output.operations.iter().map(|r| r.staff_on_duty).sum();
    assert_eq!(staff_total as usize, output.staff_hours.len());

    for row in output.operations.iter().take(50) {
        let shifts: Vec<_> = output
            .staff_hours
            .iter()
            .filter(|s| s.date == row.date && s.location_id == row.location_id)
            .collect();
        let hours: f64 = shifts.iter().map(|s| s.hours_worked).sum();
        let cost: f64 = shifts.iter().map(|s| s.labor_cost).sum();
        assert!((hours - row.total_labor_hours).abs() < 1e-6);
        assert!((cost - row.labor_cost).abs() < 0.05);
        assert!((row.clinical_labor_cost + row.admin_labor_cost - row.labor_cost).abs() < 0.011);
    }

    let items_per_location: usize = config.locations[0].equipment.iter().map(|e| e.count as usize).sum();
    let loc1_days = output.operations.iter().filter(|r| r.location_id == "LOC001").count();
    let loc1_equipment = output.equipment_usage.iter().filter(|e| e.location_id == "LOC001").count();
    assert_eq!(loc1_equipment, loc1_days * items_per_location);
    assert!(output
        .equipment_usage
        .iter()
        .all(|e| e.utilization_rate <= 0.95 && e.maintenance_flag <= 1));
}

/// Equipment use follows completed visits: a day whose only visit was
/// canceled leaves every item idle.
#[test]
fn canceled_day_leaves_equipment_idle() {
    let config = PipelineConfig::default_test();
    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Operations);
    let output = stage::generate_operations(&config, &[canceled_row()], &mut rng).unwrap();

    let day = output
        .operations
        .iter()
        .find(|r| r.location_id == "LOC001" && r.date == d(2024, 3, 5))
        .unwrap();
    assert_eq!(day.actual_appointments, 0);
    assert_eq!(day.equipment_utilization, 0.0);

    let usage: Vec<_> = output
        .equipment_usage
        .iter()
        .filter(|e| e.location_id == "LOC001" && e.date == d(2024, 3, 5))
        .collect();
    assert!(!usage.is_empty());
    assert!(usage.iter().all(|e| e.usage_count == 0 && e.usage_minutes == 0.0));

    let busy: u32 = output
        .equipment_usage
        .iter()
        .filter(|e| e.location_id == "LOC001" && e.date == d(2024, 3, 6))
        .map(|e| e.usage_count)
        .sum();
    assert!(busy > 0, "a synthetic day still uses equipment");
}

/// Claim metrics follow the 2020→2025 trend: later years process faster.
#[test]
fn claim_processing_improves_over_time() {
    let mut config = PipelineConfig::default_test();
    config.generation.start_date = d(2020, 1, 1);
    config.generation.end_date = d(2025, 12, 31);
    let mut rng = RngBank::new(9).for_stage(StageSlot::Operations);
    let output = stage::generate_operations(&config, &[], &mut rng).unwrap();

    let mean_days = |year: i32| {
        let rows: Vec<_> = output.operations.iter().filter(|r| r.date.year() == year).collect();
        rows.iter().map(|r| r.avg_days_to_payment).sum::<f64>() / rows.len() as f64
    };
    let mean_completion = |year: i32| {
        let rows: Vec<_> = output.operations.iter().filter(|r| r.date.year() == year).collect();
        rows.iter().map(|r| r.treatment_plan_completion_rate).sum::<f64>() / rows.len() as f64
    };
    assert!(mean_days(2020) > mean_days(2025));
    assert!(mean_completion(2020) < mean_completion(2025));
}
