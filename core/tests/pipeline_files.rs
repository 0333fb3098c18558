//! File-mode pipeline tests: the stage handoff through CSV files, the
//! operations filename contract, and missing vs malformed inputs.

use chrono::Datelike;
use dental_synth_core::{
    appointment_generator::AppointmentRecord,
    config::PipelineConfig,
    csv_io,
    error::PipelineError,
    operations_generator::OperationsRecord,
    pipeline,
    rng::{RngBank, StageSlot},
    stage,
};

fn run_all(config: &PipelineConfig, dir: &std::path::Path) {
    pipeline::run_appointments_stage(config, dir).unwrap();
    pipeline::run_operations_stage(config, dir).unwrap();
    pipeline::run_financials_stage(config, dir).unwrap();
}

/// Each stage writes its tables under the configured names.
#[test]
fn stages_write_every_table() {
    let config = PipelineConfig::default_test();
    let dir = tempfile::tempdir().unwrap();
    run_all(&config, dir.path());

    let files = &config.files;
    for name in [
        &files.appointments,
        &files.operations_output,
        &files.staff_hours,
        &files.equipment_usage,
        &files.financials,
    ] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }

    let header = std::fs::read_to_string(dir.path().join(&files.appointments)).unwrap();
    assert!(header.starts_with("\"Visit_ID\",\"Patient_ID\""));
}

fn headers(path: &std::path::Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.headers().unwrap().iter().map(str::to_string).collect()
}

/// Every table carries the columns the downstream dashboards read, and
/// the financial table keeps the `Revenue_` prefix for service lines.
#[test]
fn headers_match_dashboard_columns() {
    let config = PipelineConfig::default_test();
    let dir = tempfile::tempdir().unwrap();
    run_all(&config, dir.path());
    let files = &config.files;

    let expected: [(&String, &[&str]); 4] = [
        (
            &files.appointments,
            &["Visit_ID", "Patient_ID", "Location_Name", "Google_Rating", "Appointment_Status",
              "Charged_Amount", "Insurance_Claim_Status_Date", "Treatment_Plan_Completion_Rate"],
        ),
        (
            &files.operations_output,
            &["Scheduled_Appointments", "Actual_Appointments", "Total_Labor_Cost", "Total_Labor_Hours",
              "Revenue_Per_Hour", "Claims_Aging_90_Plus", "Treatment_Plans_Delayed"],
        ),
        (&files.equipment_usage, &["Equipment_Type", "Usage_Count", "Usage_Time_Minutes", "Utilization_Rate"]),
        (
            &files.financials,
            &["Billed_Revenue", "Total_Revenue", "Payor_PPO", "Payor_Self_Pay", "Labor_Clinical",
              "Supplies_Dental", "Rent_Lease", "Equipment_Costs", "Software_IT", "Chair_Capacity", "DSO"],
        ),
    ];
    for (name, columns) in expected {
        let found = headers(&dir.path().join(name));
        for column in columns {
            assert!(found.iter().any(|h| h == column), "{name} lacks {column}");
        }
    }

    let service_lines = headers(&dir.path().join(&files.financials))
        .into_iter()
        .filter(|h| h.starts_with("Revenue_"))
        .filter(|h| !matches!(h.as_str(), "Revenue_MoM_Change" | "Revenue_YoY_Change" | "Revenue_Per_Square_Foot" | "Revenue_Per_Patient"))
        .count();
    assert_eq!(service_lines, 10, "one Revenue_ column per procedure category");
}

/// The operations stage rebuilds its index from the appointment file
/// exactly as it would from the in-memory rows.
#[test]
fn operations_reads_back_the_appointment_file() {
    let config = PipelineConfig::default_test();
    let dir = tempfile::tempdir().unwrap();
    let written = pipeline::run_appointments_stage(&config, dir.path()).unwrap();
    let read: Vec<AppointmentRecord> = csv_io::read_table(&dir.path().join(&config.files.appointments)).unwrap();
    assert_eq!(read, written);

    let from_file = pipeline::run_operations_stage(&config, dir.path()).unwrap();
    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Operations);
    let in_memory = stage::generate_operations(&config, &written, &mut rng).unwrap();
    assert_eq!(from_file.operations, in_memory.operations);
}

/// With the default layout the financial stage looks for
/// Operations_Data.csv, which no stage writes, so its operations index
/// stays empty.
#[test]
fn default_layout_leaves_financial_operations_index_empty() {
    let config = PipelineConfig::default_test();
    assert!(!config.files.operations_handoff_aligned());
    assert_eq!(config.files.operations_output, "Dental_Operations_Data.csv");
    assert_eq!(config.files.financial_operations_input, "Operations_Data.csv");

    let dir = tempfile::tempdir().unwrap();
    pipeline::run_appointments_stage(&config, dir.path()).unwrap();
    pipeline::run_operations_stage(&config, dir.path()).unwrap();
    let financials = pipeline::run_financials_stage(&config, dir.path()).unwrap();
    assert!(!dir.path().join("Operations_Data.csv").exists());

    let appointments: Vec<AppointmentRecord> =
        csv_io::read_table(&dir.path().join(&config.files.appointments)).unwrap();
    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Financials);
    let without_operations = stage::generate_financials(&config, &appointments, &[], &mut rng).unwrap();
    assert_eq!(financials, without_operations);
}

/// Aligning the two names hands the operations table to the financial stage.
#[test]
fn aligned_layout_feeds_operations_into_financials() {
    let mut config = PipelineConfig::default_test();
    config.files.financial_operations_input = config.files.operations_output.clone();
    assert!(config.files.operations_handoff_aligned());

    let dir = tempfile::tempdir().unwrap();
    pipeline::run_appointments_stage(&config, dir.path()).unwrap();
    pipeline::run_operations_stage(&config, dir.path()).unwrap();
    let financials = pipeline::run_financials_stage(&config, dir.path()).unwrap();

    let appointments: Vec<AppointmentRecord> =
        csv_io::read_table(&dir.path().join(&config.files.appointments)).unwrap();
    let operations: Vec<OperationsRecord> =
        csv_io::read_table(&dir.path().join(&config.files.operations_output)).unwrap();
    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Financials);
    let expected = stage::generate_financials(&config, &appointments, &operations, &mut rng).unwrap();
    assert_eq!(financials, expected);

    // Labor now comes from the daily staff simulation.
    let first = &financials[0];
    let labor: f64 = operations
        .iter()
        .filter(|o| o.location_id == first.location_id)
        .filter(|o| o.date.year() == first.year && o.date.month() == first.month)
        .map(|o| o.clinical_labor_cost)
        .sum();
    assert!((first.expense_clinical_labor - labor).abs() < 0.05);
}

/// Downstream stages run with no upstream files at all.
#[test]
fn missing_inputs_fall_back_to_synthesis() {
    let config = PipelineConfig::default_test();
    let dir = tempfile::tempdir().unwrap();

    let operations = pipeline::run_operations_stage(&config, dir.path()).unwrap();
    assert!(!operations.operations.is_empty());
    assert!(!dir.path().join(&config.files.appointments).exists());

    let financials = pipeline::run_financials_stage(&config, dir.path()).unwrap();
    assert_eq!(financials.len(), 48);
}

/// A present but unparseable upstream file aborts the stage and
/// nothing is written.
#[test]
fn malformed_input_is_fatal() {
    let config = PipelineConfig::default_test();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(&config.files.appointments),
        "\"Visit_ID\",\"Patient_ID\"\n\"V0000001\"\n\"broken\",\"row\",\"extra\"\n",
    )
    .unwrap();

    let err = pipeline::run_operations_stage(&config, dir.path()).unwrap_err();
    assert!(matches!(err, PipelineError::Csv { .. }), "unexpected error: {err}");
    assert!(!dir.path().join(&config.files.operations_output).exists());

    let err = pipeline::run_financials_stage(&config, dir.path()).unwrap_err();
    assert!(matches!(err, PipelineError::Csv { .. }));
    assert!(!dir.path().join(&config.files.financials).exists());
}

/// The in-process run hands typed outputs through the full graph.
#[test]
fn in_process_run_uses_typed_handoff() {
    let config = PipelineConfig::default_test();
    let outputs = pipeline::run_in_process(&config).unwrap();

    let appointments = outputs.appointments.as_ref().unwrap();
    let operations = outputs.operations.as_ref().unwrap();
    let financials = outputs.financials.as_ref().unwrap();
    assert_eq!(outputs.patients.as_ref().unwrap().len(), config.generation.num_patients);

    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Financials);
    let expected = stage::generate_financials(&config, appointments, &operations.operations, &mut rng).unwrap();
    assert_eq!(financials, &expected);

    let dir = tempfile::tempdir().unwrap();
    pipeline::write_outputs(&config, dir.path(), &outputs).unwrap();
    let read: Vec<OperationsRecord> = csv_io::read_table(&dir.path().join(&config.files.operations_output)).unwrap();
    assert_eq!(read.len(), operations.operations.len());
}
