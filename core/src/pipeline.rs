//! Pipeline entry points.
//!
//! Two ways to run the generators:
//!   - file mode: one stage per call, reading upstream tables from a
//!     directory and writing its own. Continuity between stages is the
//!     files alone. Names come from `FileLayout`.
//!   - in-process: the whole StageGraph in one call, typed handoff,
//!     outputs written at the end.
//!
//! A missing upstream file is logged and treated as "no data".
//! A present but malformed one aborts the stage before anything is written.

use crate::{
    appointment_generator::AppointmentRecord,
    config::PipelineConfig,
    csv_io,
    error::PipelineResult,
    financial_generator::FinancialRecord,
    operations_generator::{OperationsOutput, OperationsRecord},
    rng::{RngBank, StageSlot},
    stage::{self, StageGraph, StageOutputs},
};
use std::path::Path;

/// Generate the appointment table and write it to `dir`.
pub fn run_appointments_stage(
    config: &PipelineConfig,
    dir: &Path,
) -> PipelineResult<Vec<AppointmentRecord>> {
    let bank = RngBank::new(config.generation.seed);
    let (_, appointments) = stage::generate_appointments(config, &bank)?;
    csv_io::write_table(&dir.join(&config.files.appointments), &appointments)?;
    Ok(appointments)
}

/// Read appointments from `dir` if present, generate operations and
/// write the daily table plus its two side tables.
pub fn run_operations_stage(config: &PipelineConfig, dir: &Path) -> PipelineResult<OperationsOutput> {
    let appointments: Vec<AppointmentRecord> =
        csv_io::read_optional_table(&dir.join(&config.files.appointments))?.unwrap_or_default();

    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Operations);
    let output = stage::generate_operations(config, &appointments, &mut rng)?;
    write_operations(config, dir, &output)?;
    Ok(output)
}

/// Read appointments and the operations table from `dir` if present,
/// generate monthly financials and write them.
///
/// The operations table is read under `files.financial_operations_input`,
/// which by default is not the name the operations stage writes.
pub fn run_financials_stage(
    config: &PipelineConfig,
    dir: &Path,
) -> PipelineResult<Vec<FinancialRecord>> {
    let files = &config.files;
    if !files.operations_handoff_aligned() {
        log::warn!(
            "financials read operations from {} but operations writes {}",
            files.financial_operations_input,
            files.operations_output
        );
    }
    let appointments: Vec<AppointmentRecord> =
        csv_io::read_optional_table(&dir.join(&files.appointments))?.unwrap_or_default();
    let operations: Vec<OperationsRecord> =
        csv_io::read_optional_table(&dir.join(&files.financial_operations_input))?.unwrap_or_default();

    let mut rng = RngBank::new(config.generation.seed).for_stage(StageSlot::Financials);
    let rows = stage::generate_financials(config, &appointments, &operations, &mut rng)?;
    csv_io::write_table(&dir.join(&files.financials), &rows)?;
    Ok(rows)
}

/// Run all stages in one process with typed handoff.
pub fn run_in_process(config: &PipelineConfig) -> PipelineResult<StageOutputs> {
    let bank = RngBank::new(config.generation.seed);
    StageGraph::standard().run(config, &bank)
}

/// Write whatever `outputs` holds to `dir`.
pub fn write_outputs(config: &PipelineConfig, dir: &Path, outputs: &StageOutputs) -> PipelineResult<()> {
    if let Some(appointments) = &outputs.appointments {
        csv_io::write_table(&dir.join(&config.files.appointments), appointments)?;
    }
    if let Some(operations) = &outputs.operations {
        write_operations(config, dir, operations)?;
    }
    if let Some(financials) = &outputs.financials {
        csv_io::write_table(&dir.join(&config.files.financials), financials)?;
    }
    log::info!("outputs written to {}", dir.display());
    Ok(())
}

fn write_operations(config: &PipelineConfig, dir: &Path, output: &OperationsOutput) -> PipelineResult<()> {
    let files = &config.files;
    csv_io::write_table(&dir.join(&files.operations_output), &output.operations)?;
    csv_io::write_table(&dir.join(&files.staff_hours), &output.staff_hours)?;
    csv_io::write_table(&dir.join(&files.equipment_usage), &output.equipment_usage)?;
    Ok(())
}
