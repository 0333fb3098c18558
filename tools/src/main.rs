//! pipeline-runner: runs all three generators in one process.
//!
//! Usage:
//!   pipeline-runner --seed 42 --dir out --data-dir ./data

mod cli;

use anyhow::Result;
use dental_synth_core::{pipeline, stage::StageOutputs};

fn main() -> Result<()> {
    env_logger::init();
    let run = cli::parse("pipeline-runner")?;

    let outputs = pipeline::run_in_process(&run.config)?;
    pipeline::write_outputs(&run.config, &run.dir, &outputs)?;
    print_summary(&outputs);
    Ok(())
}

fn print_summary(outputs: &StageOutputs) {
    let patients = outputs.patients.as_ref().map_or(0, Vec::len);
    let appointments = outputs.appointments.as_deref().unwrap_or_default();
    let financials = outputs.financials.as_deref().unwrap_or_default();

    println!("=== RUN SUMMARY ===");
    println!("  patients:        {patients}");
    println!("  procedure rows:  {}", appointments.len());
    if let Some(ops) = &outputs.operations {
        println!("  daily ops rows:  {}", ops.operations.len());
        println!("  staff shifts:    {}", ops.staff_hours.len());
        println!("  equipment rows:  {}", ops.equipment_usage.len());
    }
    println!("  monthly rows:    {}", financials.len());

    let revenue: f64 = financials.iter().map(|r| r.total_revenue).sum();
    let ebitda: f64 = financials.iter().map(|r| r.ebitda).sum();
    println!();
    println!("=== FINANCIAL SUMMARY ===");
    println!("  total revenue:   ${revenue:.0}");
    println!("  total EBITDA:    ${ebitda:.0}");
    if revenue > 0.0 {
        println!("  EBITDA margin:   {:.1}%", ebitda / revenue * 100.0);
    }
}
