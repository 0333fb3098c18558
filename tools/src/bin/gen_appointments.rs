//! gen-appointments: writes Pat_App_Data.csv.
//!
//! Usage:
//!   gen-appointments --seed 42 --dir out --data-dir ./data

#[path = "../cli.rs"]
mod cli;

use anyhow::Result;
use dental_synth_core::pipeline;
use std::collections::HashSet;

fn main() -> Result<()> {
    env_logger::init();
    let run = cli::parse("gen-appointments")?;

    let rows = pipeline::run_appointments_stage(&run.config, &run.dir)?;

    let visits: HashSet<&str> = rows.iter().map(|r| r.visit_id.as_str()).collect();
    let completed = rows.iter().filter(|r| r.is_completed()).count();
    let charged: f64 = rows.iter().map(|r| r.charged_amount).sum();

    println!("=== APPOINTMENTS ===");
    println!("  visits:         {}", visits.len());
    println!("  procedure rows: {}", rows.len());
    println!("  completed rows: {completed}");
    println!("  total charged:  ${charged:.0}");
    println!("  file:           {}", run.dir.join(&run.config.files.appointments).display());
    Ok(())
}
