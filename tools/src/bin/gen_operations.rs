//! gen-operations: reads Pat_App_Data.csv (if present) and writes the
//! daily operations table plus staff-hours and equipment-usage tables.

#[path = "../cli.rs"]
mod cli;

use anyhow::Result;
use dental_synth_core::pipeline;

fn main() -> Result<()> {
    env_logger::init();
    let run = cli::parse("gen-operations")?;

    let output = pipeline::run_operations_stage(&run.config, &run.dir)?;

    let revenue: f64 = output.operations.iter().map(|r| r.revenue).sum();
    let labor: f64 = output.operations.iter().map(|r| r.labor_cost).sum();
    let avg_util = if output.operations.is_empty() {
        0.0
    } else {
        output.operations.iter().map(|r| r.chair_utilization).sum::<f64>() / output.operations.len() as f64
    };

    println!("=== OPERATIONS ===");
    println!("  daily rows:      {}", output.operations.len());
    println!("  staff shifts:    {}", output.staff_hours.len());
    println!("  equipment rows:  {}", output.equipment_usage.len());
    println!("  revenue:         ${revenue:.0}");
    println!("  labor cost:      ${labor:.0}");
    println!("  avg chair util:  {:.1}%", avg_util * 100.0);
    Ok(())
}
