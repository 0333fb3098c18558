//! gen-financials: reads Pat_App_Data.csv and Operations_Data.csv (each
//! if present) and writes Financial_Data.csv.

#[path = "../cli.rs"]
mod cli;

use anyhow::Result;
use dental_synth_core::pipeline;

fn main() -> Result<()> {
    env_logger::init();
    let run = cli::parse("gen-financials")?;

    let rows = pipeline::run_financials_stage(&run.config, &run.dir)?;

    println!("=== FINANCIALS (last month per location) ===");
    for location in &run.config.locations {
        let Some(last) = rows.iter().rev().find(|r| r.location_id == location.location_id) else {
            println!("  {} | no months in range", location.location_id);
            continue;
        };
        println!(
            "  {} {}-{:02} | Revenue: ${:.0} | EBITDA: ${:.0} ({:.1}%) | YoY: {:+.1}%",
            last.location_id,
            last.year,
            last.month,
            last.total_revenue,
            last.ebitda,
            last.ebitda_margin * 100.0,
            last.revenue_yoy_change
        );
    }
    Ok(())
}
