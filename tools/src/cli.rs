//! Flag handling shared by every binary.
//!
//!   --seed <u64>        master seed (default: generation.json)
//!   --dir <path>        input/output directory (default: .)
//!   --data-dir <path>   catalog directory (default: ./data)

use anyhow::{Context, Result};
use dental_synth_core::config::PipelineConfig;
use std::path::PathBuf;

pub struct RunArgs {
    pub dir: PathBuf,
    pub config: PipelineConfig,
}

/// Parse flags, load the catalog and apply the seed override.
pub fn parse(tool: &str) -> Result<RunArgs> {
    let args: Vec<String> = std::env::args().collect();
    let dir = PathBuf::from(string_arg(&args, "--dir").unwrap_or("."));
    let data_dir = PathBuf::from(string_arg(&args, "--data-dir").unwrap_or("./data"));

    let mut config = PipelineConfig::load(&data_dir)
        .with_context(|| format!("loading catalog from {}", data_dir.display()))?;
    config.generation.seed = parse_arg(&args, "--seed", config.generation.seed);

    println!("Dental practice synthesizer: {tool}");
    println!("  seed:      {}", config.generation.seed);
    println!("  range:     {} .. {}", config.generation.start_date, config.generation.end_date);
    println!("  dir:       {}", dir.display());
    println!("  data_dir:  {}", data_dir.display());
    println!();

    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    log::debug!("catalog loaded from {}", data_dir.display());
    Ok(RunArgs { dir, config })
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
