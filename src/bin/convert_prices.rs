use std::{env, time::Instant};

use anyhow::{Context, Result};
use fxpipe::{conversion, prelude::*};
use tracing::info;

fn main() -> Result<()> {
    let _guard = init_tracing("convert-prices")?;

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = RateConfig::from_path(&config_path)
        .with_context(|| format!("Failed to load config '{config_path}'"))?;

    let start = Instant::now();
    let summary = conversion::run(&config).context("Price conversion failed")?;
    let elapsed = start.elapsed();

    info!(
        rows = summary.rows,
        done = summary.conversion_done,
        failed = summary.conversion_failed_no_spot_rate,
        unconverted = summary.no_conversion_required,
        output = %config.output_file.path.display(),
        elapsed = %humantime::format_duration(elapsed),
        "Price conversion written"
    );
    println!(
        "Converted {} prices in {:?} -> {}",
        summary.rows,
        elapsed,
        config.output_file.path.display()
    );

    Ok(())
}
