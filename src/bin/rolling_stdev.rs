use std::{env, time::Instant};

use anyhow::{Context, Result};
use fxpipe::{prelude::*, stdev};
use tracing::info;

fn main() -> Result<()> {
    let _guard = init_tracing("rolling-stdev")?;

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = StdevConfig::from_path(&config_path)
        .with_context(|| format!("Failed to load config '{config_path}'"))?;

    let start = Instant::now();
    let summary = stdev::run(&config).context("Rolling standard deviation failed")?;
    let elapsed = start.elapsed();

    info!(
        entities = summary.entities,
        blocks = summary.blocks,
        rows = summary.rows_written,
        output = %config.output_file.path.display(),
        elapsed = %humantime::format_duration(elapsed),
        "Rolling standard deviations written"
    );
    println!(
        "Wrote {} rows for {} entities in {:?} -> {}",
        summary.rows_written,
        summary.entities,
        elapsed,
        config.output_file.path.display()
    );

    Ok(())
}
