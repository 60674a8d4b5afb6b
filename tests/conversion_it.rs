use fxpipe::{conversion, prelude::*};
use serde_json::json;

mod common;

use common::{fixture, scratch_dir, write_config};

fn rate_config(dir: &std::path::Path, output: &str) -> RateConfig {
    let cfg = json!({
        "data": {
            "ccy_file": { "path": fixture("rate/ccy.csv"), "type": "csv" },
            "price_file": { "path": fixture("rate/price.csv"), "type": "csv" },
            "spot_file": { "path": fixture("rate/spot.csv"), "type": "csv" }
        },
        "output_file": { "path": output, "type": "csv" }
    });
    RateConfig::from_path(write_config(dir, &cfg)).expect("Failed to load rate config")
}

fn statuses(df: &polars::frame::DataFrame) -> Vec<String> {
    df.column("conversion_status")
        .expect("status column")
        .str()
        .expect("string statuses")
        .into_iter()
        .map(|s| s.unwrap_or_default().to_string())
        .collect()
}

#[test]
fn converts_fixture_prices_end_to_end() {
    let dir = scratch_dir("conversion");
    let config = rate_config(&dir, "out/converted.csv");

    let summary = conversion::run(&config).expect("conversion run succeeds");
    assert_eq!(summary.rows, 6);
    assert_eq!(summary.conversion_done, 2);
    assert_eq!(summary.conversion_failed_no_spot_rate, 1);
    assert_eq!(summary.no_conversion_required, 3);
    assert_eq!(summary.duplicate_rules, 1);

    // Relative output paths resolve against the config directory.
    assert!(config.output_file.path.ends_with("out/converted.csv"));
    assert!(config.output_file.path.is_absolute());
    let df = read_table(&config.output_file).expect("output readable");

    assert_eq!(
        statuses(&df),
        vec![
            "conversion_done",
            "no_conversion_required",
            "conversion_failed_no_spot_rate",
            "conversion_done",
            "no_conversion_required",
            "no_conversion_required",
        ]
    );

    let new_price = df.floats("new_price").expect("new_price column");
    assert!((new_price[0].expect("EURUSD converted") - 51.1).abs() < 1e-9);
    assert_eq!(new_price[1], Some(80.0));
    assert_eq!(new_price[2], None);
    // AUDUSD spot sits exactly one hour before the price.
    assert!((new_price[3].expect("AUDUSD converted") - 10.7).abs() < 1e-9);
    assert_eq!(new_price[4], Some(150.0));
    assert_eq!(new_price[5], Some(30.0));

    let ids = df.entity_keys("security_id").expect("security ids");
    assert_eq!(ids.len(), 6);
    assert_eq!(ids[0], Some(EntityKey::Int(1)));
    assert_eq!(ids[5], Some(EntityKey::Int(6)));

    let fmt = TimestampFormat::new("%Y-%m-%d %H:%M:%S%.f");
    let times = df.timestamps("timestamp", &fmt).expect("timestamps round trip");
    assert_eq!(times[0], fmt.parse("2021-11-20 10:00:00"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_input_writes_nothing() {
    let dir = scratch_dir("conversion-missing");
    let mut config = rate_config(&dir, "converted.csv");
    config.data.spot_file.path = dir.join("no-such-spot.csv");

    let err = conversion::run(&config).unwrap_err();
    assert!(matches!(err, FxPipeError::Io(IoError::ReadFailed { .. })));
    assert!(!dir.join("converted.csv").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn rerun_produces_identical_output() {
    let dir = scratch_dir("conversion-rerun");
    let mut config = rate_config(&dir, "converted.parquet");
    config.output_file.format = FileFormat::Parquet;

    conversion::run(&config).expect("first run");
    let first = read_table(&config.output_file).expect("first output");
    conversion::run(&config).expect("second run");
    let second = read_table(&config.output_file).expect("second output");

    assert!(first.equals_missing(&second));
    let _ = std::fs::remove_dir_all(&dir);
}
