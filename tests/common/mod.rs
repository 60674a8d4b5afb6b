#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn fixture(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

/// Empty per-test directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fxpipe-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

pub fn write_config(dir: &Path, json: &serde_json::Value) -> PathBuf {
    let path = dir.join("config.json");
    let raw = serde_json::to_string_pretty(json).expect("Failed to serialize config");
    fs::write(&path, raw).expect("Failed to write config");
    path
}
