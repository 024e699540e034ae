//! Fixtures shared with the binary crates' tests.
use crate::config::AnalysisConfig;
use crate::pipeline::{run, AnalysisReport};

use std::path::PathBuf;

pub fn sample_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/sample_logs/analysis.yaml")
}

pub fn create_sample_config() -> AnalysisConfig {
    AnalysisConfig::from_file(sample_config_path()).expect("sample config must load")
}

pub fn create_sample_report() -> AnalysisReport {
    run(&create_sample_config()).expect("sample logs must analyse")
}
