mod outputs_result;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use outputs_result::dump_report_to_writer;
use sla_metrics::config::AnalysisConfig;
use sla_metrics::pipeline::run;
use std::io;

#[derive(Parser)]
#[clap(
    name = "variant_comparison",
    version = "1.0",
    about = "About:
    Compares scheduler variants (ideal, actual, hermod, edf, ...) from their simulation logs.
    Latency, lateness, utilization and admission summaries are printed as YAML tables,
    one row per (key, variant)."
)]
struct ArgParser {
    ///Path to the analysis configuration (YAML).
    #[clap(short = 'c', long = "config", required = true)]
    config: String,
    ///Print only this table (e.g. latencyFractionPct, utilization, admission).
    #[clap(short = 't', long = "table")]
    table: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let arg: ArgParser = ArgParser::parse();

    let config = AnalysisConfig::from_file(&arg.config)
        .with_context(|| format!("failed to load analysis config {}", arg.config))?;
    info!("comparing {} variants", config.variants.len());
    let report = run(&config).context("analysis failed")?;

    let stdout = io::stdout();
    dump_report_to_writer(stdout.lock(), &report, arg.table.as_deref())
}
