//! End-to-end run: parse every variant's logs, derive, aggregate and compare.
use crate::admission::{reconcile_events, ADMISSION_COLUMNS};
use crate::aggregation::{
    aggregate, statistic_columns, summary_statistics, LoadClassKey, LoadLevel, LoadTickKey,
    Statistic,
};
use crate::config::{AnalysisConfig, LogSource, VariantConfig};
use crate::derived_fields::{
    compute_added_per_tick, derive_latency, derive_utilization, late_jobs, LatencyDerivation,
    LatencySample, UtilizationSample, COMPUTE_ADDED_STATISTICS, LATE_JOB_COLUMNS,
};
use crate::error::Result;
use crate::log_parser::{parse_log_files, LogRow};
use crate::records::{
    admission_events, arrival_records, process_records, usage_snapshots, AdmissionEvent,
    ArrivalRecord,
};
use crate::table::{Row, Table};
use crate::variant_comparator::{column_names, compare, Variant};

use getset::Getters;
use log::{debug, info, warn};
use serde_derive::Serialize;
use std::path::PathBuf;

const TIMELINE_STATISTICS: [Statistic; 4] = [
    Statistic::Count,
    Statistic::Min,
    Statistic::Max,
    Statistic::Mean,
];

pub const EXCLUDED_COLUMNS: [&str; 4] = ["variant", "processCount", "excludedCount", "unkeyedCount"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Processes,
    Added,
    Usage,
    Created,
    Rejected,
}

/// Everything kept from one variant's logs after filtering.
#[derive(Debug, Default)]
struct VariantLogs {
    latency: LatencyDerivation,
    process_count: usize,
    arrivals: Vec<ArrivalRecord>,
    utilization: Vec<UtilizationSample>,
    created: Vec<AdmissionEvent>,
    rejected: Vec<AdmissionEvent>,
}

/// Summary tables of one run, each in long format with a `variant` column.
#[derive(Debug, Clone, PartialEq, Getters, Serialize)]
#[getset(get = "pub")]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    variants: Vec<Variant>,
    latency_fraction_pct: Table,
    late_jobs: Table,
    compute_added: Table,
    utilization: Table,
    mem_utilization: Table,
    ticks_left_over: Table,
    admission: Table,
    excluded_records: Table,
}

impl AnalysisReport {
    pub fn tables(&self) -> Vec<(&'static str, &Table)> {
        vec![
            ("latencyFractionPct", &self.latency_fraction_pct),
            ("lateJobs", &self.late_jobs),
            ("computeAdded", &self.compute_added),
            ("utilization", &self.utilization),
            ("memUtilization", &self.mem_utilization),
            ("ticksLeftOver", &self.ticks_left_over),
            ("admission", &self.admission),
            ("excludedRecords", &self.excluded_records),
        ]
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables()
            .into_iter()
            .find(|(table_name, _)| *table_name == name)
            .map(|(_, table)| table)
    }
}

fn tag_sources(slot: Slot, sources: &[LogSource]) -> impl Iterator<Item = (Slot, &LogSource)> {
    sources.iter().map(move |source| (slot, source))
}

fn slot_sources(variant: &VariantConfig) -> Vec<(Slot, &LogSource)> {
    tag_sources(Slot::Processes, &variant.processes)
        .chain(tag_sources(Slot::Added, &variant.added))
        .chain(tag_sources(Slot::Usage, &variant.usage))
        .chain(tag_sources(Slot::Created, &variant.created))
        .chain(tag_sources(Slot::Rejected, &variant.rejected))
        .collect()
}

fn keep_events(config: &AnalysisConfig, events: Vec<AdmissionEvent>) -> Vec<AdmissionEvent> {
    events
        .into_iter()
        .filter(|event| {
            config.keeps_tick(Some(event.tick)) && config.keeps_load_level(Some(event.load_level))
        })
        .collect()
}

fn collect_variant(
    config: &AnalysisConfig,
    variant: &VariantConfig,
    parsed: Vec<(Slot, &LogSource, Vec<LogRow>)>,
) -> Result<VariantLogs> {
    let capacity = config.capacity_for(variant);
    let mut logs = VariantLogs::default();

    for (slot, source, rows) in parsed {
        match slot {
            Slot::Processes => {
                let records: Vec<_> = process_records(&rows, source.load_level)?
                    .into_iter()
                    .filter(|record| {
                        config.keeps_tick(record.tick) && config.keeps_load_level(record.load_level)
                    })
                    .collect();
                logs.process_count += records.len();
                logs.latency.extend(derive_latency(&records, source.schema)?);
            }
            Slot::Added => logs.arrivals.extend(
                arrival_records(&rows, source.load_level)?
                    .into_iter()
                    .filter(|arrival| {
                        config.keeps_tick(Some(arrival.tick))
                            && config.keeps_load_level(arrival.load_level)
                    }),
            ),
            Slot::Usage => {
                let snapshots: Vec<_> = usage_snapshots(&rows)?
                    .into_iter()
                    .filter(|snapshot| {
                        config.keeps_tick(Some(snapshot.tick))
                            && config.keeps_load_level(Some(snapshot.load_level))
                    })
                    .collect();
                logs.utilization
                    .extend(derive_utilization(&snapshots, &capacity)?);
            }
            Slot::Created => logs
                .created
                .extend(keep_events(config, admission_events(&rows)?)),
            Slot::Rejected => logs
                .rejected
                .extend(keep_events(config, admission_events(&rows)?)),
        }
    }

    debug!(
        "variant `{}`: {} process records, {} arrivals, {} usage samples, {} created, {} rejected",
        variant.name,
        logs.process_count,
        logs.arrivals.len(),
        logs.utilization.len(),
        logs.created.len(),
        logs.rejected.len()
    );
    Ok(logs)
}

fn latency_key(sample: &LatencySample) -> Option<LoadClassKey> {
    Some(LoadClassKey {
        load_level: sample.load_level?,
        class: sample.class.clone()?,
    })
}

/// `unkeyed` holds, per variant, the latency samples that had no (load level, class) key.
fn excluded_table(variants: &[(Variant, VariantLogs)], unkeyed: &[usize]) -> Table {
    let mut table = Table::new(column_names(&EXCLUDED_COLUMNS));
    for ((variant, logs), unkeyed_count) in variants.iter().zip(unkeyed) {
        table.push(
            Row::new()
                .with("variant", variant.name())
                .with("processCount", logs.process_count)
                .with("excludedCount", logs.latency.excluded_count())
                .with("unkeyedCount", *unkeyed_count),
        );
    }
    table
}

/// Run the whole analysis described by `config`.
///
/// Inputs are checked before anything is parsed, so a missing log of any
/// variant fails the run without partial output. All log files are parsed
/// in parallel.
pub fn run(config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    config.check_inputs()?;

    let declared: Vec<(usize, Slot, &LogSource)> = config
        .variants
        .iter()
        .enumerate()
        .flat_map(|(index, variant)| {
            slot_sources(variant)
                .into_iter()
                .map(move |(slot, source)| (index, slot, source))
        })
        .collect();
    let files: Vec<(PathBuf, _)> = declared
        .iter()
        .map(|(_, _, source)| (source.path.clone(), source.schema))
        .collect();
    info!(
        "parsing {} log files of {} variants",
        files.len(),
        config.variants.len()
    );
    let parsed = parse_log_files(&files)?;

    let mut per_variant: Vec<Vec<(Slot, &LogSource, Vec<LogRow>)>> =
        config.variants.iter().map(|_| Vec::new()).collect();
    for ((index, slot, source), rows) in declared.into_iter().zip(parsed) {
        per_variant[index].push((slot, source, rows));
    }

    let mut variants = Vec::new();
    for (variant, parsed) in config.variants.iter().zip(per_variant) {
        variants.push((variant.variant(), collect_variant(config, variant, parsed)?));
    }

    info!("aggregating {} variants", variants.len());
    let statistics = summary_statistics(&config.percentiles);
    let summary_columns = statistic_columns(&statistics);

    let mut latency = Vec::new();
    let mut unkeyed = Vec::new();
    let mut late = Vec::new();
    let mut compute_added = Vec::new();
    let mut utilization = Vec::new();
    let mut mem_utilization = Vec::new();
    let mut timeline = Vec::new();
    let mut admission = Vec::new();
    for ((variant, logs), variant_config) in variants.iter().zip(&config.variants) {
        let samples = &logs.latency.samples;
        let latency_fraction =
            aggregate(samples, latency_key, |sample| Some(sample.latency_fraction_pct), &statistics)?;
        if latency_fraction.skipped > 0 {
            warn!(
                "variant `{}`: {} latency samples have no load level or class and are not grouped",
                variant, latency_fraction.skipped
            );
        }
        unkeyed.push(latency_fraction.skipped);
        latency.push((variant.clone(), latency_fraction.groups));
        late.push((variant.clone(), late_jobs(samples)));
        compute_added.push((variant.clone(), compute_added_per_tick(&logs.arrivals)?.groups));

        let usage = &logs.utilization;
        let by_load = |sample: &UtilizationSample| Some(LoadLevel(sample.load_level));
        utilization.push((
            variant.clone(),
            aggregate(usage, by_load, |sample| Some(sample.utilization), &statistics)?.groups,
        ));
        mem_utilization.push((
            variant.clone(),
            aggregate(usage, by_load, |sample| sample.mem_utilization, &statistics)?.groups,
        ));
        timeline.push((
            variant.clone(),
            aggregate(
                usage,
                |sample| {
                    Some(LoadTickKey {
                        load_level: sample.load_level,
                        tick: sample.tick,
                    })
                },
                |sample| Some(sample.ticks_left_over),
                &TIMELINE_STATISTICS,
            )?
            .groups,
        ));

        if !variant_config.created.is_empty() {
            admission.push((variant.clone(), reconcile_events(&logs.created, &logs.rejected)));
        }
    }

    let report = AnalysisReport {
        variants: variants.iter().map(|(variant, _)| variant.clone()).collect(),
        latency_fraction_pct: compare(latency, &summary_columns)?.into_table(),
        late_jobs: compare(late, &column_names(&LATE_JOB_COLUMNS[2..]))?.into_table(),
        compute_added: compare(compute_added, &statistic_columns(&COMPUTE_ADDED_STATISTICS))?
            .into_table(),
        utilization: compare(utilization, &summary_columns)?.into_table(),
        mem_utilization: compare(mem_utilization, &summary_columns)?.into_table(),
        ticks_left_over: compare(timeline, &statistic_columns(&TIMELINE_STATISTICS))?.into_table(),
        admission: compare(admission, &column_names(&ADMISSION_COLUMNS[2..]))?.into_table(),
        excluded_records: excluded_table(&variants, &unkeyed),
    };
    for (name, table) in report.tables() {
        info!("{}: {} rows", name, table.len());
    }
    Ok(report)
}
