//! Per-record derived quantities: latency fraction, compute and memory utilization.
use crate::aggregation::{
    aggregate, count_by_key, Aggregation, GroupKey, LoadClassKey, LoadTickKey, Statistic,
};
use crate::error::{AnalysisError, Result};
use crate::record_schema::{ClassTag, LatencyBasis, LogKind, SchemaVersion};
use crate::records::{ArrivalRecord, ProcessRecord, UsageSnapshot};
use crate::table::Row;

use log::warn;
use serde_derive::{Deserialize, Serialize};

const DEFAULT_MEM_PER_MACHINE: u64 = 32000;

fn default_mem_per_machine() -> u64 {
    DEFAULT_MEM_PER_MACHINE
}

/// Capacity of the simulated cluster that produced a set of usage logs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterCapacity {
    pub num_machines: u32,
    pub cores_per_machine: u32,
    /// MB
    #[serde(default = "default_mem_per_machine")]
    pub mem_per_machine: u64,
}

impl ClusterCapacity {
    pub fn new(num_machines: u32, cores_per_machine: u32, mem_per_machine: u64) -> Self {
        Self {
            num_machines,
            cores_per_machine,
            mem_per_machine,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_machines == 0 || self.cores_per_machine == 0 || self.mem_per_machine == 0 {
            return Err(AnalysisError::Capacity(format!(
                "every capacity must be positive, got {} machines x {} cores x {} MB",
                self.num_machines, self.cores_per_machine, self.mem_per_machine
            )));
        }
        Ok(())
    }

    /// Cores of one machine, or of the whole cluster.
    pub fn compute_capacity(&self, per_machine: bool) -> f64 {
        if per_machine {
            self.cores_per_machine as f64
        } else {
            self.num_machines as f64 * self.cores_per_machine as f64
        }
    }

    pub fn memory_capacity(&self, per_machine: bool) -> f64 {
        if per_machine {
            self.mem_per_machine as f64
        } else {
            self.num_machines as f64 * self.mem_per_machine as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    ZeroCompute,
    ZeroAllowance,
    MissingDenominator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedRecord {
    /// position in the input slice
    pub index: usize,
    pub reason: DegenerateReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencySample {
    pub load_level: Option<i64>,
    pub class: Option<ClassTag>,
    pub tick: Option<i64>,
    pub latency_fraction_pct: f64,
    pub late: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyDerivation {
    pub samples: Vec<LatencySample>,
    pub excluded: Vec<ExcludedRecord>,
}

impl LatencyDerivation {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn extend(&mut self, other: LatencyDerivation) {
        let offset = self.samples.len() + self.excluded.len();
        self.samples.extend(other.samples);
        self.excluded
            .extend(other.excluded.into_iter().map(|excluded| ExcludedRecord {
                index: excluded.index + offset,
                reason: excluded.reason,
            }));
    }
}

/// Latency of every record as a percentage of its allowance or of its compute.
///
/// Records whose denominator is zero or missing are excluded and reported in
/// `excluded`; no infinity or NaN ever reaches `samples`.
pub fn derive_latency(records: &[ProcessRecord], schema: SchemaVersion) -> Result<LatencyDerivation> {
    if schema.kind() != LogKind::Process {
        return Err(AnalysisError::SchemaKindMismatch {
            expected: LogKind::Process.name(),
            found: schema.kind().name(),
        });
    }
    let basis = schema.latency_basis();
    let mut derivation = LatencyDerivation::default();

    for (index, record) in records.iter().enumerate() {
        let (denominator, zero_reason) = match basis {
            LatencyBasis::Allowance => (record.allowance, DegenerateReason::ZeroAllowance),
            LatencyBasis::Compute => (record.comp_done, DegenerateReason::ZeroCompute),
        };
        let denominator = match denominator {
            Some(value) if value != 0.0 => value,
            Some(_) => {
                derivation.excluded.push(ExcludedRecord {
                    index,
                    reason: zero_reason,
                });
                continue;
            }
            None => {
                derivation.excluded.push(ExcludedRecord {
                    index,
                    reason: DegenerateReason::MissingDenominator,
                });
                continue;
            }
        };
        derivation.samples.push(LatencySample {
            load_level: record.load_level,
            class: record.class.clone(),
            tick: record.tick,
            latency_fraction_pct: 100.0 * record.time_passed / denominator,
            late: record.is_late(),
        });
    }

    if !derivation.excluded.is_empty() {
        warn!(
            "{} of {} records have no usable latency denominator and are excluded",
            derivation.excluded.len(),
            records.len()
        );
    }
    Ok(derivation)
}

pub const LATE_JOB_COLUMNS: [&str; 5] = ["loadLevel", "class", "count", "lateCount", "lateFraction"];

/// Jobs of one (load level, class) that finished late through queuing.
#[derive(Debug, Clone, PartialEq)]
pub struct LateJobSummary {
    pub key: LoadClassKey,
    pub count: usize,
    pub late_count: usize,
}

impl LateJobSummary {
    pub fn late_fraction(&self) -> f64 {
        self.late_count as f64 / self.count as f64
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        self.key.write_key(&mut row);
        row.set("count", self.count);
        row.set("lateCount", self.late_count);
        row.set("lateFraction", self.late_fraction());
        row
    }
}

/// Only samples with a load level, a class and a known lateness are counted.
pub fn late_jobs(samples: &[LatencySample]) -> Vec<LateJobSummary> {
    let key = |sample: &LatencySample| -> Option<LoadClassKey> {
        sample.late?;
        Some(LoadClassKey {
            load_level: sample.load_level?,
            class: sample.class.clone()?,
        })
    };
    let counts = count_by_key(samples, key);
    let late_counts = count_by_key(samples, |sample| match sample.late {
        Some(true) => key(sample),
        _ => None,
    });
    counts
        .into_iter()
        .map(|(key, count)| LateJobSummary {
            late_count: late_counts.get(&key).copied().unwrap_or(0),
            key,
            count,
        })
        .collect()
}

pub const COMPUTE_ADDED_STATISTICS: [Statistic; 2] = [Statistic::Count, Statistic::Sum];

/// Jobs and ticks of compute added at every (load level, tick).
pub fn compute_added_per_tick(arrivals: &[ArrivalRecord]) -> Result<Aggregation<LoadTickKey>> {
    aggregate(
        arrivals,
        |arrival| {
            Some(LoadTickKey {
                load_level: arrival.load_level?,
                tick: arrival.tick,
            })
        },
        |arrival| Some(arrival.actual_comp),
        &COMPUTE_ADDED_STATISTICS,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationSample {
    pub load_level: i64,
    pub tick: i64,
    pub machine_id: Option<u32>,
    pub ticks_left_over: f64,
    pub utilization: f64,
    /// Above 1.0 when the tick was over-provisioned.
    pub mem_utilization: Option<f64>,
}

/// Compute and memory utilization of every snapshot.
///
/// A snapshot with a machine id is measured against one machine, otherwise
/// against the whole cluster.
pub fn derive_utilization(
    snapshots: &[UsageSnapshot],
    capacity: &ClusterCapacity,
) -> Result<Vec<UtilizationSample>> {
    capacity.validate()?;
    snapshots
        .iter()
        .map(|snapshot| {
            let per_machine = snapshot.machine_id.is_some();
            let compute_capacity = capacity.compute_capacity(per_machine);
            if snapshot.ticks_left_over > compute_capacity {
                return Err(AnalysisError::Capacity(format!(
                    "{} ticks left over at tick {} (machine {:?}) exceeds a capacity of {}",
                    snapshot.ticks_left_over, snapshot.tick, snapshot.machine_id, compute_capacity
                )));
            }
            let memory_capacity = capacity.memory_capacity(per_machine);
            Ok(UtilizationSample {
                load_level: snapshot.load_level,
                tick: snapshot.tick,
                machine_id: snapshot.machine_id,
                ticks_left_over: snapshot.ticks_left_over,
                utilization: (compute_capacity - snapshot.ticks_left_over) / compute_capacity,
                mem_utilization: snapshot
                    .mem_free
                    .map(|mem_free| 1.0 - mem_free as f64 / memory_capacity),
            })
        })
        .collect()
}
