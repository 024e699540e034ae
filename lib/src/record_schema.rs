//! Field layouts of the logs written by the simulator.
//!
//! The same log kind has been written with different column sets by different
//! simulator variants, so the caller always declares the [`SchemaVersion`] of
//! a file. Nothing here guesses a schema from the number of columns.
use serde_derive::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Opaque class value: a deadline or a price/willingness tier.
///
/// Kept as the source text. Numeric tags order numerically so that deadlines
/// `1, 4, 100, 1000` do not sort as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassTag(String);

impl ClassTag {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn as_number(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|value| value.is_finite())
    }
}

impl Ord for ClassTag {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(lhs), Some(rhs)) => lhs.total_cmp(&rhs).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ClassTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassTag {
    fn from(raw: &str) -> Self {
        ClassTag::new(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    /// Integer machine id; negative values mean "whole cluster".
    MachineId,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Process,
    /// Work entering the system, one line per job handed to a machine.
    Arrival,
    Usage,
    Admission,
}

impl LogKind {
    pub fn name(&self) -> &'static str {
        match self {
            LogKind::Process => "process",
            LogKind::Arrival => "arrival",
            LogKind::Usage => "usage",
            LogKind::Admission => "admission",
        }
    }
}

/// Denominator of the latency fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBasis {
    /// `100 * ticksPassed / sla`
    Allowance,
    /// `100 * timePassed / compDone`
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    ProcsDoneSla,
    ProcsDonePriced,
    ProcsDoneClusterPriced,
    ProcsAdded,
    UsageQueue,
    UsageMemory,
    UsageMachineMemory,
    UsageClusterMemory,
    AdmissionDeadline,
    AdmissionPrice,
}

use FieldKind::*;

const PROCS_DONE_SLA: &[FieldSpec] = &[
    field("tick", Int),
    field("machineId", MachineId),
    field("procType", Class),
    field("sla", Float),
    field("ticksPassed", Float),
    field("actualComp", Float),
];

const PROCS_DONE_PRICED: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("machineId", MachineId),
    field("price", Class),
    field("timePassed", Float),
    field("compDone", Float),
    field("memory", Int),
    field("totMemPaged", Int),
    field("numTimesPaged", Int),
];

const PROCS_DONE_CLUSTER_PRICED: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("price", Class),
    field("timePassed", Float),
    field("compDone", Float),
];

const PROCS_ADDED: &[FieldSpec] = &[
    field("tick", Int),
    field("machineId", MachineId),
    field("procType", Class),
    field("sla", Float),
    field("actualComp", Float),
    field("migrated", Int),
];

const USAGE_QUEUE: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("tick", Int),
    field("machineId", MachineId),
    field("qlen", Int),
    field("ticksLeftOver", Float),
];

const USAGE_MEMORY: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("tick", Int),
    field("machineId", MachineId),
    field("begMemFree", Int),
    field("begMemPaged", Int),
    field("ticksLeftOver", Float),
    field("endMemFree", Int),
    field("endMemPaged", Int),
    field("sumMemSeen", Int),
    field("numProcsRan", Int),
    field("maxMemSeen", Int),
    field("fullQlen", Int),
];

const USAGE_MACHINE_MEMORY: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("tick", Int),
    field("machineId", MachineId),
    field("ticksLeftOver", Float),
    field("memFree", Int),
];

const USAGE_CLUSTER_MEMORY: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("tick", Int),
    field("ticksLeftOver", Float),
    field("memFree", Int),
];

const ADMISSION_DEADLINE: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("tick", Int),
    field("deadline", Class),
];

const ADMISSION_PRICE: &[FieldSpec] = &[
    field("nGenPerTick", Int),
    field("tick", Int),
    field("price", Class),
];

impl SchemaVersion {
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            SchemaVersion::ProcsDoneSla => PROCS_DONE_SLA,
            SchemaVersion::ProcsDonePriced => PROCS_DONE_PRICED,
            SchemaVersion::ProcsDoneClusterPriced => PROCS_DONE_CLUSTER_PRICED,
            SchemaVersion::ProcsAdded => PROCS_ADDED,
            SchemaVersion::UsageQueue => USAGE_QUEUE,
            SchemaVersion::UsageMemory => USAGE_MEMORY,
            SchemaVersion::UsageMachineMemory => USAGE_MACHINE_MEMORY,
            SchemaVersion::UsageClusterMemory => USAGE_CLUSTER_MEMORY,
            SchemaVersion::AdmissionDeadline => ADMISSION_DEADLINE,
            SchemaVersion::AdmissionPrice => ADMISSION_PRICE,
        }
    }

    pub fn kind(&self) -> LogKind {
        match self {
            SchemaVersion::ProcsDoneSla
            | SchemaVersion::ProcsDonePriced
            | SchemaVersion::ProcsDoneClusterPriced => LogKind::Process,
            SchemaVersion::ProcsAdded => LogKind::Arrival,
            SchemaVersion::UsageQueue
            | SchemaVersion::UsageMemory
            | SchemaVersion::UsageMachineMemory
            | SchemaVersion::UsageClusterMemory => LogKind::Usage,
            SchemaVersion::AdmissionDeadline | SchemaVersion::AdmissionPrice => {
                LogKind::Admission
            }
        }
    }

    /// Only meaningful for process schemas.
    pub fn latency_basis(&self) -> LatencyBasis {
        match self {
            SchemaVersion::ProcsDoneSla => LatencyBasis::Allowance,
            _ => LatencyBasis::Compute,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|spec| spec.name == name)
    }
}
