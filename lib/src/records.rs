//! Typed records built from parsed log rows
use crate::error::{AnalysisError, Result};
use crate::log_parser::LogRow;
use crate::record_schema::{ClassTag, LogKind};

fn expect_kind(row: &LogRow, kind: LogKind) -> Result<()> {
    if row.schema.kind() != kind {
        return Err(AnalysisError::SchemaKindMismatch {
            expected: kind.name(),
            found: row.schema.kind().name(),
        });
    }
    Ok(())
}

fn first_float(row: &LogRow, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| row.float(name))
}

fn first_int(row: &LogRow, names: &[&str]) -> Option<i64> {
    names.iter().find_map(|name| row.int(name))
}

fn first_class(row: &LogRow, names: &[&str]) -> Option<ClassTag> {
    names.iter().find_map(|name| row.class(name))
}

/// A completed unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub tick: Option<i64>,
    pub load_level: Option<i64>,
    pub machine_id: Option<u32>,
    pub class: Option<ClassTag>,
    /// sla, in ticks
    pub allowance: Option<f64>,
    pub time_passed: f64,
    pub comp_done: Option<f64>,
    pub memory: Option<i64>,
    pub tot_mem_paged: Option<i64>,
    pub num_times_paged: Option<i64>,
}

impl ProcessRecord {
    /// `load_level` is used when the schema has no `nGenPerTick` column.
    pub fn from_row(row: &LogRow, load_level: Option<i64>) -> Result<Self> {
        expect_kind(row, LogKind::Process)?;
        let time_passed = first_float(row, &["timePassed", "ticksPassed"]).ok_or_else(|| {
            AnalysisError::SchemaKindMismatch {
                expected: "process",
                found: "incomplete process",
            }
        })?;
        Ok(Self {
            tick: row.int("tick"),
            load_level: row.int("nGenPerTick").or(load_level),
            machine_id: row.machine_id("machineId"),
            class: first_class(row, &["price", "procType", "deadline"]),
            allowance: row.float("sla"),
            time_passed,
            comp_done: first_float(row, &["compDone", "actualComp"]),
            memory: row.int("memory"),
            tot_mem_paged: row.int("totMemPaged"),
            num_times_paged: row.int("numTimesPaged"),
        })
    }

    /// Late through queuing: past the allowance and longer than its own compute.
    pub fn is_late(&self) -> Option<bool> {
        let allowance = self.allowance?;
        let comp_done = self.comp_done?;
        Some(self.time_passed > allowance && self.time_passed > comp_done)
    }
}

/// A job handed to a machine, with the compute it brings.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalRecord {
    pub tick: i64,
    pub load_level: Option<i64>,
    pub machine_id: Option<u32>,
    pub class: ClassTag,
    pub allowance: f64,
    pub actual_comp: f64,
    pub migrated: bool,
}

impl ArrivalRecord {
    /// The arrival log does not record the load level; the caller supplies it.
    pub fn from_row(row: &LogRow, load_level: Option<i64>) -> Result<Self> {
        expect_kind(row, LogKind::Arrival)?;
        let incomplete = || AnalysisError::SchemaKindMismatch {
            expected: "arrival",
            found: "incomplete arrival",
        };
        Ok(Self {
            tick: row.int("tick").ok_or_else(incomplete)?,
            load_level: row.int("nGenPerTick").or(load_level),
            machine_id: row.machine_id("machineId"),
            class: row.class("procType").ok_or_else(incomplete)?,
            allowance: row.float("sla").ok_or_else(incomplete)?,
            actual_comp: row.float("actualComp").ok_or_else(incomplete)?,
            migrated: row.int("migrated").map_or(false, |migrated| migrated != 0),
        })
    }
}

/// Per-tick capacity snapshot of one machine, or of the whole cluster when
/// `machine_id` is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    pub load_level: i64,
    pub tick: i64,
    pub machine_id: Option<u32>,
    pub ticks_left_over: f64,
    pub mem_free: Option<i64>,
    pub end_mem_free: Option<i64>,
    pub mem_paged: Option<i64>,
    pub sum_mem_seen: Option<i64>,
    pub num_procs_ran: Option<i64>,
    pub max_mem_seen: Option<i64>,
    pub qlen: Option<i64>,
}

impl UsageSnapshot {
    pub fn from_row(row: &LogRow) -> Result<Self> {
        expect_kind(row, LogKind::Usage)?;
        let incomplete = || AnalysisError::SchemaKindMismatch {
            expected: "usage",
            found: "incomplete usage",
        };
        Ok(Self {
            load_level: row.int("nGenPerTick").ok_or_else(incomplete)?,
            tick: row.int("tick").ok_or_else(incomplete)?,
            machine_id: row.machine_id("machineId"),
            ticks_left_over: row.float("ticksLeftOver").ok_or_else(incomplete)?,
            mem_free: first_int(row, &["memFree", "begMemFree"]),
            end_mem_free: row.int("endMemFree"),
            mem_paged: row.int("begMemPaged"),
            sum_mem_seen: row.int("sumMemSeen"),
            num_procs_ran: row.int("numProcsRan"),
            max_mem_seen: row.int("maxMemSeen"),
            qlen: first_int(row, &["qlen", "fullQlen"]),
        })
    }
}

/// A job offered to the scheduler, either created or rejected at admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionEvent {
    pub load_level: i64,
    pub tick: i64,
    pub class: ClassTag,
}

impl AdmissionEvent {
    pub fn from_row(row: &LogRow) -> Result<Self> {
        expect_kind(row, LogKind::Admission)?;
        let incomplete = || AnalysisError::SchemaKindMismatch {
            expected: "admission",
            found: "incomplete admission",
        };
        Ok(Self {
            load_level: row.int("nGenPerTick").ok_or_else(incomplete)?,
            tick: row.int("tick").ok_or_else(incomplete)?,
            class: first_class(row, &["deadline", "price"]).ok_or_else(incomplete)?,
        })
    }
}

/// convert a batch of rows, stopping at the first row of the wrong kind
pub fn process_records(rows: &[LogRow], load_level: Option<i64>) -> Result<Vec<ProcessRecord>> {
    rows.iter()
        .map(|row| ProcessRecord::from_row(row, load_level))
        .collect()
}

pub fn arrival_records(rows: &[LogRow], load_level: Option<i64>) -> Result<Vec<ArrivalRecord>> {
    rows.iter()
        .map(|row| ArrivalRecord::from_row(row, load_level))
        .collect()
}

pub fn usage_snapshots(rows: &[LogRow]) -> Result<Vec<UsageSnapshot>> {
    rows.iter().map(UsageSnapshot::from_row).collect()
}

pub fn admission_events(rows: &[LogRow]) -> Result<Vec<AdmissionEvent>> {
    rows.iter().map(AdmissionEvent::from_row).collect()
}
