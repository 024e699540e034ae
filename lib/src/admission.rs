//! Join created and rejected admission counts into rejection ratios
use crate::aggregation::{count_by_key, GroupKey, LoadClassKey};
use crate::records::AdmissionEvent;
use crate::table::{Row, Table};

use std::collections::{BTreeMap, BTreeSet};

pub const ADMISSION_COLUMNS: [&str; 5] = [
    "loadLevel",
    "class",
    "createdCount",
    "rejectedCount",
    "rejectionRatio",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRow {
    pub key: LoadClassKey,
    pub created_count: usize,
    pub rejected_count: usize,
    /// `None` when nothing was created for the key.
    pub rejection_ratio: Option<f64>,
}

impl AdmissionRow {
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        self.key.write_key(&mut row);
        row.set("createdCount", self.created_count);
        row.set("rejectedCount", self.rejected_count);
        row.set("rejectionRatio", self.rejection_ratio);
        row
    }
}

/// Full outer join of created and rejected counts.
///
/// Every key present on either side yields one row. A key that was only
/// rejected keeps its counts but has no ratio; a key that was only created
/// has a ratio of zero.
pub fn reconcile(
    created: &BTreeMap<LoadClassKey, usize>,
    rejected: &BTreeMap<LoadClassKey, usize>,
) -> Vec<AdmissionRow> {
    let keys: BTreeSet<&LoadClassKey> = created.keys().chain(rejected.keys()).collect();
    keys.into_iter()
        .map(|key| {
            let created_count = created.get(key).copied().unwrap_or(0);
            let rejected_count = rejected.get(key).copied().unwrap_or(0);
            let rejection_ratio = if created_count == 0 {
                None
            } else {
                Some(rejected_count as f64 / created_count as f64)
            };
            AdmissionRow {
                key: key.clone(),
                created_count,
                rejected_count,
                rejection_ratio,
            }
        })
        .collect()
}

pub fn count_admissions(events: &[AdmissionEvent]) -> BTreeMap<LoadClassKey, usize> {
    count_by_key(events, |event| {
        Some(LoadClassKey {
            load_level: event.load_level,
            class: event.class.clone(),
        })
    })
}

pub fn reconcile_events(created: &[AdmissionEvent], rejected: &[AdmissionEvent]) -> Vec<AdmissionRow> {
    reconcile(&count_admissions(created), &count_admissions(rejected))
}

pub fn admission_table(rows: &[AdmissionRow]) -> Table {
    let mut table = Table::new(ADMISSION_COLUMNS.iter().map(|column| column.to_string()).collect());
    for row in rows {
        table.push(row.to_row());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_schema::ClassTag;
    use crate::table::Value;

    fn create_counts(entries: &[(i64, &str, usize)]) -> BTreeMap<LoadClassKey, usize> {
        entries
            .iter()
            .map(|(load_level, class, count)| (LoadClassKey::new(*load_level, class), *count))
            .collect()
    }

    fn create_event(load_level: i64, tick: i64, class: &str) -> AdmissionEvent {
        AdmissionEvent {
            load_level,
            tick,
            class: ClassTag::new(class),
        }
    }

    #[test]
    fn test_reconcile_rejected_only_key_has_undefined_ratio() {
        let created = create_counts(&[(10, "1", 100)]);
        let rejected = create_counts(&[(10, "1", 5), (10, "4", 2)]);
        let rows = reconcile(&created, &rejected);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, LoadClassKey::new(10, "1"));
        assert_eq!(rows[0].rejection_ratio, Some(0.05));
        assert_eq!(rows[1].key, LoadClassKey::new(10, "4"));
        assert_eq!(rows[1].rejection_ratio, None);
        assert_eq!(rows[1].rejected_count, 2);
        assert_eq!(rows[1].created_count, 0);
    }

    #[test]
    fn test_reconcile_created_only_key_has_zero_ratio() {
        let rows = reconcile(&create_counts(&[(20, "100", 8)]), &BTreeMap::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rejection_ratio, Some(0.0));
        assert_eq!(rows[0].rejected_count, 0);
    }

    #[test]
    fn test_reconcile_is_full_outer_join() {
        let created = create_counts(&[(10, "1", 3), (20, "1", 3), (30, "4", 1)]);
        let rejected = create_counts(&[(20, "1", 1), (40, "1000", 1)]);
        let rows = reconcile(&created, &rejected);
        let union: BTreeSet<&LoadClassKey> = created.keys().chain(rejected.keys()).collect();
        assert_eq!(rows.len(), union.len());
        assert!(rows
            .iter()
            .all(|row| row.rejection_ratio.map_or(true, f64::is_finite)));
    }

    #[test]
    fn test_reconcile_events_counts_per_load_and_class() {
        let created = vec![
            create_event(10, 101, "1"),
            create_event(10, 102, "1"),
            create_event(10, 103, "4"),
            create_event(10, 104, "1"),
        ];
        let rejected = vec![create_event(10, 102, "1")];
        let rows = reconcile_events(&created, &rejected);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].created_count, 3);
        assert_eq!(rows[0].rejected_count, 1);
        assert!((rows[0].rejection_ratio.unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(rows[1].rejection_ratio, Some(0.0));
    }

    #[test]
    fn test_admission_table_marks_undefined_ratio_missing() {
        let rows = reconcile(&BTreeMap::new(), &create_counts(&[(10, "4", 2)]));
        let table = admission_table(&rows);
        assert_eq!(table.columns, ADMISSION_COLUMNS.to_vec());
        assert!(table.rows[0].get("rejectionRatio").unwrap().is_missing());
        assert_eq!(table.rows[0].get("rejectedCount"), Some(&Value::Int(2)));
        assert_eq!(table.rows[0].get("createdCount"), Some(&Value::Int(0)));
    }
}
