//! Align the same summary across scheduler variants.
//!
//! The output has one row per (key, variant) so that a presentation layer can
//! facet or color by variant without recomputing anything. Variants are an
//! open list of names; a variant without rows is left out rather than filled
//! with zeros.
use crate::admission::{AdmissionRow, ADMISSION_COLUMNS};
use crate::aggregation::{GroupKey, GroupSummary, LoadClassKey};
use crate::derived_fields::{LateJobSummary, LATE_JOB_COLUMNS};
use crate::error::{AnalysisError, Result};
use crate::table::{Row, Table};

use getset::Getters;
use log::info;
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant(String);

impl Variant {
    pub fn new(name: &str) -> Self {
        Self(name.to_owned())
    }

    pub fn ideal() -> Self {
        Self::new("ideal")
    }

    pub fn actual() -> Self {
        Self::new("actual")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn column_names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|column| column.to_string()).collect()
}

/// A keyed summary row that can be placed side by side with other variants.
pub trait SummaryRow {
    type Key: GroupKey;

    fn key(&self) -> &Self::Key;
    fn value_columns(&self) -> Vec<String>;
    fn to_row(&self) -> Row;
}

impl<K: GroupKey> SummaryRow for GroupSummary<K> {
    type Key = K;

    fn key(&self) -> &K {
        &self.key
    }

    fn value_columns(&self) -> Vec<String> {
        self.statistics
            .iter()
            .map(|(statistic, _)| statistic.column_name())
            .collect()
    }

    fn to_row(&self) -> Row {
        GroupSummary::to_row(self)
    }
}

impl SummaryRow for AdmissionRow {
    type Key = LoadClassKey;

    fn key(&self) -> &LoadClassKey {
        &self.key
    }

    fn value_columns(&self) -> Vec<String> {
        column_names(&ADMISSION_COLUMNS[2..])
    }

    fn to_row(&self) -> Row {
        AdmissionRow::to_row(self)
    }
}

impl SummaryRow for LateJobSummary {
    type Key = LoadClassKey;

    fn key(&self) -> &LoadClassKey {
        &self.key
    }

    fn value_columns(&self) -> Vec<String> {
        column_names(&LATE_JOB_COLUMNS[2..])
    }

    fn to_row(&self) -> Row {
        LateJobSummary::to_row(self)
    }
}

#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct VariantComparison<K> {
    /// variants that contributed rows, in declaration order
    variants: Vec<Variant>,
    /// sorted union of keys over all variants
    axis: Vec<K>,
    table: Table,
}

impl<K> VariantComparison<K> {
    pub fn into_table(self) -> Table {
        self.table
    }
}

/// place per-variant summaries into one aligned table
///
/// # Arguments
///
/// *  `inputs` - summaries of each variant, in the order variants should appear
/// *  `value_columns` - columns every summary row carries after its key columns
///
/// # Returns
///
/// *  one row per (key, variant), ordered by key and then by variant order;
///    the columns are the same whether or not any variant has rows
pub fn compare<R: SummaryRow>(
    inputs: Vec<(Variant, Vec<R>)>,
    value_columns: &[String],
) -> Result<VariantComparison<R::Key>> {
    let mut seen = HashSet::new();
    for (variant, _) in &inputs {
        if !seen.insert(variant.clone()) {
            return Err(AnalysisError::Comparison(format!(
                "variant `{}` is given more than once",
                variant
            )));
        }
    }

    let mut variants = Vec::new();
    let mut entries = Vec::new();
    for (variant, rows) in inputs {
        if rows.is_empty() {
            info!("variant `{}` has no rows and is left out of the comparison", variant);
            continue;
        }
        for row in &rows {
            let columns = row.value_columns();
            if columns != value_columns {
                return Err(AnalysisError::Comparison(format!(
                    "variant `{}` has columns {:?}, expected {:?}",
                    variant, columns, value_columns
                )));
            }
        }
        let variant_index = variants.len();
        for row in &rows {
            let mut cells = Row::new().with("variant", variant.name());
            for (column, value) in row.to_row().iter() {
                cells.set(column, value.clone());
            }
            entries.push((row.key().clone(), variant_index, cells));
        }
        variants.push(variant);
    }

    entries.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0).then(lhs.1.cmp(&rhs.1)));
    let axis: Vec<R::Key> = entries
        .iter()
        .map(|(key, _, _)| key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = std::iter::once("variant".to_string())
        .chain(R::Key::key_columns().iter().map(|column| column.to_string()))
        .chain(value_columns.iter().cloned())
        .collect();
    let mut table = Table::new(columns);
    for (_, _, row) in entries {
        table.push(row);
    }

    Ok(VariantComparison {
        variants,
        axis,
        table,
    })
}
