//! Group records by key and compute descriptive statistics per group
use crate::error::{AnalysisError, Result};
use crate::record_schema::ClassTag;
use crate::table::{Row, Table, Value};

use std::collections::BTreeMap;

pub const DEFAULT_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Count,
    Min,
    Max,
    Mean,
    Sum,
    /// `p` in [0, 100]
    Percentile(f64),
}

impl Statistic {
    pub fn column_name(&self) -> String {
        match self {
            Statistic::Count => "count".to_string(),
            Statistic::Min => "min".to_string(),
            Statistic::Max => "max".to_string(),
            Statistic::Mean => "mean".to_string(),
            Statistic::Sum => "sum".to_string(),
            Statistic::Percentile(p) => format!("p{}", p),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Statistic::Percentile(p) if !(0.0..=100.0).contains(p) => Err(
                AnalysisError::InvalidStatistic(format!("percentile {} is outside [0, 100]", p)),
            ),
            _ => Ok(()),
        }
    }

    /// `sorted` must be ascending and non-empty.
    fn compute(&self, sorted: &[f64]) -> f64 {
        match self {
            Statistic::Count => sorted.len() as f64,
            Statistic::Min => sorted[0],
            Statistic::Max => sorted[sorted.len() - 1],
            // rounding can put sum / n just outside the observed range
            Statistic::Mean => (sorted.iter().sum::<f64>() / sorted.len() as f64)
                .clamp(sorted[0], sorted[sorted.len() - 1]),
            Statistic::Sum => sorted.iter().sum(),
            Statistic::Percentile(p) => percentile(sorted, *p),
        }
    }

    fn cell(&self, value: f64) -> Value {
        match self {
            Statistic::Count => Value::Int(value as i64),
            _ => Value::Float(value),
        }
    }
}

pub fn statistic_columns(statistics: &[Statistic]) -> Vec<String> {
    statistics.iter().map(Statistic::column_name).collect()
}

/// count, min, max, mean, then the given percentiles
pub fn summary_statistics(percentiles: &[f64]) -> Vec<Statistic> {
    let mut statistics = vec![
        Statistic::Count,
        Statistic::Min,
        Statistic::Max,
        Statistic::Mean,
    ];
    statistics.extend(percentiles.iter().map(|p| Statistic::Percentile(*p)));
    statistics
}

/// Percentile with linear interpolation between order statistics.
///
/// `rank = p / 100 * (n - 1)`; the result lies between the two values around
/// `rank`, weighted by its fractional part. `sorted` must be ascending and
/// non-empty.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// A grouping key that knows how to print itself into a table row.
pub trait GroupKey: Ord + Clone {
    fn key_columns() -> &'static [&'static str];
    fn write_key(&self, row: &mut Row);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadLevel(pub i64);

impl GroupKey for LoadLevel {
    fn key_columns() -> &'static [&'static str] {
        &["loadLevel"]
    }

    fn write_key(&self, row: &mut Row) {
        row.set("loadLevel", self.0);
    }
}

/// Ordered by load level, then by the class tag's natural order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadClassKey {
    pub load_level: i64,
    pub class: ClassTag,
}

impl LoadClassKey {
    pub fn new(load_level: i64, class: &str) -> Self {
        Self {
            load_level,
            class: ClassTag::new(class),
        }
    }
}

impl GroupKey for LoadClassKey {
    fn key_columns() -> &'static [&'static str] {
        &["loadLevel", "class"]
    }

    fn write_key(&self, row: &mut Row) {
        row.set("loadLevel", self.load_level);
        row.set("class", self.class.as_str());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTickKey {
    pub load_level: i64,
    pub tick: i64,
}

impl GroupKey for LoadTickKey {
    fn key_columns() -> &'static [&'static str] {
        &["loadLevel", "tick"]
    }

    fn write_key(&self, row: &mut Row) {
        row.set("loadLevel", self.load_level);
        row.set("tick", self.tick);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary<K> {
    pub key: K,
    pub count: usize,
    pub statistics: Vec<(Statistic, f64)>,
}

impl<K: GroupKey> GroupSummary<K> {
    pub fn get(&self, statistic: Statistic) -> Option<f64> {
        self.statistics
            .iter()
            .find(|(candidate, _)| *candidate == statistic)
            .map(|(_, value)| *value)
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        self.key.write_key(&mut row);
        for (statistic, value) in &self.statistics {
            row.set(&statistic.column_name(), statistic.cell(*value));
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation<K> {
    pub statistics: Vec<Statistic>,
    pub groups: Vec<GroupSummary<K>>,
    /// records without a key or without a value
    pub skipped: usize,
}

impl<K: GroupKey> Aggregation<K> {
    pub fn columns(&self) -> Vec<String> {
        K::key_columns()
            .iter()
            .map(|column| column.to_string())
            .chain(statistic_columns(&self.statistics))
            .collect()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(self.columns());
        for group in &self.groups {
            table.push(group.to_row());
        }
        table
    }

    pub fn grouped_count(&self) -> usize {
        self.groups.iter().map(|group| group.count).sum()
    }
}

/// Compute `statistics` over `value_fn` for every distinct `key_fn` value.
///
/// A record takes part only when both its key and its value are defined;
/// the others are counted in `skipped`. Groups come out ordered by key and
/// empty groups never appear.
pub fn aggregate<T, K, F, V>(
    records: &[T],
    key_fn: F,
    value_fn: V,
    statistics: &[Statistic],
) -> Result<Aggregation<K>>
where
    K: GroupKey,
    F: Fn(&T) -> Option<K>,
    V: Fn(&T) -> Option<f64>,
{
    for statistic in statistics {
        statistic.validate()?;
    }

    let mut grouped: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    let mut skipped = 0;
    for record in records {
        match (key_fn(record), value_fn(record)) {
            (Some(key), Some(value)) => {
                if !value.is_finite() {
                    return Err(AnalysisError::InvalidStatistic(format!(
                        "cannot aggregate a non-finite value ({})",
                        value
                    )));
                }
                grouped.entry(key).or_default().push(value);
            }
            _ => skipped += 1,
        }
    }

    let groups = grouped
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            GroupSummary {
                key,
                count: values.len(),
                statistics: statistics
                    .iter()
                    .map(|statistic| (*statistic, statistic.compute(&values)))
                    .collect(),
            }
        })
        .collect();

    Ok(Aggregation {
        statistics: statistics.to_vec(),
        groups,
        skipped,
    })
}

pub fn count_by_key<T, K, F>(records: &[T], key_fn: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&T) -> Option<K>,
{
    let mut counts = BTreeMap::new();
    for key in records.iter().filter_map(key_fn) {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_samples() -> Vec<(i64, &'static str, f64)> {
        vec![
            (10, "1", 50.0),
            (10, "1", 200.0),
            (10, "4", 80.0),
            (20, "1", 10.0),
            (20, "1", 30.0),
            (20, "1", 20.0),
            (20, "1", 90.0),
            (10, "100", 5.0),
        ]
    }

    fn by_load_class(sample: &(i64, &'static str, f64)) -> Option<LoadClassKey> {
        Some(LoadClassKey::new(sample.0, sample.1))
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let sorted = [50.0, 200.0];
        assert_eq!(percentile(&sorted, 50.0), 125.0);
        assert_eq!(percentile(&sorted, 0.0), 50.0);
        assert_eq!(percentile(&sorted, 100.0), 200.0);

        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 25.0), 2.0);
        assert!((percentile(&sorted, 90.0) - 4.6).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
    }

    #[test]
    fn test_statistic_column_names() {
        assert_eq!(Statistic::Percentile(50.0).column_name(), "p50");
        assert_eq!(Statistic::Percentile(99.9).column_name(), "p99.9");
        assert_eq!(Statistic::Mean.column_name(), "mean");
        assert_eq!(Statistic::Sum.column_name(), "sum");
    }

    #[test]
    fn test_aggregate_two_record_scenario() {
        let samples = vec![(10, "1", 50.0), (10, "1", 200.0)];
        let aggregation = aggregate(
            &samples,
            by_load_class,
            |sample| Some(sample.2),
            &summary_statistics(&[50.0]),
        )
        .unwrap();
        let group = &aggregation.groups[0];
        assert_eq!(group.count, 2);
        assert_eq!(group.get(Statistic::Mean), Some(125.0));
        assert_eq!(group.get(Statistic::Percentile(50.0)), Some(125.0));
        assert_eq!(group.get(Statistic::Min), Some(50.0));
        assert_eq!(group.get(Statistic::Max), Some(200.0));
    }

    #[test]
    fn test_aggregate_orders_by_load_then_class() {
        let aggregation = aggregate(
            &create_samples(),
            by_load_class,
            |sample| Some(sample.2),
            &[Statistic::Mean],
        )
        .unwrap();
        let keys: Vec<(i64, &str)> = aggregation
            .groups
            .iter()
            .map(|group| (group.key.load_level, group.key.class.as_str()))
            .collect();
        assert_eq!(keys, vec![(10, "1"), (10, "4"), (10, "100"), (20, "1")]);
    }

    #[test]
    fn test_aggregate_is_a_partition() {
        let mut samples = create_samples();
        samples.push((30, "1", f64::NAN));
        let aggregation = aggregate(
            &samples,
            |sample| {
                if sample.0 == 30 {
                    None
                } else {
                    Some(LoadLevel(sample.0))
                }
            },
            |sample| Some(sample.2),
            &[Statistic::Count],
        )
        .unwrap();
        assert_eq!(aggregation.skipped, 1);
        assert_eq!(aggregation.grouped_count(), samples.len() - 1);
        assert_eq!(aggregation.groups.len(), 2);
    }

    #[test]
    fn test_aggregate_statistics_are_ordered() {
        let aggregation = aggregate(
            &create_samples(),
            by_load_class,
            |sample| Some(sample.2),
            &summary_statistics(&DEFAULT_PERCENTILES),
        )
        .unwrap();
        for group in &aggregation.groups {
            let min = group.get(Statistic::Min).unwrap();
            let mean = group.get(Statistic::Mean).unwrap();
            let max = group.get(Statistic::Max).unwrap();
            assert!(min <= mean && mean <= max);
            let percentiles: Vec<f64> = DEFAULT_PERCENTILES
                .iter()
                .map(|p| group.get(Statistic::Percentile(*p)).unwrap())
                .collect();
            assert!(percentiles.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }

    #[test]
    fn test_aggregate_mean_stays_within_min_and_max() {
        let samples = vec![(10, "1", 0.1), (10, "1", 0.1), (10, "1", 0.1)];
        let aggregation = aggregate(
            &samples,
            by_load_class,
            |sample| Some(sample.2),
            &[Statistic::Min, Statistic::Mean, Statistic::Max],
        )
        .unwrap();
        let group = &aggregation.groups[0];
        let min = group.get(Statistic::Min).unwrap();
        let mean = group.get(Statistic::Mean).unwrap();
        let max = group.get(Statistic::Max).unwrap();
        assert!(min <= mean && mean <= max);
        assert_eq!(mean, 0.1);
    }

    #[test]
    fn test_aggregate_rejects_bad_percentile() {
        let result = aggregate(
            &create_samples(),
            by_load_class,
            |sample| Some(sample.2),
            &[Statistic::Percentile(101.0)],
        );
        assert!(matches!(result, Err(AnalysisError::InvalidStatistic(_))));
    }

    #[test]
    fn test_aggregate_rejects_non_finite_value() {
        let result = aggregate(
            &[(10, "1", f64::INFINITY)],
            by_load_class,
            |sample| Some(sample.2),
            &[Statistic::Mean],
        );
        assert!(matches!(result, Err(AnalysisError::InvalidStatistic(_))));
    }

    #[test]
    fn test_aggregate_empty_input_has_no_groups() {
        let samples: Vec<(i64, &'static str, f64)> = Vec::new();
        let aggregation =
            aggregate(&samples, by_load_class, |sample| Some(sample.2), &[Statistic::Mean])
                .unwrap();
        assert!(aggregation.groups.is_empty());
        assert!(aggregation.to_table().is_empty());
    }

    #[test]
    fn test_aggregation_to_table_columns() {
        let aggregation = aggregate(
            &create_samples(),
            by_load_class,
            |sample| Some(sample.2),
            &summary_statistics(&[50.0]),
        )
        .unwrap();
        let table = aggregation.to_table();
        assert_eq!(
            table.columns,
            vec!["loadLevel", "class", "count", "min", "max", "mean", "p50"]
        );
        assert_eq!(table.rows[0].get("count"), Some(&Value::Int(2)));
        assert_eq!(table.rows[0].get("class"), Some(&Value::Text("1".to_string())));
    }

    #[test]
    fn test_count_by_key() {
        let counts = count_by_key(&create_samples(), |sample| Some(LoadLevel(sample.0)));
        assert_eq!(counts[&LoadLevel(10)], 4);
        assert_eq!(counts[&LoadLevel(20)], 4);
    }
}
