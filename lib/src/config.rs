//! Analysis configuration: which variants to compare and where their logs are
use crate::aggregation::{Statistic, DEFAULT_PERCENTILES};
use crate::derived_fields::ClusterCapacity;
use crate::error::{AnalysisError, Result};
use crate::record_schema::{LogKind, SchemaVersion};
use crate::variant_comparator::Variant;

use serde_derive::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::{self, File},
    path::{Path, PathBuf},
};

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSource {
    pub path: PathBuf,
    pub schema: SchemaVersion,
    /// Load level of the run; required for logs that do not record `nGenPerTick`.
    #[serde(default)]
    pub load_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    /// Overrides the top-level cluster for this variant's usage logs.
    #[serde(default)]
    pub cluster: Option<ClusterCapacity>,
    #[serde(default)]
    pub processes: Vec<LogSource>,
    #[serde(default)]
    pub added: Vec<LogSource>,
    #[serde(default)]
    pub usage: Vec<LogSource>,
    #[serde(default)]
    pub created: Vec<LogSource>,
    #[serde(default)]
    pub rejected: Vec<LogSource>,
}

impl VariantConfig {
    pub fn variant(&self) -> Variant {
        Variant::new(&self.name)
    }

    pub fn sources(&self) -> impl Iterator<Item = &LogSource> {
        self.processes
            .iter()
            .chain(self.added.iter())
            .chain(self.usage.iter())
            .chain(self.created.iter())
            .chain(self.rejected.iter())
    }

    fn check_slot(&self, slot: &str, sources: &[LogSource], kind: LogKind) -> Result<()> {
        match sources.iter().find(|source| source.schema.kind() != kind) {
            Some(source) => Err(AnalysisError::Config(format!(
                "variant `{}` lists {} under `{}`, which needs a {} schema",
                self.name,
                source.path.display(),
                slot,
                kind.name()
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub cluster: ClusterCapacity,
    /// Ticks up to and including this one are discarded.
    #[serde(default)]
    pub warmup_ticks: i64,
    #[serde(default)]
    pub load_levels: Option<Vec<i64>>,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    pub variants: Vec<VariantConfig>,
}

impl AnalysisConfig {
    /// parse a YAML configuration; relative log paths are resolved against `base_dir`
    pub fn from_yaml_str(contents: &str, base_dir: &Path) -> Result<Self> {
        let mut config: AnalysisConfig = serde_yaml::from_str(contents)?;
        for variant in config.variants.iter_mut() {
            for source in variant
                .processes
                .iter_mut()
                .chain(variant.added.iter_mut())
                .chain(variant.usage.iter_mut())
                .chain(variant.created.iter_mut())
                .chain(variant.rejected.iter_mut())
            {
                if source.path.is_relative() {
                    source.path = base_dir.join(&source.path);
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&contents, base_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            return Err(AnalysisError::Config("no variants are declared".to_string()));
        }
        self.cluster.validate()?;
        for p in &self.percentiles {
            Statistic::Percentile(*p).validate()?;
        }

        let mut names = HashSet::new();
        for variant in &self.variants {
            if !names.insert(variant.name.as_str()) {
                return Err(AnalysisError::Config(format!(
                    "variant `{}` is declared more than once",
                    variant.name
                )));
            }
            if let Some(cluster) = &variant.cluster {
                cluster.validate()?;
            }
            variant.check_slot("processes", &variant.processes, LogKind::Process)?;
            variant.check_slot("added", &variant.added, LogKind::Arrival)?;
            variant.check_slot("usage", &variant.usage, LogKind::Usage)?;
            variant.check_slot("created", &variant.created, LogKind::Admission)?;
            variant.check_slot("rejected", &variant.rejected, LogKind::Admission)?;
            if let Some(source) = variant.sources().find(|source| {
                source.load_level.is_none() && source.schema.position("nGenPerTick").is_none()
            }) {
                return Err(AnalysisError::Config(format!(
                    "variant `{}` must declare a load_level for {}, whose log has no nGenPerTick",
                    variant.name,
                    source.path.display()
                )));
            }
            if variant.created.is_empty() != variant.rejected.is_empty() {
                return Err(AnalysisError::Config(format!(
                    "variant `{}` must declare both created and rejected admission logs, or neither",
                    variant.name
                )));
            }
            if variant.sources().next().is_none() {
                return Err(AnalysisError::Config(format!(
                    "variant `{}` declares no logs",
                    variant.name
                )));
            }
        }
        Ok(())
    }

    /// Every declared log must be a readable file before any parsing starts.
    pub fn check_inputs(&self) -> Result<()> {
        for variant in &self.variants {
            for source in variant.sources() {
                let readable = fs::metadata(&source.path)
                    .map(|metadata| metadata.is_file())
                    .unwrap_or(false)
                    && File::open(&source.path).is_ok();
                if !readable {
                    return Err(AnalysisError::MissingVariantInput {
                        variant: variant.name.clone(),
                        path: source.path.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn capacity_for(&self, variant: &VariantConfig) -> ClusterCapacity {
        variant.cluster.unwrap_or(self.cluster)
    }

    /// Records without a tick cannot be placed in the warm-up window and are kept.
    pub fn keeps_tick(&self, tick: Option<i64>) -> bool {
        tick.map_or(true, |tick| tick > self.warmup_ticks)
    }

    pub fn keeps_load_level(&self, load_level: Option<i64>) -> bool {
        match (&self.load_levels, load_level) {
            (None, _) => true,
            (Some(levels), Some(load_level)) => levels.contains(&load_level),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = "
cluster:
  num_machines: 2
  cores_per_machine: 4
warmup_ticks: 100
variants:
  - name: ideal
    cluster: { num_machines: 1, cores_per_machine: 8, mem_per_machine: 64000 }
    usage:
      - { path: ideal_usage.txt, schema: usage_queue }
    created:
      - { path: procs_created.txt, schema: admission_deadline }
    rejected:
      - { path: ideal_said_no.txt, schema: admission_deadline }
  - name: actual
    processes:
      - { path: /abs/procs_done.txt, schema: procs_done_sla, load_level: 30 }
";

    #[test]
    fn test_from_yaml_str_resolves_paths_and_defaults() {
        let config = AnalysisConfig::from_yaml_str(SAMPLE_CONFIG, Path::new("runs")).unwrap();
        assert_eq!(config.cluster.mem_per_machine, 32000);
        assert_eq!(config.percentiles, vec![50.0, 90.0, 95.0, 99.0]);
        assert_eq!(config.load_levels, None);
        assert_eq!(
            config.variants[0].usage[0].path,
            PathBuf::from("runs/ideal_usage.txt")
        );
        assert_eq!(
            config.variants[1].processes[0].path,
            PathBuf::from("/abs/procs_done.txt")
        );
        assert_eq!(config.variants[1].processes[0].load_level, Some(30));
        assert_eq!(config.capacity_for(&config.variants[0]).cores_per_machine, 8);
        assert_eq!(config.capacity_for(&config.variants[1]).cores_per_machine, 4);
    }

    #[test]
    fn test_validate_rejects_duplicate_variant() {
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - { name: edf, usage: [{ path: a.txt, schema: usage_cluster_memory }] }
  - { name: edf, usage: [{ path: b.txt, schema: usage_cluster_memory }] }
";
        assert!(matches!(
            AnalysisConfig::from_yaml_str(contents, Path::new(".")),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_schema_in_wrong_slot() {
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - { name: edf, usage: [{ path: a.txt, schema: procs_done_cluster_priced }] }
";
        assert!(matches!(
            AnalysisConfig::from_yaml_str(contents, Path::new(".")),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_validate_requires_load_level_without_n_gen_per_tick() {
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - { name: ideal, processes: [{ path: a.txt, schema: procs_done_sla }] }
";
        assert!(matches!(
            AnalysisConfig::from_yaml_str(contents, Path::new(".")),
            Err(AnalysisError::Config(_))
        ));
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - { name: ideal, added: [{ path: a.txt, schema: procs_added }] }
";
        assert!(AnalysisConfig::from_yaml_str(contents, Path::new(".")).is_err());
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - name: ideal
    processes: [{ path: a.txt, schema: procs_done_cluster_priced }]
    added: [{ path: b.txt, schema: procs_added, load_level: 10 }]
";
        let config = AnalysisConfig::from_yaml_str(contents, Path::new("runs")).unwrap();
        assert_eq!(config.variants[0].added[0].path, PathBuf::from("runs/b.txt"));
    }

    #[test]
    fn test_validate_rejects_half_declared_admission() {
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - { name: edf, rejected: [{ path: a.txt, schema: admission_price }] }
";
        assert!(AnalysisConfig::from_yaml_str(contents, Path::new(".")).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_percentile_and_unknown_schema() {
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
percentiles: [50, 120]
variants:
  - { name: edf, usage: [{ path: a.txt, schema: usage_cluster_memory }] }
";
        assert!(matches!(
            AnalysisConfig::from_yaml_str(contents, Path::new(".")),
            Err(AnalysisError::InvalidStatistic(_))
        ));
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 1 }
variants:
  - { name: edf, usage: [{ path: a.txt, schema: usage_v9 }] }
";
        assert!(matches!(
            AnalysisConfig::from_yaml_str(contents, Path::new(".")),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_check_inputs_reports_missing_variant_log() {
        let contents = "
cluster: { num_machines: 1, cores_per_machine: 8 }
variants:
  - { name: ideal, usage: [{ path: usage_queue.txt, schema: usage_queue }] }
  - { name: hermod, usage: [{ path: hermod_usage.txt, schema: usage_machine_memory }] }
";
        let config =
            AnalysisConfig::from_yaml_str(contents, Path::new("tests/sample_logs")).unwrap();
        match config.check_inputs() {
            Err(AnalysisError::MissingVariantInput { variant, .. }) => {
                assert_eq!(variant, "hermod")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tick_and_load_level_filters() {
        let mut config = AnalysisConfig::from_yaml_str(SAMPLE_CONFIG, Path::new(".")).unwrap();
        assert!(!config.keeps_tick(Some(100)));
        assert!(config.keeps_tick(Some(101)));
        assert!(config.keeps_tick(None));
        assert!(config.keeps_load_level(None));

        config.load_levels = Some(vec![10, 30]);
        assert!(config.keeps_load_level(Some(30)));
        assert!(!config.keeps_load_level(Some(20)));
        assert!(!config.keeps_load_level(None));
    }
}
