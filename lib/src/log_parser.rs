//! Decode comma-separated simulator logs into rows of a declared schema
use crate::error::{AnalysisError, ParseErrorKind, Result};
use crate::record_schema::{ClassTag, FieldKind, FieldSpec, SchemaVersion};

use log::debug;
use rayon::prelude::*;
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    MachineId(Option<u32>),
    Class(ClassTag),
}

/// One log line, typed according to its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub schema: SchemaVersion,
    pub values: Vec<FieldValue>,
}

impl LogRow {
    fn value(&self, name: &str) -> Option<&FieldValue> {
        self.schema
            .position(name)
            .and_then(|index| self.values.get(index))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.schema.position(name).is_some()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.value(name)? {
            FieldValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer columns are widened, so callers can read any numeric column as f64.
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.value(name)? {
            FieldValue::Float(value) => Some(*value),
            FieldValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn machine_id(&self, name: &str) -> Option<u32> {
        match self.value(name)? {
            FieldValue::MachineId(id) => *id,
            _ => None,
        }
    }

    pub fn class(&self, name: &str) -> Option<ClassTag> {
        match self.value(name)? {
            FieldValue::Class(tag) => Some(tag.clone()),
            _ => None,
        }
    }
}

fn parse_field(spec: &FieldSpec, raw: &str) -> std::result::Result<FieldValue, ParseErrorKind> {
    if raw.is_empty() {
        return Err(ParseErrorKind::Empty { field: spec.name });
    }
    let not_a_number = || ParseErrorKind::Number {
        field: spec.name,
        raw: raw.to_owned(),
    };
    match spec.kind {
        FieldKind::Int => {
            if let Ok(value) = raw.parse::<i64>() {
                return Ok(FieldValue::Int(value));
            }
            // The simulator sometimes prints whole numbers with a fraction ("12.00").
            match raw.parse::<f64>() {
                Ok(value)
                    if value.fract() == 0.0
                        && value >= i64::MIN as f64
                        && value < i64::MAX as f64 =>
                {
                    Ok(FieldValue::Int(value as i64))
                }
                _ => Err(not_a_number()),
            }
        }
        FieldKind::Float => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(FieldValue::Float(value)),
            _ => Err(not_a_number()),
        },
        FieldKind::MachineId => {
            let id = raw.parse::<i64>().map_err(|_| not_a_number())?;
            if id < 0 {
                Ok(FieldValue::MachineId(None))
            } else {
                let id = u32::try_from(id).map_err(|_| not_a_number())?;
                Ok(FieldValue::MachineId(Some(id)))
            }
        }
        FieldKind::Class => Ok(FieldValue::Class(ClassTag::new(raw))),
    }
}

/// parse a whole log from a reader
///
/// # Arguments
///
/// *  `reader` - log contents, one record per line, no header
/// *  `schema` - the schema the producer of the log wrote
/// *  `path` - used to locate errors only
///
/// # Returns
///
/// *  every row of the log in file order, or the first malformed row as an error
pub fn parse_log<R: Read>(reader: R, schema: SchemaVersion, path: &Path) -> Result<Vec<LogRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let fields = schema.fields();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record.map_err(|err| AnalysisError::Parse {
            path: path.to_path_buf(),
            line: err.position().map(|position| position.line()).unwrap_or(0),
            kind: ParseErrorKind::Csv(err.to_string()),
        })?;
        // a whitespace-only line trims down to one empty field
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        let line = record.position().map(|position| position.line()).unwrap_or(0);
        if record.len() != fields.len() {
            return Err(AnalysisError::Parse {
                path: path.to_path_buf(),
                line,
                kind: ParseErrorKind::FieldCount {
                    expected: fields.len(),
                    found: record.len(),
                },
            });
        }
        let values = fields
            .iter()
            .zip(record.iter())
            .map(|(spec, raw)| parse_field(spec, raw))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|kind| AnalysisError::Parse {
                path: path.to_path_buf(),
                line,
                kind,
            })?;
        rows.push(LogRow { schema, values });
    }
    Ok(rows)
}

/// load a log file
///
/// # Example
///
/// ```
/// use sla_metrics::log_parser::parse_log_file;
/// use sla_metrics::record_schema::SchemaVersion;
///
/// let rows = parse_log_file("tests/sample_logs/procs_done_priced.txt", SchemaVersion::ProcsDonePriced).unwrap();
/// assert_eq!(rows[0].int("nGenPerTick"), Some(10));
/// ```
pub fn parse_log_file<P: AsRef<Path>>(path: P, schema: SchemaVersion) -> Result<Vec<LogRow>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = parse_log(file, schema, path)?;
    debug!("parsed {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// load several independent log files in parallel
///
/// Results keep the order of `sources`. The first malformed file fails the call.
pub fn parse_log_files(sources: &[(PathBuf, SchemaVersion)]) -> Result<Vec<Vec<LogRow>>> {
    sources
        .par_iter()
        .map(|(path, schema)| parse_log_file(path, *schema))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(contents: &str, schema: SchemaVersion) -> Result<Vec<LogRow>> {
        parse_log(contents.as_bytes(), schema, Path::new("inline.txt"))
    }

    #[test]
    fn test_parse_log_trims_simulator_spacing() {
        let rows = parse_str("10, 3, 0.7, 52.00, 40.00, 12, 0, 0 \n", SchemaVersion::ProcsDonePriced)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].int("nGenPerTick"), Some(10));
        assert_eq!(rows[0].machine_id("machineId"), Some(3));
        assert_eq!(rows[0].class("price"), Some(ClassTag::new("0.7")));
        assert_eq!(rows[0].float("timePassed"), Some(52.0));
        assert_eq!(rows[0].int("numTimesPaged"), Some(0));
    }

    #[test]
    fn test_parse_log_skips_blank_lines() {
        let rows = parse_str("10, 1, 4\n\n10, 2, 1\n", SchemaVersion::AdmissionDeadline).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].class("deadline"), Some(ClassTag::new("1")));
    }

    #[test]
    fn test_parse_log_skips_whitespace_only_lines() {
        let rows = parse_str("10, 101, 4\n   \n\t\n10, 102, 1\n", SchemaVersion::AdmissionDeadline)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].int("tick"), Some(102));
    }

    #[test]
    fn test_parse_log_out_of_range_int_is_fatal() {
        let err = parse_str("1e30, 101, 4\n", SchemaVersion::AdmissionDeadline).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Parse {
                kind: ParseErrorKind::Number {
                    field: "nGenPerTick",
                    ..
                },
                ..
            }
        ));
        let rows = parse_str("-12.00, 101, 4\n", SchemaVersion::AdmissionDeadline).unwrap();
        assert_eq!(rows[0].int("nGenPerTick"), Some(-12));
    }

    #[test]
    fn test_parse_log_negative_machine_id_is_cluster_wide() {
        let rows = parse_str("30, 101, -1, 4, 2.5\n", SchemaVersion::UsageQueue).unwrap();
        assert_eq!(rows[0].machine_id("machineId"), None);
        assert!(rows[0].has_field("machineId"));
    }

    #[test]
    fn test_parse_log_accepts_whole_float_for_int_field() {
        let rows = parse_str("10.00, 5, 1\n", SchemaVersion::AdmissionDeadline).unwrap();
        assert_eq!(rows[0].int("nGenPerTick"), Some(10));
    }

    #[test]
    fn test_parse_log_field_count_mismatch_is_fatal() {
        let err = parse_str("10, 1, 4\n10, 2\n", SchemaVersion::AdmissionDeadline).unwrap_err();
        match err {
            AnalysisError::Parse {
                line,
                kind: ParseErrorKind::FieldCount { expected, found },
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_log_bad_number_is_fatal() {
        let err = parse_str("10, soon, 4\n", SchemaVersion::AdmissionDeadline).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Parse {
                kind: ParseErrorKind::Number { field: "tick", .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_log_rejects_nan_float() {
        let err = parse_str("10, 1, NaN, 4\n", SchemaVersion::UsageClusterMemory).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Parse {
                kind: ParseErrorKind::Number { field: "ticksLeftOver", .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_log_empty_class_is_fatal() {
        let err = parse_str("10, 1, \n", SchemaVersion::AdmissionDeadline).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Parse {
                kind: ParseErrorKind::Empty { field: "deadline" },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_log_file_missing_is_io_error() {
        let err = parse_log_file("tests/sample_logs/no_such_log.txt", SchemaVersion::UsageQueue)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }

    #[test]
    fn test_parse_log_files_keeps_source_order() {
        let sources = vec![
            (
                PathBuf::from("tests/sample_logs/usage_queue.txt"),
                SchemaVersion::UsageQueue,
            ),
            (
                PathBuf::from("tests/sample_logs/procs_created.txt"),
                SchemaVersion::AdmissionDeadline,
            ),
        ];
        let parsed = parse_log_files(&sources).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0][0].schema, SchemaVersion::UsageQueue);
        assert_eq!(parsed[1][0].schema, SchemaVersion::AdmissionDeadline);
    }

    #[test]
    fn test_parse_log_files_fails_on_malformed_file() {
        let sources = vec![
            (
                PathBuf::from("tests/sample_logs/usage_queue.txt"),
                SchemaVersion::UsageQueue,
            ),
            (
                PathBuf::from("tests/sample_logs/malformed_usage.txt"),
                SchemaVersion::UsageQueue,
            ),
        ];
        assert!(matches!(
            parse_log_files(&sources),
            Err(AnalysisError::Parse { .. })
        ));
    }
}
