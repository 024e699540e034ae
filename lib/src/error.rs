//! Error type shared by every stage of the analysis pipeline
use std::{error, fmt, io, path::PathBuf};

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug)]
pub enum ParseErrorKind {
    FieldCount { expected: usize, found: usize },
    Number { field: &'static str, raw: String },
    Empty { field: &'static str },
    Csv(String),
}

#[derive(Debug)]
pub enum AnalysisError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        line: u64,
        kind: ParseErrorKind,
    },
    SchemaKindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    InvalidStatistic(String),
    Capacity(String),
    MissingVariantInput {
        variant: String,
        path: PathBuf,
    },
    Config(String),
    Comparison(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseErrorKind::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            ParseErrorKind::Number { field, raw } => {
                write!(f, "field `{}` is not a number: {:?}", field, raw)
            }
            ParseErrorKind::Empty { field } => write!(f, "field `{}` is empty", field),
            ParseErrorKind::Csv(message) => write!(f, "{}", message),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            AnalysisError::Parse { path, line, kind } => {
                write!(f, "malformed log {} (line {}): {}", path.display(), line, kind)
            }
            AnalysisError::SchemaKindMismatch { expected, found } => {
                write!(f, "expected a {} schema, got a {} schema", expected, found)
            }
            AnalysisError::InvalidStatistic(message) => {
                write!(f, "invalid statistic: {}", message)
            }
            AnalysisError::Capacity(message) => write!(f, "capacity error: {}", message),
            AnalysisError::MissingVariantInput { variant, path } => write!(
                f,
                "variant `{}` declares {} but it is not a readable file",
                variant,
                path.display()
            ),
            AnalysisError::Config(message) => write!(f, "invalid configuration: {}", message),
            AnalysisError::Comparison(message) => {
                write!(f, "cannot compare variants: {}", message)
            }
        }
    }
}

impl error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            AnalysisError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for AnalysisError {
    fn from(err: serde_yaml::Error) -> Self {
        AnalysisError::Config(err.to_string())
    }
}
