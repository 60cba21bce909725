use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a source into a table. Fatal for the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("input file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read {source_name}: {source}")]
    Read {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input in {source_name}{}: {reason}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Malformed {
        source_name: String,
        line: Option<u64>,
        reason: String,
    },

    #[error("{source_name} has no header row")]
    Empty { source_name: String },

    #[error("{source_name} has duplicate column name '{name}'")]
    DuplicateColumn { source_name: String, name: String },
}

/// A column needs filling but offers nothing to fill from. Fatal for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot impute column '{column}': {missing} missing value(s) and no observed values")]
pub struct ImputationError {
    pub column: String,
    pub missing: usize,
}

/// Which statistical procedure a result or failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Normality,
    Independence,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normality => f.write_str("normality"),
            Self::Independence => f.write_str("independence"),
        }
    }
}

/// Why a single test could not produce a result
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestFailure {
    #[error("need at least {required} observations, got {actual}")]
    TooFewObservations { required: usize, actual: usize },

    #[error("column has zero variance")]
    ZeroVariance,

    #[error("degenerate contingency table: {detail}")]
    DegenerateTable { detail: String },

    #[error("test statistic is not finite")]
    NonFinite,

    #[error("reference distribution unavailable: {detail}")]
    Distribution { detail: String },
}

/// A statistical test that is undefined for its input. Local: recorded in
/// the report next to the successful results.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{kind} test on [{}] failed: {reason}", .columns.join(", "))]
pub struct TestError {
    pub kind: TestKind,
    pub columns: Vec<String>,
    pub reason: TestFailure,
}

#[derive(Error, Debug)]
pub enum StatError {
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("cleaning failed: {0}")]
    Imputation(#[from] ImputationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid dataset: {0}")]
    Shape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatError {
    /// Pipeline stage the error originated from
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::Imputation(_) => "clean",
            Self::Config(_) => "config",
            Self::Shape(_) => "classify",
            Self::Io(_) | Self::Json(_) => "output",
        }
    }
}

pub type Result<T> = std::result::Result<T, StatError>;
