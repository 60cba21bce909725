//! Consolidated public types for the tabstat crate
//!
//! This module contains the dataset model, the analysis result types, and
//! the visualization sink trait shared across the pipeline stages.

pub use crate::error::{Result, StatError, TestError, TestKind};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Raw Table Types
// ============================================================================

/// A loaded delimited file: unique headers plus rows of cells.
/// `None` is the missing-value marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Get number of rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get number of columns
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.headers.len()
    }

    /// Get a column's cells by index
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<Option<&str>>> {
        if index >= self.headers.len() {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).and_then(|c| c.as_deref()))
                .collect(),
        )
    }
}

// ============================================================================
// Dataset Types
// ============================================================================

/// Semantic type of a column, fixed by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Categorical,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => f.write_str("numeric"),
            Self::Categorical => f.write_str("categorical"),
        }
    }
}

/// Typed cells of a column. The variant is the column's semantic type tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// Hashable view of one cell, used for row identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKey<'a> {
    Missing,
    Number(u64),
    Text(&'a str),
}

impl Column {
    #[must_use]
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    #[must_use]
    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Categorical(values),
        }
    }

    #[must_use]
    pub const fn semantic_type(&self) -> SemanticType {
        match self.values {
            ColumnValues::Numeric(_) => SemanticType::Numeric,
            ColumnValues::Categorical(_) => SemanticType::Categorical,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Count of missing markers
    #[must_use]
    pub fn missing_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnValues::Categorical(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Observed numeric values in row order (empty for categorical columns)
    #[must_use]
    pub fn observed_numbers(&self) -> Vec<f64> {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().flatten().copied().collect(),
            ColumnValues::Categorical(_) => Vec::new(),
        }
    }

    /// Observed categorical values in row order (empty for numeric columns)
    #[must_use]
    pub fn observed_labels(&self) -> Vec<&str> {
        match &self.values {
            ColumnValues::Categorical(v) => v.iter().flatten().map(String::as_str).collect(),
            ColumnValues::Numeric(_) => Vec::new(),
        }
    }

    /// Identity of the cell at `row`. `-0.0` and `0.0` share a key.
    #[must_use]
    pub fn cell_key(&self, row: usize) -> CellKey<'_> {
        match &self.values {
            ColumnValues::Numeric(v) => match v.get(row).copied().flatten() {
                Some(x) => CellKey::Number((x + 0.0).to_bits()),
                None => CellKey::Missing,
            },
            ColumnValues::Categorical(v) => match v.get(row).and_then(Option::as_deref) {
                Some(s) => CellKey::Text(s),
                None => CellKey::Missing,
            },
        }
    }

    /// New column of the same type keeping only the given rows, in order
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let values = match &self.values {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(rows.iter().map(|&r| v[r]).collect()),
            ColumnValues::Categorical(v) => {
                ColumnValues::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        };
        Self {
            name: self.name.clone(),
            values,
        }
    }
}

/// Ordered, equal-length, uniquely named columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from columns
    ///
    /// # Errors
    /// Returns error if column lengths differ or names repeat
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);

        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(StatError::Shape(format!(
                    "column '{}' has {} rows, expected {n_rows}",
                    column.name,
                    column.len()
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(StatError::Shape(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.semantic_type() == SemanticType::Numeric)
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.semantic_type() == SemanticType::Categorical)
    }

    /// True if any cell holds the missing marker
    #[must_use]
    pub fn has_missing(&self) -> bool {
        self.columns.iter().any(|c| c.missing_count() > 0)
    }

    #[must_use]
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

// ============================================================================
// Cleaning Types
// ============================================================================

/// Fill rule for numeric columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericImputation {
    #[default]
    Mean,
    Median,
}

/// Fill rule for categorical columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoricalImputation {
    /// Most frequent value; ties go to the first one encountered
    #[default]
    Mode,
    Constant(String),
}

/// Mapping from semantic type to fill rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImputationStrategy {
    pub numeric: NumericImputation,
    pub categorical: CategoricalImputation,
}

/// Value written into missing cells
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputationRecord {
    pub column: String,
    pub rule: &'static str,
    pub fill: FillValue,
    pub filled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub original_rows: usize,
    pub rows: usize,
    pub duplicates_removed: usize,
    pub imputations: Vec<ImputationRecord>,
}

// ============================================================================
// Descriptive Types
// ============================================================================

/// Descriptive statistics for a numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined below two observations
    pub std_dev: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub iqr: f64,
}

impl NumericSummary {
    /// Format as a summary string
    #[must_use]
    pub fn summary(&self) -> String {
        let std = self
            .std_dev
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}"));
        format!(
            "{}: n={}, mean={:.2}, std={std}, min={:.2}, Q1={:.2}, median={:.2}, Q3={:.2}, max={:.2}, IQR={:.2}",
            self.name, self.count, self.mean, self.min, self.q1, self.median, self.q3, self.max, self.iqr
        )
    }
}

/// Equal-width bins over a numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub name: String,
    /// `counts.len() + 1` ascending edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
}

/// Value counts for a categorical column, most frequent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyTable {
    pub name: String,
    pub total: usize,
    pub entries: Vec<FrequencyEntry>,
}

impl FrequencyTable {
    #[must_use]
    pub fn count_of(&self, value: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.count)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DescriptiveReport {
    pub numeric: Vec<NumericSummary>,
    pub histograms: Vec<Histogram>,
    pub categorical: Vec<FrequencyTable>,
}

// ============================================================================
// Correlation Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    /// Pearson correlation of average ranks
    Spearman,
}

/// Square correlation matrix over numeric columns. `None` cells are undefined
/// (constant column or fewer than two paired observations).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub names: Vec<String>,
    pub matrix: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        self.matrix[i][j]
    }

    /// Name pairs (i < j) whose correlation is undefined
    #[must_use]
    pub fn undefined_pairs(&self) -> Vec<(&str, &str)> {
        let n = self.names.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.matrix[i][j].is_none() {
                    pairs.push((self.names[i].as_str(), self.names[j].as_str()));
                }
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrelationOutcome {
    /// Fewer than two numeric columns
    NotApplicable { numeric_columns: usize },
    Computed(CorrelationMatrix),
}

impl CorrelationOutcome {
    #[must_use]
    pub const fn matrix(&self) -> Option<&CorrelationMatrix> {
        match self {
            Self::Computed(m) => Some(m),
            Self::NotApplicable { .. } => None,
        }
    }
}

// ============================================================================
// Inference Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Normal,
    NotNormal,
    Dependent,
    Independent,
}

impl Conclusion {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::NotNormal => "not normal",
            Self::Dependent => "dependent",
            Self::Independent => "independent",
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub kind: TestKind,
    pub columns: Vec<String>,
    pub statistic: f64,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dof: Option<usize>,
    pub conclusion: Conclusion,
}

/// One entry of the ordered test list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed(TestResult),
    Failed(TestError),
}

impl From<std::result::Result<TestResult, TestError>> for TestOutcome {
    fn from(r: std::result::Result<TestResult, TestError>) -> Self {
        match r {
            Ok(result) => Self::Passed(result),
            Err(e) => Self::Failed(e),
        }
    }
}

impl TestOutcome {
    #[must_use]
    pub const fn kind(&self) -> TestKind {
        match self {
            Self::Passed(r) => r.kind,
            Self::Failed(e) => e.kind,
        }
    }
}

// ============================================================================
// Report Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnType {
    pub name: String,
    pub semantic_type: SemanticType,
    pub missing: usize,
}

/// Everything one pipeline run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub source: String,
    pub loaded_rows: usize,
    pub loaded_columns: usize,
    pub column_types: Vec<ColumnType>,
    pub cleaning: CleaningSummary,
    pub descriptive: DescriptiveReport,
    pub correlation: CorrelationOutcome,
    pub tests: Vec<TestOutcome>,
}

impl AnalysisReport {
    pub fn test_results(&self) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter_map(|t| match t {
            TestOutcome::Passed(r) => Some(r),
            TestOutcome::Failed(_) => None,
        })
    }

    pub fn test_errors(&self) -> impl Iterator<Item = &TestError> {
        self.tests.iter().filter_map(|t| match t {
            TestOutcome::Failed(e) => Some(e),
            TestOutcome::Passed(_) => None,
        })
    }

    /// Hand the chart-ready data to a visualization sink
    pub fn publish(&self, sink: &mut dyn VisualizationSink) {
        for histogram in &self.descriptive.histograms {
            sink.histogram(histogram);
        }
        for table in &self.descriptive.categorical {
            sink.frequencies(table);
        }
        if let Some(matrix) = self.correlation.matrix() {
            sink.correlation(matrix);
        }
    }
}

/// Downstream consumer of chart data. The core never renders.
pub trait VisualizationSink {
    fn histogram(&mut self, histogram: &Histogram);

    fn frequencies(&mut self, table: &FrequencyTable);

    fn correlation(&mut self, matrix: &CorrelationMatrix);
}
