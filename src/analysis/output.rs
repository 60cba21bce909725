//! Report writers: text summary, JSON, and chart data

use crate::error::Result;
use crate::structs::{
    AnalysisReport, CorrelationMatrix, CorrelationOutcome, FrequencyTable, Histogram,
    TestOutcome, VisualizationSink,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

/// Most frequent values listed per categorical column in the text summary
const TOP_FREQUENCIES: usize = 10;

/// Build the human readable report
#[must_use]
pub fn build_summary(report: &AnalysisReport) -> String {
    let mut s = String::new();

    let _ = writeln!(s, "=== Dataset ===");
    let _ = writeln!(s, "Source: {}", report.source);
    let _ = writeln!(
        s,
        "Loaded: {} rows x {} columns",
        report.loaded_rows, report.loaded_columns
    );
    for column in &report.column_types {
        let _ = writeln!(
            s,
            "  {}: {} ({} missing)",
            column.name, column.semantic_type, column.missing
        );
    }

    let cleaning = &report.cleaning;
    let _ = writeln!(s, "\n=== Cleaning ===");
    let _ = writeln!(
        s,
        "Rows: {} -> {} ({} duplicates removed)",
        cleaning.original_rows, cleaning.rows, cleaning.duplicates_removed
    );
    for record in &cleaning.imputations {
        let _ = writeln!(
            s,
            "  {}: filled {} with {} = {}",
            record.column, record.filled, record.rule, record.fill
        );
    }

    let _ = writeln!(s, "\n=== Descriptive Statistics ===");
    if report.descriptive.numeric.is_empty() {
        let _ = writeln!(s, "No numeric columns");
    }
    for stats in &report.descriptive.numeric {
        let _ = writeln!(s, "{}", stats.summary());
    }

    let _ = writeln!(s, "\n=== Categorical Frequencies ===");
    if report.descriptive.categorical.is_empty() {
        let _ = writeln!(s, "No categorical columns");
    }
    for table in &report.descriptive.categorical {
        write_frequencies(&mut s, table);
    }

    let _ = writeln!(s, "\n=== Correlation ===");
    match &report.correlation {
        CorrelationOutcome::NotApplicable { numeric_columns } => {
            let _ = writeln!(
                s,
                "Not applicable: {numeric_columns} numeric column(s), need at least 2"
            );
        }
        CorrelationOutcome::Computed(matrix) => write_correlation(&mut s, matrix),
    }

    let _ = writeln!(s, "\n=== Statistical Tests ===");
    if report.tests.is_empty() {
        let _ = writeln!(s, "No tests applicable");
    }
    for test in &report.tests {
        match test {
            TestOutcome::Passed(r) => {
                let dof = r.dof.map(|d| format!(", dof={d}")).unwrap_or_default();
                let _ = writeln!(
                    s,
                    "{} [{}]: statistic={:.4}, p-value={:.4}{} -> {}",
                    r.kind,
                    r.columns.join(", "),
                    r.statistic,
                    r.p_value,
                    dof,
                    r.conclusion
                );
            }
            TestOutcome::Failed(e) => {
                let _ = writeln!(s, "{e}");
            }
        }
    }

    s
}

fn write_frequencies(s: &mut String, table: &FrequencyTable) {
    let _ = writeln!(
        s,
        "{} ({} values, {} distinct):",
        table.name,
        table.total,
        table.entries.len()
    );
    for entry in table.entries.iter().take(TOP_FREQUENCIES) {
        let _ = writeln!(s, "  {}: {}", entry.value, entry.count);
    }
    if table.entries.len() > TOP_FREQUENCIES {
        let _ = writeln!(s, "  ... {} more", table.entries.len() - TOP_FREQUENCIES);
    }
}

fn write_correlation(s: &mut String, matrix: &CorrelationMatrix) {
    let _ = writeln!(s, "Method: {:?}", matrix.method);
    let width = matrix.names.iter().map(String::len).max().unwrap_or(0).max(6);

    let _ = write!(s, "{:width$}", "");
    for name in &matrix.names {
        let _ = write!(s, " {name:>width$}");
    }
    let _ = writeln!(s);

    for (name, row) in matrix.names.iter().zip(&matrix.matrix) {
        let _ = write!(s, "{name:width$}");
        for cell in row {
            match cell {
                Some(r) => {
                    let _ = write!(s, " {r:>width$.3}");
                }
                None => {
                    let _ = write!(s, " {:>width$}", "n/a");
                }
            }
        }
        let _ = writeln!(s);
    }
}

/// Write the report as pretty-printed JSON
///
/// # Errors
/// Returns error if serialization or the write fails
pub fn write_json<W: Write>(writer: W, report: &AnalysisReport) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// A sink that keeps every chart payload it receives
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartData {
    pub histograms: Vec<Histogram>,
    pub frequencies: Vec<FrequencyTable>,
    pub correlation: Option<CorrelationMatrix>,
}

impl ChartData {
    /// Collect the chart payloads of a report
    #[must_use]
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut data = Self::default();
        report.publish(&mut data);
        data
    }
}

impl VisualizationSink for ChartData {
    fn histogram(&mut self, histogram: &Histogram) {
        self.histograms.push(histogram.clone());
    }

    fn frequencies(&mut self, table: &FrequencyTable) {
        self.frequencies.push(table.clone());
    }

    fn correlation(&mut self, matrix: &CorrelationMatrix) {
        self.correlation = Some(matrix.clone());
    }
}
