//! Analysis pipeline that orchestrates every stage

use super::clean::{clean, Cleaned};
use super::inference::{InferenceOptions, Significance};
use crate::csv_reader::delimiter_for;
use crate::structs::{
    AnalysisReport, ColumnType, CorrelationMethod, ImputationStrategy, RawTable, Result,
    StatError,
};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Configuration for the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    /// Field delimiter; `None` picks tab for `.tsv` files and comma otherwise
    pub delimiter: Option<u8>,
    pub imputation: ImputationStrategy,
    /// Histogram bin count; `None` uses Sturges' rule
    pub bins: Option<usize>,
    pub correlation: CorrelationMethod,
    pub significance: Significance,
    pub yates_correction: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            imputation: ImputationStrategy::default(),
            bins: None,
            correlation: CorrelationMethod::default(),
            significance: Significance::default(),
            yates_correction: true,
        }
    }
}

impl AnalysisConfig {
    /// # Errors
    /// Returns `StatError::Config` for a zero bin count or a threshold
    /// outside `(0, 1)`
    pub fn validate(&self) -> Result<()> {
        if self.bins == Some(0) {
            return Err(StatError::Config("histogram bins must be at least 1".into()));
        }
        for (name, alpha) in [
            ("normality alpha", self.significance.normality_alpha),
            ("independence alpha", self.significance.independence_alpha),
        ] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(StatError::Config(format!(
                    "{name} must be between 0 and 1, got {alpha}"
                )));
            }
        }
        Ok(())
    }

    const fn inference(&self) -> InferenceOptions {
        InferenceOptions {
            significance: self.significance,
            yates_correction: self.yates_correction,
        }
    }
}

/// Load a delimited file and run the full analysis on it
///
/// # Errors
/// Returns error if the configuration is invalid, the file cannot be
/// loaded, or a column cannot be imputed. Individual statistical tests
/// that fail are recorded in the report instead.
pub fn run_pipeline(path: &Path, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;

    let delimiter = config
        .delimiter
        .unwrap_or_else(|| delimiter_for(path, false));
    let table = RawTable::from_file(path, delimiter)?;

    analyze_table(&table, config)
}

/// Run classification, cleaning and the analyses on an already loaded table
///
/// # Errors
/// Returns error if the configuration is invalid or a column cannot be imputed
pub fn analyze_table(table: &RawTable, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;

    info!(
        "Analyzing '{}': {} rows x {} columns",
        table.source,
        table.row_count(),
        table.col_count()
    );

    let typed = super::classify::classify(table)?;
    let column_types = typed
        .columns()
        .iter()
        .map(|c| ColumnType {
            name: c.name.clone(),
            semantic_type: c.semantic_type(),
            missing: c.missing_count(),
        })
        .collect();

    let Cleaned { dataset, summary } = clean(&typed, &config.imputation)?;

    let inference = config.inference();
    let (descriptive, (correlation, tests)) = rayon::join(
        || super::descriptive::describe(&dataset, config.bins),
        || {
            rayon::join(
                || super::correlation::correlation_matrix(&dataset, config.correlation),
                || super::inference::run_tests(&dataset, &inference),
            )
        },
    );

    let report = AnalysisReport {
        source: table.source.clone(),
        loaded_rows: table.row_count(),
        loaded_columns: table.col_count(),
        column_types,
        cleaning: summary,
        descriptive,
        correlation,
        tests,
    };

    info!(
        "Analysis complete: {} test result(s), {} test error(s)",
        report.test_results().count(),
        report.test_errors().count()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadError, TestKind};
    use crate::structs::{CorrelationOutcome, SemanticType, TestOutcome};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    fn mixed_csv() -> NamedTempFile {
        let mut lines = vec!["id,height,weight,color,size".to_string()];
        for i in 0..24 {
            let height = 150.0 + f64::from(i % 7) * 4.5;
            let weight = 50.0 + f64::from(i % 5) * 6.0 + f64::from(i) * 0.3;
            let color = ["red", "green", "blue"][(i % 3) as usize];
            let size = if i % 2 == 0 { "S" } else { "L" };
            lines.push(format!("{i},{height},{weight},{color},{size}"));
        }
        // duplicate of the last row and a row with gaps
        let last = lines[lines.len() - 1].clone();
        lines.push(last);
        lines.push("24,NA,61.0,,S".to_string());
        create_test_csv(&lines.join("\n"))
    }

    #[test]
    fn test_full_pipeline() {
        let file = mixed_csv();
        let report = run_pipeline(file.path(), &AnalysisConfig::default()).expect("pipeline");

        assert_eq!(report.loaded_rows, 26);
        assert_eq!(report.loaded_columns, 5);
        assert_eq!(report.cleaning.duplicates_removed, 1);
        assert_eq!(report.cleaning.rows, 25);
        assert_eq!(report.cleaning.imputations.len(), 2);

        let types: Vec<SemanticType> =
            report.column_types.iter().map(|c| c.semantic_type).collect();
        assert_eq!(
            types,
            vec![
                SemanticType::Numeric,
                SemanticType::Numeric,
                SemanticType::Numeric,
                SemanticType::Categorical,
                SemanticType::Categorical
            ]
        );

        assert_eq!(report.descriptive.numeric.len(), 3);
        for table in &report.descriptive.categorical {
            assert_eq!(table.total, report.cleaning.rows);
        }

        let corr = report.correlation.matrix().expect("correlation");
        assert_eq!(corr.names, vec!["id", "height", "weight"]);

        // 3 normality tests followed by one independence test
        let kinds: Vec<TestKind> = report.tests.iter().map(TestOutcome::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TestKind::Normality,
                TestKind::Normality,
                TestKind::Normality,
                TestKind::Independence
            ]
        );
        for result in report.test_results() {
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn test_scenario_dedup_and_impute() {
        let file = create_test_csv("a,b\n1,x\n1,x\n,y\n");
        let report = run_pipeline(file.path(), &AnalysisConfig::default()).expect("pipeline");

        assert_eq!(report.cleaning.rows, 2);
        assert_eq!(report.descriptive.numeric[0].count, 2);
        assert!((report.descriptive.numeric[0].mean - 1.0).abs() < 1e-12);
        assert_eq!(
            report.correlation,
            CorrelationOutcome::NotApplicable { numeric_columns: 1 }
        );
        // one categorical column: no independence tests
        assert!(report
            .tests
            .iter()
            .all(|t| t.kind() == TestKind::Normality));
    }

    #[test]
    fn test_all_missing_column_aborts() {
        let file = create_test_csv("a,empty\n1,\n2,NA\n3,\n");
        let err = run_pipeline(file.path(), &AnalysisConfig::default()).unwrap_err();

        assert_eq!(err.stage(), "clean");
        match err {
            StatError::Imputation(e) => assert_eq!(e.column, "empty"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_fails_fast() {
        let err = run_pipeline(Path::new("/nonexistent/data.csv"), &AnalysisConfig::default())
            .unwrap_err();
        assert!(matches!(err, StatError::Load(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_config() {
        let config = AnalysisConfig {
            significance: Significance {
                normality_alpha: 1.5,
                ..Significance::default()
            },
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(StatError::Config(_))));

        let config = AnalysisConfig {
            bins: Some(0),
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(StatError::Config(_))));
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_tsv_delimiter_override() {
        let file = create_test_csv("x\ty\n1\t2\n3\t5\n4\t4\n");
        let config = AnalysisConfig {
            delimiter: Some(b'\t'),
            ..AnalysisConfig::default()
        };
        let report = run_pipeline(file.path(), &config).expect("pipeline");

        assert_eq!(report.loaded_columns, 2);
        assert!(report.correlation.matrix().is_some());
    }
}
