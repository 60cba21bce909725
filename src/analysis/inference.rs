//! Normality and independence tests
//!
//! Normality uses the D'Agostino-Pearson omnibus test: the skewness and
//! kurtosis z-scores are squared and summed into `K2`, which is compared
//! against a chi-square distribution with 2 degrees of freedom.
//!
//! Independence uses Pearson's chi-square test on the contingency table of
//! two categorical columns, with Yates' continuity correction applied to
//! 2x2 tables unless disabled.

use crate::error::{TestError, TestFailure, TestKind};
use crate::structs::{Column, ColumnValues, Conclusion, Dataset, TestOutcome, TestResult};
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A column is "normal" when its normality p-value exceeds this
pub const DEFAULT_NORMALITY_ALPHA: f64 = 0.05;

/// A pair is "dependent" when its independence p-value is below this
pub const DEFAULT_INDEPENDENCE_ALPHA: f64 = 0.05;

/// The skewness z-score is not defined below this sample size
pub const MIN_NORMALITY_OBSERVATIONS: usize = 8;

/// Significance thresholds for the conclusion labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Significance {
    pub normality_alpha: f64,
    pub independence_alpha: f64,
}

impl Default for Significance {
    fn default() -> Self {
        Self {
            normality_alpha: DEFAULT_NORMALITY_ALPHA,
            independence_alpha: DEFAULT_INDEPENDENCE_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InferenceOptions {
    pub significance: Significance,
    pub yates_correction: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            significance: Significance::default(),
            yates_correction: true,
        }
    }
}

// ============================================================================
// Normality
// ============================================================================

/// Result of the omnibus normality test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalityStatistic {
    pub z_skewness: f64,
    pub z_kurtosis: f64,
    pub k2: f64,
    pub p_value: f64,
}

/// D'Agostino-Pearson K2 test for departure from normality
///
/// # Errors
/// Returns `TestFailure` with fewer than 8 observations, zero variance, or a
/// non-finite statistic
#[allow(clippy::cast_precision_loss, clippy::many_single_char_names)]
pub fn dagostino_pearson(values: &[f64]) -> Result<NormalityStatistic, TestFailure> {
    let count = values.len();
    if count < MIN_NORMALITY_OBSERVATIONS {
        return Err(TestFailure::TooFewObservations {
            required: MIN_NORMALITY_OBSERVATIONS,
            actual: count,
        });
    }
    if values.iter().all(|&v| v == values[0]) {
        return Err(TestFailure::ZeroVariance);
    }
    if count < 20 {
        debug!("Kurtosis z-score is approximate below 20 observations (n={count})");
    }

    let n = count as f64;
    let mean = values.iter().sum::<f64>() / n;
    let moment = |k: i32| values.iter().map(|x| (x - mean).powi(k)).sum::<f64>() / n;
    let m2 = moment(2);
    let m3 = moment(3);
    let m4 = moment(4);
    if m2 <= 0.0 {
        return Err(TestFailure::ZeroVariance);
    }

    // skewness
    let b1 = m3 / m2.powf(1.5);
    let y = b1 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let z_skewness = delta * (y / alpha).asinh();

    // kurtosis
    let b2 = m4 / (m2 * m2);
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 = 24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    let z_kurtosis = (term1 - term2) / (2.0 / (9.0 * a)).sqrt();

    let k2 = z_skewness * z_skewness + z_kurtosis * z_kurtosis;
    if !k2.is_finite() {
        return Err(TestFailure::NonFinite);
    }

    Ok(NormalityStatistic {
        z_skewness,
        z_kurtosis,
        k2,
        p_value: chi_square_sf(k2, 2.0)?,
    })
}

fn normality_test(column: &Column, alpha: f64) -> Result<TestResult, TestError> {
    let values = column.observed_numbers();
    let stat = dagostino_pearson(&values).map_err(|reason| TestError {
        kind: TestKind::Normality,
        columns: vec![column.name.clone()],
        reason,
    })?;

    let conclusion = if stat.p_value > alpha {
        Conclusion::Normal
    } else {
        Conclusion::NotNormal
    };

    Ok(TestResult {
        kind: TestKind::Normality,
        columns: vec![column.name.clone()],
        statistic: stat.k2,
        p_value: stat.p_value,
        dof: None,
        conclusion,
    })
}

/// One normality test per numeric column, in column order
#[must_use]
pub fn normality_tests(dataset: &Dataset, alpha: f64) -> Vec<TestOutcome> {
    let columns: Vec<&Column> = dataset.numeric_columns().collect();
    if columns.is_empty() {
        info!("Normality tests skipped: no numeric columns");
        return Vec::new();
    }

    columns
        .par_iter()
        .map(|column| TestOutcome::from(normality_test(column, alpha)))
        .collect()
}

// ============================================================================
// Independence
// ============================================================================

/// Cross-tabulated co-occurrence counts of two categorical columns.
/// Labels are in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ContingencyTable {
    /// Cross-tabulate two equally long label sequences. Rows where either
    /// side is missing are skipped.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut row_index: HashMap<&str, usize> = HashMap::new();
        let mut col_index: HashMap<&str, usize> = HashMap::new();
        let mut row_labels = Vec::new();
        let mut col_labels = Vec::new();
        let mut cells: Vec<(usize, usize)> = Vec::new();

        for (a, b) in pairs {
            let i = *row_index.entry(a).or_insert_with(|| {
                row_labels.push(a.to_string());
                row_labels.len() - 1
            });
            let j = *col_index.entry(b).or_insert_with(|| {
                col_labels.push(b.to_string());
                col_labels.len() - 1
            });
            cells.push((i, j));
        }

        let mut counts = vec![vec![0usize; col_labels.len()]; row_labels.len()];
        for (i, j) in cells {
            counts[i][j] += 1;
        }

        Self {
            row_labels,
            col_labels,
            counts,
        }
    }

    /// Build the table for two dataset columns
    #[must_use]
    pub fn from_columns(a: &Column, b: &Column) -> Self {
        match (&a.values, &b.values) {
            (ColumnValues::Categorical(xs), ColumnValues::Categorical(ys)) => Self::from_pairs(
                xs.iter()
                    .zip(ys)
                    .filter_map(|(x, y)| Some((x.as_deref()?, y.as_deref()?))),
            ),
            _ => Self::from_pairs(std::iter::empty()),
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
}

/// Pearson's chi-square test of independence
///
/// # Errors
/// Returns `TestFailure::DegenerateTable` for an empty table, a single
/// category on either side, or a zero expected frequency
#[allow(clippy::cast_precision_loss)]
pub fn chi_square_independence(
    table: &ContingencyTable,
    yates_correction: bool,
) -> Result<ChiSquare, TestFailure> {
    let total = table.total();
    if total == 0 {
        return Err(TestFailure::DegenerateTable {
            detail: "no paired observations".into(),
        });
    }

    let row_sums: Vec<usize> = table.counts.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<usize> = (0..table.col_labels.len())
        .map(|j| table.counts.iter().map(|r| r[j]).sum())
        .collect();

    if row_sums.iter().chain(&col_sums).any(|&s| s == 0) {
        return Err(TestFailure::DegenerateTable {
            detail: "zero expected frequency".into(),
        });
    }
    if row_sums.len() < 2 || col_sums.len() < 2 {
        return Err(TestFailure::DegenerateTable {
            detail: format!(
                "{}x{} table has zero degrees of freedom",
                row_sums.len(),
                col_sums.len()
            ),
        });
    }

    let dof = (row_sums.len() - 1) * (col_sums.len() - 1);
    let correct = yates_correction && dof == 1;
    let n = total as f64;

    let mut statistic = 0.0;
    for (i, row) in table.counts.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = row_sums[i] as f64 * col_sums[j] as f64 / n;
            let mut diff = (observed as f64 - expected).abs();
            if correct {
                diff = (diff - 0.5).max(0.0);
            }
            statistic += diff * diff / expected;
        }
    }

    if !statistic.is_finite() {
        return Err(TestFailure::NonFinite);
    }

    Ok(ChiSquare {
        statistic,
        p_value: chi_square_sf(statistic, dof as f64)?,
        dof,
    })
}

fn independence_test(
    a: &Column,
    b: &Column,
    alpha: f64,
    yates_correction: bool,
) -> Result<TestResult, TestError> {
    let columns = vec![a.name.clone(), b.name.clone()];
    let table = ContingencyTable::from_columns(a, b);

    match chi_square_independence(&table, yates_correction) {
        Ok(chi) => Ok(TestResult {
            kind: TestKind::Independence,
            columns,
            statistic: chi.statistic,
            p_value: chi.p_value,
            dof: Some(chi.dof),
            conclusion: if chi.p_value < alpha {
                Conclusion::Dependent
            } else {
                Conclusion::Independent
            },
        }),
        Err(reason) => Err(TestError {
            kind: TestKind::Independence,
            columns,
            reason,
        }),
    }
}

/// One chi-square test per unordered pair of categorical columns (i < j)
#[must_use]
pub fn independence_tests(dataset: &Dataset, alpha: f64, yates_correction: bool) -> Vec<TestOutcome> {
    let columns: Vec<&Column> = dataset.categorical_columns().collect();
    if columns.len() < 2 {
        info!(
            "Independence tests skipped: {} categorical column(s)",
            columns.len()
        );
        return Vec::new();
    }

    let pairs: Vec<(usize, usize)> = (0..columns.len())
        .flat_map(|i| ((i + 1)..columns.len()).map(move |j| (i, j)))
        .collect();

    pairs
        .par_iter()
        .map(|&(i, j)| {
            TestOutcome::from(independence_test(
                columns[i],
                columns[j],
                alpha,
                yates_correction,
            ))
        })
        .collect()
}

/// Normality tests in column order followed by independence tests in pair order
#[must_use]
pub fn run_tests(dataset: &Dataset, options: &InferenceOptions) -> Vec<TestOutcome> {
    info!("Running inferential tests...");

    let mut outcomes = normality_tests(dataset, options.significance.normality_alpha);
    outcomes.extend(independence_tests(
        dataset,
        options.significance.independence_alpha,
        options.yates_correction,
    ));

    for outcome in &outcomes {
        match outcome {
            TestOutcome::Passed(r) => debug!(
                "{} test on {:?}: statistic={:.4}, p-value={:.4} ({})",
                r.kind, r.columns, r.statistic, r.p_value, r.conclusion
            ),
            TestOutcome::Failed(e) => warn!("{e}"),
        }
    }

    outcomes
}

fn chi_square_sf(statistic: f64, dof: f64) -> Result<f64, TestFailure> {
    let dist = ChiSquared::new(dof).map_err(|e| TestFailure::Distribution {
        detail: e.to_string(),
    })?;
    Ok(dist.sf(statistic).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(rows: &[&[usize]]) -> ContingencyTable {
        ContingencyTable {
            row_labels: (0..rows.len()).map(|i| format!("r{i}")).collect(),
            col_labels: (0..rows[0].len()).map(|j| format!("c{j}")).collect(),
            counts: rows.iter().map(|r| r.to_vec()).collect(),
        }
    }

    #[test]
    fn test_skewed_sample_is_not_normal() {
        let values = [
            1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 50.0, 100.0,
            200.0, 1000.0, 1.0, 1.0,
        ];
        let stat = dagostino_pearson(&values).expect("normaltest");

        assert!((stat.z_skewness - 5.242_542_485_581_334).abs() < 1e-9);
        assert!((stat.z_kurtosis - 4.549_207_631_944_559).abs() < 1e-9);
        assert!((stat.k2 - 48.179_541_791_667_93).abs() < 1e-8);
        assert!(stat.p_value < 1e-10);
    }

    #[test]
    fn test_symmetric_sample_is_normal() {
        let values = [
            -1.2, -0.8, -0.5, -0.3, -0.1, 0.0, 0.1, 0.3, 0.5, 0.8, 1.2, -0.2, 0.2, 0.6, -0.6, 1.5,
            -1.5, 0.05, -0.05, 0.9,
        ];
        let stat = dagostino_pearson(&values).expect("normaltest");

        assert!((stat.k2 - 0.089_725_180_568_420_41).abs() < 1e-8);
        assert!((stat.p_value - 0.956_128_854_201_087_5).abs() < 1e-8);
    }

    #[test]
    fn test_normality_preconditions() {
        assert_eq!(
            dagostino_pearson(&[1.0, 2.0, 3.0]),
            Err(TestFailure::TooFewObservations {
                required: 8,
                actual: 3
            })
        );
        assert_eq!(dagostino_pearson(&[4.0; 12]), Err(TestFailure::ZeroVariance));
    }

    #[test]
    fn test_chi_square_reference_table() {
        let chi = chi_square_independence(&counts(&[&[10, 10, 20], &[20, 20, 20]]), true)
            .expect("chi2");

        assert_eq!(chi.dof, 2);
        assert!((chi.statistic - 2.777_777_777_777_777_7).abs() < 1e-12);
        assert!((chi.p_value - 0.249_352_208_777_296_2).abs() < 1e-9);
    }

    #[test]
    fn test_yates_correction_on_two_by_two() {
        let table = counts(&[&[12, 5], &[7, 7]]);

        let corrected = chi_square_independence(&table, true).expect("chi2");
        assert_eq!(corrected.dof, 1);
        assert!((corrected.statistic - 0.641_120_263_895_031_7).abs() < 1e-9);
        assert!((corrected.p_value - 0.423_305_424_322_418_4).abs() < 1e-6);

        let plain = chi_square_independence(&table, false).expect("chi2");
        assert!((plain.statistic - 1.371_646_026_831_785_4).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_tables() {
        let single_row = counts(&[&[3, 4]]);
        assert!(matches!(
            chi_square_independence(&single_row, true),
            Err(TestFailure::DegenerateTable { .. })
        ));

        let zero_col = counts(&[&[3, 0], &[4, 0]]);
        assert!(matches!(
            chi_square_independence(&zero_col, true),
            Err(TestFailure::DegenerateTable { .. })
        ));

        let empty = ContingencyTable::from_pairs(std::iter::empty());
        assert!(matches!(
            chi_square_independence(&empty, true),
            Err(TestFailure::DegenerateTable { .. })
        ));
    }

    #[test]
    fn test_contingency_from_pairs() {
        let table = ContingencyTable::from_pairs(vec![("a", "x"), ("b", "x"), ("a", "y"), ("a", "x")]);
        assert_eq!(table.row_labels, vec!["a", "b"]);
        assert_eq!(table.col_labels, vec!["x", "y"]);
        assert_eq!(table.counts, vec![vec![2, 1], vec![1, 0]]);
        assert_eq!(table.total(), 4);
    }

    #[test]
    fn test_one_bad_pair_does_not_block_others() {
        let dataset = Dataset::new(vec![
            Column::categorical("a", ["x", "x", "y", "y"].iter().map(|s| Some((*s).to_string())).collect()),
            Column::categorical("b", ["p", "q", "p", "q"].iter().map(|s| Some((*s).to_string())).collect()),
            Column::categorical("k", ["c", "c", "c", "c"].iter().map(|s| Some((*s).to_string())).collect()),
        ])
        .expect("dataset");

        let outcomes = independence_tests(&dataset, DEFAULT_INDEPENDENCE_ALPHA, true);
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(&outcomes[0], TestOutcome::Passed(r) if r.columns == ["a", "b"]));
        assert!(matches!(&outcomes[1], TestOutcome::Failed(e) if e.columns == ["a", "k"]));
        assert!(matches!(&outcomes[2], TestOutcome::Failed(e) if e.columns == ["b", "k"]));
    }

    #[test]
    fn test_single_categorical_column_skips_independence() {
        let dataset = Dataset::new(vec![
            Column::numeric("n", (0..10).map(|i| Some(f64::from(i * i))).collect()),
            Column::categorical("c", (0..10).map(|i| Some(format!("v{}", i % 3))).collect()),
        ])
        .expect("dataset");

        let outcomes = run_tests(&dataset, &InferenceOptions::default());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].kind(), TestKind::Normality);
        if let TestOutcome::Passed(r) = &outcomes[0] {
            assert!((0.0..=1.0).contains(&r.p_value));
        } else {
            panic!("normality test should pass on 10 distinct values");
        }
    }

    #[test]
    fn test_conclusion_thresholds() {
        let dataset = Dataset::new(vec![
            Column::categorical("a", (0..40).map(|i| Some(if i < 20 { "x" } else { "y" }.to_string())).collect()),
            Column::categorical("b", (0..40).map(|i| Some(if i < 20 { "p" } else { "q" }.to_string())).collect()),
        ])
        .expect("dataset");

        let outcomes = independence_tests(&dataset, DEFAULT_INDEPENDENCE_ALPHA, true);
        match &outcomes[0] {
            TestOutcome::Passed(r) => {
                assert_eq!(r.conclusion, Conclusion::Dependent);
                assert!((r.statistic - 36.1).abs() < 1e-9);
            }
            TestOutcome::Failed(e) => panic!("unexpected failure: {e}"),
        }

        let strict = independence_tests(&dataset, 1e-12, true);
        assert!(matches!(&strict[0], TestOutcome::Passed(r) if r.conclusion == Conclusion::Independent));
    }
}
