//! Correlation matrix computation

use crate::structs::{
    Column, ColumnValues, CorrelationMatrix, CorrelationMethod, CorrelationOutcome, Dataset,
};
use ndarray::Array1;
use rayon::prelude::*;
use tracing::{info, warn};

/// Pearson correlation coefficient between two variables.
///
/// `None` when lengths differ, fewer than 2 values exist, or either side is
/// constant. The result is clamped into `[-1, 1]`.
#[must_use]
pub fn pearson(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 || is_constant(x) || is_constant(y) {
        return None;
    }

    let dx = x - x.mean()?;
    let dy = y - y.mean()?;

    let cov = dx.dot(&dy);
    let denom = (dx.dot(&dx) * dy.dot(&dy)).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }

    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Spearman rank correlation: Pearson over average ranks
#[must_use]
pub fn spearman(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// 1-based ranks; tied values share the mean of their positions
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn average_ranks(values: &Array1<f64>) -> Array1<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = Array1::zeros(values.len());
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end (0-based) share rank mean(start+1 ..= end)
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

fn is_constant(values: &Array1<f64>) -> bool {
    values.iter().all(|&v| v == values[0])
}

/// Rows where both columns hold a value
fn paired_values(a: &Column, b: &Column, n_rows: usize) -> (Array1<f64>, Array1<f64>) {
    let (xs, ys): (Vec<f64>, Vec<f64>) = (0..n_rows)
        .filter_map(|row| Some((numeric_cell(a, row)?, numeric_cell(b, row)?)))
        .unzip();
    (Array1::from(xs), Array1::from(ys))
}

fn numeric_cell(column: &Column, row: usize) -> Option<f64> {
    match &column.values {
        ColumnValues::Numeric(v) => v.get(row).copied().flatten(),
        ColumnValues::Categorical(_) => None,
    }
}

fn correlate(a: &Column, b: &Column, n_rows: usize, method: CorrelationMethod) -> Option<f64> {
    let (x, y) = paired_values(a, b, n_rows);
    match method {
        CorrelationMethod::Pearson => pearson(&x, &y),
        CorrelationMethod::Spearman => spearman(&x, &y),
    }
}

/// Compute the `NxN` correlation matrix between all numeric columns.
///
/// Returns `NotApplicable` with fewer than two numeric columns.
#[must_use]
pub fn correlation_matrix(dataset: &Dataset, method: CorrelationMethod) -> CorrelationOutcome {
    let columns: Vec<&Column> = dataset.numeric_columns().collect();
    let n = columns.len();

    if n < 2 {
        info!("Correlation analysis skipped: {} numeric column(s)", n);
        return CorrelationOutcome::NotApplicable { numeric_columns: n };
    }

    info!("Computing {:?} correlation over {} numeric columns", method, n);

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i..n).map(move |j| (i, j)))
        .collect();

    let values: Vec<((usize, usize), Option<f64>)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let r = if i == j {
                // diagonal is defined exactly when the column can correlate at all
                correlate(columns[i], columns[j], dataset.n_rows(), method).map(|_| 1.0)
            } else {
                correlate(columns[i], columns[j], dataset.n_rows(), method)
            };
            ((i, j), r)
        })
        .collect();

    let mut matrix = vec![vec![None; n]; n];
    for ((i, j), r) in values {
        matrix[i][j] = r;
        matrix[j][i] = r;
    }

    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let result = CorrelationMatrix {
        method,
        names,
        matrix,
    };

    for (a, b) in result.undefined_pairs() {
        warn!("Correlation between '{}' and '{}' is undefined", a, b);
    }

    CorrelationOutcome::Computed(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify::classify;
    use crate::structs::RawTable;
    use ndarray::array;

    fn dataset(content: &str) -> Dataset {
        let table = RawTable::from_reader(content.as_bytes(), b',', "mem").expect("parse");
        classify(&table).expect("classify")
    }

    #[test]
    fn test_pearson() {
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];
        let corr = pearson(&x, &y).expect("calculate correlation");

        assert!((corr - 1.0).abs() < 1e-12); // Perfect positive correlation

        let z = array![5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&x, &z).expect("negative") + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_undefined_for_constant() {
        let x = array![1.0, 2.0, 3.0];
        let c = array![7.0, 7.0, 7.0];
        assert_eq!(pearson(&x, &c), None);
        assert_eq!(pearson(&array![1.0], &array![2.0]), None);
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&array![10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, array![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_spearman_monotonic() {
        let x = array![1.0, 2.0, 3.0, 4.0];
        let y = array![1.0, 8.0, 27.0, 64.0];
        let r = spearman(&x, &y).expect("spearman");
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_matrix() {
        let data = dataset("a,b,c\n1.0,2.0,10.0\n2.0,4.0,20.0\n3.0,6.0,30.5");
        let outcome = correlation_matrix(&data, CorrelationMethod::Pearson);
        let corr = outcome.matrix().expect("computed");

        assert_eq!(corr.names.len(), 3);
        assert_eq!(corr.matrix.len(), 3);
        for i in 0..3 {
            assert_eq!(corr.matrix[i][i], Some(1.0));
            for j in 0..3 {
                assert_eq!(corr.matrix[i][j], corr.matrix[j][i]);
                let r = corr.matrix[i][j].expect("defined");
                assert!((-1.0..=1.0).contains(&r));
            }
        }
        // a and b are perfectly correlated
        assert!((corr.get("a", "b").expect("a,b") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_is_undefined() {
        let data = dataset("a,b,k\n1,3,5\n2,1,5\n3,2,5\n4,5,5");
        let outcome = correlation_matrix(&data, CorrelationMethod::Pearson);
        let corr = outcome.matrix().expect("computed");

        assert_eq!(corr.get("a", "k"), None);
        assert_eq!(corr.get("k", "b"), None);
        assert_eq!(corr.get("k", "k"), None);
        assert_eq!(corr.get("a", "a"), Some(1.0));
        assert!(corr.get("a", "b").is_some());
        assert_eq!(corr.undefined_pairs(), vec![("a", "k"), ("b", "k")]);
    }

    #[test]
    fn test_not_applicable_with_one_numeric_column() {
        let data = dataset("a,b\n1,x\n2,y");
        assert_eq!(
            correlation_matrix(&data, CorrelationMethod::Pearson),
            CorrelationOutcome::NotApplicable { numeric_columns: 1 }
        );
    }
}
