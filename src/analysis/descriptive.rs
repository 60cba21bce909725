//! Per-column summary statistics and chart-ready distribution data

use crate::structs::{
    Column, ColumnValues, Dataset, DescriptiveReport, FrequencyEntry, FrequencyTable, Histogram,
    NumericSummary,
};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

impl NumericSummary {
    /// Calculate statistics for a vector of values; `None` when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate(name: &str, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;

        let std_dev = (count > 1).then(|| {
            let ss = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
            (ss / (count - 1) as f64).sqrt()
        });

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile(&sorted, 25.0);
        let median = percentile(&sorted, 50.0);
        let q3 = percentile(&sorted, 75.0);

        Some(Self {
            name: name.to_string(),
            count,
            mean,
            std_dev,
            min: sorted[0],
            q1,
            median,
            q3,
            max: sorted[count - 1],
            iqr: q3 - q1,
        })
    }
}

/// Calculate percentile using linear interpolation between closest ranks
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let k = (p / 100.0) * (sorted.len() - 1) as f64;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;

    if f == c {
        sorted[f]
    } else {
        let d0 = sorted[f] * (c as f64 - k);
        let d1 = sorted[c] * (k - f as f64);
        d0 + d1
    }
}

/// Sturges' rule: `ceil(log2 n) + 1`
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (n as f64).log2().ceil() as usize + 1
}

impl Histogram {
    /// Equal-width histogram over `[min, max]`; the last bin is closed.
    /// A constant column is binned over `[v - 0.5, v + 0.5]`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn calculate(name: &str, values: &[f64], bins: Option<usize>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let bins = bins.unwrap_or_else(|| sturges_bins(values.len())).max(1);

        let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins)
            .map(|i| if i == bins { hi } else { lo + width * i as f64 })
            .collect();

        let mut counts = vec![0usize; bins];
        for &v in values {
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Some(Self {
            name: name.to_string(),
            edges,
            counts,
        })
    }
}

impl FrequencyTable {
    /// Exact value counts, most frequent first, ties in order of first appearance
    #[must_use]
    pub fn calculate(name: &str, values: &[&str]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut entries: Vec<FrequencyEntry> = Vec::new();
        for &value in values {
            if let Some(&i) = index.get(value) {
                entries[i].count += 1;
            } else {
                index.insert(value, entries.len());
                entries.push(FrequencyEntry {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
        // stable: equal counts keep first-appearance order
        entries.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            name: name.to_string(),
            total: values.len(),
            entries,
        }
    }
}

enum ColumnDescription {
    Numeric(NumericSummary, Histogram),
    Categorical(FrequencyTable),
}

fn describe_column(column: &Column, bins: Option<usize>) -> Option<ColumnDescription> {
    match &column.values {
        ColumnValues::Numeric(_) => {
            let values = column.observed_numbers();
            let summary = NumericSummary::calculate(&column.name, &values)?;
            let histogram = Histogram::calculate(&column.name, &values, bins)?;
            debug!("{}", summary.summary());
            Some(ColumnDescription::Numeric(summary, histogram))
        }
        ColumnValues::Categorical(_) => {
            let values = column.observed_labels();
            Some(ColumnDescription::Categorical(FrequencyTable::calculate(
                &column.name,
                &values,
            )))
        }
    }
}

/// Summaries for every column, in column order. Column types with no
/// members are simply absent from the report.
#[must_use]
pub fn describe(dataset: &Dataset, bins: Option<usize>) -> DescriptiveReport {
    info!("Computing descriptive statistics...");

    let descriptions: Vec<Option<ColumnDescription>> = dataset
        .columns()
        .par_iter()
        .map(|column| describe_column(column, bins))
        .collect();

    let mut report = DescriptiveReport::default();
    for description in descriptions.into_iter().flatten() {
        match description {
            ColumnDescription::Numeric(summary, histogram) => {
                report.numeric.push(summary);
                report.histograms.push(histogram);
            }
            ColumnDescription::Categorical(table) => report.categorical.push(table),
        }
    }

    if report.numeric.is_empty() {
        debug!("No numeric columns to summarize");
    }
    if report.categorical.is_empty() {
        debug!("No categorical columns to summarize");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_summary() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = NumericSummary::calculate("test", &values).expect("calculate stats");

        assert_eq!(stats.count, 10);
        assert!((stats.mean - 5.5).abs() < 1e-12);
        assert!((stats.min - 1.0).abs() < 1e-12);
        assert!((stats.max - 10.0).abs() < 1e-12);
        assert!((stats.median - 5.5).abs() < 1e-12);
        assert!((stats.q1 - 3.25).abs() < 1e-12);
        assert!((stats.q3 - 7.75).abs() < 1e-12);
        // sample standard deviation of 1..=10
        assert!((stats.std_dev.unwrap() - 3.027_650_354_097_491_7).abs() < 1e-9);
    }

    #[test]
    fn test_single_value_has_no_std_dev() {
        let stats = NumericSummary::calculate("one", &[4.0]).expect("calculate stats");
        assert_eq!(stats.std_dev, None);
        assert!((stats.q1 - 4.0).abs() < 1e-12);
        assert!(NumericSummary::calculate("none", &[]).is_none());
    }

    #[test]
    fn test_histogram() {
        let values = vec![0.0, 1.0, 2.0, 3.0, 4.0, 10.0];
        let hist = Histogram::calculate("x", &values, Some(5)).expect("histogram");

        assert_eq!(hist.edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(hist.counts, vec![2, 2, 1, 0, 1]);
        assert_eq!(hist.counts.iter().sum::<usize>(), values.len());
    }

    #[test]
    fn test_histogram_constant_column() {
        let hist = Histogram::calculate("x", &[3.0, 3.0, 3.0], None).expect("histogram");
        assert_eq!(hist.counts.iter().sum::<usize>(), 3);
        assert!((hist.edges[0] - 2.5).abs() < 1e-12);
        assert!((hist.edges[hist.edges.len() - 1] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_sturges() {
        assert_eq!(sturges_bins(1), 1);
        assert_eq!(sturges_bins(8), 4);
        assert_eq!(sturges_bins(100), 8);
    }

    #[test]
    fn test_frequency_table_order_and_total() {
        let table = FrequencyTable::calculate("c", &["b", "a", "a", "c", "b", "a"]);

        let values: Vec<&str> = table.entries.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
        assert_eq!(table.count_of("a"), Some(3));
        assert_eq!(table.total, 6);
        assert_eq!(table.entries.iter().map(|e| e.count).sum::<usize>(), 6);
    }

    #[test]
    fn test_frequency_ties_keep_first_appearance() {
        let table = FrequencyTable::calculate("c", &["y", "x", "x", "y", "z"]);
        let values: Vec<&str> = table.entries.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_describe_mixed_dataset() {
        let dataset = Dataset::new(vec![
            Column::numeric("n", vec![Some(1.0), Some(2.0), Some(3.0)]),
            Column::categorical("c", vec![Some("x".into()), Some("y".into()), Some("x".into())]),
        ])
        .expect("dataset");

        let report = describe(&dataset, None);
        assert_eq!(report.numeric.len(), 1);
        assert_eq!(report.histograms.len(), 1);
        assert_eq!(report.categorical.len(), 1);
        assert_eq!(report.categorical[0].total, dataset.n_rows());
    }

    #[test]
    fn test_describe_skips_empty_type_sets() {
        let dataset = Dataset::new(vec![Column::categorical("c", vec![Some("x".into())])])
            .expect("dataset");

        let report = describe(&dataset, None);
        assert!(report.numeric.is_empty());
        assert!(report.histograms.is_empty());
        assert_eq!(report.categorical.len(), 1);
    }
}
