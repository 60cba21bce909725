//! Deduplication and imputation of a classified dataset

use crate::error::ImputationError;
use crate::structs::{
    CategoricalImputation, CellKey, CleaningSummary, Column, ColumnValues, Dataset, FillValue,
    ImputationRecord, ImputationStrategy, NumericImputation, Result,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// A cleaned dataset together with what the cleaner did to it
#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned {
    pub dataset: Dataset,
    pub summary: CleaningSummary,
}

/// Indices of the first occurrence of every distinct row, in original order
#[must_use]
pub fn unique_row_indices(dataset: &Dataset) -> Vec<usize> {
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(dataset.n_rows());
    (0..dataset.n_rows())
        .filter(|&row| {
            let key: Vec<CellKey<'_>> = dataset
                .columns()
                .iter()
                .map(|c| c.cell_key(row))
                .collect();
            seen.insert(key)
        })
        .collect()
}

/// Remove exact duplicate rows, then fill every missing cell.
///
/// Fill values are computed from the deduplicated rows.
///
/// # Errors
/// Returns `StatError::Imputation` for a column that has missing cells but
/// no observed value to fill them from
pub fn clean(dataset: &Dataset, strategy: &ImputationStrategy) -> Result<Cleaned> {
    let original_rows = dataset.n_rows();
    let keep = unique_row_indices(dataset);
    let duplicates_removed = original_rows - keep.len();

    if duplicates_removed > 0 {
        debug!("Removed {} duplicate rows", duplicates_removed);
    } else {
        debug!("No duplicate rows found");
    }

    let mut columns = Vec::with_capacity(dataset.n_cols());
    let mut imputations = Vec::new();

    for column in dataset.columns() {
        let (filled, record) = impute_column(column.select_rows(&keep), strategy)?;
        if let Some(record) = record {
            debug!(
                "Filled {} missing value(s) in '{}' with {} '{}'",
                record.filled, record.column, record.rule, record.fill
            );
            imputations.push(record);
        }
        columns.push(filled);
    }

    let cleaned = Dataset::new(columns)?;

    info!(
        "Data cleaning complete! Original shape: ({}, {}), New shape: ({}, {})",
        original_rows,
        dataset.n_cols(),
        cleaned.n_rows(),
        cleaned.n_cols()
    );

    Ok(Cleaned {
        summary: CleaningSummary {
            original_rows,
            rows: cleaned.n_rows(),
            duplicates_removed,
            imputations,
        },
        dataset: cleaned,
    })
}

/// Fill a single column. Columns without missing cells pass through untouched.
fn impute_column(
    column: Column,
    strategy: &ImputationStrategy,
) -> std::result::Result<(Column, Option<ImputationRecord>), ImputationError> {
    let missing = column.missing_count();
    if missing == 0 {
        return Ok((column, None));
    }

    let Column { name, values } = column;
    let no_values = || ImputationError {
        column: name.clone(),
        missing,
    };

    let (values, rule, fill) = match values {
        ColumnValues::Numeric(cells) => {
            let observed: Vec<f64> = cells.iter().flatten().copied().collect();
            let (rule, fill) = match strategy.numeric {
                NumericImputation::Mean => ("mean", mean(&observed)),
                NumericImputation::Median => ("median", median(&observed)),
            };
            let fill = fill.ok_or_else(no_values)?;
            let filled = cells.into_iter().map(|c| Some(c.unwrap_or(fill))).collect();
            (ColumnValues::Numeric(filled), rule, FillValue::Number(fill))
        }
        ColumnValues::Categorical(cells) => {
            let (rule, fill) = match &strategy.categorical {
                CategoricalImputation::Mode => ("mode", mode(&cells).map(str::to_string)),
                CategoricalImputation::Constant(value) => ("constant", Some(value.clone())),
            };
            let fill = fill.ok_or_else(no_values)?;
            let filled = cells
                .into_iter()
                .map(|c| Some(c.unwrap_or_else(|| fill.clone())))
                .collect();
            (ColumnValues::Categorical(filled), rule, FillValue::Text(fill))
        }
    };

    let record = ImputationRecord {
        column: name.clone(),
        rule,
        fill,
        filled: missing,
    };
    Ok((Column { name, values }, Some(record)))
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent observed value; ties go to the value seen first
fn mode(cells: &[Option<String>]) -> Option<&str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for value in cells.iter().flatten() {
        let count = counts.entry(value.as_str()).or_insert(0);
        if *count == 0 {
            order.push(value.as_str());
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for value in order {
        let count = counts[value];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}
