//! Semantic typing of loaded columns

use crate::structs::{Column, Dataset, RawTable, Result, SemanticType};
use tracing::debug;

/// Parse a cell as a finite number
#[must_use]
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Semantic type for a column's cells. Numeric needs at least one observed
/// value and every observed value finite-numeric; all-missing is Categorical.
#[must_use]
pub fn infer_type(cells: &[Option<&str>]) -> SemanticType {
    let mut observed = cells.iter().flatten().peekable();
    if observed.peek().is_none() {
        return SemanticType::Categorical;
    }
    if observed.all(|s| parse_number(s).is_some()) {
        SemanticType::Numeric
    } else {
        SemanticType::Categorical
    }
}

/// Tag every column of a loaded table and build the typed dataset
///
/// # Errors
/// Returns error if the table's rows do not match its header
pub fn classify(table: &RawTable) -> Result<Dataset> {
    let mut columns = Vec::with_capacity(table.col_count());

    for (index, name) in table.headers.iter().enumerate() {
        let cells = table.column(index).unwrap_or_default();
        let column = match infer_type(&cells) {
            SemanticType::Numeric => Column::numeric(
                name.clone(),
                cells.iter().map(|c| c.and_then(parse_number)).collect(),
            ),
            SemanticType::Categorical => Column::categorical(
                name.clone(),
                cells.iter().map(|c| c.map(str::to_string)).collect(),
            ),
        };
        debug!("Column '{}' classified as {}", name, column.semantic_type());
        columns.push(column);
    }

    Dataset::new(columns)
}
