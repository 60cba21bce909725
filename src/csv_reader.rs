use crate::error::LoadError;
use crate::structs::RawTable;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Cell texts read as the missing-value marker
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A", "#NA",
    "<NA>", "1.#QNAN", "-1.#IND",
];

/// True if the (trimmed) cell text denotes a missing value
#[must_use]
pub fn is_missing_token(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

/// Delimiter for a path: tab for `.tsv` files or when forced, comma otherwise
#[must_use]
pub fn delimiter_for(path: &Path, force_tsv: bool) -> u8 {
    let is_tsv_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    if force_tsv || is_tsv_ext {
        b'\t'
    } else {
        b','
    }
}

impl RawTable {
    /// Parse a CSV or TSV file
    ///
    /// # Errors
    /// Returns `LoadError` if the file is missing, unreadable, or malformed
    pub fn from_file(path: &Path, delimiter: u8) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let file = std::fs::File::open(path).map_err(|source| LoadError::Read {
            source_name: path.display().to_string(),
            source,
        })?;

        let table = Self::from_reader(file, delimiter, &path.display().to_string())?;
        info!(
            "Loaded {} rows x {} columns from {}",
            table.row_count(),
            table.col_count(),
            table.source
        );
        Ok(table)
    }

    /// Parse delimited text from any reader. `source_name` labels errors.
    ///
    /// # Errors
    /// Returns `LoadError` on I/O failure, ragged rows, invalid UTF-8,
    /// a missing header row, or duplicate header names
    pub fn from_reader<R: io::Read>(
        reader: R,
        delimiter: u8,
        source_name: &str,
    ) -> Result<Self, LoadError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .trim(Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(source_name, e))?
            .iter()
            .map(ToString::to_string)
            .collect();

        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(LoadError::Empty {
                source_name: source_name.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(LoadError::DuplicateColumn {
                    source_name: source_name.to_string(),
                    name: name.clone(),
                });
            }
        }

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => rows.push(record.iter().map(to_cell).collect()),
                Ok(false) => break,
                Err(e) => return Err(csv_error(source_name, e)),
            }
        }

        debug!("{source_name}: header {:?}", headers);

        Ok(Self {
            source: source_name.to_string(),
            headers,
            rows,
        })
    }
}

fn to_cell(field: &str) -> Option<String> {
    if is_missing_token(field) {
        None
    } else {
        Some(field.to_string())
    }
}

fn csv_error(source_name: &str, err: csv::Error) -> LoadError {
    let line = err.position().map(csv::Position::line);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => LoadError::Read {
            source_name: source_name.to_string(),
            source,
        },
        _ => LoadError::Malformed {
            source_name: source_name.to_string(),
            line,
            reason,
        },
    }
}
