//! Tabstat - statistical analysis of delimited tabular data
//!
//! Loads a CSV/TSV file, types and cleans its columns, then computes
//! descriptive statistics, a correlation matrix, normality tests and
//! chi-square independence tests into a single [`structs::AnalysisReport`].

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

pub mod analysis;
pub mod csv_reader;
pub mod error;
pub mod structs;

pub use analysis::{analyze_table, run_pipeline, AnalysisConfig};
pub use error::{Result, StatError};
