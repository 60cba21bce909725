//! Statistical analysis stages
//!
//! Each stage takes the previous stage's output by reference and returns a
//! new value: classify, clean, then descriptive, correlation and inference
//! over the same cleaned dataset.

pub mod classify;
pub mod clean;
pub mod correlation;
pub mod descriptive;
pub mod inference;
pub mod output;
pub mod pipeline;

pub use pipeline::{analyze_table, run_pipeline, AnalysisConfig};
