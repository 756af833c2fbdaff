//! Tabular import, review-then-commit pipeline and export.

pub mod export;
pub mod pipeline;
pub mod tabular;

pub use export::{ExportFormat, export};
pub use pipeline::{ImportPipeline, ImportReport, ReviewedRow};
pub use tabular::{TabularFormat, is_empty_row, parse};
