//! # probeanno: microarray probe annotation
//!
//! probeanno maps platform probe identifiers to gene symbols, filters
//! expression matrices down to annotated probes and reports how many probes
//! each dataset keeps.
//!
//! ## Features
//!
//! - Platform schema resolution over the usual probe/symbol column names
//! - Tab, comma and gzipped inputs, GEO comment preambles skipped
//! - Per-dataset and per-platform retention statistics
//! - Quality checks re-run on the written exports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use probeanno::data::loader::TableLoader;
//! use probeanno::data::platform::resolve;
//! use probeanno::annotate::join;
//! use probeanno::stats::summarize;
//!
//! let loader = TableLoader::new();
//! let table = loader.load_platform("GPL570.txt").unwrap();
//! let map = resolve("GPL570", &table).unwrap();
//!
//! let matrix = loader.load_expression("GSE1_series_matrix.txt.gz").unwrap();
//! let annotated = join(&matrix, &map);
//! let summary = summarize("GSE1", "GPL570", &matrix, &annotated).unwrap();
//! println!("Retention: {:.2}%", summary.retention_rate);
//! ```

pub mod annotate;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod stats;
pub mod utils;
pub mod verify;

/// Re-export commonly used types
pub use data::{AnnotatedMatrix, ExpressionMatrix, PlatformTable, ProbeGeneMap};
pub use error::AnnotationError;
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
pub use stats::{AnnotationSummaryRow, OverallStatistics, PlatformStatistics};
pub use verify::QualityReport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - microarray probe to gene annotation",
        NAME, VERSION
    )
}
