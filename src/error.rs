use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Platform {platform}: no gene symbol column found among {columns:?}")]
    SchemaResolution {
        platform: String,
        columns: Vec<String>,
    },

    #[error("Malformed expression matrix at row {row}, column {column}: {reason}")]
    MalformedMatrix {
        row: usize,
        column: usize,
        reason: String,
    },

    #[error("Cannot compute {what}: denominator is zero")]
    DivisionByZero { what: String },

    #[error("Dataset {dataset}: {detail}")]
    MissingAssignment { dataset: String, detail: String },
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
