//! Error types shared by library generation, reference checking and annotation.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotatorError {
    /// File could not be opened, read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside the dataframe layer (CSV parsing, column casts, ...)
    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad cas type, PAM alphabet, chemistry bases or editing window
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A column the annotation needs is absent from the guide table
    #[error("required column `{0}` not found in guide table")]
    MissingColumn(String),

    /// Exon records whose lowercase flanks differ in length
    #[error("inconsistent intron flank in exon {exon}: expected {expected} bp, found {found} bp")]
    InconsistentFlank {
        exon: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid nucleotide sequence `{0}`")]
    InvalidSequence(String),

    #[error("could not build sequence matcher: {0}")]
    Matcher(String),
}

pub type Result<T> = std::result::Result<T, AnnotatorError>;
