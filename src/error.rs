//! Error types for the word2vec training engine.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for word2vec operations.
#[derive(Error, Debug)]
pub enum Word2VecError {
    /// Training or vocabulary file not found.
    #[error("input file not found: {path}")]
    InputMissing { path: PathBuf },

    /// A numeric CLI argument failed to parse.
    #[error("invalid value for -{flag}: {value}")]
    BadNumericArg { flag: &'static str, value: String },

    /// The parameter matrices do not fit in memory.
    #[error("failed to allocate {bytes} bytes for parameter matrix")]
    AllocationFailure { bytes: usize },

    /// A vocabulary or model file ended mid-record.
    #[error("truncated record while reading {path}")]
    TruncatedRead { path: PathBuf },

    /// One or more training workers did not complete; no model was written.
    #[error("{failed} of {total} training workers failed; model was not written")]
    WorkerFailure { failed: usize, total: usize },

    /// Blanket I/O conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for word2vec operations.
pub type Result<T> = std::result::Result<T, Word2VecError>;
