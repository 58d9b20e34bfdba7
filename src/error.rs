//! Error types shared by the library

use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading and harmonizing survey exports
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read export {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}:{row}: {message}")]
    Row {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("{path}: no column identifies the questionnaire variant (expected formatUp + hidden, variant, or a `files` entry in config)")]
    MissingVariant { path: PathBuf },

    #[error("No CSV exports found under {0}")]
    NoExports(PathBuf),
}

impl IngestError {
    pub fn row(path: impl Into<PathBuf>, row: usize, message: impl Into<String>) -> Self {
        Self::Row {
            path: path.into(),
            row,
            message: message.into(),
        }
    }
}

/// Precondition failures of the statistical routines
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("group `{0}` is empty")]
    EmptyGroup(String),

    #[error("need at least {needed} observations, got {got}")]
    TooFewObservations { needed: usize, got: usize },

    #[error("contingency table has a zero expected frequency")]
    ZeroExpected,

    #[error("contingency table must be at least 2x2")]
    DegenerateTable,

    #[error("matrix is singular")]
    SingularMatrix,

    #[error("variable has zero variance")]
    ZeroVariance,

    #[error("dimension mismatch: {0}")]
    Dimension(String),
}

/// Top-level library error
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Failed to write report {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;
