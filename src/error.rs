//! Error types for Entify.
//!
//! All errors are strongly typed using thiserror. The taxonomy mirrors how
//! each failure is handled: input errors drop a single record, config errors
//! reject a whole call, enrichment errors degrade to a warning.

use thiserror::Error;

use crate::storage::StorageError;

/// Per-record normalization failures.
///
/// The offending record is dropped and the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no identifier could be resolved for the left entity")]
    MissingLeftId,

    #[error("no identifier could be resolved for the right entity")]
    MissingRightId,

    #[error("record links entity '{id}' to itself")]
    SameEntity {
        id: String,
    },

    #[error("match probability is missing or invalid: {reason}")]
    InvalidProbability {
        reason: String,
    },

    #[error("malformed match record: {reason}")]
    MalformedRecord {
        reason: String,
    },
}

impl InputError {
    /// Stable reason code, suitable for counting rejections.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingLeftId => "MissingLeftId",
            Self::MissingRightId => "MissingRightId",
            Self::SameEntity { .. } => "SameEntity",
            Self::InvalidProbability { .. } => "InvalidProbability",
            Self::MalformedRecord { .. } => "MalformedRecord",
        }
    }
}

/// Configuration errors. The whole call is rejected; no partial result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Match probability threshold {value} is out of range [0.0, 1.0]")]
    ThresholdOutOfRange {
        value: f64,
    },

    #[error("Invalid size range: min ({min}) must not exceed max ({max})")]
    InvalidSizeRange {
        min: usize,
        max: usize,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Failed to parse configuration: {message}")]
    Parse {
        message: String,
    },
}

/// Enrichment failures. Reported as warnings, never as pipeline failures.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Table not found in record store: {table}")]
    TableNotFound {
        table: String,
    },

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        table: String,
        column: String,
    },

    #[error("Table '{table}' has no columns to key on")]
    NoColumns {
        table: String,
    },

    #[error("Record store error: {0}")]
    Store(#[from] StorageError),
}

/// Errors from the background enrichment runtime.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Enrichment queue is full (capacity: {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Enrichment worker disconnected before replying")]
    Disconnected,

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Errors while serializing cluster exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export output is not valid UTF-8")]
    Utf8,
}

/// Top-level error type for Entify.
#[derive(Debug, Error)]
pub enum EntifyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl EntifyError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a per-record input error.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Returns true if this is an enrichment error.
    #[must_use]
    pub const fn is_enrichment(&self) -> bool {
        matches!(self, Self::Enrichment(_))
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Assembly is deterministic, so only runtime back-pressure and store
    /// connectivity are worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. } | ExecutionError::Timeout { .. }
            ),
            Self::Enrichment(EnrichmentError::Store(StorageError::ConnectionError(_))) => true,
            _ => false,
        }
    }
}

/// Result type alias for Entify operations.
pub type EntifyResult<T> = Result<T, EntifyError>;
