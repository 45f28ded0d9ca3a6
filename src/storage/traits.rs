//! Abstract record store trait.
//!
//! The record store is the analytical database holding the original input
//! rows. Clustering only needs two things from it: the column names of a
//! table and a batched lookup by id. By using a trait we keep:
//! - In-memory backends for testing and embedded use
//! - Remote backends behind the same interface

use thiserror::Error;

use crate::entity::{Attributes, EntityId};

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Table not found.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not found.
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Key already exists.
    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Ingest or decode failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Keyed access to original records.
///
/// # Safety Considerations
/// - Implementations must be safe to call from several enrichment workers
/// - `fetch_by_ids` must not allocate shared result state between calls
pub trait RecordStore: Send + Sync {
    /// Column names of `table`, in table order.
    fn columns(&self, table: &str) -> Result<Vec<String>, StorageError>;

    /// Rows of `table` whose `id_column` value matches one of `ids`.
    ///
    /// Values are compared by their id rendering (see
    /// [`EntityId::from_value`]), so numeric columns match string ids.
    fn fetch_by_ids(
        &self,
        table: &str,
        id_column: &str,
        ids: &[EntityId],
    ) -> Result<Vec<Attributes>, StorageError>;
}
