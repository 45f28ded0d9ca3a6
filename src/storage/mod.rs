//! Record store boundary.
//!
//! The trait describes the external keyed store used for enrichment; the
//! in-memory implementation backs tests, the CLI and embedded use.

mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, StorageError};
