//! # Entify - Match-Graph Clustering for Entity Resolution
//!
//! Entify turns pairwise match scores produced by an external scoring
//! service into clusters of records that refer to the same real-world
//! entity. Matches above a probability threshold are edges of an undirected
//! graph; every connected component of that graph is one cluster.
//!
//! ## Core Concepts
//!
//! - **Match record**: one scored pair of entities, normalized from either a
//!   flat (`*_l` / `*_r`) or a structured (`left_entity` / `right_entity`) form
//! - **Cluster**: a connected component, ranked by size and keyed by a
//!   content-derived stable key
//! - **Enrichment**: a batched lookup of the original rows for every
//!   clustered entity in a [`RecordStore`]
//!
//! ## Usage
//!
//! ```rust
//! use entify::{resolve, to_csv_string, ResolutionConfig};
//! use serde_json::json;
//!
//! let raw = vec![
//!     json!({"unique_id_l": "A", "unique_id_r": "B", "match_probability": 0.9}),
//!     json!({"unique_id_l": "B", "unique_id_r": "C", "match_probability": 0.8}),
//!     json!({"unique_id_l": "D", "unique_id_r": "E", "match_probability": 0.95}),
//! ];
//!
//! let resolution = resolve(&raw, &ResolutionConfig::with_threshold(0.5))?;
//! assert_eq!(resolution.clusters.len(), 2);
//! assert_eq!(resolution.clusters.clusters()[0].size, 3);
//!
//! let csv = to_csv_string(&resolution.clusters)?;
//! assert!(csv.starts_with("entity_id,cluster_id,cluster_number,cluster_size"));
//! # Ok::<(), entify::EntifyError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod cluster;
pub mod entity;
pub mod error;
pub mod record;
pub mod union_find;

// Pipeline stages
pub mod assemble;
pub mod export;
pub mod filter;
pub mod normalize;
pub mod stats;

// Storage and enrichment
pub mod enrich;
pub mod storage;

// Orchestration
pub mod config;
pub mod logging;
pub mod pipeline;

// Re-export primary types at crate root for convenience
pub use assemble::{assemble_clusters, validate_threshold, ClusterAssembler};
pub use cluster::{stable_key, Cluster, ClusterSet};
pub use entity::{Attributes, Entity, EntityId};
pub use error::{
    ConfigError, EnrichmentError, EntifyError, EntifyResult, ExecutionError, ExportError,
    InputError,
};
pub use export::{export_rows, to_csv_string, write_csv, ExportRow};
pub use filter::{filter_by_size, SizeRange};
pub use normalize::{MatchRecordNormalizer, NormalizedBatch, Rejection};
pub use record::{Edge, MatchRecord};
pub use stats::{ClusterStatistics, SizeBucket, SizeDistribution};
pub use union_find::UnionFind;

pub use enrich::{
    EnrichmentHandle, EnrichmentOutcome, EnrichmentRuntime, EnrichmentRuntimeConfig,
    RecordEnricher,
};
pub use storage::{InMemoryRecordStore, RecordStore, StorageError};

pub use config::{EnrichmentConfig, ResolutionConfig};
pub use pipeline::{resolve, Resolution};
