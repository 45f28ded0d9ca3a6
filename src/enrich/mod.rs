//! Record enrichment.
//!
//! Resolves the original store rows for every entity in a [`ClusterSet`]
//! with a single batched lookup. Enrichment never fails the pipeline: any
//! store problem becomes a warning on the [`EnrichmentOutcome`] and the
//! clusters keep their match-derived attributes.

pub mod runtime;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cluster::{Cluster, ClusterSet};
use crate::entity::{Attributes, Entity, EntityId};
use crate::error::EnrichmentError;
use crate::storage::{RecordStore, StorageError};

pub use runtime::{EnrichmentHandle, EnrichmentRuntime, EnrichmentRuntimeConfig};

/// Id column names tried when the caller does not name one.
pub const ID_COLUMN_CANDIDATES: [&str; 8] = [
    "unique_id",
    "id",
    "_id",
    "entity_id",
    "record_id",
    "uid",
    "key",
    "pk",
];

/// Picks the id column of a table.
///
/// Order: the explicit column when it exists, then
/// [`ID_COLUMN_CANDIDATES`] (exact, then ASCII case-insensitive), then the
/// first column.
///
/// # Errors
///
/// [`EnrichmentError::NoColumns`] when `columns` is empty.
pub fn resolve_id_column(
    table: &str,
    columns: &[String],
    requested: Option<&str>,
) -> Result<String, EnrichmentError> {
    if let Some(requested) = requested {
        if columns.iter().any(|c| c == requested) {
            return Ok(requested.to_string());
        }
        warn!(target: "entify::enrich", table, column = requested, "requested id column not found, falling back");
    }

    for candidate in ID_COLUMN_CANDIDATES {
        if columns.iter().any(|c| c == candidate) {
            return Ok(candidate.to_string());
        }
    }
    for candidate in ID_COLUMN_CANDIDATES {
        if let Some(found) = columns.iter().find(|c| c.eq_ignore_ascii_case(candidate)) {
            return Ok(found.clone());
        }
    }

    let first = columns.first().ok_or_else(|| EnrichmentError::NoColumns {
        table: table.to_string(),
    })?;
    debug!(target: "entify::enrich", table, column = %first, "no id-like column, using first column");
    Ok(first.clone())
}

/// Result of one enrichment call.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    /// Store rows keyed by entity id. Only ids found in the store appear.
    pub records: HashMap<EntityId, Attributes>,
    /// Id column the lookup used, when it got that far.
    pub id_column: Option<String>,
    /// Why enrichment degraded, if it did.
    pub warning: Option<EnrichmentError>,
}

impl EnrichmentOutcome {
    fn degraded(id_column: Option<String>, warning: EnrichmentError) -> Self {
        Self {
            records: HashMap::new(),
            id_column,
            warning: Some(warning),
        }
    }

    /// True when the lookup completed without a warning.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.warning.is_none()
    }

    /// Store row for `id`.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<&Attributes> {
        self.records.get(id)
    }

    /// Copy of `set` whose entities carry their store rows.
    ///
    /// Entities missing from the store keep their match-derived attributes.
    #[must_use]
    pub fn apply(&self, set: &ClusterSet) -> ClusterSet {
        let clusters = set
            .iter()
            .map(|cluster| Cluster {
                entities: cluster
                    .entities
                    .iter()
                    .map(|entity| match self.records.get(&entity.id) {
                        Some(row) => Entity::with_attributes(entity.id.clone(), row.clone()),
                        None => entity.clone(),
                    })
                    .collect(),
                ..cluster.clone()
            })
            .collect();
        ClusterSet::from_ordered(clusters)
    }
}

/// Batched lookup of original records for clustered entities.
#[derive(Clone)]
pub struct RecordEnricher {
    store: Arc<dyn RecordStore>,
    table: String,
    id_column: Option<String>,
}

impl std::fmt::Debug for RecordEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordEnricher")
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .finish_non_exhaustive()
    }
}

impl RecordEnricher {
    /// Enricher reading from `table`.
    pub fn new(store: Arc<dyn RecordStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            id_column: None,
        }
    }

    /// Prefer `column` as the id column when it exists.
    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.id_column = (!column.trim().is_empty()).then_some(column);
        self
    }

    /// Table being read.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Resolves store rows for every entity in `set`.
    ///
    /// Issues one `columns` call and at most one `fetch_by_ids` call.
    #[must_use]
    pub fn enrich(&self, set: &ClusterSet) -> EnrichmentOutcome {
        let ids: Vec<EntityId> = set
            .entity_ids()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.enrich_ids(&ids)
    }

    /// Resolves store rows for `ids` (sorted and unique).
    #[must_use]
    pub fn enrich_ids(&self, ids: &[EntityId]) -> EnrichmentOutcome {
        if ids.is_empty() {
            return EnrichmentOutcome::default();
        }

        let columns = match self.store.columns(&self.table) {
            Ok(columns) => columns,
            Err(err) => return self.soft_fail(None, store_error(&self.table, err)),
        };
        let id_column = match resolve_id_column(&self.table, &columns, self.id_column.as_deref()) {
            Ok(column) => column,
            Err(err) => return self.soft_fail(None, err),
        };

        let rows = match self.store.fetch_by_ids(&self.table, &id_column, ids) {
            Ok(rows) => rows,
            Err(err) => return self.soft_fail(Some(id_column), store_error(&self.table, err)),
        };

        let mut records = HashMap::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.get(&id_column).and_then(EntityId::from_value) else {
                continue;
            };
            // First row wins for duplicate keys.
            records.entry(id).or_insert(row);
        }

        info!(
            target: "entify::enrich",
            table = %self.table,
            id_column = %id_column,
            requested = ids.len(),
            found = records.len(),
            "enriched entities"
        );
        EnrichmentOutcome {
            records,
            id_column: Some(id_column),
            warning: None,
        }
    }

    fn soft_fail(&self, id_column: Option<String>, err: EnrichmentError) -> EnrichmentOutcome {
        warn!(target: "entify::enrich", table = %self.table, "enrichment degraded: {err}");
        EnrichmentOutcome::degraded(id_column, err)
    }
}

fn store_error(table: &str, err: StorageError) -> EnrichmentError {
    match err {
        StorageError::TableNotFound(_) => EnrichmentError::TableNotFound {
            table: table.to_string(),
        },
        StorageError::ColumnNotFound { table, column } => {
            EnrichmentError::ColumnNotFound { table, column }
        }
        other => EnrichmentError::Store(other),
    }
}
