//! One-call resolution pipeline.
//!
//! `normalize -> assemble -> filter -> statistics`, all synchronous and free
//! of I/O. Enrichment is left to the caller (see [`crate::enrich`]) because
//! it is the only stage that talks to a store.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::assemble::ClusterAssembler;
use crate::cluster::ClusterSet;
use crate::config::ResolutionConfig;
use crate::error::EntifyResult;
use crate::filter::filter_by_size;
use crate::normalize::{MatchRecordNormalizer, Rejection};
use crate::stats::ClusterStatistics;

/// Output of [`resolve`].
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Ranked clusters, after the optional size filter.
    pub clusters: ClusterSet,
    /// Statistics of `clusters`.
    pub statistics: ClusterStatistics,
    /// Records dropped during normalization.
    pub rejections: Vec<Rejection>,
    /// Number of records that normalized successfully.
    pub accepted: usize,
}

impl Resolution {
    /// True when no cluster survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Runs the synchronous pipeline over raw match records.
///
/// Bad records are rejected individually; only an invalid config fails the
/// call. An empty result is not an error.
///
/// # Errors
///
/// [`crate::EntifyError::Config`] when `config` does not validate.
pub fn resolve(raw: &[Value], config: &ResolutionConfig) -> EntifyResult<Resolution> {
    config.validate()?;
    let assembler = ClusterAssembler::new(config.min_probability)?;

    let normalizer = config
        .primary_key
        .as_deref()
        .map_or_else(MatchRecordNormalizer::new, |key| {
            MatchRecordNormalizer::with_primary_key(key)
        });
    let batch = normalizer.normalize_batch(raw);
    if !batch.rejections.is_empty() {
        warn!(
            target: "entify::normalize",
            rejected = batch.rejections.len(),
            total = raw.len(),
            "some match records were rejected"
        );
    }

    let assembled = assembler.assemble(&batch.records);
    let clusters = match config.size_range {
        Some(range) => filter_by_size(&assembled, range),
        None => assembled,
    };
    let statistics = ClusterStatistics::compute(&clusters);

    info!(
        target: "entify::assemble",
        accepted = batch.records.len(),
        clusters = statistics.total_clusters,
        entities = statistics.total_entities,
        "resolution complete"
    );

    Ok(Resolution {
        clusters,
        statistics,
        rejections: batch.rejections,
        accepted: batch.records.len(),
    })
}
