//! Cluster assembly.
//!
//! Turns normalized match records into a ranked [`ClusterSet`] in two
//! passes over the records that clear the threshold. Every union happens in
//! the first pass; the second pass only reads roots, so each `find` already
//! reflects the final partition.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::cluster::{Cluster, ClusterSet};
use crate::entity::{Entity, EntityId};
use crate::error::ConfigError;
use crate::record::{Edge, MatchRecord};
use crate::union_find::UnionFind;

/// Checks that a probability threshold lies in `[0, 1]`.
///
/// # Errors
///
/// [`ConfigError::ThresholdOutOfRange`] for values outside the range or NaN.
pub fn validate_threshold(min_probability: f64) -> Result<f64, ConfigError> {
    if min_probability.is_nan() || !(0.0..=1.0).contains(&min_probability) {
        return Err(ConfigError::ThresholdOutOfRange {
            value: min_probability,
        });
    }
    Ok(min_probability)
}

#[derive(Default)]
struct Group {
    members: Vec<EntityId>,
    seen: HashSet<EntityId>,
    edges: Vec<Edge>,
}

impl Group {
    fn add_member(&mut self, id: &EntityId) {
        if self.seen.insert(id.clone()) {
            self.members.push(id.clone());
        }
    }
}

/// Groups match records into clusters at a probability threshold.
///
/// # Examples
///
/// ```
/// use entify::{ClusterAssembler, MatchRecordNormalizer};
/// use serde_json::json;
///
/// let normalizer = MatchRecordNormalizer::new();
/// let records: Vec<_> = [("A", "B", 0.9), ("B", "C", 0.8), ("D", "E", 0.95)]
///     .iter()
///     .map(|(l, r, p)| normalizer.normalize(&json!({"id_l": l, "id_r": r, "match_probability": p})).unwrap())
///     .collect();
///
/// let clusters = ClusterAssembler::new(0.5).unwrap().assemble(&records);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters.clusters()[0].size, 3);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ClusterAssembler {
    min_probability: f64,
}

impl ClusterAssembler {
    /// Creates an assembler for the given threshold.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ThresholdOutOfRange`] when the threshold is outside `[0, 1]`.
    pub fn new(min_probability: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            min_probability: validate_threshold(min_probability)?,
        })
    }

    /// Threshold in use.
    #[must_use]
    pub const fn min_probability(&self) -> f64 {
        self.min_probability
    }

    /// Assembles clusters from `records`.
    #[must_use]
    pub fn assemble(&self, records: &[MatchRecord]) -> ClusterSet {
        let surviving: Vec<&MatchRecord> = records
            .iter()
            .filter(|r| r.probability >= self.min_probability)
            .collect();

        let mut forest: UnionFind<EntityId> = UnionFind::with_capacity(surviving.len() * 2);
        let mut entities: HashMap<EntityId, Entity> = HashMap::with_capacity(surviving.len() * 2);

        for record in &surviving {
            register(&mut entities, &record.left_id, || record.left_entity());
            register(&mut entities, &record.right_id, || record.right_entity());
            forest.union(&record.left_id, &record.right_id);
        }

        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Group> = HashMap::new();
        for record in &surviving {
            let root = forest.find(&record.left_id);
            let group = match groups.entry(root) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    order.push(root);
                    e.insert(Group::default())
                }
            };
            group.edges.push(record.edge());
            group.add_member(&record.left_id);
            group.add_member(&record.right_id);
        }

        let clusters: Vec<Cluster> = order
            .into_iter()
            .filter_map(|root| groups.remove(&root))
            .map(|group| {
                let members = group
                    .members
                    .iter()
                    .filter_map(|id| entities.get(id).cloned())
                    .collect();
                Cluster::new(members, group.edges)
            })
            .collect();

        let set = ClusterSet::ranked(clusters);
        debug!(
            target: "entify::assemble",
            entities = forest.len(),
            components = forest.set_count(),
            "union-find pass complete"
        );
        info!(
            target: "entify::assemble",
            threshold = self.min_probability,
            records = records.len(),
            surviving = surviving.len(),
            clusters = set.len(),
            "assembled clusters"
        );
        set
    }
}

fn register<F>(entities: &mut HashMap<EntityId, Entity>, id: &EntityId, make: F)
where
    F: FnOnce() -> Entity,
{
    if !entities.contains_key(id) {
        entities.insert(id.clone(), make());
    }
}

/// Convenience wrapper: validate `min_probability` and assemble.
///
/// # Errors
///
/// [`ConfigError::ThresholdOutOfRange`] when the threshold is outside `[0, 1]`.
pub fn assemble_clusters(
    records: &[MatchRecord],
    min_probability: f64,
) -> Result<ClusterSet, ConfigError> {
    Ok(ClusterAssembler::new(min_probability)?.assemble(records))
}
