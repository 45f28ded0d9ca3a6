//! Cluster types.
//!
//! A [`ClusterSet`] is the complete, immutable answer for one input batch at
//! one threshold. It is rebuilt from scratch whenever the inputs change.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::record::Edge;

/// Prefix of every cluster stable key.
pub const STABLE_KEY_PREFIX: &str = "cl-";

const STABLE_KEY_HEX_LEN: usize = 16;

/// Content-derived cluster key.
///
/// Hashes the sorted member ids with BLAKE3, so the same membership always
/// yields the same key regardless of input order.
///
/// # Examples
///
/// ```
/// use entify::{stable_key, EntityId};
///
/// let a = EntityId::parse("a").unwrap();
/// let b = EntityId::parse("b").unwrap();
/// assert_eq!(stable_key([&a, &b]), stable_key([&b, &a]));
/// assert!(stable_key([&a]).starts_with("cl-"));
/// ```
#[must_use]
pub fn stable_key<'a, I>(members: I) -> String
where
    I: IntoIterator<Item = &'a EntityId>,
{
    let mut ids: Vec<&str> = members.into_iter().map(EntityId::as_str).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut hasher = blake3::Hasher::new();
    for id in ids {
        // Length prefix keeps ["ab", "c"] distinct from ["a", "bc"].
        hasher.update(&(id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("{STABLE_KEY_PREFIX}{}", &hex.as_str()[..STABLE_KEY_HEX_LEN])
}

/// A connected component of the match graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// 1-based position in the size-descending ordering.
    pub rank: usize,
    /// Content-derived identity, see [`stable_key`].
    pub stable_key: String,
    /// Member ids, unique, in first-seen order.
    pub entity_ids: Vec<EntityId>,
    /// Member entities, parallel to `entity_ids`.
    pub entities: Vec<Entity>,
    /// Supporting edges, one per surviving match record.
    pub edges: Vec<Edge>,
    /// Number of members.
    pub size: usize,
    /// Mean edge score.
    pub avg_score: f64,
}

impl Cluster {
    /// Builds a cluster from members and edges. `rank` is set by the caller.
    ///
    /// Repeated members are dropped; the first occurrence wins.
    #[must_use]
    pub fn new(entities: Vec<Entity>, edges: Vec<Edge>) -> Self {
        let mut seen = HashSet::with_capacity(entities.len());
        let entities: Vec<Entity> = entities
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        let entity_ids: Vec<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
        let stable_key = stable_key(&entity_ids);
        let avg_score = if edges.is_empty() {
            0.0
        } else {
            edges.iter().map(|e| e.score).sum::<f64>() / edges.len() as f64
        };
        Self {
            rank: 0,
            stable_key,
            size: entity_ids.len(),
            entity_ids,
            entities,
            edges,
            avg_score,
        }
    }

    /// True when `id` is a member.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entity_ids.iter().any(|e| e.as_str() == id)
    }

    /// Lowest and highest edge score.
    #[must_use]
    pub fn score_range(&self) -> Option<(f64, f64)> {
        self.edges.iter().map(|e| e.score).fold(None, |acc, s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        })
    }
}

/// Clusters ordered by size, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
}

impl ClusterSet {
    /// Sorts clusters by size (stable, so ties keep their order) and assigns
    /// 1-based ranks.
    #[must_use]
    pub fn ranked(mut clusters: Vec<Cluster>) -> Self {
        clusters.sort_by(|a, b| b.size.cmp(&a.size));
        for (idx, cluster) in clusters.iter_mut().enumerate() {
            cluster.rank = idx + 1;
        }
        Self { clusters }
    }

    /// Wraps clusters that are already ordered and ranked.
    pub(crate) fn from_ordered(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }

    /// Clusters in rank order.
    #[must_use]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Iterates clusters in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True when there are no clusters. A valid result, not an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster containing `id`.
    #[must_use]
    pub fn cluster_of(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.contains(id))
    }

    /// Cluster with the given stable key.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.stable_key == key)
    }

    /// Every member id across all clusters, in cluster then member order.
    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.clusters.iter().flat_map(|c| c.entity_ids.iter())
    }

    /// Sum of cluster sizes.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.clusters.iter().map(|c| c.size).sum()
    }

    /// Consumes the set, returning the clusters.
    #[must_use]
    pub fn into_vec(self) -> Vec<Cluster> {
        self.clusters
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<EntityId> {
        raw.iter().map(|s| EntityId::parse(s).unwrap()).collect()
    }

    fn cluster(raw: &[&str], scores: &[f64]) -> Cluster {
        let members = ids(raw);
        let entities = members.iter().cloned().map(Entity::new).collect();
        let edges = scores
            .iter()
            .map(|&score| Edge {
                source_id: members[0].clone(),
                target_id: members[members.len() - 1].clone(),
                score,
            })
            .collect();
        Cluster::new(entities, edges)
    }

    #[test]
    fn test_stable_key_is_order_independent() {
        let a = ids(&["x", "y", "z"]);
        let b = ids(&["z", "x", "y"]);
        assert_eq!(stable_key(&a), stable_key(&b));
    }

    #[test]
    fn test_stable_key_distinguishes_memberships() {
        assert_ne!(stable_key(&ids(&["ab", "c"])), stable_key(&ids(&["a", "bc"])));
        assert_ne!(stable_key(&ids(&["a", "b"])), stable_key(&ids(&["a", "b", "c"])));
    }

    #[test]
    fn test_stable_key_format() {
        let key = stable_key(&ids(&["1"]));
        assert!(key.starts_with(STABLE_KEY_PREFIX));
        assert_eq!(key.len(), STABLE_KEY_PREFIX.len() + 16);
        assert!(key[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cluster_new_computes_size_and_average() {
        let c = cluster(&["a", "b", "c"], &[0.9, 0.8]);
        assert_eq!(c.size, 3);
        assert!((c.avg_score - 0.85).abs() < 1e-12);
        assert_eq!(c.score_range(), Some((0.8, 0.9)));
        assert!(c.contains("b"));
        assert!(!c.contains("d"));
    }

    #[test]
    fn test_cluster_new_drops_repeated_members() {
        let a = EntityId::parse("a").unwrap();
        let mut first = Entity::new(a.clone());
        first.attributes.insert("n".into(), serde_json::json!(1));
        let mut second = Entity::new(a.clone());
        second.attributes.insert("n".into(), serde_json::json!(2));

        let c = Cluster::new(vec![first, second], vec![]);
        assert_eq!(c.size, 1);
        assert_eq!(c.entity_ids, vec![a.clone()]);
        assert_eq!(c.entities[0].field("n"), Some(&serde_json::json!(1)));
        assert_eq!(c.stable_key, stable_key([&a]));
    }

    #[test]
    fn test_cluster_without_edges_has_zero_average() {
        let c = cluster(&["solo"], &[]);
        assert_eq!(c.avg_score, 0.0);
        assert_eq!(c.score_range(), None);
    }

    #[test]
    fn test_ranked_sorts_by_size_with_stable_ties() {
        let set = ClusterSet::ranked(vec![
            cluster(&["a", "b"], &[0.9]),
            cluster(&["c", "d", "e"], &[0.9, 0.9]),
            cluster(&["f", "g"], &[0.9]),
        ]);
        let order: Vec<_> = set.iter().map(|c| (c.rank, c.entity_ids[0].as_str())).collect();
        assert_eq!(order, vec![(1, "c"), (2, "a"), (3, "f")]);
        assert_eq!(set.entity_count(), 7);
        assert_eq!(set.cluster_of("g").map(|c| c.rank), Some(3));
    }

    #[test]
    fn test_cluster_set_serializes_as_array() {
        let set = ClusterSet::ranked(vec![cluster(&["a", "b"], &[0.7])]);
        let json = serde_json::to_value(&set).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["rank"], 1);
        assert_eq!(arr[0]["size"], 2);
        assert_eq!(arr[0]["entity_ids"], serde_json::json!(["a", "b"]));
    }
}
