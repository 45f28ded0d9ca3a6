//! Canonical match records and graph edges.

use serde::{Deserialize, Serialize};

use crate::entity::{Attributes, Entity, EntityId};

/// A normalized pairwise match produced by the external scoring service.
///
/// Built by the normalizer; `left_id != right_id` and `probability` is
/// finite and within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Id of the left entity.
    pub left_id: EntityId,
    /// Id of the right entity.
    pub right_id: EntityId,
    /// Match probability in `[0, 1]`.
    pub probability: f64,
    /// Left-side fields with the side suffix stripped.
    #[serde(default)]
    pub left_attrs: Attributes,
    /// Right-side fields with the side suffix stripped.
    #[serde(default)]
    pub right_attrs: Attributes,
}

impl MatchRecord {
    /// Left side as an entity.
    #[must_use]
    pub fn left_entity(&self) -> Entity {
        Entity::with_attributes(self.left_id.clone(), self.left_attrs.clone())
    }

    /// Right side as an entity.
    #[must_use]
    pub fn right_entity(&self) -> Entity {
        Entity::with_attributes(self.right_id.clone(), self.right_attrs.clone())
    }

    /// The edge this record contributes to the match graph.
    #[must_use]
    pub fn edge(&self) -> Edge {
        Edge {
            source_id: self.left_id.clone(),
            target_id: self.right_id.clone(),
            score: self.probability,
        }
    }
}

/// One surviving match between two entities.
///
/// Edges are not deduplicated: a pair scored twice yields two edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Left entity of the match.
    pub source_id: EntityId,
    /// Right entity of the match.
    pub target_id: EntityId,
    /// Match probability.
    pub score: f64,
}
