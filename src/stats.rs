//! Size-bucketed statistics over a [`ClusterSet`].

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSet;

/// Size bucket of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    /// Exactly one entity.
    Singleton,
    /// Exactly two entities.
    Pair,
    /// 3 to 5 entities.
    Small,
    /// 6 to 10 entities.
    Medium,
    /// More than 10 entities.
    Large,
}

impl SizeBucket {
    /// Bucket for a cluster size. Size 0 never occurs and maps to `Singleton`.
    #[must_use]
    pub const fn of(size: usize) -> Self {
        match size {
            0 | 1 => Self::Singleton,
            2 => Self::Pair,
            3..=5 => Self::Small,
            6..=10 => Self::Medium,
            _ => Self::Large,
        }
    }
}

/// Cluster counts per size bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeDistribution {
    /// Clusters of size 1.
    pub singleton: usize,
    /// Clusters of size 2.
    pub pair: usize,
    /// Clusters of size 3 to 5.
    pub small: usize,
    /// Clusters of size 6 to 10.
    pub medium: usize,
    /// Clusters above size 10.
    pub large: usize,
}

impl SizeDistribution {
    fn bump(&mut self, bucket: SizeBucket) {
        let slot = match bucket {
            SizeBucket::Singleton => &mut self.singleton,
            SizeBucket::Pair => &mut self.pair,
            SizeBucket::Small => &mut self.small,
            SizeBucket::Medium => &mut self.medium,
            SizeBucket::Large => &mut self.large,
        };
        *slot += 1;
    }

    /// Count for one bucket.
    #[must_use]
    pub const fn get(&self, bucket: SizeBucket) -> usize {
        match bucket {
            SizeBucket::Singleton => self.singleton,
            SizeBucket::Pair => self.pair,
            SizeBucket::Small => self.small,
            SizeBucket::Medium => self.medium,
            SizeBucket::Large => self.large,
        }
    }
}

/// Dashboard statistics for one cluster set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatistics {
    /// Number of clusters.
    pub total_clusters: usize,
    /// Sum of cluster sizes.
    pub total_entities: usize,
    /// Edges across all clusters.
    pub total_edges: usize,
    /// Mean cluster size, 0 for an empty set.
    pub average_size: f64,
    /// Largest cluster size.
    pub max_size: usize,
    /// Cluster counts per size bucket.
    pub distribution: SizeDistribution,
}

impl ClusterStatistics {
    /// Computes statistics. An empty set yields all zeros.
    #[must_use]
    pub fn compute(set: &ClusterSet) -> Self {
        let mut stats = Self::default();
        for cluster in set {
            stats.total_clusters += 1;
            stats.total_entities += cluster.size;
            stats.total_edges += cluster.edges.len();
            stats.max_size = stats.max_size.max(cluster.size);
            stats.distribution.bump(SizeBucket::of(cluster.size));
        }
        if stats.total_clusters > 0 {
            stats.average_size = stats.total_entities as f64 / stats.total_clusters as f64;
        }
        stats
    }
}
