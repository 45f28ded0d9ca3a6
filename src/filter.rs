//! Post-assembly filtering by cluster size.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSet;
use crate::error::ConfigError;

/// Inclusive cluster size range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSizeRange")]
pub struct SizeRange {
    min: usize,
    max: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSizeRange {
    #[serde(default)]
    min: Option<usize>,
    #[serde(default)]
    max: Option<usize>,
}

impl TryFrom<RawSizeRange> for SizeRange {
    type Error = ConfigError;

    fn try_from(raw: RawSizeRange) -> Result<Self, Self::Error> {
        let (min, max) = raw.bounds();
        Self::new(min, max)
    }
}

impl RawSizeRange {
    fn bounds(&self) -> (usize, usize) {
        (self.min.unwrap_or(1), self.max.unwrap_or(usize::MAX))
    }
}

/// Deserializes an optional range without checking `min <= max`.
///
/// Used by config structs whose `validate` reports the typed
/// [`ConfigError::InvalidSizeRange`] instead of a parse error.
pub(crate) fn deserialize_unchecked<'de, D>(deserializer: D) -> Result<Option<SizeRange>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<RawSizeRange>::deserialize(deserializer)?;
    Ok(raw.map(|raw| {
        let (min, max) = raw.bounds();
        SizeRange { min, max }
    }))
}

impl SizeRange {
    /// Creates a range.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSizeRange`] when `min > max`.
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidSizeRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Range with no upper bound.
    #[must_use]
    pub const fn at_least(min: usize) -> Self {
        Self {
            min,
            max: usize::MAX,
        }
    }

    /// Smallest size kept.
    #[must_use]
    pub const fn min(&self) -> usize {
        self.min
    }

    /// Largest size kept.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// True when `size` lies in the range.
    #[must_use]
    pub const fn contains(&self, size: usize) -> bool {
        size >= self.min && size <= self.max
    }
}

/// Keeps clusters whose size lies in `range`, preserving order and ranks.
#[must_use]
pub fn filter_by_size(set: &ClusterSet, range: SizeRange) -> ClusterSet {
    ClusterSet::from_ordered(
        set.iter()
            .filter(|c| range.contains(c.size))
            .cloned()
            .collect(),
    )
}
