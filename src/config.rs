//! Resolution run configuration.
//!
//! All run parameters are explicit values passed into each call; nothing is
//! read from global state. Configs can be built in code or parsed from TOML:
//!
//! ```toml
//! min_probability = 0.8
//! primary_key = "person_id"
//!
//! [size_range]
//! min = 2
//! max = 50
//!
//! [enrichment]
//! table = "input_data"
//! id_column = "person_id"
//! ```

use serde::{Deserialize, Serialize};

use crate::assemble::validate_threshold;
use crate::error::ConfigError;
use crate::filter::{deserialize_unchecked, SizeRange};

/// Default match probability threshold.
pub const DEFAULT_MIN_PROBABILITY: f64 = 0.5;

fn default_min_probability() -> f64 {
    DEFAULT_MIN_PROBABILITY
}

/// Where enrichment reads original records from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Store table holding the original records.
    pub table: String,
    /// Preferred id column; verified against the table before use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
}

/// Parameters of one resolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Minimum match probability for an edge to count.
    #[serde(default = "default_min_probability")]
    pub min_probability: f64,

    /// Field tried first when resolving entity ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Optional inclusive cluster size filter.
    #[serde(
        default,
        deserialize_with = "deserialize_unchecked",
        skip_serializing_if = "Option::is_none"
    )]
    pub size_range: Option<SizeRange>,

    /// Optional store lookup for original records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentConfig>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            min_probability: DEFAULT_MIN_PROBABILITY,
            primary_key: None,
            size_range: None,
            enrichment: None,
        }
    }
}

impl ResolutionConfig {
    /// Config with the given threshold and defaults elsewhere.
    #[must_use]
    pub fn with_threshold(min_probability: f64) -> Self {
        Self {
            min_probability,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, or any validation error.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the threshold, the size range and the enrichment table name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ThresholdOutOfRange`], [`ConfigError::InvalidSizeRange`]
    /// or [`ConfigError::MissingField`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.min_probability)?;
        if let Some(range) = self.size_range {
            SizeRange::new(range.min(), range.max())?;
        }
        if let Some(enrichment) = &self.enrichment {
            if enrichment.table.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "enrichment.table".to_string(),
                });
            }
        }
        Ok(())
    }
}
