//! Normalization of raw match records.
//!
//! The scoring service emits records in two shapes:
//!
//! - **structured**: `{left_entity: {...}, right_entity: {...}, left_id?,
//!   right_id?, match_probability}`
//! - **flat**: one column per field and side (`first_name_l`,
//!   `first_name_r`, ...) plus `match_probability`.
//!
//! Both become a [`MatchRecord`]. A record whose identifiers cannot be
//! resolved is rejected; identifiers are never invented.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::entity::{Attributes, EntityId};
use crate::error::InputError;
use crate::record::MatchRecord;

/// Probability field name shared by both record shapes.
pub const PROBABILITY_FIELD: &str = "match_probability";

/// Identifier aliases tried when no primary key resolves.
pub const ID_ALIASES: [&str; 3] = ["unique_id", "id", "id1"];

const LEFT_SUFFIX: &str = "_l";
const RIGHT_SUFFIX: &str = "_r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Left => LEFT_SUFFIX,
            Self::Right => RIGHT_SUFFIX,
        }
    }

    const fn entity_field(self) -> &'static str {
        match self {
            Self::Left => "left_entity",
            Self::Right => "right_entity",
        }
    }

    const fn id_field(self) -> &'static str {
        match self {
            Self::Left => "left_id",
            Self::Right => "right_id",
        }
    }

    const fn missing(self) -> InputError {
        match self {
            Self::Left => InputError::MissingLeftId,
            Self::Right => InputError::MissingRightId,
        }
    }
}

/// A record dropped during batch normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Position of the record in the input batch.
    pub index: usize,
    /// Reason code, see [`InputError::code`].
    pub code: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl Rejection {
    fn new(index: usize, err: &InputError) -> Self {
        Self {
            index,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Accepted records plus rejections, in input order.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Records that normalized.
    pub records: Vec<MatchRecord>,
    /// Records that were dropped.
    pub rejections: Vec<Rejection>,
}

/// Converts raw match records into [`MatchRecord`]s.
///
/// # Examples
///
/// ```
/// use entify::MatchRecordNormalizer;
/// use serde_json::json;
///
/// let normalizer = MatchRecordNormalizer::new();
/// let rec = normalizer
///     .normalize(&json!({"unique_id_l": 1, "unique_id_r": 2, "name_l": "Ann", "name_r": "Anne", "match_probability": 0.93}))
///     .unwrap();
/// assert_eq!(rec.left_id.as_str(), "1");
/// assert_eq!(rec.right_attrs["name"], json!("Anne"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MatchRecordNormalizer {
    primary_key: Option<String>,
}

impl MatchRecordNormalizer {
    /// Normalizer that relies on the built-in id aliases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer that tries `primary_key` before any alias.
    #[must_use]
    pub fn with_primary_key(primary_key: impl Into<String>) -> Self {
        let key = primary_key.into();
        let key = key.trim();
        Self {
            primary_key: (!key.is_empty()).then(|| key.to_string()),
        }
    }

    /// Primary-key field in use, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Normalizes one raw record.
    ///
    /// # Errors
    ///
    /// Returns the [`InputError`] explaining why the record was rejected.
    pub fn normalize(&self, raw: &Value) -> Result<MatchRecord, InputError> {
        let Value::Object(fields) = raw else {
            return Err(InputError::MalformedRecord {
                reason: "record is not a JSON object".to_string(),
            });
        };

        let structured =
            fields.contains_key(Side::Left.entity_field()) && fields.contains_key(Side::Right.entity_field());

        let (left_attrs, right_attrs) = if structured {
            (
                entity_object(fields, Side::Left)?,
                entity_object(fields, Side::Right)?,
            )
        } else {
            split_flat(fields)
        };

        let left_id = self
            .resolve_id(fields, &left_attrs, Side::Left)
            .ok_or_else(|| Side::Left.missing())?;
        let right_id = self
            .resolve_id(fields, &right_attrs, Side::Right)
            .ok_or_else(|| Side::Right.missing())?;

        if left_id == right_id {
            return Err(InputError::SameEntity {
                id: left_id.into_string(),
            });
        }

        let probability = probability(fields)?;

        Ok(MatchRecord {
            left_id,
            right_id,
            probability,
            left_attrs,
            right_attrs,
        })
    }

    /// Normalizes a batch, collecting rejections instead of failing.
    pub fn normalize_batch<'a, I>(&self, raw: I) -> NormalizedBatch
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut batch = NormalizedBatch::default();
        for (index, value) in raw.into_iter().enumerate() {
            match self.normalize(value) {
                Ok(record) => batch.records.push(record),
                Err(err) => {
                    debug!(target: "entify::normalize", index, code = err.code(), "rejected match record: {err}");
                    batch.rejections.push(Rejection::new(index, &err));
                }
            }
        }
        batch
    }

    fn resolve_id(&self, fields: &Attributes, entity: &Attributes, side: Side) -> Option<EntityId> {
        if let Some(id) = self
            .primary_key
            .as_deref()
            .and_then(|pk| entity.get(pk))
            .and_then(EntityId::from_value)
        {
            return Some(id);
        }

        if let Some(id) = fields.get(side.id_field()).and_then(EntityId::from_value) {
            return Some(id);
        }

        if let Some(id) = ID_ALIASES
            .iter()
            .find_map(|alias| entity.get(*alias).and_then(EntityId::from_value))
        {
            return Some(id);
        }

        ["unique_id", "id"]
            .iter()
            .find_map(|base| {
                fields
                    .get(&format!("{base}{}", side.suffix()))
                    .and_then(EntityId::from_value)
            })
    }
}

fn entity_object(fields: &Attributes, side: Side) -> Result<Attributes, InputError> {
    match fields.get(side.entity_field()) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::Null) | None => Ok(Attributes::new()),
        Some(_) => Err(InputError::MalformedRecord {
            reason: format!("'{}' is not an object", side.entity_field()),
        }),
    }
}

fn split_flat(fields: &Attributes) -> (Attributes, Attributes) {
    let mut left = Attributes::new();
    let mut right = Attributes::new();
    for (key, value) in fields {
        if let Some(base) = key.strip_suffix(LEFT_SUFFIX).filter(|b| !b.is_empty()) {
            left.insert(base.to_string(), value.clone());
        } else if let Some(base) = key.strip_suffix(RIGHT_SUFFIX).filter(|b| !b.is_empty()) {
            right.insert(base.to_string(), value.clone());
        }
    }
    (left, right)
}

fn probability(fields: &Attributes) -> Result<f64, InputError> {
    let raw = fields
        .get(PROBABILITY_FIELD)
        .ok_or_else(|| InputError::InvalidProbability {
            reason: format!("'{PROBABILITY_FIELD}' is missing"),
        })?;

    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| InputError::InvalidProbability {
        reason: format!("'{raw}' is not a number"),
    })?;

    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(InputError::InvalidProbability {
            reason: format!("{value} is outside [0.0, 1.0]"),
        });
    }
    Ok(value)
}
