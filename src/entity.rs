//! Entity identity and attributes.
//!
//! Entities are referenced by string identifiers everywhere in the engine.
//! Identity is the id alone: two entities with the same id are the same
//! entity regardless of the attributes each record carried for it.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field-name suffix for the cleaned variant of an attribute.
pub const CLEANED_SUFFIX: &str = "_cleaned";

/// Attribute map carried by an entity.
pub type Attributes = serde_json::Map<String, Value>;

/// Identifier of an entity, as resolved from a match record.
///
/// Always non-empty and trimmed.
///
/// # Examples
///
/// ```
/// use entify::EntityId;
///
/// let id = EntityId::parse("  42 ").unwrap();
/// assert_eq!(id.as_str(), "42");
/// assert!(EntityId::parse("   ").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Parses an identifier from text. Returns `None` when it is blank.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Extracts an identifier from a JSON value.
    ///
    /// Strings are trimmed; integers and floats use their canonical decimal
    /// rendering. Every other value kind yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => Self::parse(&n.to_string()),
            _ => None,
        }
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A resolved entity: an identifier plus its attributes.
///
/// # Examples
///
/// ```
/// use entify::{Entity, EntityId};
/// use serde_json::json;
///
/// let mut entity = Entity::new(EntityId::parse("p1").unwrap());
/// entity.attributes.insert("name".into(), json!("Jon Smith"));
/// entity.attributes.insert("name_cleaned".into(), json!("jon smith"));
///
/// assert_eq!(entity.preferred("name"), Some(&json!("jon smith")));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier.
    pub id: EntityId,

    /// Field name to value.
    #[serde(default)]
    pub attributes: Attributes,
}

impl Entity {
    /// Creates an entity with no attributes.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
        }
    }

    /// Creates an entity with the given attributes.
    #[must_use]
    pub fn with_attributes(id: EntityId, attributes: Attributes) -> Self {
        Self { id, attributes }
    }

    /// Raw value of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Cleaned variant of a field (`<name>_cleaned`), if present.
    #[must_use]
    pub fn cleaned(&self, name: &str) -> Option<&Value> {
        self.attributes.get(&format!("{name}{CLEANED_SUFFIX}"))
    }

    /// Cleaned value when present and non-null, else the raw value.
    #[must_use]
    pub fn preferred(&self, name: &str) -> Option<&Value> {
        match self.cleaned(name) {
            Some(v) if !v.is_null() => Some(v),
            _ => self.field(name),
        }
    }

    /// Field names without their cleaned variants.
    pub fn base_fields(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .keys()
            .map(String::as_str)
            .filter(|k| !k.ends_with(CLEANED_SUFFIX))
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
